//! 벡터 유사도 - 메트릭 정의 및 계산
//!
//! 한 코퍼스는 하나의 메트릭만 사용합니다.
//! 점수는 항상 "높을수록 유사"입니다 (L2는 음의 거리로 표현).

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

// ============================================================================
// SimilarityMetric
// ============================================================================

/// 유사도 메트릭
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// 코사인 유사도 (-1.0 ~ 1.0)
    #[default]
    Cosine,
    /// 음의 유클리드 거리 (-inf ~ 0.0)
    L2,
}

impl SimilarityMetric {
    /// 두 벡터의 점수 (높을수록 유사)
    pub fn score(self, query: &[f32], candidate: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(query, candidate),
            Self::L2 => -euclidean_distance(query, candidate),
        }
    }

    /// 이 메트릭에서 가능한 최대 점수 (동일 벡터)
    pub fn max_score(self) -> f32 {
        match self {
            Self::Cosine => 1.0,
            Self::L2 => 0.0,
        }
    }
}

impl FromStr for SimilarityMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "l2" | "euclidean" => Ok(Self::L2),
            other => Err(format!("unknown metric '{}': expected cosine or l2", other)),
        }
    }
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => f.write_str("cosine"),
            Self::L2 => f.write_str("l2"),
        }
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다.
/// 길이가 다르거나, 비어 있거나, 영벡터가 포함되면 0.0을 반환합니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// 유클리드(L2) 거리
///
/// 길이가 다르면 `f32::INFINITY`를 반환합니다.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

// ============================================================================
// Tests
// ============================================================================
