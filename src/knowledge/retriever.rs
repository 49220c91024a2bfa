//! Retriever - top-k 유사도 검색
//!
//! 질의를 코퍼스와 같은 임베더로 벡터화한 뒤 모든 벡터와 비교하는 brute-force 검색입니다.
//! 정렬은 점수 내림차순, 동점은 삽입 순서(먼저 들어온 청크 우선)입니다.

use std::cmp::Ordering;

use serde::Serialize;
use thiserror::Error;

use crate::embedding::{EmbedError, Embedder};

use super::chunker::Chunk;
use super::corpus::CorpusStore;

// ============================================================================
// Types
// ============================================================================

/// 검색 결과 (높은 점수가 더 유사)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("failed to embed query: {0}")]
    Embedding(#[from] EmbedError),

    #[error("query dimension {actual} does not match corpus dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

// ============================================================================
// Retriever
// ============================================================================

/// 질의 → top-k 검색기
#[derive(Debug, Clone)]
pub struct Retriever {
    embedder: Embedder,
}

impl Retriever {
    /// 코퍼스를 만든 것과 같은 임베더로 생성해야 합니다.
    pub fn new(embedder: Embedder) -> Self {
        Self { embedder }
    }

    /// 질의와 가장 유사한 청크 `top_n`개
    ///
    /// 빈 코퍼스, 빈 질의, `top_n == 0`은 에러가 아니라 빈 결과입니다.
    /// 이 경우 임베더를 호출하지 않습니다.
    pub async fn top_matches(
        &self,
        corpus: &CorpusStore,
        query: &str,
        top_n: usize,
    ) -> Result<Vec<Match>, RetrieveError> {
        if corpus.is_empty() || top_n == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_one(query).await?;
        rank(corpus, &query_vector, top_n)
    }
}

/// 질의 벡터로 코퍼스 전체를 점수화하여 상위 `top_n`개 반환
///
/// `top_n`이 코퍼스 크기보다 크면 코퍼스 크기로 줄입니다.
/// NaN 점수는 항상 마지막 순위입니다.
pub fn rank(
    corpus: &CorpusStore,
    query_vector: &[f32],
    top_n: usize,
) -> Result<Vec<Match>, RetrieveError> {
    if corpus.is_empty() || top_n == 0 {
        return Ok(Vec::new());
    }

    if let Some(expected) = corpus.dimension() {
        if query_vector.len() != expected {
            return Err(RetrieveError::DimensionMismatch {
                expected,
                actual: query_vector.len(),
            });
        }
    }

    let metric = corpus.metric();
    let mut scored: Vec<(usize, f32)> = corpus
        .all_embeddings()
        .iter()
        .enumerate()
        .map(|(i, embedding)| {
            let score = metric.score(query_vector, embedding);
            (i, if score.is_nan() { f32::NEG_INFINITY } else { score })
        })
        .collect();

    // stable sort: 동점이면 삽입 순서 유지
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_n);

    let chunks = corpus.all_chunks();
    Ok(scored
        .into_iter()
        .map(|(i, score)| Match {
            chunk: chunks[i].clone(),
            score,
        })
        .collect())
}

// ============================================================================
// Tests
// ============================================================================
