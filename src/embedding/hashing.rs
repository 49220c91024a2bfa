//! 오프라인 해싱 임베딩
//!
//! 모델 다운로드나 네트워크 없이 동작하는 결정적 임베딩입니다.
//! `--provider hashing`으로 명시했을 때와 테스트에서만 사용합니다.
//! 소문자화한 영숫자 토큰을 SHA-256으로 버킷/부호에 매핑하여 누적한 뒤 L2 정규화합니다.
//! 의미 이해 수준은 낮지만, 같은 텍스트에는 항상 같은 벡터를 돌려줍니다.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{EmbedError, EmbeddingProvider};

/// 기본 차원 (all-MiniLM-L6-v2와 동일)
pub const DEFAULT_HASHING_DIMENSION: usize = 384;

/// Feature hashing 기반 bag-of-words 임베딩
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dimension: usize,
}

impl HashingEmbedding {
    pub fn new(dimension: usize) -> Result<Self, EmbedError> {
        if dimension == 0 {
            return Err(EmbedError::Unavailable(
                "hashing embedding dimension must be positive".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    /// 단일 텍스트를 벡터로 변환
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());

            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

            vector[index] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }

        vector
    }
}

impl Default for HashingEmbedding {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_HASHING_DIMENSION,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing-bow"
    }

    fn max_batch_size(&self) -> usize {
        1024
    }
}

/// 소문자 영숫자 토큰
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}
