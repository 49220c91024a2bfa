//! 로컬 문장 임베딩 (fastembed)
//!
//! sentence-transformers/all-MiniLM-L6-v2 모델을 CPU에서 실행합니다.
//! 모델은 첫 호출 시 한 번 내려받아 로드하며, 추론은 blocking 스레드에서 수행합니다.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use super::{EmbedError, EmbeddingProvider};

/// all-MiniLM-L6-v2 출력 차원
pub const LOCAL_EMBEDDING_DIMENSION: usize = 384;

const LOCAL_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// 요청 당 최대 텍스트 수
const MAX_BATCH: usize = 256;

/// 모델 입력 최대 문자 수 (초과분은 잘라냄)
const MAX_CHARS: usize = 2000;

/// fastembed 기반 로컬 임베딩
pub struct FastEmbedding {
    model: Arc<Mutex<Option<TextEmbedding>>>,
}

impl FastEmbedding {
    /// 생성 (모델 로드는 첫 임베딩 시점)
    ///
    /// # Arguments
    /// * `dimension` - None 또는 384만 허용
    pub fn new(dimension: Option<usize>) -> Result<Self, EmbedError> {
        if let Some(dimension) = dimension.filter(|&d| d != LOCAL_EMBEDDING_DIMENSION) {
            return Err(EmbedError::Unavailable(format!(
                "{} produces {}-dimensional vectors, {} requested",
                LOCAL_MODEL_NAME, LOCAL_EMBEDDING_DIMENSION, dimension
            )));
        }

        Ok(Self {
            model: Arc::new(Mutex::new(None)),
        })
    }

    /// 모델 로드 여부
    pub fn is_loaded(&self) -> bool {
        self.model.lock().map(|m| m.is_some()).unwrap_or(false)
    }
}

impl fmt::Debug for FastEmbedding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FastEmbedding")
            .field("model", &LOCAL_MODEL_NAME)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let inputs: Vec<String> = texts
            .iter()
            .map(|t| truncate_to_chars(t, MAX_CHARS).into_owned())
            .collect();

        tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>, EmbedError> {
            let mut guard = model.lock().map_err(|_| {
                EmbedError::Unavailable("local embedding model lock poisoned".to_string())
            })?;

            if guard.is_none() {
                *guard = Some(load_model()?);
            }
            let embedder = guard.as_mut().ok_or_else(|| {
                EmbedError::Unavailable("local embedding model not loaded".to_string())
            })?;

            let mut vectors = embedder
                .embed(&inputs, Some(inputs.len()))
                .map_err(|e| EmbedError::Unavailable(format!("local embedding failed: {}", e)))?;

            vectors.iter_mut().for_each(|v| l2_normalize(v));
            Ok(vectors)
        })
        .await
        .map_err(|e| EmbedError::Unavailable(format!("embedding task failed: {}", e)))?
    }

    fn dimension(&self) -> usize {
        LOCAL_EMBEDDING_DIMENSION
    }

    fn name(&self) -> &str {
        LOCAL_MODEL_NAME
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH
    }
}

fn load_model() -> Result<TextEmbedding, EmbedError> {
    tracing::info!("Loading local embedding model: {}", LOCAL_MODEL_NAME);

    TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML6V2)).map_err(|e| {
        EmbedError::Unavailable(format!("failed to initialize {}: {}", LOCAL_MODEL_NAME, e))
    })
}

fn truncate_to_chars(input: &str, max_chars: usize) -> Cow<'_, str> {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(input[..idx].to_string()),
        None => Cow::Borrowed(input),
    }
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}
