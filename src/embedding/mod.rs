//! 임베딩 모듈 - 텍스트 벡터화
//!
//! 청크와 질의를 같은 함수로 벡터화합니다.
//! 한 세션 동안 하나의 프로바이더만 사용해야 벡터끼리 비교할 수 있습니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let provider = create_provider(ProviderKind::Auto, None)?;
//! let embedder = Embedder::new(provider);
//! let vectors = embedder.embed(&chunks).await?;
//! let query = embedder.embed_one("Hello, world!").await?;
//! ```

mod gemini;
mod hashing;
mod local;
mod openai;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use gemini::GeminiEmbedding;
pub use hashing::{HashingEmbedding, DEFAULT_HASHING_DIMENSION};
pub use local::{FastEmbedding, LOCAL_EMBEDDING_DIMENSION};
pub use openai::{OpenAiEmbedding, DEFAULT_OPENAI_MODEL};

/// 임베딩 호출 기본 타임아웃
pub const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// Errors
// ============================================================================

/// 임베딩 실패
///
/// 어떤 경우에도 부분 결과는 반환하지 않습니다.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),

    #[error("embedding request timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed embedding response: {0}")]
    Malformed(String),
}

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트 배치를 같은 순서의 벡터 배치로 변환하는 인터페이스입니다.
/// 같은 텍스트는 배치 구성과 무관하게 항상 같은 벡터가 되어야 합니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 배치 임베딩
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// 요청 전 대기 (rate limit 등). 이 대기는 요청 타임아웃에 포함되지 않습니다.
    async fn throttle(&self) {}

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더(모델) 이름
    fn name(&self) -> &str;

    /// 한 번의 요청에 보낼 수 있는 최대 텍스트 수
    fn max_batch_size(&self) -> usize {
        64
    }
}

// ============================================================================
// Embedder
// ============================================================================

/// 프로바이더를 감싸 계약을 강제하는 임베더
///
/// - 결과 개수 == 입력 개수
/// - 모든 벡터 길이 == `dimension()`
/// - 요청마다 타임아웃 적용
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
}

impl Embedder {
    /// 프로바이더를 주입하여 생성
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            timeout: DEFAULT_EMBED_TIMEOUT,
        }
    }

    /// 요청 타임아웃 지정
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    pub fn model(&self) -> &str {
        self.provider.name()
    }

    /// 배치 임베딩
    ///
    /// 프로바이더의 최대 배치 크기로 나눠 순차 호출합니다.
    /// 하나라도 실패하면 전체가 실패합니다.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batch_size = self.provider.max_batch_size().max(1);
        let total = texts.len().div_ceil(batch_size);
        let mut results = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(batch_size).enumerate() {
            tracing::debug!(
                "Embedding batch {}/{} ({} texts, {})",
                i + 1,
                total,
                batch.len(),
                self.provider.name()
            );

            self.provider.throttle().await;
            let vectors = tokio::time::timeout(self.timeout, self.provider.embed_batch(batch))
                .await
                .map_err(|_| EmbedError::Timeout(self.timeout))??;

            self.validate(batch.len(), &vectors)?;
            results.extend(vectors);
        }

        Ok(results)
    }

    /// 단일 텍스트 임베딩 (배치와 같은 경로를 사용)
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EmbedError::Malformed("no vector returned".to_string()))
    }

    fn validate(&self, expected: usize, vectors: &[Vec<f32>]) -> Result<(), EmbedError> {
        if vectors.len() != expected {
            return Err(EmbedError::Malformed(format!(
                "{} returned {} vectors for {} inputs",
                self.provider.name(),
                vectors.len(),
                expected
            )));
        }

        let dimension = self.provider.dimension();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(EmbedError::Malformed(format!(
                "{} returned a {}-dimensional vector, expected {}",
                self.provider.name(),
                bad.len(),
                dimension
            )));
        }

        Ok(())
    }
}

impl fmt::Debug for Embedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Embedder")
            .field("model", &self.provider.name())
            .field("dimension", &self.provider.dimension())
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// Provider Selection
// ============================================================================

/// 임베딩 프로바이더 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    /// API 키가 있으면 Gemini → OpenAI, 없으면 로컬 모델
    #[default]
    Auto,
    /// fastembed all-MiniLM-L6-v2
    Local,
    /// 오프라인 해싱 (모델 다운로드 없음)
    Hashing,
    Gemini,
    OpenAi,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "local" | "minilm" => Ok(Self::Local),
            "hashing" => Ok(Self::Hashing),
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!(
                "unknown provider '{}': expected auto, local, hashing, gemini or openai",
                other
            )),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Local => "local",
            Self::Hashing => "hashing",
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
        };
        f.write_str(name)
    }
}

impl ProviderKind {
    /// `Auto`를 환경변수 기준으로 구체적인 종류로 결정
    pub fn resolve(self) -> Self {
        match self {
            Self::Auto if has_gemini_key() => Self::Gemini,
            Self::Auto if has_openai_key() => Self::OpenAi,
            Self::Auto => Self::Local,
            other => other,
        }
    }
}

/// 임베딩 프로바이더 생성
///
/// 프로세스 시작 시 한 번 호출하고, 결과를 `Embedder`에 주입해 재사용합니다.
///
/// # Arguments
/// * `kind` - 프로바이더 종류
/// * `dimension` - 차원 (None이면 프로바이더 기본값)
pub fn create_provider(
    kind: ProviderKind,
    dimension: Option<usize>,
) -> Result<Arc<dyn EmbeddingProvider>, EmbedError> {
    let provider: Arc<dyn EmbeddingProvider> = match kind.resolve() {
        ProviderKind::Gemini => Arc::new(GeminiEmbedding::from_env(dimension)?),
        ProviderKind::OpenAi => Arc::new(OpenAiEmbedding::from_env(dimension)?),
        ProviderKind::Local | ProviderKind::Auto => Arc::new(FastEmbedding::new(dimension)?),
        ProviderKind::Hashing => Arc::new(HashingEmbedding::new(
            dimension.unwrap_or(DEFAULT_HASHING_DIMENSION),
        )?),
    };

    tracing::info!(
        "Using {} embedding (dimension: {})",
        provider.name(),
        provider.dimension()
    );
    Ok(provider)
}

// ============================================================================
// API Key Management
// ============================================================================

/// 비어있지 않은 환경변수 값
fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Gemini API 키 로드
///
/// 우선순위:
/// 1. `GEMINI_API_KEY` 환경변수
/// 2. `GOOGLE_AI_API_KEY` 환경변수
pub fn gemini_api_key() -> Result<String, EmbedError> {
    non_empty_env("GEMINI_API_KEY")
        .or_else(|| non_empty_env("GOOGLE_AI_API_KEY"))
        .ok_or_else(|| {
            EmbedError::Unavailable(
                "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable."
                    .to_string(),
            )
        })
}

/// OpenAI API 키 로드 (`OPENAI_API_KEY`)
pub fn openai_api_key() -> Result<String, EmbedError> {
    non_empty_env("OPENAI_API_KEY").ok_or_else(|| {
        EmbedError::Unavailable(
            "API key not found. Set OPENAI_API_KEY environment variable.".to_string(),
        )
    })
}

pub fn has_gemini_key() -> bool {
    gemini_api_key().is_ok()
}

pub fn has_openai_key() -> bool {
    openai_api_key().is_ok()
}

// ============================================================================
// Tests
// ============================================================================
