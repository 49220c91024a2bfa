//! Google Gemini 임베딩
//!
//! `batchEmbedContents` 엔드포인트로 한 번에 여러 텍스트를 벡터화합니다.
//! ref: https://ai.google.dev/gemini-api/docs/embeddings

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{gemini_api_key, EmbedError, EmbeddingProvider};

/// Gemini 배치 임베딩 API 엔드포인트 (gemini-embedding-001 - MRL 지원)
const GEMINI_BATCH_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-001:batchEmbedContents";

const GEMINI_MODEL: &str = "models/gemini-embedding-001";

/// 청크와 질의가 같은 벡터 공간에 있어야 하므로 작업 유형은 하나로 고정
const TASK_TYPE: &str = "SEMANTIC_SIMILARITY";

/// 기본 임베딩 차원
pub const DEFAULT_GEMINI_DIMENSION: usize = 768;

/// 배치 요청 당 최대 텍스트 수
const MAX_BATCH: usize = 100;

/// Rate Limiter 설정 (Gemini 무료 티어: 60 RPM)
const RATE_LIMIT_RPM: u32 = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// 호출 간 최소 딜레이 (1000ms = 60 RPM 준수)
const MIN_DELAY_MS: u64 = 1000;

/// Google Gemini 임베딩 구현체
#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: String,
    client: reqwest::Client,
    dimension: usize,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// Rate Limiter with minimum delay between requests
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay: Duration::from_millis(MIN_DELAY_MS),
            last_request: None,
        }
    }

    /// 요청 가능 시점까지 대기
    async fn acquire(&mut self) {
        // 1. 최소 딜레이 (버스트 방지)
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                let wait_time = self.min_delay - elapsed;
                tracing::debug!("Min delay: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        // 2. 윈도우 밖의 오래된 요청 제거
        let now = Instant::now();
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        // 3. 윈도우 내 요청 수 초과 시 가장 오래된 요청이 빠질 때까지 대기
        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window.saturating_sub(now.duration_since(oldest));
                if !wait_time.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

impl GeminiEmbedding {
    /// 차원을 지정하여 생성
    ///
    /// # Arguments
    /// * `api_key` - Google AI API 키
    /// * `dimension` - 임베딩 차원 (768, 1536, 3072 중 선택)
    pub fn with_dimension(api_key: String, dimension: usize) -> Result<Self, EmbedError> {
        if ![768, 1536, 3072].contains(&dimension) {
            return Err(EmbedError::Unavailable(format!(
                "Invalid dimension: {}. Must be 768, 1536, or 3072",
                dimension
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EmbedError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            client,
            dimension,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                RATE_LIMIT_RPM,
                RATE_LIMIT_WINDOW,
            ))),
        })
    }

    /// 환경변수의 API 키로 생성
    pub fn from_env(dimension: Option<usize>) -> Result<Self, EmbedError> {
        let api_key = gemini_api_key()?;
        Self::with_dimension(api_key, dimension.unwrap_or(DEFAULT_GEMINI_DIMENSION))
    }

    fn build_request(&self, texts: &[String]) -> BatchEmbedRequest {
        BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: GEMINI_MODEL.to_string(),
                    content: EmbedContent {
                        parts: vec![EmbedPart { text: text.clone() }],
                    },
                    task_type: TASK_TYPE.to_string(),
                    output_dimensionality: Some(self.dimension),
                })
                .collect(),
        }
    }
}

/// Gemini API 요청 본문
#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(rename = "taskType")]
    task_type: String,
    #[serde(rename = "outputDimensionality", skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

/// Gemini API 응답
#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    /// 분당 요청 한도 대기
    async fn throttle(&self) {
        let mut limiter = self.rate_limiter.lock().await;
        limiter.acquire().await;
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // API 키는 URL이 아닌 헤더로 전송
        let response = self
            .client
            .post(GEMINI_BATCH_URL)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.build_request(texts))
            .send()
            .await
            .map_err(|e| {
                EmbedError::Unavailable(format!("Failed to send embedding request: {}", e))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EmbedError::Unavailable(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
                return Err(EmbedError::Unavailable(format!(
                    "Gemini API error ({}): {}",
                    error.error.status, error.error.message
                )));
            }
            return Err(EmbedError::Unavailable(format!(
                "Gemini API error ({}): {}",
                status, body
            )));
        }

        let parsed: BatchEmbedResponse = serde_json::from_str(&body).map_err(|e| {
            EmbedError::Malformed(format!("Failed to parse embedding response: {}", e))
        })?;

        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "gemini-embedding-001"
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH
    }
}
