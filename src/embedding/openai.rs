//! OpenAI 호환 임베딩
//!
//! `/embeddings` 엔드포인트를 사용합니다. `OPENAI_BASE_URL`로 호환 서버를 지정할 수 있습니다.
//! ref: https://platform.openai.com/docs/api-reference/embeddings

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{openai_api_key, EmbedError, EmbeddingProvider};

pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const MAX_BATCH: usize = 256;

/// OpenAI 임베딩 구현체
#[derive(Debug)]
pub struct OpenAiEmbedding {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    /// 0이면 아직 모름 (첫 응답에서 결정)
    dimension: AtomicUsize,
    /// 호출자가 지정한 차원은 항상 요청에 포함
    requested_dimension: Option<usize>,
}

/// 알려진 모델의 기본 출력 차원
fn native_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

impl OpenAiEmbedding {
    /// # Arguments
    /// * `api_key` - OpenAI API 키
    /// * `base_url` - API 베이스 URL
    /// * `model` - 모델 이름
    /// * `dimension` - 출력 차원 (None이면 모델 기본값, 모르는 모델은 첫 응답 기준)
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        dimension: Option<usize>,
    ) -> Result<Self, EmbedError> {
        if api_key.trim().is_empty() {
            return Err(EmbedError::Unavailable("missing OpenAI API key".to_string()));
        }
        if model.trim().is_empty() {
            return Err(EmbedError::Unavailable("missing OpenAI model name".to_string()));
        }
        if dimension == Some(0) {
            return Err(EmbedError::Unavailable(
                "OpenAI embedding dimension must be positive".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| EmbedError::Unavailable("invalid OpenAI API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()
            .map_err(|e| EmbedError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dimension: AtomicUsize::new(dimension.or_else(|| native_dimension(model)).unwrap_or(0)),
            requested_dimension: dimension,
        })
    }

    /// 환경변수로 생성
    ///
    /// - `OPENAI_API_KEY` (필수)
    /// - `OPENAI_BASE_URL` (선택)
    /// - `OPENAI_EMBEDDING_MODEL` (선택)
    pub fn from_env(dimension: Option<usize>) -> Result<Self, EmbedError> {
        let api_key = openai_api_key()?;
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("OPENAI_EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string());
        Self::new(&api_key, &base_url, &model, dimension)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// 응답을 입력 순서(index)대로 정렬
fn into_ordered(mut response: EmbeddingResponse) -> Vec<Vec<f32>> {
    response.data.sort_by_key(|entry| entry.index);
    response.data.into_iter().map(|entry| entry.embedding).collect()
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.requested_dimension,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbedError::Unavailable(format!("OpenAI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbedError::Unavailable(format!(
                "OpenAI embeddings request failed ({}): {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            EmbedError::Malformed(format!("failed to parse OpenAI embedding response: {}", e))
        })?;

        let vectors = into_ordered(parsed);
        if let Some(first) = vectors.first() {
            if self
                .dimension
                .compare_exchange(0, first.len(), Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                tracing::debug!("{} dimension detected: {}", self.model, first.len());
            }
        }

        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.model
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::embedding::Embedder;

    /// 요청 하나를 받아 `reply`로 응답하고, 받은 요청 본문을 돌려주는 로컬 서버
    async fn serve_once(reply: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/v1", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before headers");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
            let length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < header_end + length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                reply.len(),
                reply
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            String::from_utf8_lossy(&buf[header_end..]).to_string()
        });

        (base_url, handle)
    }

    fn provider_for(base_url: &str, model: &str, dimension: Option<usize>) -> OpenAiEmbedding {
        let mut provider = OpenAiEmbedding::new("sk-test", base_url, model, dimension).unwrap();
        // 로컬 서버는 환경 프록시를 거치지 않음
        provider.client = reqwest::Client::builder().no_proxy().build().unwrap();
        provider
    }

    fn reply_with(dimension: usize) -> String {
        serde_json::json!({
            "data": [{"index": 0, "embedding": vec![0.5_f32; dimension]}]
        })
        .to_string()
    }

    #[test]
    fn test_missing_key_rejected() {
        let result = OpenAiEmbedding::new(" ", DEFAULT_BASE_URL, DEFAULT_OPENAI_MODEL, None);
        assert!(matches!(result, Err(EmbedError::Unavailable(_))));
    }

    #[test]
    fn test_endpoint_and_dimension() {
        let embedder =
            OpenAiEmbedding::new("sk-test", "http://localhost:8080/v1/", "m", Some(512)).unwrap();
        assert_eq!(embedder.endpoint(), "http://localhost:8080/v1/embeddings");
        assert_eq!(embedder.dimension(), 512);
        assert_eq!(embedder.requested_dimension, Some(512));

        let small =
            OpenAiEmbedding::new("sk-test", DEFAULT_BASE_URL, DEFAULT_OPENAI_MODEL, None).unwrap();
        assert_eq!(small.dimension(), 1536);
        assert_eq!(small.requested_dimension, None);

        let large =
            OpenAiEmbedding::new("sk-test", DEFAULT_BASE_URL, "text-embedding-3-large", None)
                .unwrap();
        assert_eq!(large.dimension(), 3072);
    }

    #[test]
    fn test_response_reordered_by_index() {
        let body = r#"{"data": [
            {"index": 1, "embedding": [2.0]},
            {"index": 0, "embedding": [1.0]}
        ]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(into_ordered(parsed), vec![vec![1.0], vec![2.0]]);
    }

    #[tokio::test]
    async fn test_large_model_uses_native_dimension() {
        let (base_url, server) = serve_once(reply_with(3072)).await;
        let provider = provider_for(&base_url, "text-embedding-3-large", None);
        assert_eq!(provider.dimension(), 3072);

        let embedder = Embedder::new(Arc::new(provider));
        let vector = embedder.embed_one("hello").await.unwrap();
        assert_eq!(vector.len(), 3072);

        let body: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert!(body.get("dimensions").is_none());
        assert_eq!(body["model"], "text-embedding-3-large");
        assert_eq!(body["input"][0], "hello");
    }

    #[tokio::test]
    async fn test_explicit_dimension_is_always_sent() {
        let (base_url, server) = serve_once(reply_with(1536)).await;
        let provider = provider_for(&base_url, DEFAULT_OPENAI_MODEL, Some(1536));

        let vectors = provider.embed_batch(&["hello".to_string()]).await.unwrap();
        assert_eq!(vectors[0].len(), 1536);

        let body: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(body["dimensions"], 1536);
    }

    #[tokio::test]
    async fn test_unknown_model_learns_dimension() {
        let (base_url, server) = serve_once(reply_with(5)).await;
        let provider = Arc::new(provider_for(&base_url, "custom-embedder", None));
        assert_eq!(provider.dimension(), 0);

        let embedder = Embedder::new(provider.clone());
        let vector = embedder.embed_one("hello").await.unwrap();
        assert_eq!(vector.len(), 5);
        assert_eq!(provider.dimension(), 5);

        server.await.unwrap();
    }
}
