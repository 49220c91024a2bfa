//! 소스 수집 모듈 - URL/파일에서 텍스트 추출
//!
//! 소스 하나당 줄바꿈으로 구분된 정리된 텍스트 블록 하나를 돌려줍니다.
//! 재시도는 하지 않습니다. 실패는 `FetchError`로 호출자에게 전달됩니다.

mod local;
mod web;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub use local::LocalFileFetcher;
pub use web::{parse_page, WebScraper, DEFAULT_FETCH_TIMEOUT};

// ============================================================================
// Types
// ============================================================================

/// 수집된 페이지
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// 페이지 제목 (없을 수 있음)
    pub title: Option<String>,
    /// 줄바꿈으로 구분된 본문 텍스트
    pub text: String,
}

/// 수집 실패
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid source '{0}'")]
    InvalidSource(String),

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("no readable content found at {0}")]
    NoContent(String),

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// PageFetcher Trait
// ============================================================================

/// 소스 → 텍스트 변환 인터페이스
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, source: &str) -> Result<FetchedPage, FetchError>;
}

// ============================================================================
// Source Dispatch
// ============================================================================

/// 소스 종류
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Web(Url),
    File(PathBuf),
}

/// 소스 문자열 분류
///
/// - `http(s)://` → 웹
/// - `file://` 또는 일반 경로 → 파일
/// - 그 외 스킴 → 에러
pub fn classify_source(source: &str) -> Result<SourceKind, FetchError> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Err(FetchError::InvalidSource(source.to_string()));
    }

    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(SourceKind::Web(url)),
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map(SourceKind::File)
            .map_err(|_| FetchError::InvalidSource(source.to_string())),
        // Windows 드라이브 문자 (C:\...)
        Ok(url) if url.scheme().len() == 1 => Ok(SourceKind::File(PathBuf::from(trimmed))),
        Ok(_) => Err(FetchError::InvalidSource(source.to_string())),
        Err(_) => Ok(SourceKind::File(PathBuf::from(trimmed))),
    }
}

/// URL은 웹 스크래퍼로, 경로는 파일 리더로 보내는 수집기
#[derive(Debug, Default)]
pub struct SourceFetcher {
    web: WebScraper,
    local: LocalFileFetcher,
}

impl SourceFetcher {
    pub fn new(web: WebScraper) -> Self {
        Self {
            web,
            local: LocalFileFetcher,
        }
    }
}

#[async_trait]
impl PageFetcher for SourceFetcher {
    async fn fetch(&self, source: &str) -> Result<FetchedPage, FetchError> {
        match classify_source(source)? {
            SourceKind::Web(url) => self.web.fetch(url.as_str()).await,
            SourceKind::File(path) => self.local.read(&path).await,
        }
    }
}
