//! 로컬 텍스트 파일 수집

use std::path::Path;

use async_trait::async_trait;

use super::{classify_source, FetchError, FetchedPage, PageFetcher, SourceKind};

/// 로컬 파일을 그대로 읽는 수집기
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileFetcher;

impl LocalFileFetcher {
    /// 파일 읽기 (제목은 파일 이름)
    pub async fn read(&self, path: &Path) -> Result<FetchedPage, FetchError> {
        tracing::info!("Reading: {}", path.display());

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| FetchError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let title = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);

        Ok(FetchedPage { title, text })
    }
}

#[async_trait]
impl PageFetcher for LocalFileFetcher {
    async fn fetch(&self, source: &str) -> Result<FetchedPage, FetchError> {
        match classify_source(source)? {
            SourceKind::File(path) => self.read(&path).await,
            SourceKind::Web(_) => Err(FetchError::InvalidSource(source.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn test_read_file_with_title() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("guidance.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "Apply online\n\nPay the fee").unwrap();

        let page = LocalFileFetcher.read(&path).await.unwrap();
        assert_eq!(page.title.as_deref(), Some("guidance.txt"));
        assert_eq!(page.text, "Apply online\n\nPay the fee");
    }

    #[tokio::test]
    async fn test_rejects_urls() {
        let err = LocalFileFetcher
            .fetch("https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidSource(_)));
    }
}
