//! 웹 스크래퍼 - URL 본문 텍스트 추출
//!
//! 본문 영역(main > [role=main] > article > body)에서 보이는 텍스트만 골라
//! 텍스트 노드 하나당 한 줄로 돌려줍니다. script/style 내용은 제외합니다.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{FetchError, FetchedPage, PageFetcher};

/// 기본 요청 타임아웃
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// 본문 후보 셀렉터 (우선순위 순)
const CONTENT_SELECTORS: [&str; 4] = ["main", "[role=main]", "article", "body"];

/// 텍스트를 가져오지 않는 요소
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex is valid"));

/// 웹 스크래퍼
#[derive(Debug, Clone)]
pub struct WebScraper {
    client: reqwest::Client,
}

impl WebScraper {
    /// 기본 타임아웃으로 생성
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    /// 요청 타임아웃 지정
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("data-scout/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Request {
                url: String::new(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    /// URL에서 페이지 텍스트 추출
    pub async fn scrape(&self, url: &str) -> Result<FetchedPage, FetchError> {
        tracing::info!("Scraping: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(|e| FetchError::Request {
            url: url.to_string(),
            message: format!("failed to read response body: {}", e),
        })?;

        parse_page(&html).ok_or_else(|| FetchError::NoContent(url.to_string()))
    }
}

impl Default for WebScraper {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            tracing::error!("WebScraper 생성 실패: {}", e);
            // 최소한의 클라이언트로 폴백
            Self {
                client: reqwest::Client::new(),
            }
        })
    }
}

#[async_trait]
impl PageFetcher for WebScraper {
    async fn fetch(&self, source: &str) -> Result<FetchedPage, FetchError> {
        self.scrape(source).await
    }
}

// ============================================================================
// HTML Extraction
// ============================================================================

/// HTML 문서 → 페이지 (본문이 비어 있으면 None)
pub fn parse_page(html: &str) -> Option<FetchedPage> {
    let document = Html::parse_document(html);
    let text = extract_content(&document)?;

    Some(FetchedPage {
        title: extract_title(&document),
        text,
    })
}

/// 제목 추출 (<title> → <h1>)
fn extract_title(document: &Html) -> Option<String> {
    for selector_str in ["title", "h1"] {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let title = collapse_whitespace(&element.text().collect::<String>());
                if !title.is_empty() {
                    return Some(title);
                }
            }
        }
    }

    None
}

/// 본문 추출: 첫 번째로 텍스트가 있는 후보 영역
fn extract_content(document: &Html) -> Option<String> {
    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };

        if let Some(element) = document.select(&selector).next() {
            let lines = extract_lines(&element);
            if !lines.is_empty() {
                return Some(lines.join("\n"));
            }
        }
    }

    None
}

/// 요소 안의 보이는 텍스트 노드를 한 줄씩
fn extract_lines(element: &ElementRef) -> Vec<String> {
    element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
            });
            if hidden {
                return None;
            }

            let line = collapse_whitespace(text);
            (!line.is_empty()).then_some(line)
        })
        .collect()
}

/// 연속 공백 정리
fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scraper_creation() {
        assert!(WebScraper::new().is_ok());
        assert!(WebScraper::with_timeout(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_extract_title() {
        let html = r#"
            <html>
                <head><title>Test Page Title</title></head>
                <body><h1>Main Heading</h1></body>
            </html>
        "#;
        let document = Html::parse_document(html);
        assert_eq!(extract_title(&document), Some("Test Page Title".to_string()));
    }

    #[test]
    fn test_extract_title_h1_fallback() {
        let html = r#"
            <html>
                <head><title></title></head>
                <body><h1>H1 Heading</h1></body>
            </html>
        "#;
        let document = Html::parse_document(html);
        assert_eq!(extract_title(&document), Some("H1 Heading".to_string()));
    }

    #[test]
    fn test_main_content_one_line_per_text_node() {
        let html = r#"
            <html>
                <body>
                    <nav>Navigation menu</nav>
                    <main>
                        <h1>Apply   for a
                            visa</h1>
                        <p>You can apply online.</p>

                        <p>It costs <strong>£100</strong>.</p>
                        <script>var tracking = 1;</script>
                        <style>p { color: red; }</style>
                    </main>
                    <footer>Footer content</footer>
                </body>
            </html>
        "#;
        let page = parse_page(html).unwrap();
        assert_eq!(
            page.text,
            "Apply for a visa\nYou can apply online.\nIt costs\n£100\n."
        );
        assert_eq!(page.title, Some("Apply for a visa".to_string()));
    }

    #[test]
    fn test_falls_back_to_article_then_body() {
        let html = r#"<html><body><nav>Menu</nav><article>Article text</article></body></html>"#;
        assert_eq!(parse_page(html).unwrap().text, "Article text");

        let html = r#"<html><body><div>Only body text</div></body></html>"#;
        assert_eq!(parse_page(html).unwrap().text, "Only body text");
    }

    #[test]
    fn test_empty_page_has_no_content() {
        let html = r#"<html><head><script>x()</script></head><body>   </body></html>"#;
        assert!(parse_page(html).is_none());
    }

    #[test]
    fn test_default_implementation() {
        let scraper = WebScraper::default();
        let _ = format!("{:?}", scraper);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_error() {
        let scraper = WebScraper::with_timeout(Duration::from_millis(500)).unwrap();
        let err = scraper.scrape("http://127.0.0.1:9/nothing").await.unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
    }

    #[tokio::test]
    async fn test_truncated_body_is_request_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/page", listener.local_addr().unwrap());

        // 선언한 길이보다 짧은 본문을 보내고 연결을 닫음
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let reply = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 1000\r\n\r\n<html><body>partial";
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        let mut scraper = WebScraper::with_timeout(Duration::from_secs(5)).unwrap();
        scraper.client = reqwest::Client::builder().no_proxy().build().unwrap();

        let err = scraper.scrape(&url).await.unwrap_err();
        server.await.unwrap();

        match err {
            FetchError::Request { url: failed, message } => {
                assert_eq!(failed, url);
                assert!(message.starts_with("failed to read response body"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
