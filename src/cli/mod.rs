//! CLI 모듈
//!
//! data-scout CLI 명령어 정의 및 구현

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::ScoutConfig;
use crate::embedding::{create_provider, has_gemini_key, has_openai_key, ProviderKind};
use crate::knowledge::{
    Chunker, Explorer, LineChunker, RunReport, SimilarityMetric, SourceOutcome, SourceReport,
};
use crate::scraper::{PageFetcher, SourceFetcher, WebScraper};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "data-scout")]
#[command(version, about = "인메모리 RAG 콘텐츠 탐색기", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 소스를 처리한 뒤 질의에 답변
    Explore {
        /// 수집할 URL 또는 파일 경로
        #[arg(required = true)]
        sources: Vec<String>,

        /// 검색 쿼리 (생략 시 표준 입력에서 대화형으로 읽음)
        #[arg(short, long)]
        query: Option<String>,

        /// 결과 개수
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// JSON 출력
        #[arg(long)]
        json: bool,
    },

    /// 소스 하나를 청킹하여 미리보기
    Chunk {
        /// 수집할 URL 또는 파일 경로
        source: String,

        /// 청크당 최대 단어 수
        #[arg(long)]
        max_words: Option<usize>,

        /// JSON 출력
        #[arg(long)]
        json: bool,
    },

    /// 설정 및 API 키 상태 확인
    Status,
}

/// 파이프라인 설정 덮어쓰기 플래그
#[derive(Args, Debug, Default)]
pub struct PipelineArgs {
    /// 청크당 최대 단어 수
    #[arg(long)]
    pub max_words: Option<usize>,

    /// 유사도 (cosine, l2)
    #[arg(long)]
    pub metric: Option<SimilarityMetric>,

    /// 임베딩 프로바이더 (auto, local, hashing, gemini, openai)
    #[arg(long)]
    pub provider: Option<ProviderKind>,

    /// 임베딩 차원
    #[arg(long)]
    pub dimension: Option<usize>,

    /// 동시에 처리할 소스 수
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl PipelineArgs {
    /// 지정된 플래그만 설정에 반영
    pub fn apply(&self, config: &mut ScoutConfig) {
        if let Some(max_words) = self.max_words {
            config.max_words = max_words;
        }
        if let Some(metric) = self.metric {
            config.metric = metric;
        }
        if let Some(provider) = self.provider {
            config.provider = provider;
        }
        if self.dimension.is_some() {
            config.dimension = self.dimension;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
    }
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = ScoutConfig::from_env().context("환경변수 설정 오류")?;

    match cli.command {
        Commands::Explore {
            sources,
            query,
            top_n,
            pipeline,
            json,
        } => {
            pipeline.apply(&mut config);
            if let Some(top_n) = top_n {
                config.top_n = top_n;
            }
            config.validate().context("잘못된 옵션")?;
            cmd_explore(&config, &sources, query.as_deref(), json).await
        }
        Commands::Chunk {
            source,
            max_words,
            json,
        } => {
            if let Some(max_words) = max_words {
                config.max_words = max_words;
            }
            config.validate().context("잘못된 옵션")?;
            cmd_chunk(&config, &source, json).await
        }
        Commands::Status => cmd_status(&config),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 탐색 명령어 (explore)
///
/// 모든 소스를 처리한 뒤 `--query` 또는 표준 입력의 질의에 답합니다.
async fn cmd_explore(
    config: &ScoutConfig,
    sources: &[String],
    query: Option<&str>,
    json: bool,
) -> Result<()> {
    let provider = create_provider(config.provider, config.dimension)
        .context("임베딩 프로바이더 생성 실패")?;
    let fetcher = source_fetcher(config)?;
    let mut explorer = Explorer::from_config(config, fetcher, provider)
        .context("Explorer 초기화 실패")?;

    if !json {
        println!(
            "[*] 소스 {} 개 처리 중 (임베딩: {}, 유사도: {})",
            sources.len(),
            explorer.embedder().model(),
            config.metric
        );
    }

    let report = explorer.process(sources).await.context("처리 중단")?;
    print_report(&report, json)?;

    if report.is_empty() {
        if !json {
            println!("\n[!] 인덱싱된 청크가 없습니다. 검색할 내용이 없습니다.");
        }
        return Ok(());
    }

    match query {
        Some(query) => answer(&explorer, query, config.top_n, json).await,
        None => interactive(&explorer, config.top_n, json).await,
    }
}

/// 표준 입력에서 질의를 읽어 답변 (EOF 또는 빈 줄에서 종료)
async fn interactive(explorer: &Explorer, top_n: usize, json: bool) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if !json {
            print!("\n질문> ");
            std::io::stdout().flush()?;
        }

        let Some(line) = lines.next_line().await.context("표준 입력 읽기 실패")? else {
            break;
        };

        let query = line.trim();
        if query.is_empty() {
            break;
        }

        if let Err(e) = answer(explorer, query, top_n, json).await {
            eprintln!("[!] {:#}", e);
        }
    }

    Ok(())
}

/// 질의 하나에 답변
async fn answer(explorer: &Explorer, query: &str, top_n: usize, json: bool) -> Result<()> {
    let matches = explorer
        .top_matches(query, top_n)
        .await
        .context("검색 실패")?;

    if json {
        println!(
            "{}",
            serde_json::to_string(&json!({ "query": query, "matches": matches }))?
        );
        return Ok(());
    }

    if matches.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", matches.len());

    for (i, m) in matches.iter().enumerate() {
        println!(
            "{}. [점수: {:.4}] {} #{}",
            i + 1,
            m.score,
            m.chunk.source_id,
            m.chunk.position
        );
        println!("   내용: {}", truncate_text(&m.chunk.text, 200));
        println!();
    }

    Ok(())
}

/// 청킹 미리보기 명령어 (chunk)
async fn cmd_chunk(config: &ScoutConfig, source: &str, json: bool) -> Result<()> {
    let chunker = LineChunker::new(config.max_words).context("잘못된 --max-words")?;
    let fetcher = source_fetcher(config)?;

    let page = fetcher
        .fetch(source)
        .await
        .with_context(|| format!("수집 실패: {}", source))?;
    let chunks = chunker.chunk(source, &page.text);

    if json {
        println!("{}", serde_json::to_string(&chunks)?);
        return Ok(());
    }

    if let Some(ref title) = page.title {
        println!("[*] 제목: {}", title);
    }
    println!("[*] 본문: {}", format_bytes(page.text.len()));

    if chunks.is_empty() {
        println!("[!] 청크가 없습니다.");
        return Ok(());
    }

    println!(
        "[OK] 청크 {} 개 (최대 {} 단어)\n",
        chunks.len(),
        config.max_words
    );

    for chunk in &chunks {
        let marker = if chunk.is_oversized(config.max_words) {
            " [초과]"
        } else {
            ""
        };
        println!("#{:<4} {} 단어{}", chunk.position, chunk.word_count, marker);
        println!("      {}", truncate_text(&chunk.text, 200));
    }

    Ok(())
}

/// 상태 명령어 (status)
///
/// 적용될 설정과 API 키 상태를 확인합니다.
fn cmd_status(config: &ScoutConfig) -> Result<()> {
    println!("data-scout v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 청크 크기: 최대 {} 단어", config.max_words);
    println!("[*] 검색 결과: {} 건", config.top_n);
    println!("[*] 유사도: {}", config.metric);
    println!(
        "[*] 임베딩: {} (실제: {})",
        config.provider,
        config.provider.resolve()
    );
    if let Some(dimension) = config.dimension {
        println!("[*] 임베딩 차원: {}", dimension);
    }
    println!("[*] 동시 처리: {} 소스", config.concurrency);
    println!(
        "[*] 타임아웃: 수집 {}s, 임베딩 {}s",
        config.fetch_timeout.as_secs(),
        config.embed_timeout.as_secs()
    );
    println!(
        "[*] 임베딩 실패 시: {}",
        if config.abort_on_embedding_error {
            "전체 중단"
        } else {
            "해당 소스만 건너뜀"
        }
    );
    println!();

    // API 키 상태
    for (name, present, hint) in [
        ("Gemini", has_gemini_key(), "export GEMINI_API_KEY=your-key"),
        ("OpenAI", has_openai_key(), "export OPENAI_API_KEY=your-key"),
    ] {
        if present {
            println!("[OK] {} API 키: 설정됨", name);
        } else {
            println!("[!] {} API 키: 미설정", name);
            println!("    설정: {}", hint);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn source_fetcher(config: &ScoutConfig) -> Result<Arc<SourceFetcher>> {
    let web = WebScraper::with_timeout(config.fetch_timeout).context("WebScraper 생성 실패")?;
    Ok(Arc::new(SourceFetcher::new(web)))
}

/// 실행 보고 출력
fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        let sources: Vec<Value> = report.sources.iter().map(report_json).collect();
        println!(
            "{}",
            serde_json::to_string(&json!({
                "sources": sources,
                "indexed_chunks": report.indexed_chunks(),
            }))?
        );
        return Ok(());
    }

    println!();
    for source in &report.sources {
        let title = source
            .title
            .as_ref()
            .map(|t| format!(" ({})", truncate_text(t, 40)))
            .unwrap_or_default();

        match &source.outcome {
            SourceOutcome::Indexed { chunks } => {
                println!("[OK] {}{} - 청크 {} 개", source.source_id, title, chunks)
            }
            SourceOutcome::Empty => println!("[!] {}{} - 본문 없음", source.source_id, title),
            SourceOutcome::Failed(e) => println!("[!] {} - 실패: {}", source.source_id, e),
        }
    }

    println!(
        "\n[*] 총 청크 {} 개 인덱싱 (실패 {} 건)",
        report.indexed_chunks(),
        report.failures().count()
    );

    Ok(())
}

/// 소스 보고 → JSON
fn report_json(report: &SourceReport) -> Value {
    let (status, chunks, error) = match &report.outcome {
        SourceOutcome::Indexed { chunks } => ("indexed", *chunks, None),
        SourceOutcome::Empty => ("empty", 0, None),
        SourceOutcome::Failed(e) => ("failed", 0, Some(e.to_string())),
    };

    json!({
        "source": report.source_id,
        "title": report.title,
        "status": status,
        "chunks": chunks,
        "error": error,
    })
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
