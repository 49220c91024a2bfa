//! Explorer - 수집 → 청킹 → 임베딩 → 코퍼스 → 검색 오케스트레이션
//!
//! 소스별 작업(수집/청킹/임베딩)은 제한된 동시성으로 실행하되,
//! 결과는 항상 입력 순서대로 코퍼스에 추가합니다.
//! 소스 하나의 실패는 해당 소스만 건너뛰고 나머지는 계속 처리합니다.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;

use crate::config::ScoutConfig;
use crate::embedding::{EmbedError, Embedder, EmbeddingProvider};
use crate::scraper::{FetchError, PageFetcher};

use super::chunker::{Chunk, ChunkError, Chunker, LineChunker};
use super::corpus::{CorpusError, CorpusStats, CorpusStore};
use super::retriever::{Match, RetrieveError, Retriever};
use super::vector::SimilarityMetric;

/// 기본 동시 처리 소스 수
pub const DEFAULT_CONCURRENCY: usize = 4;

// ============================================================================
// Types
// ============================================================================

/// 소스 단위 실패 (해당 소스는 청크 0개로 처리)
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("corpus rejected source: {0}")]
    Corpus(#[from] CorpusError),
}

/// 실행 전체 실패
#[derive(Debug, Error)]
pub enum ExploreError {
    #[error("processing aborted at {source_id}: {error}")]
    Aborted {
        source_id: String,
        #[source]
        error: EmbedError,
    },

    #[error(transparent)]
    Retrieve(#[from] RetrieveError),
}

/// 코퍼스에 넣기 직전의 소스
#[derive(Debug, Clone)]
pub struct ChunkedSource {
    pub source_id: String,
    pub title: Option<String>,
    pub chunks: Vec<Chunk>,
    pub embeddings: Vec<Vec<f32>>,
}

/// 소스 처리 결과
#[derive(Debug)]
pub enum SourceOutcome {
    /// 코퍼스에 추가됨
    Indexed { chunks: usize },
    /// 수집은 됐지만 청크가 없음
    Empty,
    /// 건너뜀
    Failed(SourceError),
}

/// 소스별 보고
#[derive(Debug)]
pub struct SourceReport {
    pub source_id: String,
    pub title: Option<String>,
    pub outcome: SourceOutcome,
}

impl SourceReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Failed(_))
    }
}

/// 실행 보고 (입력 순서)
#[derive(Debug, Default)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    /// 이번 실행으로 추가된 청크 수
    pub fn indexed_chunks(&self) -> usize {
        self.sources
            .iter()
            .map(|r| match r.outcome {
                SourceOutcome::Indexed { chunks } => chunks,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|r| r.is_failure())
    }

    /// 보여줄 것이 없는지 여부 (소스가 없거나 청크가 하나도 없음)
    pub fn is_empty(&self) -> bool {
        self.indexed_chunks() == 0
    }
}

/// 오케스트레이터 옵션
#[derive(Debug, Clone, Serialize)]
pub struct ExplorerOptions {
    /// 동시에 처리할 소스 수
    pub concurrency: usize,
    /// 임베딩 실패 시 실행 전체 중단 (기본: 해당 소스만 건너뜀)
    pub abort_on_embedding_error: bool,
}

impl Default for ExplorerOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            abort_on_embedding_error: false,
        }
    }
}

// ============================================================================
// Explorer
// ============================================================================

/// 콘텐츠 탐색기
///
/// 코퍼스를 변경하는 것은 이 구조체뿐이며, `&mut self`로 한 번에 하나의 실행만 허용합니다.
pub struct Explorer {
    fetcher: Arc<dyn PageFetcher>,
    chunker: Box<dyn Chunker>,
    embedder: Embedder,
    retriever: Retriever,
    corpus: CorpusStore,
    options: ExplorerOptions,
}

impl Explorer {
    /// 구성 요소를 주입하여 생성
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        chunker: Box<dyn Chunker>,
        embedder: Embedder,
        metric: SimilarityMetric,
    ) -> Self {
        Self {
            fetcher,
            chunker,
            retriever: Retriever::new(embedder.clone()),
            embedder,
            corpus: CorpusStore::new(metric),
            options: ExplorerOptions::default(),
        }
    }

    /// 설정으로 생성
    pub fn from_config(
        config: &ScoutConfig,
        fetcher: Arc<dyn PageFetcher>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, ChunkError> {
        let chunker = LineChunker::new(config.max_words)?;
        let embedder = Embedder::new(provider).with_timeout(config.embed_timeout);

        Ok(
            Self::new(fetcher, Box::new(chunker), embedder, config.metric).with_options(
                ExplorerOptions {
                    concurrency: config.concurrency,
                    abort_on_embedding_error: config.abort_on_embedding_error,
                },
            ),
        )
    }

    pub fn with_options(mut self, options: ExplorerOptions) -> Self {
        self.options = options;
        self
    }

    /// 소스 하나 준비: 수집 → 청킹 → 임베딩
    ///
    /// 코퍼스는 건드리지 않습니다.
    pub async fn prepare_source(&self, source_id: &str) -> Result<ChunkedSource, SourceError> {
        let page = self.fetcher.fetch(source_id).await?;
        let chunks = self.chunker.chunk(source_id, &page.text);

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;

        Ok(ChunkedSource {
            source_id: source_id.to_string(),
            title: page.title,
            chunks,
            embeddings,
        })
    }

    /// 재처리: 코퍼스를 통째로 교체
    ///
    /// 중단(abort) 시에는 기존 코퍼스가 그대로 남습니다.
    pub async fn process(&mut self, sources: &[String]) -> Result<RunReport, ExploreError> {
        self.run(sources, true).await
    }

    /// 기존 코퍼스 뒤에 소스 추가
    pub async fn extend(&mut self, sources: &[String]) -> Result<RunReport, ExploreError> {
        self.run(sources, false).await
    }

    async fn run(&mut self, sources: &[String], replace: bool) -> Result<RunReport, ExploreError> {
        let concurrency = self.options.concurrency.max(1);

        // buffered()는 완료 순서가 아니라 입력 순서대로 결과를 내보냄
        let mut prepared: Vec<(String, Result<ChunkedSource, SourceError>)> = {
            let this = &*self;
            stream::iter(sources)
                .map(|source| async move { (source.clone(), this.prepare_source(source).await) })
                .buffered(concurrency)
                .collect()
                .await
        };

        // 중단은 코퍼스를 건드리기 전에 결정
        if self.options.abort_on_embedding_error {
            let failed = prepared
                .iter()
                .position(|(_, r)| matches!(r, Err(SourceError::Embedding(_))));
            if let Some(index) = failed {
                if let (source_id, Err(SourceError::Embedding(error))) = prepared.swap_remove(index) {
                    tracing::error!("Aborting run at {}: {}", source_id, error);
                    return Err(ExploreError::Aborted { source_id, error });
                }
            }
        }

        if replace {
            self.corpus.reset();
        }

        let mut report = RunReport::default();
        for (source_id, result) in prepared {
            let source_report = match result {
                Ok(chunked) => self.store(chunked),
                Err(error) => {
                    tracing::warn!("Skipping {}: {}", source_id, error);
                    SourceReport {
                        source_id,
                        title: None,
                        outcome: SourceOutcome::Failed(error),
                    }
                }
            };
            report.sources.push(source_report);
        }

        tracing::info!(
            "Processed {} sources: {} chunks indexed, {} failed (corpus: {} chunks)",
            report.sources.len(),
            report.indexed_chunks(),
            report.failures().count(),
            self.corpus.len()
        );

        Ok(report)
    }

    fn store(&mut self, chunked: ChunkedSource) -> SourceReport {
        let ChunkedSource {
            source_id,
            title,
            chunks,
            embeddings,
        } = chunked;

        let outcome = match self.corpus.add_source(&source_id, chunks, embeddings) {
            Ok(0) => {
                tracing::warn!("No chunks generated for source: {}", source_id);
                SourceOutcome::Empty
            }
            Ok(chunks) => {
                tracing::info!("Indexed {} ({} chunks)", source_id, chunks);
                SourceOutcome::Indexed { chunks }
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", source_id, e);
                SourceOutcome::Failed(SourceError::Corpus(e))
            }
        };

        SourceReport {
            source_id,
            title,
            outcome,
        }
    }

    /// 질의와 가장 유사한 청크
    pub async fn top_matches(&self, query: &str, top_n: usize) -> Result<Vec<Match>, ExploreError> {
        Ok(self
            .retriever
            .top_matches(&self.corpus, query, top_n)
            .await?)
    }

    /// 코퍼스 비우기
    pub fn reset(&mut self) {
        self.corpus.reset();
    }

    pub fn corpus(&self) -> &CorpusStore {
        &self.corpus
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn stats(&self) -> CorpusStats {
        self.corpus.stats()
    }
}

// ============================================================================
// Tests
// ============================================================================
