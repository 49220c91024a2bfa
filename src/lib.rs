//! data-scout - 인메모리 RAG 콘텐츠 탐색기
//!
//! URL/파일을 수집하여 줄 단위로 청킹하고, 임베딩한 뒤
//! 자연어 질의와 가장 유사한 청크를 찾아줍니다.
//! 모든 데이터는 메모리에만 존재합니다.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod knowledge;
pub mod scraper;

// Re-exports
pub use config::{ConfigError, ScoutConfig};
pub use embedding::{
    create_provider, EmbedError, Embedder, EmbeddingProvider, FastEmbedding, GeminiEmbedding,
    HashingEmbedding, OpenAiEmbedding, ProviderKind,
};
pub use knowledge::{
    chunk_text, default_chunker, Chunk, Chunker, CorpusStore, ExploreError, Explorer,
    ExplorerOptions, LineChunker, Match, Retriever, RunReport, SimilarityMetric, SourceOutcome,
    SourceReport,
};
pub use scraper::{FetchError, FetchedPage, PageFetcher, SourceFetcher, WebScraper};
