//! Knowledge 모듈 - 인메모리 RAG 파이프라인
//!
//! - Chunker: 줄 단위 단어 수 제한 분할
//! - Corpus: 청크 + 임베딩 병렬 저장 (소스별 구간 추적)
//! - Retriever: brute-force top-k 유사도 검색
//! - Explorer: 수집 → 청킹 → 임베딩 → 검색 오케스트레이션

mod chunker;
mod corpus;
mod explorer;
mod retriever;
mod vector;

// Re-exports
pub use chunker::{
    chunk_text, default_chunker, word_count, Chunk, ChunkError, Chunker, LineChunker,
    DEFAULT_MAX_WORDS,
};
pub use corpus::{CorpusError, CorpusStats, CorpusStore, SourceSpan};
pub use explorer::{
    ChunkedSource, ExploreError, Explorer, ExplorerOptions, RunReport, SourceError,
    SourceOutcome, SourceReport, DEFAULT_CONCURRENCY,
};
pub use retriever::{rank, Match, RetrieveError, Retriever};
pub use vector::{cosine_similarity, euclidean_distance, SimilarityMetric};
