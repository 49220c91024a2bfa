//! Corpus Store - 메모리 내 (청크, 임베딩) 저장소
//!
//! 소스 단위로 append만 가능하며, 재처리 시에는 `reset()` 후 다시 채웁니다.
//! i번째 청크의 벡터는 항상 i번째 임베딩 슬롯에 있습니다.

use std::ops::Range;

use serde::Serialize;
use thiserror::Error;

use super::chunker::Chunk;
use super::vector::SimilarityMetric;

// ============================================================================
// Types
// ============================================================================

/// 소스별 파티션 (청크 인덱스 범위)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSpan {
    pub source_id: String,
    pub range: Range<usize>,
}

impl SourceSpan {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct CorpusStats {
    pub source_count: usize,
    pub chunk_count: usize,
    pub total_words: usize,
    pub dimension: Option<usize>,
    pub metric: SimilarityMetric,
}

/// 저장 거부 사유 (거부 시 저장소는 변경되지 않음)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorpusError {
    #[error("{chunks} chunks but {embeddings} embeddings for source {source_id}")]
    LengthMismatch {
        source_id: String,
        chunks: usize,
        embeddings: usize,
    },

    #[error("embedding {index} has dimension {actual}, corpus dimension is {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("embedding {index} is empty")]
    EmptyVector { index: usize },
}

// ============================================================================
// CorpusStore
// ============================================================================

/// 메모리 내 코퍼스
///
/// 메트릭은 생성 시 고정되며 코퍼스 수명 동안 바뀌지 않습니다.
/// 자체 잠금이 없으므로 쓰기는 한 번에 하나의 호출자만 해야 합니다.
#[derive(Debug, Clone, Default)]
pub struct CorpusStore {
    metric: SimilarityMetric,
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
    sources: Vec<SourceSpan>,
    dimension: Option<usize>,
}

impl CorpusStore {
    /// 빈 코퍼스 생성
    pub fn new(metric: SimilarityMetric) -> Self {
        Self {
            metric,
            ..Default::default()
        }
    }

    /// 소스 하나의 청크와 임베딩 추가
    ///
    /// 청크는 `source_id`로 태깅됩니다.
    /// 검증에 실패하면 아무것도 저장하지 않고 에러를 반환합니다.
    ///
    /// # Returns
    /// 추가된 청크 수
    pub fn add_source(
        &mut self,
        source_id: &str,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<usize, CorpusError> {
        if chunks.len() != embeddings.len() {
            return Err(CorpusError::LengthMismatch {
                source_id: source_id.to_string(),
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }

        // 첫 벡터가 코퍼스 차원을 고정
        let expected = self
            .dimension
            .or_else(|| embeddings.first().map(Vec::len));

        for (index, vector) in embeddings.iter().enumerate() {
            if vector.is_empty() {
                return Err(CorpusError::EmptyVector { index });
            }
            if let Some(expected) = expected {
                if vector.len() != expected {
                    return Err(CorpusError::DimensionMismatch {
                        index,
                        expected,
                        actual: vector.len(),
                    });
                }
            }
        }

        let start = self.chunks.len();
        let added = chunks.len();

        self.chunks.extend(chunks.into_iter().map(|mut chunk| {
            chunk.source_id = source_id.to_string();
            chunk
        }));
        self.embeddings.extend(embeddings);
        self.dimension = expected;
        self.sources.push(SourceSpan {
            source_id: source_id.to_string(),
            range: start..start + added,
        });

        tracing::debug!("Corpus: +{} chunks from {} (total {})", added, source_id, self.len());
        Ok(added)
    }

    /// 전체 청크 (삽입 순서)
    pub fn all_chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// 전체 임베딩 (청크와 같은 순서)
    pub fn all_embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    /// 소스 파티션 (추가 순서)
    pub fn sources(&self) -> &[SourceSpan] {
        &self.sources
    }

    /// 특정 소스의 청크
    pub fn chunks_for(&self, source_id: &str) -> Vec<&Chunk> {
        self.sources
            .iter()
            .filter(|span| span.source_id == source_id)
            .flat_map(|span| &self.chunks[span.range.clone()])
            .collect()
    }

    /// 전체 초기화 (재처리용)
    pub fn reset(&mut self) {
        self.chunks.clear();
        self.embeddings.clear();
        self.sources.clear();
        self.dimension = None;
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// 코퍼스 벡터 차원 (비어 있으면 None)
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    pub fn stats(&self) -> CorpusStats {
        CorpusStats {
            source_count: self.sources.len(),
            chunk_count: self.chunks.len(),
            total_words: self.chunks.iter().map(|c| c.word_count).sum(),
            dimension: self.dimension,
            metric: self.metric,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::chunker::{Chunker, LineChunker};

    fn chunks(source: &str, n: usize) -> Vec<Chunk> {
        let text: Vec<String> = (0..n).map(|i| format!("{} line {}", source, i)).collect();
        LineChunker::new(3).unwrap().chunk(source, &text.join("\n"))
    }

    fn vectors(n: usize, dim: usize) -> Vec<Vec<f32>> {
        (0..n).map(|i| vec![i as f32 + 1.0; dim]).collect()
    }

    #[test]
    fn test_multi_source_isolation() {
        let mut store = CorpusStore::new(SimilarityMetric::Cosine);
        store.add_source("A", chunks("A", 2), vectors(2, 4)).unwrap();
        store.add_source("B", chunks("B", 3), vectors(3, 4)).unwrap();

        assert_eq!(store.len(), 5);
        assert_eq!(store.all_embeddings().len(), 5);

        let tags: Vec<&str> = store.all_chunks().iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(tags, vec!["A", "A", "B", "B", "B"]);

        assert_eq!(store.sources().len(), 2);
        assert_eq!(store.sources()[0].range, 0..2);
        assert_eq!(store.sources()[1].range, 2..5);
        assert_eq!(store.chunks_for("B").len(), 3);
        assert_eq!(store.chunks_for("B")[0].text, "B line 0");
    }

    #[test]
    fn test_length_mismatch_leaves_store_untouched() {
        let mut store = CorpusStore::new(SimilarityMetric::Cosine);
        store.add_source("A", chunks("A", 2), vectors(2, 4)).unwrap();

        let err = store.add_source("B", chunks("B", 3), vectors(2, 4)).unwrap_err();
        assert!(matches!(err, CorpusError::LengthMismatch { chunks: 3, embeddings: 2, .. }));
        assert_eq!(store.len(), 2);
        assert_eq!(store.all_embeddings().len(), 2);
        assert_eq!(store.sources().len(), 1);
    }

    #[test]
    fn test_dimension_is_pinned() {
        let mut store = CorpusStore::new(SimilarityMetric::L2);
        store.add_source("A", chunks("A", 1), vectors(1, 4)).unwrap();
        assert_eq!(store.dimension(), Some(4));

        let err = store.add_source("B", chunks("B", 1), vectors(1, 8)).unwrap_err();
        assert_eq!(
            err,
            CorpusError::DimensionMismatch {
                index: 0,
                expected: 4,
                actual: 8
            }
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_mixed_dimensions_within_source_rejected() {
        let mut store = CorpusStore::new(SimilarityMetric::Cosine);
        let err = store
            .add_source("A", chunks("A", 2), vec![vec![1.0, 2.0], vec![1.0]])
            .unwrap_err();
        assert!(matches!(err, CorpusError::DimensionMismatch { index: 1, .. }));
        assert!(store.is_empty());
        assert_eq!(store.dimension(), None);
    }

    #[test]
    fn test_empty_vector_rejected() {
        let mut store = CorpusStore::new(SimilarityMetric::Cosine);
        let err = store.add_source("A", chunks("A", 1), vec![vec![]]).unwrap_err();
        assert_eq!(err, CorpusError::EmptyVector { index: 0 });
    }

    #[test]
    fn test_retags_chunks_with_source_id() {
        let mut store = CorpusStore::new(SimilarityMetric::Cosine);
        store.add_source("canonical", chunks("other", 1), vectors(1, 2)).unwrap();
        assert_eq!(store.all_chunks()[0].source_id, "canonical");
    }

    #[test]
    fn test_empty_source_recorded() {
        let mut store = CorpusStore::new(SimilarityMetric::Cosine);
        assert_eq!(store.add_source("empty", vec![], vec![]).unwrap(), 0);
        assert_eq!(store.sources().len(), 1);
        assert!(store.sources()[0].is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_reset() {
        let mut store = CorpusStore::new(SimilarityMetric::L2);
        store.add_source("A", chunks("A", 2), vectors(2, 4)).unwrap();
        store.reset();

        assert!(store.is_empty());
        assert!(store.all_embeddings().is_empty());
        assert!(store.sources().is_empty());
        assert_eq!(store.dimension(), None);
        assert_eq!(store.metric(), SimilarityMetric::L2);

        // 리셋 후에는 다른 차원도 허용
        store.add_source("B", chunks("B", 1), vectors(1, 8)).unwrap();
        assert_eq!(store.dimension(), Some(8));
    }

    #[test]
    fn test_stats() {
        let mut store = CorpusStore::new(SimilarityMetric::Cosine);
        store.add_source("A", chunks("A", 2), vectors(2, 4)).unwrap();
        let stats = store.stats();
        assert_eq!(stats.source_count, 1);
        assert_eq!(stats.chunk_count, 2);
        assert_eq!(stats.total_words, 6);
        assert_eq!(stats.dimension, Some(4));
    }
}
