//! Text Chunking Module
//!
//! 줄(line) 경계를 존중하는 텍스트 분할을 제공합니다.
//! 줄을 순서대로 누적하다가 단어 수 상한을 넘기 직전에 청크를 닫습니다.
//! 줄 중간에서는 절대 자르지 않으므로, 상한보다 긴 한 줄은 그 자체로 하나의 청크가 됩니다.

use serde::Serialize;
use thiserror::Error;

/// 기본 청크 크기 (단어 수)
pub const DEFAULT_MAX_WORDS: usize = 400;

// ============================================================================
// Types
// ============================================================================

/// 하나의 소스에서 추출된 연속된 텍스트 단위
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// 청크 본문 (원본 줄들을 `\n`으로 연결)
    pub text: String,
    /// 공백 기준 단어 수
    pub word_count: usize,
    /// 원본 문서 식별자 (URL 또는 경로)
    pub source_id: String,
    /// 소스 내 순번 (0-based)
    pub position: usize,
}

impl Chunk {
    /// 청크를 구성하는 원본 줄들
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }

    /// 단일 줄이 상한을 넘어서 만들어진 청크인지 여부
    pub fn is_oversized(&self, max_words: usize) -> bool {
        self.word_count > max_words
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("max_words must be positive")]
    ZeroMaxWords,
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크 본문들로 분할
    fn split(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;

    /// 분할 결과에 소스 ID와 순번을 붙여 `Chunk`로 변환
    fn chunk(&self, source_id: &str, text: &str) -> Vec<Chunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(position, text)| Chunk {
                word_count: word_count(&text),
                text,
                source_id: source_id.to_string(),
                position,
            })
            .collect()
    }
}

// ============================================================================
// LineChunker
// ============================================================================

/// 줄 단위 누적 청커
///
/// - 빈 줄/공백 줄은 버림
/// - 누적 단어 수가 `max_words`를 넘게 되는 줄에서 새 청크 시작
/// - 마지막 청크는 항상 flush
#[derive(Debug, Clone)]
pub struct LineChunker {
    max_words: usize,
}

impl LineChunker {
    /// 단어 수 상한으로 생성
    pub fn new(max_words: usize) -> Result<Self, ChunkError> {
        if max_words == 0 {
            return Err(ChunkError::ZeroMaxWords);
        }
        Ok(Self { max_words })
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self {
            max_words: DEFAULT_MAX_WORDS,
        }
    }

    pub fn max_words(&self) -> usize {
        self.max_words
    }
}

impl Default for LineChunker {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Chunker for LineChunker {
    fn split(&self, text: &str) -> Vec<String> {
        chunk_text(text, self.max_words)
    }

    fn name(&self) -> &'static str {
        "LineChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 공백 기준 단어 수
#[inline]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// 텍스트를 줄 경계에서 청크로 분할
///
/// # Arguments
/// * `text` - 줄바꿈으로 구분된 텍스트
/// * `max_words` - 청크 당 최대 단어 수 (단일 줄이 이를 넘는 경우는 예외)
///
/// # Returns
/// 원본 순서를 유지하는 청크 문자열 목록
pub fn chunk_text(text: &str, max_words: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_words = 0;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let words = word_count(line);

        // 현재 청크에 추가하면 상한 초과? (빈 청크는 절대 내보내지 않음)
        if !current.is_empty() && current_words + words > max_words {
            chunks.push(current.join("\n"));
            current.clear();
            current_words = 0;
        }

        current.push(line);
        current_words += words;
    }

    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }

    chunks
}

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(LineChunker::with_defaults())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = "Para one word word.\nPara two.\n\nPara three word word word.";

    /// 테스트용 의사 난수 텍스트 (고정 시드)
    fn generated_text(seed: u64, lines: usize) -> String {
        let mut state = seed;
        let mut out = Vec::new();
        for _ in 0..lines {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let words = (state >> 33) % 12;
            if words == 0 {
                out.push("   ".to_string());
                continue;
            }
            let line: Vec<String> = (0..words).map(|w| format!("w{}", w)).collect();
            out.push(format!("  {}  ", line.join(" ")));
        }
        out.join("\n")
    }

    fn non_blank_lines(text: &str) -> Vec<String> {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_chunker_empty() {
        assert!(chunk_text("", 10).is_empty());
        assert!(chunk_text("\n   \n\t\n", 10).is_empty());
    }

    #[test]
    fn test_scenario_boundaries_at_five_words() {
        // 4 + 2 = 6 > 5 이므로 두 번째 줄에서 청크가 닫힘
        let chunks = chunk_text(SCENARIO, 5);
        assert_eq!(
            chunks,
            vec![
                "Para one word word.".to_string(),
                "Para two.".to_string(),
                "Para three word word word.".to_string(),
            ]
        );
    }

    #[test]
    fn test_scenario_boundaries_at_six_words() {
        let chunks = chunk_text(SCENARIO, 6);
        assert_eq!(
            chunks,
            vec![
                "Para one word word.\nPara two.".to_string(),
                "Para three word word word.".to_string(),
            ]
        );
        assert_eq!(word_count(&chunks[0]), 6);
        assert_eq!(word_count(&chunks[1]), 5);
    }

    #[test]
    fn test_oversized_line_is_own_chunk() {
        let text = "one two three four five six seven\nshort line\nanother";
        let chunks = chunk_text(text, 3);
        assert_eq!(chunks[0], "one two three four five six seven");
        assert_eq!(chunks[1], "short line\nanother");
    }

    #[test]
    fn test_oversized_first_line_emits_no_empty_chunk() {
        let chunks = chunk_text("a b c d e f", 2);
        assert_eq!(chunks, vec!["a b c d e f".to_string()]);
    }

    #[test]
    fn test_oversized_line_in_the_middle() {
        let chunks = chunk_text("a b\nc d e f g\nh", 3);
        assert_eq!(
            chunks,
            vec!["a b".to_string(), "c d e f g".to_string(), "h".to_string()]
        );
    }

    #[test]
    fn test_crlf_and_trimming() {
        let chunks = chunk_text("  alpha beta \r\n\r\n gamma\r\n", 10);
        assert_eq!(chunks, vec!["alpha beta\ngamma".to_string()]);
    }

    #[test]
    fn test_reconstruction_and_size_bound() {
        for seed in 1..40u64 {
            let text = generated_text(seed, 60);
            for max_words in [1, 4, 7, 15, 50] {
                let chunks = chunk_text(&text, max_words);

                // 순서 보존 재구성
                let rebuilt: Vec<String> = chunks
                    .iter()
                    .flat_map(|c| c.split('\n').map(str::to_string).collect::<Vec<_>>())
                    .collect();
                assert_eq!(rebuilt, non_blank_lines(&text));

                // 크기 상한 (단일 줄 예외)
                for chunk in &chunks {
                    let lines = chunk.split('\n').count();
                    assert!(!chunk.is_empty());
                    assert!(word_count(chunk) <= max_words || lines == 1);
                }
            }
        }
    }

    #[test]
    fn test_chunk_assigns_source_and_position() {
        let chunker = LineChunker::new(2).unwrap();
        let chunks = chunker.chunk("https://example.com/a", "a b\nc d\ne");
        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.position, i);
            assert_eq!(chunk.source_id, "https://example.com/a");
        }
        assert_eq!(chunks[0].word_count, 2);
        assert_eq!(chunks[2].word_count, 1);
        assert_eq!(chunks[0].lines().collect::<Vec<_>>(), vec!["a b"]);
    }

    #[test]
    fn test_deterministic() {
        let text = generated_text(7, 30);
        assert_eq!(chunk_text(&text, 9), chunk_text(&text, 9));
    }

    #[test]
    fn test_zero_max_words_rejected() {
        assert_eq!(LineChunker::new(0).unwrap_err(), ChunkError::ZeroMaxWords);
        assert_eq!(LineChunker::default().max_words(), DEFAULT_MAX_WORDS);
        assert_eq!(default_chunker().name(), "LineChunker");
    }

    #[test]
    fn test_is_oversized() {
        let chunker = LineChunker::new(2).unwrap();
        let chunks = chunker.chunk("src", "a b c");
        assert!(chunks[0].is_oversized(2));
    }
}
