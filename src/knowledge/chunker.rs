//! Text Chunking Module
//!
//! 재귀 경계 탐색 분할기입니다.
//! 큰 구조 구분자(문단 → 줄 → 단어)에서 먼저 자르고, 그래도 큰 조각은
//! 문자 단위로 자릅니다. 연속된 청크는 앞 청크의 끝부분을 최대
//! `overlap_characters`만큼 공유합니다.
//!
//! 길이는 모두 문자(char) 수 기준이며, 청크는 항상 원문의 연속된 부분 문자열입니다.

use std::collections::VecDeque;
use std::ops::Range;

use crate::error::PipelineError;

/// 기본 구분자 (굵은 것부터, 마지막 빈 문자열 = 문자 단위 절단)
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub max_characters: usize,
    /// 오버랩 크기 (문자 수)
    pub overlap_characters: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_characters: 10_000,
            overlap_characters: 1_000,
        }
    }
}

impl ChunkConfig {
    pub fn new(max_characters: usize, overlap_characters: usize) -> Self {
        Self {
            max_characters,
            overlap_characters,
        }
    }

    /// 오버랩은 최대 크기보다 작아야 함
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_characters == 0 {
            return Err(PipelineError::Config(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.overlap_characters >= self.max_characters {
            return Err(PipelineError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.overlap_characters, self.max_characters
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할 (빈 텍스트 → 빈 벡터)
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// RecursiveChunker
// ============================================================================

/// 재귀 구분자 청커
pub struct RecursiveChunker {
    config: ChunkConfig,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// 설정으로 생성 (기본 구분자)
    pub fn new(config: ChunkConfig) -> Self {
        Self::with_separators(config, &DEFAULT_SEPARATORS)
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    /// 구분자 목록 지정
    ///
    /// 목록에 빈 문자열이 없으면 나눌 수 없는 조각이 `max_characters`를
    /// 넘는 청크로 남을 수 있습니다.
    pub fn with_separators(config: ChunkConfig, separators: &[&str]) -> Self {
        Self {
            config,
            separators: separators.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// 청크의 바이트 범위 목록
    ///
    /// 첫 범위는 0에서 시작하고 마지막 범위는 텍스트 끝에서 끝납니다.
    /// 다음 범위의 시작은 항상 이전 범위의 끝 이하입니다 (틈 없음).
    pub fn split_spans(&self, text: &str) -> Vec<Range<usize>> {
        if text.trim().is_empty() {
            return vec![];
        }

        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        let mut spans = Vec::new();
        self.split_recursive(text, 0..text.len(), &separators, &mut spans);
        spans
    }

    fn split_recursive(
        &self,
        text: &str,
        range: Range<usize>,
        separators: &[&str],
        out: &mut Vec<Range<usize>>,
    ) {
        let (separator, finer) = pick_separator(&text[range.clone()], separators);
        let pieces = split_keep_separator(text, range, separator);

        let mut pending: Vec<(Range<usize>, usize)> = Vec::new();
        for piece in pieces {
            let len = char_len(text, &piece);
            if len < self.config.max_characters {
                pending.push((piece, len));
                continue;
            }

            if !pending.is_empty() {
                out.extend(self.merge_pieces(&pending));
                pending.clear();
            }

            if finer.is_empty() {
                tracing::debug!("Indivisible piece of {} chars kept as one chunk", len);
                out.push(piece);
            } else {
                self.split_recursive(text, piece, finer, out);
            }
        }

        if !pending.is_empty() {
            out.extend(self.merge_pieces(&pending));
        }
    }

    /// 작은 조각들을 최대 크기까지 병합하고, 창을 내보낼 때마다
    /// 뒤쪽 조각을 오버랩 한도 안에서 다음 창으로 넘김
    fn merge_pieces(&self, pieces: &[(Range<usize>, usize)]) -> Vec<Range<usize>> {
        let max = self.config.max_characters;
        let overlap = self.config.overlap_characters;

        let mut spans = Vec::new();
        let mut window: VecDeque<&(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = piece.1;
            if total + len > max {
                if let Some(span) = window_span(&window) {
                    spans.push(span);
                }
                while total > overlap || (total > 0 && total + len > max) {
                    match window.pop_front() {
                        Some(dropped) => total -= dropped.1,
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        if let Some(span) = window_span(&window) {
            spans.push(span);
        }

        spans
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        self.split_spans(text)
            .into_iter()
            .map(|span| text[span].to_string())
            .collect()
    }

    fn name(&self) -> &'static str {
        "RecursiveChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트에 존재하는 첫 구분자와 그보다 잘게 자르는 나머지 구분자
fn pick_separator<'a, 'b>(slice: &str, separators: &'b [&'a str]) -> (&'a str, &'b [&'a str]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() || slice.contains(separator) {
            return (*separator, &separators[i + 1..]);
        }
    }
    (separators.last().copied().unwrap_or(""), &[])
}

/// 구분자를 다음 조각의 앞에 붙여 분할 (조각들이 원문을 정확히 덮음)
fn split_keep_separator(text: &str, range: Range<usize>, separator: &str) -> Vec<Range<usize>> {
    let base = range.start;
    let slice = &text[range.clone()];

    if separator.is_empty() {
        return slice
            .char_indices()
            .map(|(i, c)| base + i..base + i + c.len_utf8())
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in slice.match_indices(separator) {
        if pos > start {
            pieces.push(base + start..base + pos);
        }
        start = pos;
    }
    if start < slice.len() {
        pieces.push(base + start..range.end);
    }
    pieces
}

fn window_span(window: &VecDeque<&(Range<usize>, usize)>) -> Option<Range<usize>> {
    match (window.front(), window.back()) {
        (Some(first), Some(last)) => Some(first.0.start..last.0.end),
        _ => None,
    }
}

#[inline]
fn char_len(text: &str, range: &Range<usize>) -> usize {
    text[range.clone()].chars().count()
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(RecursiveChunker::with_defaults())
}

/// 설정 지정 청커 생성
pub fn recursive_chunker(config: ChunkConfig) -> Box<dyn Chunker> {
    Box::new(RecursiveChunker::new(config))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// 범위 불변식 검사 후 오버랩을 제거해 원문 복원
    fn assert_invariants(chunker: &RecursiveChunker, text: &str) -> Vec<Range<usize>> {
        let max = chunker.config().max_characters;
        let overlap = chunker.config().overlap_characters;
        let spans = chunker.split_spans(text);
        assert!(!spans.is_empty());

        assert_eq!(spans[0].start, 0);
        assert_eq!(spans[spans.len() - 1].end, text.len());

        for span in &spans {
            assert!(
                text[span.clone()].chars().count() <= max,
                "chunk longer than {}: {:?}",
                max,
                &text[span.clone()]
            );
        }

        for pair in spans.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            assert!(next.start <= prev.end, "gap between chunks");
            assert!(next.start >= prev.start);
            assert!(next.end > prev.end);
            assert!(text[next.start..prev.end].chars().count() <= overlap);
        }

        let mut rebuilt = text[spans[0].clone()].to_string();
        for pair in spans.windows(2) {
            rebuilt.push_str(&text[pair[0].end..pair[1].end]);
        }
        assert_eq!(rebuilt, text);

        let chunks = chunker.chunk(text);
        assert_eq!(chunks.len(), spans.len());
        spans
    }

    /// 결정적 의사 난수 텍스트 (문단/줄/단어 혼합)
    fn sample_text(seed: u64, words: usize) -> String {
        const VOCAB: [&str; 10] = [
            "pipeline", "chunk", "vector", "문서", "index", "a", "retrieval", "질문",
            "supercalifragilisticexpialidocious", "é",
        ];
        let mut state = seed;
        let mut out = String::new();
        for i in 0..words {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let word = VOCAB[(state >> 33) as usize % VOCAB.len()];
            if i > 0 {
                out.push_str(match (state >> 20) % 17 {
                    0 => "\n\n",
                    1 | 2 => "\n",
                    _ => " ",
                });
            }
            out.push_str(word);
        }
        out
    }

    #[test]
    fn test_chunker_empty() {
        let chunker = RecursiveChunker::with_defaults();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   ").is_empty());
        assert!(chunker.chunk("\n\n \t").is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunker = RecursiveChunker::with_defaults();
        let text = "The capital of France is Paris.";
        assert_eq!(chunker.chunk(text), vec![text.to_string()]);
    }

    #[test]
    fn test_invariants_hold_across_configs() {
        let configs = [(50, 10), (100, 0), (30, 29), (200, 40), (7, 3)];
        for (seed, words) in [(1u64, 40usize), (7, 120), (42, 300), (99, 5)] {
            let text = sample_text(seed, words);
            for (max, overlap) in configs {
                let chunker = RecursiveChunker::new(ChunkConfig::new(max, overlap));
                assert_invariants(&chunker, &text);
            }
        }
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let para1 = "a".repeat(30);
        let para2 = "b".repeat(30);
        let text = format!("{}\n\n{}", para1, para2);

        let chunker = RecursiveChunker::new(ChunkConfig::new(40, 0));
        let chunks = chunker.chunk(&text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], para1);
        assert_eq!(chunks[1].trim_start(), para2);
    }

    #[test]
    fn test_consecutive_chunks_share_overlap() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunker = RecursiveChunker::new(ChunkConfig::new(20, 8));
        let spans = assert_invariants(&chunker, text);

        assert!(spans.len() > 1);
        assert!(spans.windows(2).any(|pair| pair[1].start < pair[0].end));
    }

    #[test]
    fn test_hard_cut_without_separators() {
        let text = "x".repeat(95);
        let chunker = RecursiveChunker::new(ChunkConfig::new(20, 5));
        let spans = assert_invariants(&chunker, &text);
        assert!(spans.len() >= 5);
    }

    #[test]
    fn test_multibyte_text() {
        let text = "안녕하세요 세계. ".repeat(40);
        let chunker = RecursiveChunker::new(ChunkConfig::new(25, 6));
        assert_invariants(&chunker, &text);
    }

    #[test]
    fn test_indivisible_token_without_hard_cut() {
        let long_word = "y".repeat(50);
        let text = format!("short words {} tail", long_word);
        let chunker =
            RecursiveChunker::with_separators(ChunkConfig::new(20, 0), &["\n\n", "\n", " "]);

        let chunks = chunker.chunk(&text);
        assert!(chunks.iter().any(|c| c.trim() == long_word));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_config_validation() {
        assert!(ChunkConfig::default().validate().is_ok());
        assert!(ChunkConfig::new(100, 100).validate().is_err());
        assert!(ChunkConfig::new(0, 0).validate().is_err());
    }
}
