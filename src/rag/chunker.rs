//! Sentence-aware text chunking with word overlap.
//!
//! Documents are split into sentences and packed greedily into chunks of
//! roughly `chunk_size` characters. When a chunk is closed, its last
//! `overlap` words seed the next one so that statements spanning a boundary
//! remain retrievable from either side.

use regex::Regex;
use std::sync::{Arc, LazyLock};

/// Terminal punctuation, optional closing quotes or brackets, then whitespace.
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[.!?]+["')\]]*\s+"#).expect("valid sentence regex"));

/// Splits text into sentences.
pub trait SentenceSplitter: Send + Sync {
    /// Sentences in document order, trimmed and non-empty.
    fn split<'a>(&self, text: &'a str) -> Vec<&'a str>;
}

/// Breaks after `.`, `!` or `?` when whitespace follows, so decimals such
/// as `2.5` stay inside their sentence.
#[derive(Debug, Clone, Copy, Default)]
pub struct PunctuationSentenceSplitter;

impl SentenceSplitter for PunctuationSentenceSplitter {
    fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut sentences = Vec::new();
        let mut start = 0;
        for boundary in SENTENCE_END.find_iter(text) {
            sentences.push(&text[start..boundary.end()]);
            start = boundary.end();
        }
        sentences.push(&text[start..]);

        sentences
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    splitter: Arc<dyn SentenceSplitter>,
}

impl std::fmt::Debug for TextChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextChunker")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .finish()
    }
}

impl TextChunker {
    /// `chunk_size` is in characters, `chunk_overlap` in words.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            splitter: Arc::new(PunctuationSentenceSplitter),
        }
    }

    pub fn with_splitter(mut self, splitter: Arc<dyn SentenceSplitter>) -> Self {
        self.splitter = splitter;
        self
    }

    /// Chunk `text`. Empty or whitespace-only input yields no chunks.
    ///
    /// Sentences are never split: one longer than `chunk_size` lands whole in
    /// the current buffer. A chunk may therefore exceed `chunk_size` by the
    /// carried overlap plus one sentence.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for sentence in self.splitter.split(text) {
            let sentence_len = sentence.chars().count();

            if current.is_empty() {
                current.push_str(sentence);
                current_len = sentence_len;
                continue;
            }

            if current_len + 1 + sentence_len <= self.chunk_size {
                current.push(' ');
                current.push_str(sentence);
                current_len += 1 + sentence_len;
                continue;
            }

            let seed = self.overlap_tail(&current);
            chunks.push(std::mem::take(&mut current));

            current = seed;
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
            current_len = current.chars().count();
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }

    /// Last `chunk_overlap` whitespace-separated words of `chunk`.
    fn overlap_tail(&self, chunk: &str) -> String {
        if self.chunk_overlap == 0 {
            return String::new();
        }
        let words: Vec<&str> = chunk.split_whitespace().collect();
        let start = words.len().saturating_sub(self.chunk_overlap);
        words[start..].join(" ")
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(500, 50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Splits on `|` so tests control sentence boundaries exactly.
    struct PipeSplitter;

    impl SentenceSplitter for PipeSplitter {
        fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
            text.split('|').map(str::trim).filter(|s| !s.is_empty()).collect()
        }
    }

    fn pipe_chunker(size: usize, overlap: usize) -> TextChunker {
        TextChunker::new(size, overlap).with_splitter(Arc::new(PipeSplitter))
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let chunker = TextChunker::default();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\t ").is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunker = TextChunker::new(500, 50);
        let chunks = chunker.chunk("Give amoxicillin. Review after 48 hours.");
        assert_eq!(chunks, vec!["Give amoxicillin. Review after 48 hours.".to_string()]);
    }

    #[test]
    fn test_packs_until_budget() {
        let chunker = pipe_chunker(11, 0);
        let chunks = chunker.chunk("aaaaa|bbbbb|ccccc");
        assert_eq!(chunks, vec!["aaaaa bbbbb".to_string(), "ccccc".to_string()]);
    }

    #[test]
    fn test_overlap_words_seed_next_chunk() {
        let chunker = pipe_chunker(20, 2);
        let chunks = chunker.chunk("one two three four|five six seven eight");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "one two three four");
        assert_eq!(chunks[1], "three four five six seven eight");
    }

    #[test]
    fn test_long_sentence_is_not_split() {
        let long = "x".repeat(50);
        let chunker = pipe_chunker(10, 0);
        let chunks = chunker.chunk(&format!("short|{}|tail", long));
        assert_eq!(chunks, vec!["short".to_string(), long, "tail".to_string()]);
    }

    #[test]
    fn test_long_first_sentence_does_not_emit_empty_chunk() {
        let long = "y".repeat(30);
        let chunker = pipe_chunker(10, 5);
        let chunks = chunker.chunk(&long);
        assert_eq!(chunks, vec![long]);
        assert!(chunks.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn test_every_sentence_appears_in_some_chunk() {
        let text = "Hypertension is defined as a sustained blood pressure above 140/90. \
                    First-line treatment depends on age. Patients under 55 receive an ACE inhibitor. \
                    Patients over 55 receive a calcium channel blocker. Review within four weeks. \
                    Escalate if targets are not met.";
        let chunker = TextChunker::new(80, 5);
        let chunks = chunker.chunk(text);

        assert!(chunks.len() > 1);
        for sentence in PunctuationSentenceSplitter.split(text) {
            assert!(
                chunks.iter().any(|c| c.contains(sentence)),
                "sentence missing from chunks: {}",
                sentence
            );
        }
    }

    #[test]
    fn test_chunk_length_counts_characters_not_bytes() {
        // 5 chars, 10 bytes each
        let chunker = pipe_chunker(11, 0);
        let chunks = chunker.chunk("ééééé|ààààà");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_punctuation_splitter_trims_sentences() {
        let sentences = PunctuationSentenceSplitter.split("First one.  Second one? Third!");
        assert_eq!(sentences, vec!["First one.", "Second one?", "Third!"]);
    }

    #[test]
    fn test_punctuation_splitter_keeps_decimals_and_quotes() {
        let sentences =
            PunctuationSentenceSplitter.split("Give 2.5 mg daily. He said \"stop.\" Then review.");
        assert_eq!(
            sentences,
            vec!["Give 2.5 mg daily.", "He said \"stop.\"", "Then review."]
        );
    }
}
