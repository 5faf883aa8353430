//! Thread chunking
//!
//! Splits long text into an ordered list of segments that each fit a
//! platform's length limit. Segments are meant to be published in order,
//! each one replying to the previous, so the output is a fully materialised
//! `Vec` rather than a lazy iterator.

/// Twitter's per-post character limit
pub const TWITTER_MAX_LENGTH: usize = 280;

/// Greedy word packer.
///
/// Words are whitespace-delimited and joined with single spaces. A word longer
/// than the limit is hard-cut into `max_length`-sized fragments; the final
/// fragment seeds the next segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadChunker {
    max_length: usize,
}

impl Default for ThreadChunker {
    fn default() -> Self {
        Self::new(TWITTER_MAX_LENGTH)
    }
}

impl ThreadChunker {
    /// Create a chunker; a zero limit is treated as one character.
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(1),
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Split `text` into segments of at most `max_length` characters.
    ///
    /// Lengths are counted in Unicode scalar values. No emitted segment is
    /// empty, and concatenating the segments' words reproduces the input's
    /// word stream (oversized words appear as consecutive fragments).
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let max = self.max_length;
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for word in text.split_whitespace() {
            let word_len = word.chars().count();
            let candidate_len = if current.is_empty() {
                word_len
            } else {
                current_len + 1 + word_len
            };

            if candidate_len <= max {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
                current_len = candidate_len;
                continue;
            }

            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }

            let mut rest = word;
            let mut rest_len = word_len;
            while rest_len > max {
                let split = byte_offset(rest, max);
                segments.push(rest[..split].to_string());
                rest = &rest[split..];
                rest_len -= max;
            }
            current = rest.to_string();
            current_len = rest_len;
        }

        if !current.is_empty() {
            segments.push(current);
        }

        segments
    }
}

/// Convenience wrapper around [`ThreadChunker::chunk`]
pub fn chunk(text: &str, max_length: usize) -> Vec<String> {
    ThreadChunker::new(max_length).chunk(text)
}

/// Byte offset of the `n`th character (or the end of the string)
pub(crate) fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_short_words_fit_limit() {
        let text = "A ".repeat(500);
        let segments = chunk(&text, 280);

        assert_eq!(segments.len(), 4);
        for segment in &segments {
            assert!(!segment.is_empty());
            assert!(segment.chars().count() <= 280);
        }
        // 140 words of "A" joined by spaces is 279 characters
        assert_eq!(segments[0].chars().count(), 279);
        assert_eq!(segments[3].split(' ').count(), 80);
    }

    #[test]
    fn test_single_oversized_word_is_hard_cut() {
        let text = "x".repeat(500);
        let segments = chunk(&text, 280);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].len(), 280);
        assert_eq!(segments[1].len(), 220);
    }

    #[test]
    fn test_word_longer_than_twice_the_limit() {
        let text = "y".repeat(650);
        let segments = chunk(&text, 280);

        assert_eq!(
            segments.iter().map(|s| s.len()).collect::<Vec<_>>(),
            vec![280, 280, 90]
        );
    }

    #[test]
    fn test_remainder_seeds_next_segment() {
        let text = format!("intro {} tail", "z".repeat(12));
        let segments = chunk(&text, 10);

        assert_eq!(segments, vec!["intro", "zzzzzzzzzz", "zz tail"]);
    }

    #[test]
    fn test_token_stream_is_preserved() {
        let text = "The quick brown fox jumps over the lazy dog and keeps running far away";
        let segments = chunk(text, 20);

        let rejoined: Vec<&str> = segments.iter().flat_map(|s| s.split(' ')).collect();
        let original: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(rejoined, original);
        assert!(segments.iter().all(|s| s.len() <= 20));
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        assert!(chunk("", 280).is_empty());
        assert!(chunk("   \n\t ", 280).is_empty());
    }

    #[test]
    fn test_short_text_is_single_segment() {
        assert_eq!(chunk("hello   world", 280), vec!["hello world"]);
    }

    #[test]
    fn test_multibyte_characters_are_counted_not_bytes() {
        let text = "é".repeat(300);
        let segments = chunk(&text, 280);

        assert_eq!(segments[0].chars().count(), 280);
        assert_eq!(segments[1].chars().count(), 20);
    }

    #[test]
    fn test_default_limit_is_twitter() {
        assert_eq!(ThreadChunker::default().max_length(), TWITTER_MAX_LENGTH);
        assert_eq!(ThreadChunker::new(0).max_length(), 1);
    }

    #[test]
    fn test_chunking_is_restartable() {
        let chunker = ThreadChunker::new(15);
        let text = "one two three four five six seven eight";
        assert_eq!(chunker.chunk(text), chunker.chunk(text));
    }
}
