//! Sentence extraction from a streaming LLM response: a rolling buffer
//! that carves off complete sentences as terminal punctuation followed by
//! whitespace arrives, with a trailing flush at stream close (§4.4).

const DEFAULT_BOUNDARIES: &[char] = &['.', '!', '?', '…'];
const CLAUSE_BOUNDARIES: &[char] = &[',', ';', ':'];

pub struct SentenceExtractor {
    buffer: String,
    min_length: usize,
    boundaries: Vec<char>,
}

impl SentenceExtractor {
    pub fn new(min_length: usize, clause_splitting: bool) -> Self {
        let mut boundaries = DEFAULT_BOUNDARIES.to_vec();
        if clause_splitting {
            boundaries.extend_from_slice(CLAUSE_BOUNDARIES);
        }
        Self {
            buffer: String::new(),
            min_length: min_length.max(1),
            boundaries,
        }
    }

    /// Appends `delta` and returns any sentences it completed, in order.
    pub fn push(&mut self, delta: &str) -> Vec<String> {
        self.buffer.push_str(delta);
        let mut sentences = Vec::new();

        loop {
            let mut after = 0usize;
            let mut cut = None;
            loop {
                match self.find_boundary(after) {
                    Some(idx) => {
                        let candidate = self.buffer[..=idx].trim();
                        if candidate.chars().count() >= self.min_length {
                            cut = Some(idx);
                            break;
                        }
                        after = idx + self.buffer[idx..].chars().next().unwrap().len_utf8();
                    }
                    None => break,
                }
            }

            match cut {
                Some(idx) => {
                    let sentence = self.buffer[..=idx].trim().to_string();
                    self.buffer = self.buffer[idx + self.buffer[idx..].chars().next().unwrap().len_utf8()..]
                        .trim_start()
                        .to_string();
                    sentences.push(sentence);
                }
                None => break,
            }
        }

        sentences
    }

    /// Flushes any remainder as a final sentence if it meets the minimum
    /// length, called once the underlying stream has closed.
    pub fn flush(&mut self) -> Option<String> {
        let trimmed = self.buffer.trim();
        if trimmed.chars().count() >= self.min_length {
            let sentence = trimmed.to_string();
            self.buffer.clear();
            Some(sentence)
        } else {
            None
        }
    }

    fn find_boundary(&self, after: usize) -> Option<usize> {
        let chars: Vec<(usize, char)> = self.buffer.char_indices().collect();
        for i in 0..chars.len() {
            let (byte_idx, ch) = chars[i];
            if byte_idx < after {
                continue;
            }
            if self.boundaries.contains(&ch) {
                if let Some(&(_, next)) = chars.get(i + 1) {
                    if next.is_whitespace() {
                        return Some(byte_idx);
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation_with_whitespace() {
        let mut ex = SentenceExtractor::new(2, false);
        let sentences = ex.push("Hello there. How are you? ");
        assert_eq!(sentences, vec!["Hello there.", "How are you?"]);
    }

    #[test]
    fn does_not_split_mid_token_punctuation() {
        let mut ex = SentenceExtractor::new(2, false);
        let sentences = ex.push("The value is 3.14 exactly. ");
        assert_eq!(sentences, vec!["The value is 3.14 exactly."]);
    }

    #[test]
    fn accumulates_across_pushes() {
        let mut ex = SentenceExtractor::new(2, false);
        assert!(ex.push("Hello ").is_empty());
        assert!(ex.push("wor").is_empty());
        let sentences = ex.push("ld. ");
        assert_eq!(sentences, vec!["Hello world."]);
    }

    #[test]
    fn flush_emits_trailing_fragment_above_minimum() {
        let mut ex = SentenceExtractor::new(2, false);
        ex.push("no terminator here");
        assert_eq!(ex.flush(), Some("no terminator here".to_string()));
    }

    #[test]
    fn flush_drops_fragment_below_minimum() {
        let mut ex = SentenceExtractor::new(5, false);
        ex.push("hi");
        assert_eq!(ex.flush(), None);
    }

    #[test]
    fn clause_splitting_treats_commas_as_boundaries() {
        let mut ex = SentenceExtractor::new(2, true);
        let sentences = ex.push("First, second, third. ");
        assert_eq!(sentences, vec!["First,", "second,", "third."]);
    }

    #[test]
    fn short_fragment_merges_into_next_boundary() {
        let mut ex = SentenceExtractor::new(3, false);
        let sentences = ex.push("A. Ok then. ");
        assert_eq!(sentences, vec!["A. Ok then."]);
    }
}
