//! Split narration text into caption-sized chunks.
//!
//! Text is whitespace-normalized, split into sentences after `.`, `?` or `!`,
//! and whole sentences are packed greedily while both the word and character
//! limits hold. A sentence too large for one caption is split word by word;
//! its trailing piece stays open and can absorb the following sentences.

use super::error::{CaptionError, CaptionResult};
use super::types::CaptionChunk;

/// Size limits for one caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    pub max_words: usize,
    pub max_chars: usize,
}

impl ChunkLimits {
    pub fn new(max_words: usize, max_chars: usize) -> Self {
        Self {
            max_words,
            max_chars,
        }
    }

    fn check(&self) -> CaptionResult<()> {
        if self.max_words == 0 || self.max_chars == 0 {
            return Err(CaptionError::InvalidLimits {
                max_words: self.max_words,
                max_chars: self.max_chars,
            });
        }
        Ok(())
    }
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self::new(10, 50)
    }
}

/// Collapse every whitespace run to one space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split normalized text into sentences.
///
/// A sentence ends at a word whose last character is `.`, `?` or `!`.
pub fn split_sentences(text: &str) -> Vec<Vec<&str>> {
    let mut sentences = Vec::new();
    let mut current = Vec::new();

    for word in text.split_whitespace() {
        current.push(word);
        if word.ends_with(['.', '?', '!']) {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }

    sentences
}

/// Split `text` into caption chunks.
///
/// Joining the chunk texts with single spaces reproduces the
/// whitespace-normalized input. Empty input gives no chunks.
pub fn chunk_text(text: &str, limits: ChunkLimits) -> CaptionResult<Vec<CaptionChunk>> {
    limits.check()?;

    let normalized = normalize_whitespace(text);
    let mut packer = Packer::new(limits);

    for sentence in split_sentences(&normalized) {
        if packer.fits_alone(&sentence) {
            if !packer.try_extend(&sentence) {
                packer.flush();
                packer.try_extend(&sentence);
            }
        } else {
            packer.flush();
            for word in sentence {
                if !packer.try_extend(&[word]) {
                    packer.flush();
                    // An over-long single word becomes its own caption.
                    packer.force_push(word);
                }
            }
        }
    }
    packer.flush();

    Ok(packer
        .finished
        .into_iter()
        .enumerate()
        .map(|(i, text)| CaptionChunk::new(i, text))
        .collect())
}

/// Greedy accumulator for the chunk being built.
struct Packer {
    limits: ChunkLimits,
    words: Vec<String>,
    chars: usize,
    finished: Vec<String>,
}

impl Packer {
    fn new(limits: ChunkLimits) -> Self {
        Self {
            limits,
            words: Vec::new(),
            chars: 0,
            finished: Vec::new(),
        }
    }

    fn fits_alone(&self, words: &[&str]) -> bool {
        words.len() <= self.limits.max_words && joined_len(words) <= self.limits.max_chars
    }

    /// Append `words` if the result stays within limits.
    fn try_extend(&mut self, words: &[&str]) -> bool {
        let added = joined_len(words);
        let separator = usize::from(!self.words.is_empty() && !words.is_empty());
        let chars = self.chars + separator + added;

        if self.words.len() + words.len() > self.limits.max_words || chars > self.limits.max_chars {
            return false;
        }

        self.words.extend(words.iter().map(|w| w.to_string()));
        self.chars = chars;
        true
    }

    fn force_push(&mut self, word: &str) {
        self.chars = word.chars().count();
        self.words.push(word.to_string());
    }

    fn flush(&mut self) {
        if self.words.is_empty() {
            return;
        }
        self.finished.push(self.words.join(" "));
        self.words.clear();
        self.chars = 0;
    }
}

fn joined_len(words: &[&str]) -> usize {
    let chars: usize = words.iter().map(|w| w.chars().count()).sum();
    chars + words.len().saturating_sub(1)
}
