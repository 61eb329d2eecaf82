//! Splits long text into fenced code blocks that each fit a message.

use std::fmt;
use thiserror::Error;

const FENCE_CLOSE: &str = "\n```";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    #[error("max segment length {max} leaves no room for content (fence overhead is {overhead})")]
    NoCapacity { max: usize, overhead: usize },
}

/// One slice of the input text plus the fence language tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseSegment<'a> {
    pub content: &'a str,
    pub language: &'a str,
}

impl ResponseSegment<'_> {
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ResponseSegment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "```{}\n{}{}", self.language, self.content, FENCE_CLOSE)
    }
}

/// Characters added around each slice by the fence.
pub fn fence_overhead(language: &str) -> usize {
    "```".len() + language.chars().count() + "\n".len() + FENCE_CLOSE.len()
}

/// Lazy iterator over segments. Cloning it restarts from the clone point.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    remaining: &'a str,
    language: &'a str,
    capacity: usize,
    finished: bool,
}

impl<'a> Iterator for Segments<'a> {
    type Item = ResponseSegment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let split = self
            .remaining
            .char_indices()
            .nth(self.capacity)
            .map(|(idx, _)| idx)
            .unwrap_or(self.remaining.len());
        let (content, rest) = self.remaining.split_at(split);
        self.remaining = rest;
        if rest.is_empty() {
            self.finished = true;
        }

        Some(ResponseSegment {
            content,
            language: self.language,
        })
    }
}

/// Splits `text` into segments whose rendered form is at most
/// `max_segment_len` characters. Slices may cut through words or lines;
/// concatenating the contents gives back `text` exactly. Empty text yields a
/// single empty segment.
pub fn chunk<'a>(
    text: &'a str,
    max_segment_len: usize,
    language: &'a str,
) -> Result<Segments<'a>, ChunkError> {
    let overhead = fence_overhead(language);
    if max_segment_len <= overhead {
        return Err(ChunkError::NoCapacity {
            max: max_segment_len,
            overhead,
        });
    }

    Ok(Segments {
        remaining: text,
        language,
        capacity: max_segment_len - overhead,
        finished: false,
    })
}
