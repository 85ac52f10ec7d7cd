//! Token-bounded, overlapping text chunks for LLM prompts.
//!
//! Token counts are approximated at four characters per token. Spans are
//! computed on character boundaries, so multi-byte text never splits inside
//! a code point.

use serde::{Deserialize, Serialize};

use crate::error::ChunkError;

/// Characters per approximated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// One slice of the chunked content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the sequence, starting at 0.
    pub index: usize,
    /// First token of the span.
    pub start: usize,
    /// One past the last token of the span.
    pub end: usize,
    /// Tokens shared with the previous chunk. Always 0 for the first.
    pub overlap: usize,
    pub text: String,
}

impl Chunk {
    pub fn token_len(&self) -> usize {
        self.end - self.start
    }

    /// Text without the part repeated from the previous chunk.
    pub fn fresh_text(&self) -> &str {
        let skip = self.overlap * CHARS_PER_TOKEN;
        match self.text.char_indices().nth(skip) {
            Some((byte, _)) => &self.text[byte..],
            None if skip == 0 => &self.text,
            None => "",
        }
    }
}

/// Approximate token count of `text`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Split `content` into chunks of at most `target` tokens, each after the
/// first starting `overlap` tokens before its predecessor's end.
///
/// Content that fits in one chunk (including empty content) yields exactly
/// one chunk with no overlap.
pub fn chunk(content: &str, target: usize, overlap: usize) -> Result<Vec<Chunk>, ChunkError> {
    if target == 0 {
        return Err(ChunkError::ZeroTarget);
    }
    if overlap >= target {
        return Err(ChunkError::OverlapTooLarge { target, overlap });
    }

    // byte offset of every char boundary, plus the end
    let boundaries: Vec<usize> = content
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(content.len()))
        .collect();
    let char_count = boundaries.len() - 1;
    let total = char_count.div_ceil(CHARS_PER_TOKEN);

    let slice = |start: usize, end: usize| -> String {
        let from = boundaries[(start * CHARS_PER_TOKEN).min(char_count)];
        let to = boundaries[(end * CHARS_PER_TOKEN).min(char_count)];
        content[from..to].to_string()
    };

    if total <= target {
        return Ok(vec![Chunk {
            index: 0,
            start: 0,
            end: total,
            overlap: 0,
            text: content.to_string(),
        }]);
    }

    let mut chunks = Vec::with_capacity(total / (target - overlap) + 1);
    let mut start = 0;
    loop {
        let end = (start + target).min(total);
        chunks.push(Chunk {
            index: chunks.len(),
            start,
            end,
            overlap: if chunks.is_empty() { 0 } else { overlap },
            text: slice(start, end),
        });
        if end == total {
            break;
        }
        start = end - overlap;
    }

    Ok(chunks)
}

/// Rebuild the original content from its chunks.
pub fn reassemble(chunks: &[Chunk]) -> String {
    chunks.iter().map(Chunk::fresh_text).collect()
}
