//! Deterministic overlapping text chunker
//!
//! Splits enriched text into chunks of bounded size with a configured
//! overlap. Boundaries prefer paragraph breaks, then line breaks, then
//! sentence ends, then spaces, searched within a fixed look-back window —
//! the same input always produces byte-identical chunks, which is what lets
//! a crashed enrichment re-run safely over a partially emitted document.

use serde::{Deserialize, Serialize};

/// How far back from the size limit a boundary search may move (chars)
const BREAK_LOOKBACK: usize = 200;

/// One chunk of text with its character offsets into the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of this chunk within the document
    pub index: usize,
    /// Start offset in characters, inclusive
    pub start: usize,
    /// End offset in characters, exclusive
    pub end: usize,
    pub text: String,
}

/// Splits text into overlapping chunks of at most `chunk_size` characters
///
/// `overlap` characters of each chunk are repeated at the start of the next
/// one. Offsets are character offsets into the original text.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    if total == 0 || chunk_size == 0 {
        return Vec::new();
    }

    // A degenerate overlap would stall the cursor
    let overlap = overlap.min(chunk_size.saturating_sub(1));

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    loop {
        let hard_end = (start + chunk_size).min(total);
        let end = if hard_end < total {
            find_break(&chars, start, hard_end)
        } else {
            total
        };

        chunks.push(Chunk {
            index,
            start,
            end,
            text: chars[start..end].iter().collect(),
        });

        if end == total {
            break;
        }

        index += 1;
        let mut next_start = end.saturating_sub(overlap);
        if next_start <= start {
            next_start = end;
        }
        start = next_start;
    }

    chunks
}

/// Finds the best boundary at or before `end`, never crossing `start`
///
/// Preference order: paragraph break, line break, sentence end, word
/// boundary; falls back to the hard size limit when the window holds none.
fn find_break(chars: &[char], start: usize, end: usize) -> usize {
    let floor = end.saturating_sub(BREAK_LOOKBACK).max(start + 1);

    for p in (floor..=end).rev() {
        if p >= 2 && chars[p - 1] == '\n' && chars[p - 2] == '\n' {
            return p;
        }
    }

    for p in (floor..=end).rev() {
        if chars[p - 1] == '\n' {
            return p;
        }
    }

    for p in (floor..=end).rev() {
        if p >= 2 && chars[p - 2] == '.' && chars[p - 1] == ' ' {
            return p;
        }
    }

    for p in (floor..=end).rev() {
        if chars[p - 1] == ' ' {
            return p;
        }
    }

    end
}
