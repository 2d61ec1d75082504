//! Chunker
//!
//! Splits content into ordered pieces that each fit a token budget, using
//! the 4-chars-per-token approximation from [`super::tokens`]. Pieces are
//! consecutive slices of the input: concatenating them yields the input
//! again. Cuts prefer natural boundaries inside the budget:
//!
//! - subtitle files (SRT / WebVTT): the start of a cue block
//! - other text: a blank line, then a line break, then whitespace
//!
//! and fall back to a hard cut at the budget when none is found.

use serde::Serialize;

use super::tokens::{chars_for_tokens, estimate_tokens, max_tokens_per_chunk, needs_chunking};

/// How many leading lines are inspected to detect subtitle content
const SUBTITLE_SNIFF_LINES: usize = 50;

/// Split `content` into pieces of at most `max_tokens_per_chunk * 4` chars
pub fn split(content: &str, max_tokens_per_chunk: u64) -> Vec<String> {
    let budget = chars_for_tokens(max_tokens_per_chunk).max(1);
    let subtitle = is_subtitle(content);

    let mut chunks = Vec::new();
    let mut rest = content;
    while !rest.is_empty() {
        // Byte offset just past `budget` chars, or the whole remainder
        let limit = match rest.char_indices().nth(budget) {
            Some((idx, _)) => idx,
            None => {
                chunks.push(rest.to_string());
                break;
            }
        };

        let boundary = if subtitle {
            cue_boundary(rest, limit).or_else(|| line_boundary(&rest[..limit]))
        } else {
            paragraph_boundary(&rest[..limit])
                .or_else(|| line_boundary(&rest[..limit]))
                .or_else(|| whitespace_boundary(&rest[..limit]))
        };
        let cut = boundary.unwrap_or(limit);

        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    chunks
}

/// Whether the content looks like SRT or WebVTT subtitles
pub fn is_subtitle(content: &str) -> bool {
    let mut lines = content.lines().take(SUBTITLE_SNIFF_LINES);
    lines.any(is_timing_line)
}

fn is_timing_line(line: &str) -> bool {
    let line = line.trim();
    line.contains("-->") && line.starts_with(|c: char| c.is_ascii_digit())
}

fn is_index_line(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.chars().all(|c| c.is_ascii_digit())
}

/// Whether a cue block (optional index line, then timing line) starts here
fn starts_cue(text: &str) -> bool {
    let mut lines = text.lines();
    match lines.next() {
        Some(first) if is_timing_line(first) => true,
        Some(first) if is_index_line(first) => lines.next().is_some_and(is_timing_line),
        _ => false,
    }
}

/// Last cue start in `(0, limit]`, never separating an index from its timing line
fn cue_boundary(rest: &str, limit: usize) -> Option<usize> {
    let mut best = None;
    let mut pos = 0;
    let mut prev: &str = "";
    for line in rest.split_inclusive('\n') {
        if pos > limit {
            break;
        }
        if pos > 0 && !is_index_line(prev) && starts_cue(&rest[pos..]) {
            best = Some(pos);
        }
        prev = line;
        pos += line.len();
    }
    best
}

/// Cut just after the last blank line
fn paragraph_boundary(window: &str) -> Option<usize> {
    let lf = window.rfind("\n\n").map(|i| i + 2);
    let crlf = window.rfind("\n\r\n").map(|i| i + 3);
    lf.max(crlf)
}

/// Cut just after the last line break
fn line_boundary(window: &str) -> Option<usize> {
    window.rfind('\n').map(|i| i + 1)
}

/// Cut just after the last whitespace character
fn whitespace_boundary(window: &str) -> Option<usize> {
    window
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, c)| i + c.len_utf8())
}

/// How a piece of content would be processed for a given model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkPlan {
    pub estimated_tokens: u64,
    pub max_tokens_per_chunk: u64,
    /// 1 when the content is sent whole
    pub chunk_count: usize,
}

impl ChunkPlan {
    pub fn is_chunked(&self) -> bool {
        self.chunk_count > 1
    }
}

/// Apply the chunking trigger to `content` without calling the API
pub fn plan(content: &str, token_limit: u64) -> ChunkPlan {
    let estimated_tokens = estimate_tokens(content);
    let max_tokens = max_tokens_per_chunk(token_limit);
    let chunk_count = if needs_chunking(content, token_limit) {
        split(content, max_tokens).len()
    } else {
        1
    };
    ChunkPlan {
        estimated_tokens,
        max_tokens_per_chunk: max_tokens,
        chunk_count,
    }
}
