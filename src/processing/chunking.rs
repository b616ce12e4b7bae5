//! Size-bounded recursive splitting of header sections.
//!
//! Each [`HeaderSection`] is cut into windows of at most `chunk_size` characters. Cut points
//! prefer natural boundaries, coarsest first:
//!
//! 1. paragraph break (`\n\n`)
//! 2. line break (`\n`)
//! 3. sentence end (`.`, `!`, `?` followed by whitespace, or `。！？．`)
//! 4. any whitespace
//! 5. hard cut at the size limit
//!
//! Separators stay at the end of the earlier window. Every window after the first starts exactly
//! `chunk_overlap` characters before the previous one ended, so dropping that prefix from each
//! later window and concatenating reconstructs the section verbatim. A cut is only accepted when
//! it lies beyond `start + chunk_overlap`, which guarantees forward progress.
//!
//! Sizes are counted in Unicode scalar values.

use super::types::{Chunk, ChunkingError, HeaderSection};

/// Maximum chunk size and overlap, validated so that `chunk_overlap < chunk_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkingConfig {
    /// Default maximum chunk size in characters.
    pub const DEFAULT_CHUNK_SIZE: usize = 2000;
    /// Default overlap in characters.
    pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

    /// Validate and build a splitter configuration.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Maximum characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters repeated from the previous chunk.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            chunk_overlap: Self::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Whitespace,
}

const BOUNDARY_PRIORITY: [Boundary; 4] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Whitespace,
];

impl Boundary {
    /// Byte offset just past the last separator of this kind in `window`.
    fn last_cut(self, window: &str) -> Option<usize> {
        match self {
            Self::Paragraph => window.rfind("\n\n").map(|at| at + 2),
            Self::Line => window.rfind('\n').map(|at| at + 1),
            Self::Sentence => last_sentence_end(window),
            Self::Whitespace => window
                .char_indices()
                .rev()
                .find(|(_, ch)| ch.is_whitespace())
                .map(|(at, ch)| at + ch.len_utf8()),
        }
    }
}

fn last_sentence_end(window: &str) -> Option<usize> {
    let mut following: Option<char> = None;
    for (at, ch) in window.char_indices().rev() {
        match ch {
            '。' | '！' | '？' | '．' => return Some(at + ch.len_utf8()),
            '.' | '!' | '?' => {
                if let Some(space) = following.filter(|next| next.is_whitespace()) {
                    return Some(at + ch.len_utf8() + space.len_utf8());
                }
            }
            _ => {}
        }
        following = Some(ch);
    }
    None
}

/// Split every section and number the resulting chunks contiguously across the whole document.
///
/// Windows holding only whitespace are dropped before numbering.
pub fn split_sections(sections: &[HeaderSection], config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut ordinal = 0;

    for section in sections {
        let pieces = split_text(&section.content, config);
        for piece in pieces.into_iter().filter(|piece| !piece.trim().is_empty()) {
            chunks.push(Chunk {
                content: piece.to_string(),
                headers: section.headers.clone(),
                ordinal,
            });
            ordinal += 1;
        }
    }

    tracing::debug!(
        sections = sections.len(),
        chunks = chunks.len(),
        chunk_size = config.chunk_size,
        overlap = config.chunk_overlap,
        "Split document into chunks"
    );
    chunks
}

/// Split a single text into overlapping windows borrowed from `text`.
///
/// Returns an empty vector for empty input and `[text]` when it already fits.
pub fn split_text<'a>(text: &'a str, config: &ChunkingConfig) -> Vec<&'a str> {
    if text.is_empty() {
        return Vec::new();
    }

    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(at, _)| at)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = offsets.len() - 1;
    if total <= config.chunk_size {
        return vec![text];
    }

    let mut pieces = Vec::new();
    let mut start = 0;

    loop {
        if total - start <= config.chunk_size {
            pieces.push(&text[offsets[start]..]);
            break;
        }

        let limit = start + config.chunk_size;
        let end = find_cut(text, &offsets, start, limit, start + config.chunk_overlap);
        pieces.push(&text[offsets[start]..offsets[end]]);
        start = end - config.chunk_overlap;
    }

    pieces
}

/// Pick the cut (as a char index) in `(floor, limit]` at the coarsest available boundary.
///
/// Boundaries in the back half of the window win first; only when none lies there is a cut
/// anywhere past `floor` taken.
fn find_cut(text: &str, offsets: &[usize], start: usize, limit: usize, floor: usize) -> usize {
    let window_start = offsets[start];
    let window = &text[window_start..offsets[limit]];
    let candidates: Vec<usize> = BOUNDARY_PRIORITY
        .iter()
        .filter_map(|boundary| boundary.last_cut(window))
        .map(|relative| {
            let byte = window_start + relative;
            offsets.partition_point(|&offset| offset < byte)
        })
        .collect();

    let midpoint = floor.max(start + (limit - start) / 2);
    candidates
        .iter()
        .copied()
        .find(|&cut| cut > midpoint)
        .or_else(|| candidates.iter().copied().find(|&cut| cut > floor))
        .unwrap_or(limit)
}
