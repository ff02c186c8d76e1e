//! Boundary-respecting text chunkers.
//!
//! Splits normalized document text into overlapping [`TextChunk`]s that
//! stay within a configurable character budget. Two strategies:
//!
//! - [`chunk_by_separator`] — split on one fixed separator (default blank
//!   line), accumulate sections until the budget would be exceeded, then
//!   seed the next chunk with the tail of the closed one. Records true
//!   `[start_char, end_char)` spans into the input text.
//! - [`chunk_cascade`] — try separators from coarse to fine (major section
//!   break, blank line, newline, sentence end, space), recursing into the
//!   next finer separator whenever a closed chunk is still over budget.
//!   Preferred for ingestion. Offsets are relative to the accumulation a
//!   chunk was carved from; indices are reassigned `0..N-1` in final
//!   emission order.
//!
//! Both strategies emit trimmed text, keep consecutive chunks overlapping
//! by `chunk_overlap` characters for retrieval recall, and never truncate:
//! a section that no separator can reduce below the budget is emitted
//! whole. Budgets are byte lengths; slicing snaps to UTF-8 character
//! boundaries so multibyte input cannot split a code point.

use crate::error::RagError;

/// Separators tried by [`chunk_cascade`], coarsest first.
const CASCADE_SEPARATORS: [&str; 5] = ["\n\n\n", "\n\n", "\n", ". ", " "];

/// Chunking configuration. `chunk_size` must be strictly greater than
/// `chunk_overlap`; anything else is a configuration error, rejected
/// before any splitting happens.
#[derive(Debug, Clone)]
pub struct ChunkOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separator: String,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separator: "\n\n".to_string(),
        }
    }
}

impl ChunkOptions {
    pub fn validate(&self) -> Result<(), RagError> {
        if self.chunk_size <= self.chunk_overlap {
            return Err(RagError::Configuration(format!(
                "chunk_size ({}) must be greater than chunk_overlap ({})",
                self.chunk_size, self.chunk_overlap
            )));
        }
        Ok(())
    }
}

/// One emitted chunk: trimmed text plus position bookkeeping.
#[derive(Debug, Clone)]
pub struct TextChunk {
    pub text: String,
    /// Zero-based position within the document, contiguous in emission order.
    pub index: usize,
    pub start_char: usize,
    pub end_char: usize,
}

/// Split on a single fixed separator, accumulating sections up to
/// `chunk_size` and carrying a `chunk_overlap`-character tail between
/// consecutive chunks.
pub fn chunk_by_separator(text: &str, opts: &ChunkOptions) -> Result<Vec<TextChunk>, RagError> {
    opts.validate()?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let sep = opts.separator.as_str();
    let mut chunks: Vec<TextChunk> = Vec::new();

    let mut current = String::new();
    let mut current_start = 0usize;
    let mut current_end = 0usize;
    // Absolute byte offset of the section under iteration.
    let mut position = 0usize;

    for section in text.split(sep) {
        let advance = section.len() + sep.len();
        if section.trim().is_empty() {
            position += advance;
            continue;
        }

        if !current.is_empty() && current.len() + section.len() > opts.chunk_size {
            push_chunk(&mut chunks, &current, current_start, current_end);

            // Seed the next chunk with the tail of the one just closed.
            let overlap = tail(&current, opts.chunk_overlap);
            current_start = current_end - overlap.len();
            current = if overlap.is_empty() {
                section.to_string()
            } else {
                format!("{overlap}{sep}{section}")
            };
        } else if current.is_empty() {
            current_start = position;
            current = section.to_string();
        } else {
            current.push_str(sep);
            current.push_str(section);
        }

        current_end = position + section.len();
        position += advance;
    }

    if !current.trim().is_empty() {
        push_chunk(&mut chunks, &current, current_start, current_end);
    }

    Ok(chunks)
}

/// Cascading chunker: recurse through [`CASCADE_SEPARATORS`] until every
/// chunk fits the budget or no finer separator remains.
pub fn chunk_cascade(text: &str, opts: &ChunkOptions) -> Result<Vec<TextChunk>, RagError> {
    opts.validate()?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut chunks = split_recursive(text, &CASCADE_SEPARATORS, opts);

    // Indices assigned during recursion are provisional; reassign in
    // emission order.
    for (index, chunk) in chunks.iter_mut().enumerate() {
        chunk.index = index;
    }

    Ok(chunks)
}

/// Pure recursive split over `(text, remaining separators)`.
///
/// Bottoms out when the text already fits the budget or the separator list
/// is exhausted, in which case the text is emitted as a single chunk
/// regardless of size.
fn split_recursive(text: &str, separators: &[&str], opts: &ChunkOptions) -> Vec<TextChunk> {
    if separators.is_empty() || text.len() <= opts.chunk_size {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![TextChunk {
            text: trimmed.to_string(),
            index: 0,
            start_char: 0,
            end_char: text.len(),
        }];
    }

    let sep = separators[0];
    let finer = &separators[1..];

    let mut chunks: Vec<TextChunk> = Vec::new();
    let mut current = String::new();
    let mut position = 0usize;

    for split in text.split(sep) {
        if !current.is_empty() && current.len() + split.len() > opts.chunk_size {
            flush(&mut chunks, &current, position, finer, opts);

            let overlap = tail(&current, opts.chunk_overlap);
            current = if overlap.is_empty() {
                split.to_string()
            } else {
                format!("{overlap}{sep}{split}")
            };
        } else if current.is_empty() {
            current = split.to_string();
        } else {
            current.push_str(sep);
            current.push_str(split);
        }

        position += split.len() + sep.len();
    }

    if !current.trim().is_empty() {
        flush(&mut chunks, &current, position, finer, opts);
    }

    chunks
}

/// Close an accumulated chunk: recurse into finer separators when it is
/// still over budget, otherwise emit it as-is.
fn flush(
    chunks: &mut Vec<TextChunk>,
    current: &str,
    position: usize,
    finer: &[&str],
    opts: &ChunkOptions,
) {
    if current.len() > opts.chunk_size {
        chunks.extend(split_recursive(current, finer, opts));
        return;
    }
    push_chunk(
        chunks,
        current,
        position.saturating_sub(current.len()),
        position,
    );
}

/// Emit the trimmed accumulation, skipping whitespace-only content.
fn push_chunk(chunks: &mut Vec<TextChunk>, accumulated: &str, start: usize, end: usize) {
    let trimmed = accumulated.trim();
    if trimmed.is_empty() {
        return;
    }
    chunks.push(TextChunk {
        text: trimmed.to_string(),
        index: chunks.len(),
        start_char: start,
        end_char: end.max(start + 1),
    });
}

/// Last `max_bytes` of `s`, snapped forward to a UTF-8 char boundary.
fn tail(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut start = s.len() - max_bytes;
    while start < s.len() && !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
