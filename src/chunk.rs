//! Overlapping fixed-size text chunker.
//!
//! Splits each [`DocumentRecord`] into [`Chunk`]s of at most `chunk_size`
//! characters, where every chunk after the first repeats the last
//! `chunk_overlap` characters of its predecessor. Sizes count Unicode
//! scalar values, not bytes.
//!
//! Window ends prefer a paragraph break, then a line break, then a space,
//! provided the break lies past the overlap region; otherwise the window is
//! cut hard. Because the overlap is exact, dropping the first
//! `chunk_overlap` characters of every chunk but the first and
//! concatenating reconstructs the original text.
//!
//! Each chunk gets a fresh UUID and a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, DocumentRecord};

const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Chunk every document, preserving input order.
pub fn split_documents(
    documents: &[DocumentRecord],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| {
            let source = doc.source.display().to_string();
            split_text(&doc.text, chunk_size, chunk_overlap)
                .into_iter()
                .enumerate()
                .map(move |(i, piece)| make_chunk(&source, &doc.file_name, i as i64, piece))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Split `text` into overlapping windows.
///
/// Returns no windows for empty or whitespace-only text, and the text
/// itself when it already fits in one window.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<&str> {
    assert!(
        chunk_overlap < chunk_size,
        "chunk_overlap must be smaller than chunk_size"
    );

    if text.trim().is_empty() {
        return Vec::new();
    }

    // Byte offset of every char, plus the end of the string.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = bounds.len() - 1;

    if total_chars <= chunk_size {
        return vec![text];
    }

    let mut pieces = Vec::new();
    let mut start = 0usize;

    loop {
        let hard_end = (start + chunk_size).min(total_chars);
        let end = if hard_end == total_chars {
            hard_end
        } else {
            find_break(text, &bounds, start + chunk_overlap + 1, hard_end).unwrap_or(hard_end)
        };

        pieces.push(&text[bounds[start]..bounds[end]]);

        if end == total_chars {
            break;
        }
        start = end - chunk_overlap;
    }

    pieces
}

/// Latest char position in `(min_end, max_end]` that ends right after a
/// separator, trying separators in priority order.
fn find_break(text: &str, bounds: &[usize], min_end: usize, max_end: usize) -> Option<usize> {
    if min_end > max_end {
        return None;
    }
    let window = &text[bounds[min_end - 1]..bounds[max_end]];
    let window_offset = bounds[min_end - 1];

    for sep in SEPARATORS {
        if let Some(pos) = window.rfind(sep) {
            let byte_end = window_offset + pos + sep.len();
            // Separators are ASCII, so `byte_end` is always a char boundary.
            if let Ok(char_end) = bounds.binary_search(&byte_end) {
                if char_end >= min_end && char_end <= max_end {
                    return Some(char_end);
                }
            }
        }
    }
    None
}

fn make_chunk(source: &str, file_name: &str, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        source: source.to_string(),
        file_name: file_name.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}
