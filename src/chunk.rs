//! Overlapping fixed-size text chunker.
//!
//! Splits each [`SourceUnit`] into [`Chunk`]s of at most `max_chars`
//! characters. Consecutive chunks of the same unit share exactly
//! `overlap_chars` characters: the next window always starts `overlap_chars`
//! before the previous window ended.
//!
//! # Algorithm
//!
//! 1. A unit of at most `max_chars` characters becomes a single chunk,
//!    byte-for-byte equal to the unit text.
//! 2. Otherwise, a window starting at `start` may end anywhere in
//!    `(start + overlap, start + max]`. The end is snapped back to the last
//!    paragraph break (`\n\n`), then line break, then space inside that
//!    range; with no break available the window is hard-cut at
//!    `start + max`.
//! 3. The next window starts at `end - overlap`.
//!
//! Lengths are counted in `char`s, never bytes, so multi-byte text is never
//! split mid-character. Boundaries depend only on the input, so re-chunking
//! identical text yields identical chunks and identical ids.
//!
//! # Example
//!
//! ```rust
//! use asha::chunk::chunk_units;
//! use asha::models::SourceUnit;
//!
//! let units = vec![SourceUnit::new("Hello world.", "notes.txt")];
//! let chunks = chunk_units(&units, 1000, 100);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].text, "Hello world.");
//! ```

use sha2::{Digest, Sha256};

use crate::models::{Chunk, SourceUnit};

/// Preferred window break points, best first.
const BREAKS: [&str; 3] = ["\n\n", "\n", " "];

/// Chunk every unit in order. Chunk `unit` fields record the unit's
/// position in `units`.
pub fn chunk_units(units: &[SourceUnit], max_chars: usize, overlap_chars: usize) -> Vec<Chunk> {
    units
        .iter()
        .enumerate()
        .flat_map(|(i, unit)| chunk_unit(i as i64, unit, max_chars, overlap_chars))
        .collect()
}

/// Chunk a single unit. Returns chunks with contiguous `seq` from 0.
pub fn chunk_unit(
    unit_index: i64,
    unit: &SourceUnit,
    max_chars: usize,
    overlap_chars: usize,
) -> Vec<Chunk> {
    window_bounds(&unit.text, max_chars, overlap_chars)
        .into_iter()
        .enumerate()
        .map(|(seq, (from, to))| {
            make_chunk(&unit.origin, unit_index, seq as i64, &unit.text[from..to])
        })
        .collect()
}

/// Byte ranges of each window over `text`.
///
/// `overlap_chars` is clamped below `max_chars`; config validation rejects
/// such settings before they get here.
pub fn window_bounds(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<(usize, usize)> {
    let max = max_chars.max(1);
    let overlap = overlap_chars.min(max - 1);

    // offsets[i] is the byte offset of char i; offsets[total] == text.len().
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = offsets.len() - 1;

    if total <= max {
        return vec![(0, text.len())];
    }

    let mut bounds = Vec::new();
    let mut start = 0usize;
    loop {
        let hard_end = (start + max).min(total);
        if hard_end == total {
            bounds.push((offsets[start], text.len()));
            break;
        }
        let end = find_break(text, &offsets, start + overlap + 1, hard_end).unwrap_or(hard_end);
        bounds.push((offsets[start], offsets[end]));
        start = end - overlap;
    }
    bounds
}

/// Last char position in `[min_end, max_end]` at which the text so far ends
/// with one of [`BREAKS`], trying each separator in priority order.
fn find_break(text: &str, offsets: &[usize], min_end: usize, max_end: usize) -> Option<usize> {
    for sep in BREAKS {
        let mut end = max_end;
        while end >= min_end {
            if text[..offsets[end]].ends_with(sep) {
                return Some(end);
            }
            end -= 1;
        }
    }
    None
}

fn sha256_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Create a single [`Chunk`] with a content-addressed id and text hash.
fn make_chunk(origin: &str, unit: i64, seq: i64, text: &str) -> Chunk {
    let id = sha256_hex(&[
        origin.as_bytes(),
        &unit.to_le_bytes(),
        &seq.to_le_bytes(),
        text.as_bytes(),
    ]);
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id,
        origin: origin.to_string(),
        unit,
        seq,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(text: &str) -> SourceUnit {
        SourceUnit::new(text, "doc.txt")
    }

    fn long_text() -> String {
        (0..40)
            .map(|i| format!("Paragraph {} talks about loans, jobs and mentorship.", i))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn test_short_unit_single_chunk_verbatim() {
        let text = "  Loans for women entrepreneurs\n";
        let chunks = chunk_unit(0, &unit(text), 1000, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].seq, 0);
        assert_eq!(chunks[0].origin, "doc.txt");
    }

    #[test]
    fn test_exact_length_unit_single_chunk() {
        let text = "x".repeat(50);
        let chunks = chunk_unit(0, &unit(&text), 50, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn test_chunks_respect_max_chars() {
        let text = long_text();
        let chunks = chunk_unit(0, &unit(&text), 120, 20);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 120, "chunk too long: {:?}", c.text);
        }
    }

    #[test]
    fn test_adjacent_chunks_overlap_exactly() {
        let text = long_text();
        for (max, overlap) in [(120, 20), (80, 0), (200, 199), (64, 7)] {
            let chunks = chunk_unit(0, &unit(&text), max, overlap);
            for pair in chunks.windows(2) {
                let prev: Vec<char> = pair[0].text.chars().collect();
                let next: Vec<char> = pair[1].text.chars().collect();
                let tail = &prev[prev.len() - overlap..];
                let head = &next[..overlap];
                assert_eq!(tail, head, "max={} overlap={}", max, overlap);
            }
        }
    }

    #[test]
    fn test_dropping_overlaps_reconstructs_text() {
        let text = long_text();
        let overlap = 15;
        let chunks = chunk_unit(0, &unit(&text), 100, overlap);
        let mut rebuilt: String = chunks[0].text.clone();
        for c in &chunks[1..] {
            rebuilt.extend(c.text.chars().skip(overlap));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let text = format!("{}\n\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = chunk_unit(0, &unit(&text), 40, 2);
        assert!(chunks[0].text.ends_with("\n\n"));
        assert_eq!(chunks[0].text.chars().count(), 32);
    }

    #[test]
    fn test_hard_cut_without_whitespace() {
        let text = "z".repeat(25);
        let chunks = chunk_unit(0, &unit(&text), 10, 3);
        assert_eq!(chunks[0].text.len(), 10);
        assert_eq!(chunks[1].text.len(), 10);
        assert!(chunks.iter().all(|c| c.text.len() <= 10));
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "₹5,00,000 – ₹8,00,000 प्रति वर्ष ┌──────┐ │ Hello world │ └──────┘".repeat(5);
        let chunks = chunk_unit(0, &unit(&text), 17, 4);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 17);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = long_text();
        let c1 = chunk_unit(3, &unit(&text), 90, 12);
        let c2 = chunk_unit(3, &unit(&text), 90, 12);
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_ids_unique_and_units_numbered() {
        let units = vec![unit("same text"), unit("same text"), unit(&long_text())];
        let chunks = chunk_units(&units, 100, 10);
        let mut ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), chunks.len());
        assert_eq!(chunks[0].unit, 0);
        assert_eq!(chunks[1].unit, 1);
        assert!(chunks[2..].iter().all(|c| c.unit == 2));
        for (i, c) in chunks[2..].iter().enumerate() {
            assert_eq!(c.seq, i as i64);
        }
    }
}
