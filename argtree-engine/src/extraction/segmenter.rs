//! Transcript segmentation into overlapping windows
//!
//! Windows are cut at the last paragraph break that leaves at least
//! `min_chars` in the window, else the last line break, else the last
//! sentence end, else the last space, else hard at `max_chars`. The next
//! window starts `overlap_chars` before the cut, moved forward to the first
//! sentence boundary inside that overlap when there is one.
//!
//! Window, overlap and minimum lengths count characters. Segment offsets
//! are UTF-8 byte offsets into the transcript, so every segment is a plain
//! slice of it.

use crate::types::Segment;
use argtree_common::config::ExtractionConfig;
use serde::Serialize;

/// Window parameters, in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmenterConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub min_chars: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_chars: 2000,
            overlap_chars: 200,
            min_chars: 500,
        }
    }
}

impl From<&ExtractionConfig> for SegmenterConfig {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            max_chars: config.max_segment_chars,
            overlap_chars: config.overlap_chars,
            min_chars: config.min_segment_chars,
        }
    }
}

const SENTENCE_ENDS: [&str; 3] = [". ", "! ", "? "];

/// Split a transcript into overlapping segments
///
/// Transcripts of at most `max_chars` characters produce exactly one
/// segment (including the empty transcript).
pub fn segment_transcript(text: &str, config: &SegmenterConfig) -> Vec<Segment> {
    let max_chars = config.max_chars.max(8);
    let min_chars = config.min_chars.clamp(2, max_chars);
    let overlap_chars = config.overlap_chars.min(min_chars - 1);

    let len = text.len();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut overlap_len = 0;

    loop {
        let limit = advance_chars(text, start, max_chars);
        if limit == len {
            segments.push(make_segment(text, segments.len(), start, len, overlap_len));
            break;
        }

        let cut = find_cut(text, start, limit, min_chars);
        segments.push(make_segment(text, segments.len(), start, cut, overlap_len));

        let next_start = overlap_start(text, start, cut, overlap_chars);
        overlap_len = cut - next_start;
        start = next_start;
    }

    segments
}

fn make_segment(text: &str, index: usize, start: usize, end: usize, overlap_len: usize) -> Segment {
    Segment {
        index,
        text: text[start..end].to_string(),
        start_offset: start,
        end_offset: end,
        overlap_len,
    }
}

/// Byte offset `count` characters after `from` (clamped to the end)
fn advance_chars(text: &str, from: usize, count: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(count)
        .map_or(text.len(), |(offset, _)| from + offset)
}

/// Byte offset `count` characters before `to` (clamped to the start)
fn retreat_chars(text: &str, to: usize, count: usize) -> usize {
    if count == 0 {
        return to;
    }
    text[..to]
        .char_indices()
        .rev()
        .nth(count - 1)
        .map_or(0, |(offset, _)| offset)
}

/// End of the window `text[start..limit]` (exclusive byte offset)
fn find_cut(text: &str, start: usize, limit: usize, min_chars: usize) -> usize {
    let window = &text[start..limit];
    let earliest = advance_chars(text, start, min_chars).min(limit) - start;

    let after = |pos: Option<usize>, sep_len: usize| {
        pos.map(|p| p + sep_len).filter(|&end| end >= earliest && end > 0)
    };

    let candidate = after(window.rfind("\n\n"), 2)
        .or_else(|| after(window.rfind('\n'), 1))
        .or_else(|| {
            SENTENCE_ENDS
                .iter()
                .filter_map(|sep| after(window.rfind(sep), sep.len()))
                .max()
        })
        .or_else(|| after(window.rfind(' '), 1));

    match candidate {
        Some(end) => start + end,
        None => limit,
    }
}

/// Start of the window following a cut at `cut`
fn overlap_start(text: &str, start: usize, cut: usize, overlap_chars: usize) -> usize {
    if overlap_chars == 0 {
        return cut;
    }
    // The next window always starts at least one character after this one
    let earliest = retreat_chars(text, cut, overlap_chars).max(advance_chars(text, start, 1));
    if earliest >= cut {
        return cut;
    }

    let overlap = &text[earliest..cut];
    let boundary = SENTENCE_ENDS
        .iter()
        .filter_map(|sep| overlap.find(sep).map(|p| p + sep.len()))
        .chain(overlap.find('\n').map(|p| p + 1))
        .min();

    match boundary {
        Some(offset) if earliest + offset < cut => earliest + offset,
        _ => earliest,
    }
}

/// Summary of a segmentation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SegmentStats {
    pub count: usize,
    pub total_chars: usize,
    pub avg_chars: f64,
    pub min_chars: usize,
    pub max_chars: usize,
}

pub fn segment_stats(segments: &[Segment]) -> SegmentStats {
    if segments.is_empty() {
        return SegmentStats::default();
    }
    let lengths: Vec<usize> = segments.iter().map(|s| s.text.chars().count()).collect();
    let total: usize = lengths.iter().sum();
    SegmentStats {
        count: segments.len(),
        total_chars: total,
        avg_chars: total as f64 / segments.len() as f64,
        min_chars: lengths.iter().copied().min().unwrap_or(0),
        max_chars: lengths.iter().copied().max().unwrap_or(0),
    }
}
