//! # Alignment Engine
//!
//! Attaches translation and romanization tracks to the primary lyric.
//!
//! Secondary tracks are authored independently, so their timestamps may
//! match the primary track exactly, drift by a few milliseconds, or be
//! unrelated. The word-level track's own anchors can drift from the plain
//! track as well, so the word-level pipeline aligns in two steps:
//!
//! 1. Every plain original line is matched to a secondary entry by time and
//!    its text appended to that entry's merged buffer.
//! 2. Every secondary entry is matched to a word-level line by time, then the
//!    choice is refined within a window of lines by edit distance between the
//!    merged buffer and the candidate's text.
//!
//! ## Matching Mode
//! When at least 10% of the secondary timestamps also appear in the primary
//! track the tracks are considered co-timed and the *last* candidate within
//! 20 ms wins. Otherwise the closest candidate in time wins.

use std::collections::HashSet;

use tracing::trace;

use crate::lexer::TimedEntry;
use crate::model::LyricLine;

/// Minimum share of exactly-shared timestamps for tolerance matching
pub const SHARED_TIME_RATIO: f64 = 0.1;

/// Maximum distance (exclusive, ms) for a tolerance match
pub const TIME_TOLERANCE_MS: i64 = 20;

/// Lines searched on each side of the closest word-level line
pub const SEARCH_WINDOW: usize = 5;

/// How a secondary track is matched against a primary one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Last candidate within [`TIME_TOLERANCE_MS`]
    Tolerance,
    /// Closest candidate in time
    Nearest,
}

/// Which optional field of a line a secondary track fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryField {
    Translated,
    Roman,
}

impl SecondaryField {
    pub fn get(self, line: &LyricLine) -> Option<&String> {
        match self {
            SecondaryField::Translated => line.translated.as_ref(),
            SecondaryField::Roman => line.roman.as_ref(),
        }
    }

    fn slot(self, line: &mut LyricLine) -> &mut Option<String> {
        match self {
            SecondaryField::Translated => &mut line.translated,
            SecondaryField::Roman => &mut line.roman,
        }
    }

    /// Append `text` to the field, space-joined with existing content
    pub fn append(self, line: &mut LyricLine, text: &str) {
        append_joined(self.slot(line), text);
    }
}

/// A secondary entry carrying the original text matched onto it
#[derive(Debug, Clone, PartialEq)]
pub struct MergedEntry {
    pub time: i64,
    pub text: String,
    pub merged: Option<String>,
}

fn append_joined(slot: &mut Option<String>, text: &str) {
    let buffer = slot.get_or_insert_with(String::new);
    if !buffer.is_empty() {
        buffer.push(' ');
    }
    buffer.push_str(text);
}

/// Edit distance with unit insert/delete/substitute costs over chars
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j]
            } else {
                1 + prev[j].min(prev[j + 1]).min(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Pick the matching mode from the share of secondary timestamps that also
/// occur in the primary track.
pub fn select_mode(primary: &[i64], secondary: &[i64]) -> MatchMode {
    let secondary: HashSet<i64> = secondary.iter().copied().collect();
    if secondary.is_empty() {
        return MatchMode::Tolerance;
    }
    let primary: HashSet<i64> = primary.iter().copied().collect();
    let shared = secondary.intersection(&primary).count();
    if shared as f64 / secondary.len() as f64 >= SHARED_TIME_RATIO {
        MatchMode::Tolerance
    } else {
        MatchMode::Nearest
    }
}

/// Index of the candidate matching `time` under `mode`
pub fn match_time(candidates: &[i64], time: i64, mode: MatchMode) -> Option<usize> {
    match mode {
        MatchMode::Tolerance => candidates
            .iter()
            .rposition(|&t| t.abs_diff(time) < TIME_TOLERANCE_MS.unsigned_abs()),
        MatchMode::Nearest => nearest(candidates, time),
    }
}

/// First candidate with the smallest distance to `time`
fn nearest(candidates: &[i64], time: i64) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for (i, &t) in candidates.iter().enumerate() {
        let delta = t.abs_diff(time);
        if best.map_or(true, |(_, d)| delta < d) {
            best = Some((i, delta));
        }
    }
    best.map(|(i, _)| i)
}

/// Step 1: append each primary line's text onto its matching secondary entry
pub fn merge_primary_into_secondary(
    primary: &[TimedEntry],
    secondary: &[TimedEntry],
) -> Vec<MergedEntry> {
    let mut merged: Vec<MergedEntry> = secondary
        .iter()
        .map(|e| MergedEntry {
            time: e.time,
            text: e.text.clone(),
            merged: None,
        })
        .collect();
    if merged.is_empty() {
        return merged;
    }

    let primary_times: Vec<i64> = primary.iter().map(|e| e.time).collect();
    let secondary_times: Vec<i64> = merged.iter().map(|e| e.time).collect();
    let mode = select_mode(&primary_times, &secondary_times);
    trace!(?mode, entries = merged.len(), "merging primary text into secondary track");

    for line in primary {
        if let Some(target) = match_time(&secondary_times, line.time, mode) {
            append_joined(&mut merged[target].merged, &line.text);
        }
    }
    merged
}

/// Scan order around `center`: center first, then alternating outward
fn window(center: usize, len: usize) -> Vec<usize> {
    let mut order = vec![center];
    for offset in 1..=SEARCH_WINDOW {
        if let Some(below) = center.checked_sub(offset) {
            order.push(below);
        }
        if center + offset < len {
            order.push(center + offset);
        }
    }
    order
}

/// Step 2: attach merged secondary entries to word-level lines
pub fn attach_to_dynamic(lines: &mut [LyricLine], entries: &[MergedEntry], field: SecondaryField) {
    if lines.is_empty() {
        return;
    }

    for entry in entries {
        let times: Vec<i64> = lines.iter().map(|l| l.time).collect();
        let Some(center) = nearest(&times, entry.time) else {
            continue;
        };
        let merged = entry.merged.as_deref().unwrap_or("");

        let mut best: Option<(usize, usize)> = None;
        for index in window(center, lines.len()) {
            let candidate = &lines[index];
            let filled = usize::from(field.get(candidate).is_some());
            let score = edit_distance(merged, &candidate.original) * 1000 + filled;
            // Ties go to the last scanned candidate
            if best.map_or(true, |(_, s)| score <= s) {
                best = Some((index, score));
            }
        }

        if let Some((index, _)) = best {
            field.append(&mut lines[index], &entry.text);
        }
    }
}

/// Attach a secondary track directly onto plain primary lines
pub fn attach_to_plain(lines: &mut [LyricLine], secondary: &[TimedEntry], field: SecondaryField) {
    if lines.is_empty() || secondary.is_empty() {
        return;
    }

    let primary_times: Vec<i64> = lines.iter().map(|l| l.time).collect();
    let secondary_times: Vec<i64> = secondary.iter().map(|e| e.time).collect();
    let mode = select_mode(&primary_times, &secondary_times);
    trace!(?mode, ?field, "attaching secondary track to plain lines");

    for entry in secondary {
        if let Some(target) = match_time(&primary_times, entry.time, mode) {
            field.append(&mut lines[target], &entry.text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(items: &[(i64, &str)]) -> Vec<TimedEntry> {
        items
            .iter()
            .map(|&(time, text)| TimedEntry {
                time,
                text: text.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("", ""), 0);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("当我好奇", "当我好奇"), 0);
        assert_eq!(edit_distance("当我好奇", "当我躲在"), 2);
    }

    #[test]
    fn test_select_mode() {
        assert_eq!(select_mode(&[1000, 2000], &[1000, 2005]), MatchMode::Tolerance);
        assert_eq!(select_mode(&[1000, 2000], &[1500, 2500]), MatchMode::Nearest);
        assert_eq!(select_mode(&[1000], &[]), MatchMode::Tolerance);
    }

    #[test]
    fn test_select_mode_at_ratio_boundary() {
        let ten: Vec<i64> = (1..=10).map(|i| i * 1000).collect();
        let eleven: Vec<i64> = (1..=11).map(|i| i * 1000).collect();
        // One shared stamp out of ten is exactly the threshold
        assert_eq!(select_mode(&[1000], &ten), MatchMode::Tolerance);
        assert_eq!(select_mode(&[1000], &eleven), MatchMode::Nearest);
    }

    #[test]
    fn test_match_time_extreme_values() {
        assert_eq!(match_time(&[i64::MIN, i64::MAX], i64::MAX, MatchMode::Nearest), Some(1));
        assert_eq!(match_time(&[i64::MIN], i64::MAX, MatchMode::Tolerance), None);
    }

    #[test]
    fn test_tolerance_match_prefers_last() {
        assert_eq!(match_time(&[990, 1005, 1019], 1000, MatchMode::Tolerance), Some(2));
        assert_eq!(match_time(&[1020, 3000], 1000, MatchMode::Tolerance), None);
    }

    #[test]
    fn test_nearest_match_prefers_first() {
        assert_eq!(match_time(&[900, 1100, 5000], 1000, MatchMode::Nearest), Some(0));
        assert_eq!(match_time(&[], 1000, MatchMode::Nearest), None);
    }

    #[test]
    fn test_merge_joins_multiple_primary_lines() {
        let primary = entries(&[(1000, "first"), (1010, "second"), (5000, "third")]);
        let secondary = entries(&[(1000, "one"), (5000, "three")]);
        let merged = merge_primary_into_secondary(&primary, &secondary);
        assert_eq!(merged[0].merged.as_deref(), Some("first second"));
        assert_eq!(merged[1].merged.as_deref(), Some("third"));
    }

    #[test]
    fn test_window_order() {
        assert_eq!(window(0, 3), vec![0, 1, 2]);
        assert_eq!(window(5, 20), vec![5, 4, 6, 3, 7, 2, 8, 1, 9, 0, 10]);
    }

    #[test]
    fn test_attach_to_dynamic_uses_text_similarity() {
        let mut lines = vec![
            LyricLine::new(1000, "hello world"),
            LyricLine::new(3000, "goodbye moon"),
        ];
        // Timestamp is closest to the first line but the text matches the second
        let entries = vec![MergedEntry {
            time: 1100,
            text: "adieu lune".to_string(),
            merged: Some("goodbye moon".to_string()),
        }];
        attach_to_dynamic(&mut lines, &entries, SecondaryField::Translated);
        assert_eq!(lines[0].translated, None);
        assert_eq!(lines[1].translated.as_deref(), Some("adieu lune"));
    }

    #[test]
    fn test_attach_to_dynamic_prefers_unfilled_line() {
        let mut lines = vec![LyricLine::new(1000, "la"), LyricLine::new(2000, "la")];
        let entries = vec![
            MergedEntry {
                time: 1000,
                text: "x".to_string(),
                merged: Some("la".to_string()),
            },
            MergedEntry {
                time: 1000,
                text: "y".to_string(),
                merged: Some("la".to_string()),
            },
        ];
        attach_to_dynamic(&mut lines, &entries, SecondaryField::Roman);
        // Equal scores resolve to the last scanned line, an already filled
        // line costs one extra point
        assert_eq!(lines[1].roman.as_deref(), Some("x"));
        assert_eq!(lines[0].roman.as_deref(), Some("y"));
    }

    #[test]
    fn test_attach_to_plain() {
        let mut lines = vec![LyricLine::new(1000, "a"), LyricLine::new(2000, "b")];
        let secondary = entries(&[(1000, "A"), (2010, "B"), (2015, "B2")]);
        attach_to_plain(&mut lines, &secondary, SecondaryField::Translated);
        assert_eq!(lines[0].translated.as_deref(), Some("A"));
        assert_eq!(lines[1].translated.as_deref(), Some("B B2"));
    }
}
