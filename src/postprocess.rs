//! # Model Post-Processing
//!
//! Normalizes parsed lines into the final [`LyricModel`](crate::LyricModel)
//! shape. Runs after alignment.
//!
//! ## Word-Level Passes
//! Only meaningful for karaoke tracks, applied in this order:
//! - [`fill_gaps`] - insert a pause line into long instrumental gaps
//! - [`reconcile_spaces`] - move spacing onto the word that precedes it
//! - [`classify_words`] - wide-script and trailing-space flags
//! - [`mark_sustained`] - flag long held notes before clause boundaries
//!
//! ## Common Pass
//! [`finalize`] handles both pipelines:
//! 1. Instrumental detection (sentinel line at 99:00.000)
//! 2. Blank collapsing (a pause survives only before a gap over 5 s)
//! 3. Leading trim plus a synthetic intro pause for late starts
//! 4. Full-width punctuation rewrite inside Latin-script lines
//!
//! Plain tracks additionally get [`fill_durations`] once the line list is
//! final.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::model::{LyricLine, Word, INSTRUMENTAL_PLACEHOLDER, INSTRUMENTAL_SENTINEL_MS};

/// Pauses shorter than this (ms) are not worth a placeholder line
pub const MIN_PAUSE_MS: i64 = 5000;

/// Start (ms) of the synthetic pause inserted before a late first line
pub const INTRO_PAUSE_START_MS: i64 = 500;

/// Minimum duration (ms) of a sustained word
pub const SUSTAIN_MIN_MS: i64 = 1000;

/// Characters ending a clause inside a karaoke line
const CLAUSE_PUNCTUATION: &[char] = &[
    ',', '.', '，', '。', '!', '?', '？', '、', '；', '：', '…', '—', '~', '～', '·', '‘', '’',
    '“', '”', 'ﾞ',
];

lazy_static! {
    static ref PUNCT_OR_SYMBOL: Regex = Regex::new(r"[\p{P}\p{S}]").unwrap();
    static ref LATIN_TEXT: Regex = Regex::new(r"^[\sA-Za-z0-9_\x{00C0}-\x{024F}]+$").unwrap();
    static ref WIDE_SCRIPT: Regex =
        Regex::new(r"[\p{Han}\x{3040}-\x{309F}\x{30A0}-\x{30FF}]").unwrap();
}

/// True when `text` is Latin script once punctuation and symbols are removed
pub fn is_latin_text(text: &str) -> bool {
    let stripped = PUNCT_OR_SYMBOL.replace_all(text, "");
    LATIN_TEXT.is_match(&stripped)
}

/// Rewrite full-width quotes and punctuation to their ASCII forms
pub fn normalize_punctuation(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '‘' | '’' | '′' => '\'',
            '“' | '”' | '″' => '"',
            '（' => '(',
            '）' => ')',
            '，' => ',',
            '！' => '!',
            '？' => '?',
            '：' => ':',
            '；' => ';',
            other => other,
        })
        .collect()
}

pub fn is_wide_script(text: &str) -> bool {
    WIDE_SCRIPT.is_match(text)
}

fn ends_with_space(text: &str) -> bool {
    text.ends_with(char::is_whitespace)
}

/// Whether a word closes a clause.
///
/// Apostrophes between Latin letters (`don’t`) belong to the word.
fn is_clause_boundary(text: &str) -> bool {
    if ends_with_space(text) {
        return true;
    }
    let chars: Vec<char> = text.chars().collect();
    chars.iter().enumerate().any(|(i, &c)| {
        if !CLAUSE_PUNCTUATION.contains(&c) {
            return false;
        }
        let apostrophe = matches!(c, '‘' | '’');
        let between_letters = i > 0
            && chars[i - 1].is_ascii_alphabetic()
            && chars.get(i + 1).is_some_and(char::is_ascii_alphabetic);
        !(apostrophe && between_letters)
    })
}

/// Whether a word can carry the sustained flag
fn is_sustain_candidate(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty() && !PUNCT_OR_SYMBOL.is_match(text)
}

/// Insert a pause line between karaoke lines separated by a long gap.
///
/// The gap runs from the end of the last word of one line to the earliest
/// start (line time or word anchor) of the next.
pub fn fill_gaps(lines: &mut Vec<LyricLine>) {
    let mut i = 0;
    while i + 1 < lines.len() {
        let this = &lines[i];
        let next = &lines[i + 1];
        if !this.is_blank() && !next.is_blank() && this.duration > 0 {
            let anchor = this.dynamic.as_ref().map_or(this.time, |d| d.anchor_time);
            let this_end = anchor.saturating_add(this.duration);
            let next_start = next
                .dynamic
                .as_ref()
                .map_or(next.time, |d| d.anchor_time.min(next.time));
            let gap = next_start.saturating_sub(this_end);
            if gap >= MIN_PAUSE_MS {
                debug!(at = this_end, gap, "inserting pause line");
                lines.insert(i + 1, LyricLine::blank(this_end, gap));
                i += 1;
            }
        }
        i += 1;
    }
}

/// Carry the spacing of each line's text over to its words.
///
/// Walks the words consuming them from the trimmed line text. Where the text
/// has whitespace after a word that lacks a trailing space, one space is
/// appended to the word and any leading space of the following word dropped,
/// so the words still concatenate to the line text. Stops at the first word
/// that does not match.
pub fn reconcile_spaces(lines: &mut [LyricLine]) {
    for line in lines.iter_mut() {
        let LyricLine {
            original, dynamic, ..
        } = line;
        let Some(track) = dynamic.as_mut() else {
            continue;
        };
        let words = &mut track.words;
        let mut raw = original.trim();

        for j in 0..words.len() {
            let consumed = words[j].text.trim_end();
            let Some(rest) = raw.strip_prefix(consumed) else {
                break;
            };
            let trimmed = rest.trim_start();
            raw = trimmed;
            if trimmed.len() == rest.len() || ends_with_space(&words[j].text) {
                continue;
            }
            words[j].text.push(' ');
            if let Some(next) = words.get_mut(j + 1) {
                let shifted = next.text.trim_start().to_string();
                next.text = shifted;
            }
        }
    }
}

/// Set the wide-script and trailing-space flags of every word
pub fn classify_words(lines: &mut [LyricLine]) {
    for word in lines.iter_mut().flat_map(word_list) {
        word.flags.is_wide_script = is_wide_script(&word.text);
        word.flags.ends_with_space = ends_with_space(&word.text);
    }
}

fn word_list(line: &mut LyricLine) -> &mut [Word] {
    line.dynamic
        .as_mut()
        .map(|d| d.words.as_mut_slice())
        .unwrap_or_default()
}

/// Flag held notes.
///
/// A line splits into clauses at words ending in whitespace or clause
/// punctuation. In each clause the last word that is neither blank nor
/// punctuation is sustained when it lasts at least [`SUSTAIN_MIN_MS`].
pub fn mark_sustained(lines: &mut [LyricLine]) {
    for line in lines.iter_mut() {
        let words = word_list(line);
        let Some(last) = words.len().checked_sub(1) else {
            continue;
        };

        let mut ends: Vec<usize> = (0..last)
            .filter(|&j| is_clause_boundary(&words[j].text))
            .collect();
        ends.push(last);

        let mut start = 0;
        for end in ends {
            let target = (start..=end)
                .rev()
                .find(|&k| is_sustain_candidate(&words[k].text));
            if let Some(k) = target {
                if words[k].duration >= SUSTAIN_MIN_MS {
                    words[k].flags.is_sustained = true;
                }
            }
            start = end + 1;
        }
    }
}

/// Common normalization pass for both pipelines.
///
/// A lyric made of nothing but the 99:00.000 sentinel line is instrumental.
pub fn finalize(lines: Vec<LyricLine>) -> Vec<LyricLine> {
    if let [only] = lines.as_slice() {
        if only.time == INSTRUMENTAL_SENTINEL_MS && only.duration == 0 {
            debug!("instrumental sentinel found, replacing lyric");
            return vec![LyricLine {
                time: 0,
                duration: INSTRUMENTAL_SENTINEL_MS,
                original: INSTRUMENTAL_PLACEHOLDER.to_string(),
                ..LyricLine::default()
            }];
        }
    }

    let times: Vec<i64> = lines.iter().map(|l| l.time).collect();
    let mut result = Vec::with_capacity(lines.len());
    let mut in_pause = false;
    for (i, line) in lines.into_iter().enumerate() {
        if !line.is_blank() {
            in_pause = false;
            result.push(line);
            continue;
        }
        let long_gap = times
            .get(i + 1)
            .is_some_and(|&next| next.saturating_sub(line.time) > MIN_PAUSE_MS);
        if long_gap && !in_pause {
            result.push(line);
            in_pause = true;
        }
    }

    let leading = result.iter().take_while(|l| l.is_blank()).count();
    result.drain(..leading);

    if let Some(first_time) = result.first().map(|l| l.time) {
        if first_time > MIN_PAUSE_MS {
            result.insert(
                0,
                LyricLine::blank(INTRO_PAUSE_START_MS, first_time - INTRO_PAUSE_START_MS),
            );
        }
    }

    for line in result.iter_mut() {
        if !is_latin_text(&line.original) {
            continue;
        }
        line.original = normalize_punctuation(&line.original);
        for word in word_list(line) {
            word.text = normalize_punctuation(&word.text);
        }
    }

    result
}

/// Plain tracks: each line lasts until the next one starts
pub fn fill_durations(lines: &mut [LyricLine]) {
    for i in 1..lines.len() {
        lines[i - 1].duration = lines[i].time.saturating_sub(lines[i - 1].time);
    }
}
