//! # Lyric Model Types
//!
//! The normalized timing model every parse produces and the player consumes.
//!
//! ## Type Hierarchy
//! ```text
//! LyricModel
//!   ├── scroll: bool (false for unsynced text)
//!   └── Vec<LyricLine>
//!         ├── time / duration (ms)
//!         ├── original: String ("" = pause placeholder)
//!         ├── translated / roman: Option<String>
//!         └── dynamic: Option<WordTrack>
//!               ├── anchor_time (ms)
//!               └── Vec<Word>
//!                     ├── time / duration (ms, absolute)
//!                     ├── text (spacing baked in)
//!                     └── flags: WordFlags
//! ```
//!
//! A model is built once per parse call and never mutated afterwards. The
//! player takes ownership of it and only reads from it.
//!
//! All types serialize with camelCase field names so a model can be dumped
//! as JSON for a renderer.

use serde::{Deserialize, Serialize};

/// Time (ms) of the sentinel line lyric sources emit for tracks with no vocals.
pub const INSTRUMENTAL_SENTINEL_MS: i64 = 5_940_000;

/// Text of the single line replacing an instrumental-only track.
pub const INSTRUMENTAL_PLACEHOLDER: &str = "纯音乐，请欣赏";

/// Per-word classification used by renderers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordFlags {
    /// Contains a Han, Hiragana or Katakana character
    pub is_wide_script: bool,
    /// Text ends in whitespace
    pub ends_with_space: bool,
    /// Long held note right before a clause boundary
    pub is_sustained: bool,
}

/// A single timed word of a karaoke line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub time: i64,
    pub duration: i64,
    pub text: String,
    #[serde(default)]
    pub flags: WordFlags,
}

impl Word {
    pub fn new(time: i64, duration: i64, text: impl Into<String>) -> Self {
        Self {
            time,
            duration,
            text: text.into(),
            flags: WordFlags::default(),
        }
    }

    pub fn end_time(&self) -> i64 {
        self.time.saturating_add(self.duration)
    }
}

/// Word-level timing of one line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordTrack {
    pub anchor_time: i64,
    pub words: Vec<Word>,
}

impl WordTrack {
    /// Sum of all word durations, saturating at `i64::MAX`
    pub fn total_duration(&self) -> i64 {
        self.words
            .iter()
            .fold(0, |total: i64, w| total.saturating_add(w.duration))
    }

    /// Concatenated word texts
    pub fn text(&self) -> String {
        self.words.iter().map(|w| w.text.as_str()).collect()
    }
}

/// One displayed lyric line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricLine {
    pub time: i64,
    pub duration: i64,
    pub original: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roman: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<WordTrack>,
}

impl LyricLine {
    pub fn new(time: i64, original: impl Into<String>) -> Self {
        Self {
            time,
            original: original.into(),
            ..Self::default()
        }
    }

    /// A pause placeholder spanning `duration` ms
    pub fn blank(time: i64, duration: i64) -> Self {
        Self {
            time,
            duration,
            ..Self::default()
        }
    }

    /// True for pause placeholders (no visible text)
    pub fn is_blank(&self) -> bool {
        self.original.trim().is_empty()
    }

    pub fn end_time(&self) -> i64 {
        self.time.saturating_add(self.duration)
    }

    /// Words of the karaoke track, empty for plain lines
    pub fn words(&self) -> &[Word] {
        self.dynamic.as_ref().map(|d| d.words.as_slice()).unwrap_or(&[])
    }
}

/// Complete parsed lyric
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricModel {
    /// False when the source carried no usable timestamps
    pub scroll: bool,
    pub lines: Vec<LyricLine>,
}

impl LyricModel {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Index of the line active at `position` ms.
    ///
    /// Positions before the first line map to line 0, positions past the
    /// last line map to the last line. `None` only for an empty model.
    pub fn line_at(&self, position: f64) -> Option<usize> {
        if self.lines.is_empty() {
            return None;
        }
        let after = self.lines.partition_point(|l| (l.time as f64) <= position);
        Some(after.saturating_sub(1))
    }
}
