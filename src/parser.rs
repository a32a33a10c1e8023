//! # Parser
//!
//! Entry point turning raw lyric tracks into a [`LyricModel`].
//!
//! ## Pipelines
//!
//! ### Plain
//! Used when no word-level track is given.
//! 1. Tokenize the original track (synced or unsynced)
//! 2. Attach translation/romanization entries to lines by time
//! 3. Common post-processing, then line durations from the next start
//!
//! ### Word-level
//! Used when the `dynamic` track has content.
//! 1. Tokenize the word-level track and the plain tracks
//! 2. Merge plain original text onto the secondary entries, then place
//!    each secondary entry on a word-level line (time + edit distance)
//! 3. Gap filling, space reconciliation, word flags, sustained notes
//! 4. Common post-processing
//!
//! Parsing never fails: malformed input degrades to fewer lines.
//!
//! ## Example
//! ```rust
//! use lyric_sync::{parse_lyric, LyricSource};
//!
//! let model = parse_lyric(&LyricSource {
//!     original: Some("[00:01.000]a\n[00:02.000]b".to_string()),
//!     ..LyricSource::default()
//! });
//!
//! assert!(model.scroll);
//! assert_eq!(model.lines.len(), 2);
//! assert_eq!(model.lines[0].duration, 1000);
//! ```

use serde::Deserialize;
use tracing::debug;

use crate::align::{self, SecondaryField};
use crate::error::LyricError;
use crate::lexer::{self, PlainTrack};
use crate::model::{LyricLine, LyricModel, WordTrack};
use crate::postprocess;

/// Raw text of every lyric track of a song
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LyricSource {
    /// Line-synced (or unsynced) original lyric
    pub original: Option<String>,
    /// Line-synced translation
    pub translated: Option<String>,
    /// Line-synced romanization
    pub roman: Option<String>,
    /// Word-level karaoke lyric
    pub dynamic: Option<String>,
}

impl LyricSource {
    /// Read tracks from a YAML document with `original`, `translated`,
    /// `roman` and `dynamic` keys, all optional.
    pub fn from_yaml_str(content: &str) -> Result<Self, LyricError> {
        serde_yaml::from_str(content).map_err(|e| LyricError::Source(e.to_string()))
    }

    fn track(text: &Option<String>) -> &str {
        text.as_deref().unwrap_or("")
    }

    /// True when a non-blank word-level track is present
    pub fn has_dynamic(&self) -> bool {
        !Self::track(&self.dynamic).trim().is_empty()
    }
}

/// Parse all tracks into a normalized model
pub fn parse_lyric(source: &LyricSource) -> LyricModel {
    if source.has_dynamic() {
        parse_dynamic(source)
    } else {
        parse_plain(source)
    }
}

fn parse_plain(source: &LyricSource) -> LyricModel {
    let original = lexer::tokenize_plain(LyricSource::track(&source.original));
    let mut lines: Vec<LyricLine> = original
        .entries
        .iter()
        .map(|e| LyricLine::new(e.time, e.text.clone()))
        .collect();

    let secondary = [
        (&source.translated, SecondaryField::Translated),
        (&source.roman, SecondaryField::Roman),
    ];
    for (text, field) in secondary {
        let track = lexer::tokenize_plain(LyricSource::track(text));
        align::attach_to_plain(&mut lines, &track.entries, field);
    }

    let mut lines = postprocess::finalize(lines);
    postprocess::fill_durations(&mut lines);
    debug!(lines = lines.len(), synced = original.synced, "parsed plain lyric");

    LyricModel {
        scroll: original.synced,
        lines,
    }
}

fn parse_dynamic(source: &LyricSource) -> LyricModel {
    let mut lines: Vec<LyricLine> = lexer::tokenize_dynamic(LyricSource::track(&source.dynamic))
        .into_iter()
        .map(|line| {
            let track = WordTrack {
                anchor_time: line.time,
                words: line.words,
            };
            LyricLine {
                time: line.time,
                duration: track.total_duration(),
                original: track.text(),
                dynamic: Some(track),
                ..LyricLine::default()
            }
        })
        .collect();

    let original: PlainTrack = lexer::tokenize_plain(LyricSource::track(&source.original));
    let secondary = [
        (&source.translated, SecondaryField::Translated),
        (&source.roman, SecondaryField::Roman),
    ];
    for (text, field) in secondary {
        let track = lexer::tokenize_plain(LyricSource::track(text));
        let merged = align::merge_primary_into_secondary(&original.entries, &track.entries);
        align::attach_to_dynamic(&mut lines, &merged, field);
    }

    postprocess::fill_gaps(&mut lines);
    postprocess::reconcile_spaces(&mut lines);
    postprocess::classify_words(&mut lines);
    postprocess::mark_sustained(&mut lines);

    let lines = postprocess::finalize(lines);
    debug!(lines = lines.len(), "parsed word-level lyric");

    // Every word-level line carries its own anchor tag
    LyricModel {
        scroll: original.synced || !lines.is_empty(),
        lines,
    }
}
