//! # lyric-sync
//!
//! Parse timestamped lyrics into one timing model and play it back against a
//! live clock.
//!
//! ## Pipeline
//! ```text
//! LyricSource ──lexer──▶ timed entries ──align──▶ lines ──postprocess──▶ LyricModel
//!                                                                           │
//!                         Host ◀──timer──▶ LyricPlayer ◀────────────────────┘
//! ```
//!
//! ## Modules
//! - `lexer` - time tags, plain and word-level tracks
//! - `align` - attach translation/romanization tracks
//! - `postprocess` - blank lines, spacing, word flags, punctuation
//! - `parser` - the two parse pipelines
//! - `model` - LyricModel, LyricLine, WordTrack, Word
//! - `host` / `timer` - clock capabilities and the precise timer
//! - `player` - the playback scheduler

pub mod align;
pub mod error;
pub mod host;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod player;
pub mod postprocess;
pub mod timer;

pub use error::LyricError;
pub use model::*;
pub use parser::{parse_lyric, LyricSource};
pub use player::{LyricPlayer, PlaybackState, PlayerConfig, PlayerEvents};
