//! # Player Module
//!
//! Drive a parsed lyric against a live playback clock.
//!
//! ## Purpose
//! Renderers need to know which line (and which word of a karaoke line) is
//! active *now*, with millisecond precision, while the listener seeks,
//! pauses and changes speed. The player walks the model forward and emits:
//! 1. **Line activations** - [`PlayerEvents::on_line_play`]
//! 2. **Word activations** - [`PlayerEvents::on_word_play`] plus the line's
//!    [`LineHandle::play`]
//! 3. **Model swaps** - [`PlayerEvents::on_set_lyric`]
//!
//! ## Sub-modules
//! - `types` - PlayerConfig, PlaybackState, callback traits
//! - `engine` - The LyricPlayer state machine
//!
//! ## State Machine
//! ```text
//! Stopped ──play──▶ Playing ──pause──▶ Paused
//!    ▲                 │  ▲               │
//!    │   final line    │  └─────play──────┘
//!    └─── finished ────┘
//! set_lyric from any state ──▶ Stopped
//! ```
//!
//! ## Advance Algorithm
//! On every activation the player measures the drift between the lookup
//! position and the line's start:
//! - **drift ≥ 0** (or the first line): wait `(next.time - line.time - drift)
//!   / rate` for the next boundary; if that wait is already over, re-snap
//!   forward by time search and try again without waiting
//! - **drift < 0**: a seek landed before this line, re-snap by time search
//!
//! The loop is bounded by the line count. Words of the active line follow
//! the same algorithm on a second timer; words jumped over are flushed with
//! a zero-duration activation, the final word arms no timer.
//!
//! ## Driving
//! The player is single-threaded and passive. Public calls and
//! [`LyricPlayer::wake`] run synchronously; the [`Host`](crate::host::Host)
//! decides when wake-ups arrive.

mod engine;
mod types;


pub use engine::LyricPlayer;
pub use types::{LineHandle, PlaybackState, PlayerConfig, PlayerEvents, WordActivation};
