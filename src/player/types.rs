//! Player configuration, state and callback types

use serde::Deserialize;

use crate::error::LyricError;
use crate::model::{LyricLine, LyricModel, Word};

/// Player options, merged once at construction
///
/// # Fields
/// - `offset`: ms the lyric clock runs ahead of the media clock, to cover
///   rendering latency (default 150)
/// - `playback_rate`: media speed multiplier (default 1)
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct PlayerConfig {
    pub offset: f64,
    pub playback_rate: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            offset: 150.0,
            playback_rate: 1.0,
        }
    }
}

impl PlayerConfig {
    /// Load from YAML, e.g. `offset: 200` / `playback-rate: 1.25`
    pub fn from_yaml_str(content: &str) -> Result<Self, LyricError> {
        let config: PlayerConfig =
            serde_yaml::from_str(content).map_err(|e| LyricError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LyricError> {
        if !self.offset.is_finite() {
            return Err(LyricError::Config(format!(
                "offset must be finite, got {}",
                self.offset
            )));
        }
        validate_rate(self.playback_rate)
    }
}

pub(crate) fn validate_rate(rate: f64) -> Result<(), LyricError> {
    if rate.is_finite() && rate > 0.0 {
        Ok(())
    } else {
        Err(LyricError::Config(format!(
            "playback rate must be a positive number, got {}",
            rate
        )))
    }
}

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Initial state, and terminal once the final line has finished
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// One word becoming active
///
/// A `duration` of 0 flushes a word that was skipped over, so renderers can
/// mark it as already sung.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordActivation<'a> {
    pub line_index: usize,
    pub word_index: usize,
    pub word: &'a Word,
    /// ms of the word already elapsed at activation
    pub elapsed: f64,
    pub duration: f64,
}

/// Player notifications. All methods default to doing nothing.
pub trait PlayerEvents {
    fn on_line_play(&mut self, _index: usize, _line: &LyricLine) {}

    fn on_word_play(&mut self, _activation: &WordActivation<'_>) {}

    fn on_set_lyric(&mut self, _model: &LyricModel) {}
}

impl PlayerEvents for () {}

/// Per-line rendering bridge, one per model line
pub trait LineHandle {
    /// Start animating word `word_index` from `elapsed` over `duration` ms
    fn play(&mut self, elapsed: f64, duration: f64, word_index: usize);

    fn pause(&mut self);

    /// Return the line to its unplayed look
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PlayerConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, PlayerConfig::default());
        assert_eq!(config.offset, 150.0);
        assert_eq!(config.playback_rate, 1.0);
    }

    #[test]
    fn test_config_kebab_case_keys() {
        let config = PlayerConfig::from_yaml_str("offset: 0\nplayback-rate: 1.5\n").unwrap();
        assert_eq!(config.offset, 0.0);
        assert_eq!(config.playback_rate, 1.5);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(PlayerConfig::from_yaml_str("playback-rate: 0").is_err());
        assert!(PlayerConfig::from_yaml_str("playback-rate: -1").is_err());
        assert!(PlayerConfig::from_yaml_str("playbackRate: 2").is_err());
        let config = PlayerConfig {
            offset: f64::NAN,
            playback_rate: 1.0,
        };
        assert!(matches!(config.validate(), Err(LyricError::Config(_))));
    }
}
