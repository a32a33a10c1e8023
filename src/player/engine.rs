//! Playback scheduler
//!
//! Walks a [`LyricModel`] forward against the host clock. Two precise timers
//! are owned per player: one for line boundaries, one for word boundaries
//! inside the active line.

use tracing::{debug, trace, warn};

use crate::host::{Host, WakeId};
use crate::model::LyricModel;
use crate::timer::PreciseTimer;

use super::types::{
    validate_rate, LineHandle, PlaybackState, PlayerConfig, PlayerEvents, WordActivation,
};

/// What the line timer does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineStep {
    Advance(usize),
    Stop,
}

/// Word timer payload: next word of a given line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WordStep {
    line: usize,
    next: usize,
}

/// Index of the last item whose time is at or before `position`.
///
/// Scans forward from `hint` when the hint is still valid, from 0 otherwise.
/// Positions before the first item map to 0.
fn snap_index(len: usize, time_of: impl Fn(usize) -> i64, position: f64, hint: usize) -> usize {
    let mut index = if hint < len && time_of(hint) as f64 <= position {
        hint
    } else {
        0
    };
    while index + 1 < len && time_of(index + 1) as f64 <= position {
        index += 1;
    }
    index
}

/// Real-time lyric scheduler
///
/// # Clock
/// Between seeks and rate changes the position is extrapolated from an
/// anchor pair `(anchor_wall, anchor_position)`:
///
/// ```text
/// current_time = (now - anchor_wall) * rate + anchor_position
/// lookup       = (now - anchor_wall + offset) * rate + anchor_position
/// ```
///
/// Lines and words are activated against the lookup position.
///
/// # Example
/// ```rust
/// use lyric_sync::{parse_lyric, LyricSource};
/// use lyric_sync::host::ManualHost;
/// use lyric_sync::player::{LyricPlayer, PlayerConfig};
///
/// let model = parse_lyric(&LyricSource {
///     original: Some("[00:01.000]a\n[00:02.000]b".to_string()),
///     ..LyricSource::default()
/// });
/// let mut player = LyricPlayer::new(ManualHost::new(), (), model, PlayerConfig::default());
///
/// player.play(0.0);
/// assert_eq!(player.line_index(), Some(0));
///
/// while let Some(id) = player.host_mut().next_wake(3000.0) {
///     player.wake(id);
/// }
/// assert_eq!(player.line_index(), Some(1));
/// ```
pub struct LyricPlayer<H: Host, E: PlayerEvents> {
    host: H,
    events: E,
    model: LyricModel,
    handles: Vec<Box<dyn LineHandle>>,
    offset: f64,
    rate: f64,
    state: PlaybackState,
    anchor_wall: f64,
    anchor_position: f64,
    line_index: Option<usize>,
    word_index: Option<usize>,
    line_timer: PreciseTimer<LineStep>,
    word_timer: PreciseTimer<WordStep>,
}

impl<H: Host, E: PlayerEvents> LyricPlayer<H, E> {
    /// Create a stopped player. Invalid config values fall back to defaults.
    pub fn new(host: H, events: E, model: LyricModel, config: PlayerConfig) -> Self {
        let defaults = PlayerConfig::default();
        let offset = if config.offset.is_finite() {
            config.offset
        } else {
            warn!(offset = config.offset, "ignoring invalid offset");
            defaults.offset
        };
        let rate = match validate_rate(config.playback_rate) {
            Ok(()) => config.playback_rate,
            Err(e) => {
                warn!("{}", e);
                defaults.playback_rate
            }
        };

        let mut player = Self {
            host,
            events,
            model,
            handles: Vec::new(),
            offset,
            rate,
            state: PlaybackState::Stopped,
            anchor_wall: 0.0,
            anchor_position: 0.0,
            line_index: None,
            word_index: None,
            line_timer: PreciseTimer::new(),
            word_timer: PreciseTimer::new(),
        };
        player.anchor_wall = player.host.now();
        player.events.on_set_lyric(&player.model);
        player
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Active line, `None` before the first activation
    pub fn line_index(&self) -> Option<usize> {
        self.line_index
    }

    /// Active word of the active line
    pub fn word_index(&self) -> Option<usize> {
        self.word_index
    }

    pub fn playback_rate(&self) -> f64 {
        self.rate
    }

    pub fn lyric(&self) -> &LyricModel {
        &self.model
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }

    /// Media position in ms, frozen while not playing
    pub fn current_time(&self) -> f64 {
        match self.state {
            PlaybackState::Playing => {
                (self.host.now() - self.anchor_wall) * self.rate + self.anchor_position
            }
            _ => self.anchor_position,
        }
    }

    fn lookup_position(&self) -> f64 {
        self.current_time() + self.offset * self.rate
    }

    /// Register one rendering handle per model line
    pub fn set_line_handles(&mut self, handles: Vec<Box<dyn LineHandle>>) {
        self.handles = handles;
    }

    /// Start (or seek) playback at media position `at` ms
    pub fn play(&mut self, at: f64) {
        if self.model.is_empty() {
            debug!("play ignored, no lyric lines");
            return;
        }
        self.clear_timers();
        self.anchor_wall = self.host.now();
        self.anchor_position = at;
        self.state = PlaybackState::Playing;

        let position = self.lookup_position();
        let found = self.snap_line(position, 0);
        debug!(at, position, line = found, rate = self.rate, "play");
        self.advance_lines(found);
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.clear_timers();
        let position = self.lookup_position();
        self.freeze();
        self.state = PlaybackState::Paused;
        debug!(position, "pause");

        let line = self.snap_line(position, self.line_index.unwrap_or(0));
        if self.line_index != Some(line) {
            self.enter_line(line);
        }
        let words = self.model.lines[line].words();
        if !words.is_empty() {
            let word = snap_index(
                words.len(),
                |i| words[i].time,
                position,
                self.word_index.unwrap_or(0),
            );
            let elapsed = (position - words[word].time as f64).max(0.0);
            if self.word_index != Some(word) {
                self.activate_word(line, word, elapsed);
            }
        }

        if let Some(handle) = self.handles.get_mut(line) {
            handle.pause();
        }
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        if let Err(e) = validate_rate(rate) {
            warn!("{}", e);
            return;
        }
        if rate == self.rate {
            return;
        }
        let at = self.current_time();
        self.rate = rate;
        debug!(rate, "playback rate changed");
        if self.state == PlaybackState::Playing {
            self.play(at);
        }
    }

    /// Stop the current schedule and adopt a new model
    pub fn set_lyric(&mut self, model: LyricModel) {
        if self.state == PlaybackState::Playing {
            self.pause();
        }
        self.clear_timers();
        self.model = model;
        self.handles.clear();
        self.line_index = None;
        self.word_index = None;
        self.anchor_position = 0.0;
        self.anchor_wall = self.host.now();
        self.state = PlaybackState::Stopped;
        debug!(lines = self.model.len(), "lyric replaced");
        self.events.on_set_lyric(&self.model);
    }

    /// Deliver a host wake-up
    pub fn wake(&mut self, id: WakeId) {
        if let Some((step, overshoot)) = self.line_timer.on_wake(&mut self.host, id) {
            trace!(?step, overshoot, "line timer fired");
            if self.state != PlaybackState::Playing {
                return;
            }
            match step {
                LineStep::Advance(next) => self.advance_lines(next),
                LineStep::Stop => self.stop(),
            }
            return;
        }

        if let Some((step, overshoot)) = self.word_timer.on_wake(&mut self.host, id) {
            trace!(?step, overshoot, "word timer fired");
            if self.state == PlaybackState::Playing && self.line_index == Some(step.line) {
                self.advance_words(step.line, step.next);
            }
        }
    }

    fn clear_timers(&mut self) {
        self.line_timer.clear(&mut self.host);
        self.word_timer.clear(&mut self.host);
    }

    /// Pin the anchor to the current position
    fn freeze(&mut self) {
        self.anchor_position = self.current_time();
        self.anchor_wall = self.host.now();
    }

    fn stop(&mut self) {
        self.clear_timers();
        self.freeze();
        self.state = PlaybackState::Stopped;
        debug!(position = self.anchor_position, "playback finished");
    }

    fn snap_line(&self, position: f64, hint: usize) -> usize {
        let lines = &self.model.lines;
        snap_index(lines.len(), |i| lines[i].time, position, hint)
    }

    fn advance_lines(&mut self, mut next: usize) {
        let count = self.model.len();
        let Some(last) = count.checked_sub(1) else {
            return;
        };

        for _ in 0..=count {
            if next >= last {
                self.enter_line(last);
                self.begin_words(last);
                let position = self.lookup_position();
                let remaining = (self.model.lines[last].end_time() as f64 - position) / self.rate;
                if remaining > 0.0 {
                    self.line_timer.start(&mut self.host, LineStep::Stop, remaining);
                } else {
                    self.stop();
                }
                return;
            }

            let position = self.lookup_position();
            let line_time = self.model.lines[next].time as f64;
            let drift = position - line_time;
            if drift >= 0.0 || next == 0 {
                let next_time = self.model.lines[next + 1].time as f64;
                let delay = (next_time - line_time - drift) / self.rate;
                if delay > 0.0 {
                    self.line_timer
                        .start(&mut self.host, LineStep::Advance(next + 1), delay);
                    self.enter_line(next);
                    self.begin_words(next);
                    return;
                }
                next = self.snap_line(position, next + 1);
            } else {
                next = self.snap_line(position, next);
            }
        }

        warn!(next, "line advance did not settle");
        self.stop();
    }

    /// Make `index` the active line without touching timers
    fn enter_line(&mut self, index: usize) {
        if let Some(previous) = self.line_index.filter(|&p| p != index) {
            if let Some(handle) = self.handles.get_mut(previous) {
                handle.reset();
            }
        }
        self.line_index = Some(index);
        self.word_index = None;
        trace!(index, "line active");
        self.events.on_line_play(index, &self.model.lines[index]);
    }

    fn begin_words(&mut self, line: usize) {
        self.word_timer.clear(&mut self.host);
        let words = self.model.lines[line].words();
        if words.is_empty() {
            return;
        }
        let position = self.lookup_position();
        let first = snap_index(words.len(), |i| words[i].time, position, 0);
        self.advance_words(line, first);
    }

    fn advance_words(&mut self, line: usize, mut next: usize) {
        let count = self.model.lines[line].words().len();
        if count == 0 {
            return;
        }
        let last = count - 1;

        for _ in 0..=count {
            let position = self.lookup_position();
            let words = self.model.lines[line].words();
            if next >= last {
                let elapsed = (position - words[last].time as f64).max(0.0);
                self.activate_word(line, last, elapsed);
                return;
            }

            let word_time = words[next].time as f64;
            let drift = position - word_time;
            if drift >= 0.0 || next == 0 {
                let next_time = words[next + 1].time as f64;
                let delay = (next_time - word_time - drift) / self.rate;
                if delay > 0.0 {
                    let step = WordStep {
                        line,
                        next: next + 1,
                    };
                    self.word_timer.start(&mut self.host, step, delay);
                    self.activate_word(line, next, drift.max(0.0));
                    return;
                }
                next = snap_index(count, |i| words[i].time, position, next + 1);
            } else {
                next = snap_index(count, |i| words[i].time, position, next);
            }
        }

        warn!(line, next, "word advance did not settle");
    }

    /// Emit word `index`, flushing any words skipped since the last one
    fn activate_word(&mut self, line: usize, index: usize, elapsed: f64) {
        let flush_from = self.word_index.map_or(0, |w| w + 1);
        for skipped in flush_from..index {
            self.emit_word(line, skipped, 0.0, 0.0);
        }
        let duration = self.model.lines[line].words()[index].duration as f64;
        self.emit_word(line, index, elapsed, duration);
        self.word_index = Some(index);
    }

    fn emit_word(&mut self, line: usize, index: usize, elapsed: f64, duration: f64) {
        let activation = WordActivation {
            line_index: line,
            word_index: index,
            word: &self.model.lines[line].words()[index],
            elapsed,
            duration,
        };
        trace!(line, index, elapsed, duration, "word active");
        self.events.on_word_play(&activation);
        if let Some(handle) = self.handles.get_mut(line) {
            handle.play(elapsed, duration, index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_index() {
        let times = [1000, 2000, 2000, 3000];
        let at = |p: f64, hint: usize| snap_index(times.len(), |i| times[i], p, hint);
        assert_eq!(at(0.0, 0), 0);
        assert_eq!(at(1500.0, 0), 0);
        assert_eq!(at(2000.0, 0), 2);
        assert_eq!(at(2999.0, 1), 2);
        assert_eq!(at(10_000.0, 3), 3);
        // Hint past the position restarts from the beginning
        assert_eq!(at(1200.0, 3), 0);
        assert_eq!(at(1200.0, 99), 0);
    }
}
