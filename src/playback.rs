//! UI-side mirror of the engine's playback state.
//!
//! Three sources feed it: the periodic poll, engine notifications and the
//! user dragging the seek bar. The mirror decides which of them may change
//! what the control bar shows, and whether the loading indicator is up.

use std::time::{Duration, Instant};

use crate::engine::{EngineEvent, PropertySnapshot};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Values read by one poll tick. Unknown properties read as zero / paused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSample {
    pub position: f64,
    pub duration: f64,
    pub paused: bool,
}

impl From<&PropertySnapshot> for PollSample {
    fn from(snapshot: &PropertySnapshot) -> Self {
        Self {
            position: snapshot.time_pos.unwrap_or(0.0),
            duration: snapshot.duration.unwrap_or(0.0),
            paused: snapshot.pause.unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackMirror {
    /// A remote URL was submitted and nothing has arrived yet
    awaiting_stream: bool,
    loading_visible: bool,
    /// Seek bar fraction while the user holds it
    drag_fraction: Option<f64>,
    /// Engine reports a seek in progress
    engine_seeking: bool,
    position: f64,
    duration: f64,
    paused: bool,
    muted: bool,
}

impl Default for PlaybackMirror {
    fn default() -> Self {
        Self {
            awaiting_stream: false,
            loading_visible: false,
            drag_fraction: None,
            engine_seeking: false,
            position: 0.0,
            duration: 0.0,
            paused: true,
            muted: false,
        }
    }
}

impl PlaybackMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// A remote URL is about to be played.
    pub fn begin_stream(&mut self) {
        self.awaiting_stream = true;
        self.loading_visible = true;
    }

    /// A local file is about to be played.
    pub fn begin_local(&mut self) {
        self.awaiting_stream = false;
        self.loading_visible = false;
    }

    /// The engine could not open what was requested.
    pub fn load_failed(&mut self) {
        self.awaiting_stream = false;
        self.loading_visible = false;
    }

    pub fn on_event(&mut self, event: &EngineEvent) {
        match *event {
            EngineEvent::StartFile => {
                if self.awaiting_stream {
                    self.loading_visible = true;
                }
            }
            EngineEvent::FileLoaded | EngineEvent::Idle => self.stream_arrived(),
            EngineEvent::PlaybackTime(position) => {
                self.stream_arrived();
                if !self.is_dragging() {
                    self.position = position;
                }
            }
            EngineEvent::PauseChanged(paused) => {
                self.paused = paused;
                if !self.is_seeking() {
                    self.loading_visible = false;
                }
            }
            EngineEvent::SeekingChanged(seeking) => {
                self.engine_seeking = seeking;
                if seeking {
                    if self.awaiting_stream {
                        self.loading_visible = true;
                    }
                } else {
                    self.loading_visible = false;
                }
            }
            EngineEvent::MuteChanged(muted) => self.muted = muted,
            EngineEvent::LoadFailed(_) | EngineEvent::Shutdown => self.load_failed(),
        }
    }

    fn stream_arrived(&mut self) {
        self.awaiting_stream = false;
        self.loading_visible = false;
    }

    /// Apply one poll tick. The position is left alone while the user drags.
    pub fn apply_poll(&mut self, sample: PollSample) {
        self.duration = sample.duration;
        self.paused = sample.paused;
        if !self.is_dragging() {
            self.position = sample.position;
        }
    }

    pub fn begin_drag(&mut self, fraction: f64) {
        self.drag_fraction = Some(fraction.clamp(0.0, 1.0));
    }

    pub fn update_drag(&mut self, fraction: f64) {
        if self.drag_fraction.is_some() {
            self.drag_fraction = Some(fraction.clamp(0.0, 1.0));
        }
    }

    /// Release the seek bar. Returns the absolute target in seconds, or
    /// `None` when there was no drag or the duration is not known.
    pub fn end_drag(&mut self) -> Option<f64> {
        let fraction = self.drag_fraction.take()?;
        if self.duration > 0.0 {
            let target = fraction * self.duration;
            self.position = target;
            Some(target)
        } else {
            None
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_fraction.is_some()
    }

    pub fn is_seeking(&self) -> bool {
        self.is_dragging() || self.engine_seeking
    }

    #[cfg(test)]
    pub fn awaiting_stream(&self) -> bool {
        self.awaiting_stream
    }

    pub fn loading_visible(&self) -> bool {
        self.loading_visible
    }

    /// Seek bar position in `0.0..=1.0`.
    pub fn slider_fraction(&self) -> f64 {
        if let Some(fraction) = self.drag_fraction {
            return fraction;
        }
        if self.duration > 0.0 {
            (self.position / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Position to print next to the seek bar; follows the drag.
    pub fn display_position(&self) -> f64 {
        match self.drag_fraction {
            Some(fraction) if self.duration > 0.0 => fraction * self.duration,
            _ => self.position,
        }
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn muted(&self) -> bool {
        self.muted
    }
}

/// Fixed-cadence poll that never queues missed ticks.
#[derive(Debug, Clone)]
pub struct PollTimer {
    interval: Duration,
    last: Option<Instant>,
}

impl PollTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True if a poll should run now. An overdue timer fires once and restarts.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last {
            Some(last) => self
                .interval
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }
}

/// Format time as MM:SS or HH:MM:SS
pub fn format_time(seconds: f64) -> String {
    let secs = if seconds.is_finite() { seconds.max(0.0) as u64 } else { 0 };
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(position: f64, duration: f64) -> PollSample {
        PollSample {
            position,
            duration,
            paused: false,
        }
    }

    #[test]
    fn drag_release_without_duration_does_not_seek() {
        let mut mirror = PlaybackMirror::new();
        mirror.apply_poll(sample(0.0, 0.0));

        mirror.begin_drag(0.75);
        assert_eq!(mirror.end_drag(), None);
        assert!(!mirror.is_dragging());
    }

    #[test]
    fn drag_release_seeks_to_fraction_of_duration() {
        let mut mirror = PlaybackMirror::new();
        mirror.apply_poll(sample(10.0, 200.0));

        mirror.begin_drag(0.1);
        mirror.update_drag(0.5);
        assert_eq!(mirror.end_drag(), Some(100.0));
        assert_eq!(mirror.end_drag(), None);
    }

    #[test]
    fn polling_does_not_move_a_held_seek_bar() {
        let mut mirror = PlaybackMirror::new();
        mirror.apply_poll(sample(10.0, 100.0));
        mirror.begin_drag(0.8);

        mirror.apply_poll(sample(11.0, 100.0));
        mirror.on_event(&EngineEvent::PlaybackTime(11.5));

        assert_eq!(mirror.slider_fraction(), 0.8);
        assert_eq!(mirror.display_position(), 80.0);
        assert_eq!(mirror.position(), 10.0);

        mirror.end_drag();
        mirror.apply_poll(sample(80.5, 100.0));
        assert_eq!(mirror.position(), 80.5);
    }

    #[test]
    fn update_without_begin_is_ignored() {
        let mut mirror = PlaybackMirror::new();
        mirror.update_drag(0.4);
        assert!(!mirror.is_dragging());
    }

    #[test]
    fn awaiting_clears_on_first_time_update() {
        let mut mirror = PlaybackMirror::new();
        mirror.begin_stream();
        assert!(mirror.loading_visible());

        mirror.on_event(&EngineEvent::StartFile);
        assert!(mirror.loading_visible());

        mirror.on_event(&EngineEvent::PlaybackTime(0.1));
        assert!(!mirror.awaiting_stream());
        assert!(!mirror.loading_visible());
    }

    #[test]
    fn awaiting_clears_on_idle_or_file_loaded() {
        for event in [EngineEvent::Idle, EngineEvent::FileLoaded] {
            let mut mirror = PlaybackMirror::new();
            mirror.begin_stream();
            mirror.on_event(&event);
            assert!(!mirror.awaiting_stream(), "{event:?}");
            assert!(!mirror.loading_visible(), "{event:?}");
        }
    }

    #[test]
    fn loading_never_returns_after_stream_arrived() {
        let mut mirror = PlaybackMirror::new();
        mirror.begin_stream();
        mirror.on_event(&EngineEvent::FileLoaded);

        mirror.on_event(&EngineEvent::StartFile);
        mirror.on_event(&EngineEvent::SeekingChanged(true));
        assert!(!mirror.loading_visible());
    }

    #[test]
    fn seeking_while_awaiting_shows_loading() {
        let mut mirror = PlaybackMirror::new();
        mirror.begin_stream();
        mirror.on_event(&EngineEvent::SeekingChanged(true));
        assert!(mirror.loading_visible());
        assert!(mirror.is_seeking());

        // pause changes during a seek keep the spinner up
        mirror.on_event(&EngineEvent::PauseChanged(false));
        assert!(mirror.loading_visible());

        mirror.on_event(&EngineEvent::SeekingChanged(false));
        assert!(!mirror.loading_visible());
        assert!(mirror.awaiting_stream());
    }

    #[test]
    fn local_playback_and_failures_reset_flags() {
        let mut mirror = PlaybackMirror::new();
        mirror.begin_stream();
        mirror.begin_local();
        assert!(!mirror.awaiting_stream());
        assert!(!mirror.loading_visible());

        mirror.begin_stream();
        mirror.on_event(&EngineEvent::LoadFailed("boom".into()));
        assert!(!mirror.awaiting_stream());
        assert!(!mirror.loading_visible());
    }

    #[test]
    fn glyph_state_follows_notifications() {
        let mut mirror = PlaybackMirror::new();
        assert!(mirror.paused());
        mirror.on_event(&EngineEvent::PauseChanged(false));
        mirror.on_event(&EngineEvent::MuteChanged(true));
        assert!(!mirror.paused());
        assert!(mirror.muted());
    }

    #[test]
    fn snapshot_gaps_read_as_zero() {
        let sample = PollSample::from(&PropertySnapshot::default());
        assert_eq!(sample.position, 0.0);
        assert_eq!(sample.duration, 0.0);
        assert!(sample.paused);
    }

    #[test]
    fn overdue_poll_fires_once() {
        let start = Instant::now();
        let mut timer = PollTimer::new(Duration::from_millis(500));
        assert!(timer.due(start));
        assert!(!timer.due(start + Duration::from_millis(499)));

        let late = start + Duration::from_millis(2600);
        assert!(timer.due(late));
        assert!(!timer.due(late));
        assert_eq!(timer.remaining(late), Duration::from_millis(500));
    }

    #[test]
    fn formats_minutes_and_hours() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(75.9), "01:15");
        assert_eq!(format_time(3725.0), "01:02:05");
        assert_eq!(format_time(-4.0), "00:00");
        assert_eq!(format_time(f64::NAN), "00:00");
    }
}
