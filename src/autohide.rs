//! Control bar auto-hide while in fullscreen.
//!
//! Time is passed in explicitly so the state machine can be driven from the
//! frame loop and from tests alike.

use std::time::{Duration, Instant};

pub const DEFAULT_HIDE_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlsState {
    Visible,
    Hidden,
}

#[derive(Debug, Clone)]
pub struct FullscreenAutoHide {
    delay: Duration,
    fullscreen: bool,
    state: ControlsState,
    /// When the controls hide, if a countdown is running
    deadline: Option<Instant>,
}

impl Default for FullscreenAutoHide {
    fn default() -> Self {
        Self::new(DEFAULT_HIDE_DELAY)
    }
}

impl FullscreenAutoHide {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            fullscreen: false,
            state: ControlsState::Visible,
            deadline: None,
        }
    }

    pub fn enter_fullscreen(&mut self, now: Instant) {
        self.fullscreen = true;
        self.state = ControlsState::Visible;
        self.deadline = Some(now + self.delay);
    }

    pub fn leave_fullscreen(&mut self) {
        self.fullscreen = false;
        self.state = ControlsState::Visible;
        self.deadline = None;
    }

    /// Mouse moved inside the video area. Ignored outside fullscreen.
    pub fn mouse_moved(&mut self, now: Instant) {
        if !self.fullscreen {
            return;
        }
        self.state = ControlsState::Visible;
        self.deadline = Some(now + self.delay);
    }

    /// Advance the countdown. Returns true on the tick that hides the controls.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if self.fullscreen && now >= deadline => {
                self.deadline = None;
                self.state = ControlsState::Hidden;
                true
            }
            _ => false,
        }
    }

    /// Time left before the controls hide, for scheduling the next repaint.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    #[cfg(test)]
    pub fn state(&self) -> ControlsState {
        self.state
    }

    pub fn controls_visible(&self) -> bool {
        self.state == ControlsState::Visible
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(2000);

    #[test]
    fn hides_exactly_once_after_delay() {
        let start = Instant::now();
        let mut autohide = FullscreenAutoHide::new(DELAY);
        autohide.enter_fullscreen(start);

        assert!(!autohide.tick(start + Duration::from_millis(1999)));
        assert!(autohide.controls_visible());

        assert!(autohide.tick(start + DELAY));
        assert_eq!(autohide.state(), ControlsState::Hidden);

        assert!(!autohide.tick(start + DELAY * 3));
        assert_eq!(autohide.remaining(start + DELAY * 3), None);
    }

    #[test]
    fn movement_resets_the_countdown() {
        let start = Instant::now();
        let mut autohide = FullscreenAutoHide::new(DELAY);
        autohide.enter_fullscreen(start);

        autohide.mouse_moved(start + Duration::from_millis(1500));
        assert!(!autohide.tick(start + Duration::from_millis(2500)));
        assert!(autohide.controls_visible());

        assert!(autohide.tick(start + Duration::from_millis(3500)));
    }

    #[test]
    fn movement_reveals_hidden_controls() {
        let start = Instant::now();
        let mut autohide = FullscreenAutoHide::new(DELAY);
        autohide.enter_fullscreen(start);
        autohide.tick(start + DELAY);

        autohide.mouse_moved(start + DELAY * 2);
        assert!(autohide.controls_visible());
        assert_eq!(autohide.remaining(start + DELAY * 2), Some(DELAY));
    }

    #[test]
    fn windowed_movement_is_ignored() {
        let start = Instant::now();
        let mut autohide = FullscreenAutoHide::new(DELAY);
        autohide.mouse_moved(start);
        assert_eq!(autohide.remaining(start), None);
        assert!(!autohide.tick(start + DELAY * 2));
        assert!(autohide.controls_visible());
    }

    #[test]
    fn leaving_fullscreen_shows_controls_and_stops_timer() {
        let start = Instant::now();
        let mut autohide = FullscreenAutoHide::new(DELAY);
        autohide.enter_fullscreen(start);
        autohide.tick(start + DELAY);

        autohide.leave_fullscreen();
        assert!(autohide.controls_visible());
        assert!(!autohide.is_fullscreen());
        assert!(!autohide.tick(start + DELAY * 4));
    }

    #[test]
    fn reentering_restarts_countdown() {
        let start = Instant::now();
        let mut autohide = FullscreenAutoHide::new(DELAY);
        autohide.enter_fullscreen(start);
        autohide.leave_fullscreen();

        let again = start + Duration::from_secs(10);
        autohide.enter_fullscreen(again);
        assert_eq!(autohide.remaining(again), Some(DELAY));
    }
}
