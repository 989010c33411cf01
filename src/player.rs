//! Player session: everything the window shows, independent of the toolkit.
//!
//! The app feeds it user gestures, engine notifications and the clock; it
//! drives the engine and keeps the state the control bar is drawn from.
//! Errors never escape: they become [`Notice`]s for the UI to show.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{error, info, trace, warn};

use crate::autohide::FullscreenAutoHide;
use crate::config::Config;
use crate::engine::{EngineControl, EngineError, EngineEvent, SeekMode};
use crate::playback::{PlaybackMirror, PollSample, PollTimer};
use crate::recent::RecentFiles;
use crate::resolver::{self, Resolver};
use crate::transport::{Transport, TransportCommand};

/// Message for the user, shown as a modal dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// True for sources that go through the stream resolver.
/// `file://` URLs are local.
pub fn is_remote(source: &str) -> bool {
    match source.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && !scheme.eq_ignore_ascii_case("file")
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Local path named by a `file://` URL.
pub fn file_url_path(source: &str) -> Option<PathBuf> {
    let (scheme, rest) = source.split_once("://")?;
    if !scheme.eq_ignore_ascii_case("file") {
        return None;
    }
    let rest = rest.strip_prefix("localhost").unwrap_or(rest);
    let path = percent_decode(rest);
    // file:///C:/clip.mkv
    let bytes = path.as_bytes();
    let drive_letter =
        bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':';
    let path = if drive_letter {
        &path[1..]
    } else {
        path.as_str()
    };
    (!path.is_empty()).then(|| PathBuf::from(path))
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = (bytes[i] == b'%')
            .then(|| input.get(i + 1..i + 3))
            .flatten()
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match escaped {
            Some(byte) => {
                out.push(byte);
                i += 3;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

pub struct Player<E: EngineControl> {
    engine: Option<E>,
    /// Why the engine could not be started, if it could not
    startup_error: Option<String>,
    /// A persistent engine fault has already been shown
    fault_reported: bool,
    shutting_down: bool,
    mirror: PlaybackMirror,
    transport: Transport,
    recent: RecentFiles,
    autohide: FullscreenAutoHide,
    poll: PollTimer,
    resolver: Option<Resolver>,
    resolver_name: String,
    volume: i64,
    notices: VecDeque<Notice>,
}

impl<E: EngineControl> Player<E> {
    pub fn new(engine: Result<E, EngineError>, resolver: Option<Resolver>, config: &Config) -> Self {
        let mut player = Self {
            engine: None,
            startup_error: None,
            fault_reported: false,
            shutting_down: false,
            mirror: PlaybackMirror::new(),
            transport: Transport::new(config.skip_seconds),
            recent: RecentFiles::new(config.recent_files_limit),
            autohide: FullscreenAutoHide::new(config.fullscreen_hide_delay()),
            poll: PollTimer::new(config.poll_interval()),
            resolver,
            resolver_name: config.resolver.clone(),
            volume: config.default_volume.clamp(0, 100),
            notices: VecDeque::new(),
        };

        match engine {
            Ok(engine) => player.engine = Some(engine),
            Err(err) => {
                error!("media engine unavailable: {err}");
                player.startup_error = Some(err.to_string());
                player.report_engine_unavailable();
            }
        }

        if player.resolver.is_none() {
            let notice = player.missing_resolver_notice();
            player.notices.push_back(notice);
        }

        player
    }

    /// Open a local path or a remote URL.
    pub fn open(&mut self, source: &str) {
        let source = source.trim();
        if let Some(path) = file_url_path(source) {
            self.play_file(&path);
        } else if is_remote(source) {
            self.open_stream(source);
        } else {
            self.play_file(Path::new(source));
        }
    }

    pub fn play_file(&mut self, path: &Path) {
        let source = path.to_string_lossy().into_owned();
        info!(path = %path.display(), "opening file");

        let result = match self.engine.as_ref() {
            Some(engine) => {
                self.mirror.begin_local();
                engine.play(&source)
            }
            None => {
                self.report_engine_unavailable();
                return;
            }
        };

        match result {
            Ok(()) => self.recent.record(path),
            Err(err) => self.playback_failed("Playback Error", &source, err),
        }
    }

    /// Play a remote URL through the resolver. Blank input is ignored.
    pub fn open_stream(&mut self, url: &str) {
        let url = url.trim();
        if url.is_empty() {
            return;
        }
        let Some(resolver) = self.resolver.as_ref() else {
            warn!(url, "cannot open stream without a resolver");
            let notice = self.missing_resolver_notice();
            self.notices.push_back(notice);
            return;
        };
        info!(url, resolver = resolver.name(), "opening stream");

        let result = match self.engine.as_ref() {
            Some(engine) => {
                self.mirror.begin_stream();
                engine.play(url)
            }
            None => {
                self.report_engine_unavailable();
                return;
            }
        };

        if let Err(err) = result {
            self.playback_failed("Stream Error", url, err);
        }
    }

    pub fn handle_events(&mut self, events: impl IntoIterator<Item = EngineEvent>) {
        for event in events {
            self.handle_event(event);
        }
    }

    pub fn handle_event(&mut self, event: EngineEvent) {
        trace!(?event, "engine event");
        self.mirror.on_event(&event);
        match event {
            EngineEvent::LoadFailed(reason) => {
                warn!(%reason, "media could not be opened");
                self.notices.push_back(Notice::new(
                    "Playback Error",
                    format!("Could not open media:\n{reason}"),
                ));
            }
            EngineEvent::Shutdown if !self.shutting_down => {
                self.report_fault(&EngineError::Terminated);
            }
            _ => {}
        }
    }

    /// Refresh position, duration and pause state if a poll is due.
    pub fn poll(&mut self, now: Instant) {
        if !self.poll.due(now) {
            return;
        }
        let Some(engine) = self.engine.as_ref() else {
            return;
        };

        match engine.snapshot() {
            Ok(snapshot) => {
                self.mirror.apply_poll(PollSample::from(&snapshot));
                if let Some(volume) = snapshot.volume {
                    self.volume = volume.round().clamp(0.0, 100.0) as i64;
                }
            }
            Err(err) => self.engine_failed(err),
        }
    }

    pub fn run(&mut self, command: TransportCommand) {
        let result = match self.engine.as_ref() {
            Some(engine) => self.transport.dispatch(engine, command),
            None => {
                self.report_engine_unavailable();
                return;
            }
        };

        if let TransportCommand::SetVolume(volume) = command {
            self.volume = volume.clamp(0, 100);
        }
        if let Err(err) = result {
            self.engine_failed(err);
        }
    }

    pub fn begin_seek(&mut self, fraction: f64) {
        self.mirror.begin_drag(fraction);
    }

    pub fn update_seek(&mut self, fraction: f64) {
        self.mirror.update_drag(fraction);
    }

    /// Release the seek bar; seeks once if the duration is known.
    pub fn end_seek(&mut self) {
        let Some(target) = self.mirror.end_drag() else {
            return;
        };

        let result = match self.engine.as_ref() {
            Some(engine) => engine.seek(target, SeekMode::Absolute),
            None => {
                self.report_engine_unavailable();
                return;
            }
        };
        if let Err(err) = result {
            self.engine_failed(err);
        }
    }

    /// Flip fullscreen. Returns the new state.
    pub fn toggle_fullscreen(&mut self, now: Instant) -> bool {
        if self.autohide.is_fullscreen() {
            self.autohide.leave_fullscreen();
            false
        } else {
            self.autohide.enter_fullscreen(now);
            true
        }
    }

    /// Leave fullscreen. Returns false if the window was not fullscreen.
    pub fn exit_fullscreen(&mut self) -> bool {
        if self.autohide.is_fullscreen() {
            self.autohide.leave_fullscreen();
            true
        } else {
            false
        }
    }

    pub fn mouse_moved(&mut self, now: Instant) {
        self.autohide.mouse_moved(now);
    }

    /// Advance the auto-hide countdown. True when the controls just hid.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.autohide.tick(now)
    }

    /// How long the UI may sleep before the player needs another frame.
    pub fn next_wakeup(&self, now: Instant) -> Duration {
        let poll = self.poll.remaining(now);
        match self.autohide.remaining(now) {
            Some(hide) => poll.min(hide),
            None => poll,
        }
    }

    /// Stop the engine. Failures are logged and otherwise ignored.
    pub fn shutdown(&mut self) {
        self.shutting_down = true;
        if let Some(mut engine) = self.engine.take() {
            if let Err(err) = engine.terminate() {
                warn!("media engine did not shut down cleanly: {err}");
            }
        }
    }

    fn playback_failed(&mut self, title: &str, source: &str, err: EngineError) {
        warn!(source, "playback failed: {err}");
        self.mirror.load_failed();
        self.notices.push_back(Notice::new(
            title,
            format!("Could not play {source}:\n{err}"),
        ));
        if !err.is_transient() {
            self.fault_reported = true;
        }
    }

    fn engine_failed(&mut self, err: EngineError) {
        if err.is_transient() {
            trace!("engine state unavailable this tick: {err}");
        } else {
            self.report_fault(&err);
        }
    }

    fn report_fault(&mut self, err: &EngineError) {
        if self.fault_reported {
            return;
        }
        self.fault_reported = true;
        self.mirror.load_failed();
        warn!("media engine fault: {err}");
        self.notices
            .push_back(Notice::new("Engine Error", format!("The media engine failed:\n{err}")));
    }

    fn report_engine_unavailable(&mut self) {
        let reason = self
            .startup_error
            .as_deref()
            .unwrap_or("the media engine is not running");
        self.notices.push_back(Notice::new(
            "Engine Error",
            format!("Playback is unavailable: {reason}"),
        ));
    }

    fn missing_resolver_notice(&self) -> Notice {
        Notice::new(
            format!("{} Missing", self.resolver_name),
            resolver::missing_message(&self.resolver_name),
        )
    }

    pub fn current_notice(&self) -> Option<&Notice> {
        self.notices.front()
    }

    pub fn dismiss_notice(&mut self) {
        self.notices.pop_front();
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    pub fn mirror(&self) -> &PlaybackMirror {
        &self.mirror
    }

    pub fn recent(&self) -> &RecentFiles {
        &self.recent
    }

    pub fn resolver(&self) -> Option<&Resolver> {
        self.resolver.as_ref()
    }

    pub fn volume(&self) -> i64 {
        self.volume
    }

    pub fn is_fullscreen(&self) -> bool {
        self.autohide.is_fullscreen()
    }

    pub fn controls_visible(&self) -> bool {
        self.autohide.controls_visible()
    }

    pub fn skip_seconds(&self) -> f64 {
        self.transport.skip_seconds()
    }
}
