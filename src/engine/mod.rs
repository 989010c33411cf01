//! Media engine handle.
//!
//! The player never decodes anything itself: it drives an mpv instance and
//! mirrors a handful of its properties. Two backends exist:
//! - [`ipc`]: spawns the `mpv` executable and talks JSON IPC over a local socket
//! - `embedded` (feature `libmpv`): links libmpv and runs the client on a thread
//!
//! Both deliver notifications from a background thread through a channel and
//! wake the UI with a repaint request; nothing here touches widgets.

pub mod ipc;

#[cfg(feature = "libmpv")]
pub mod embedded;

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

/// Longest time a property read may wait for the snapshot lock.
const SNAPSHOT_LOCK_TIMEOUT: Duration = Duration::from_millis(5);

/// Properties observed on every backend.
pub const OBSERVED_PROPERTIES: [&str; 7] = [
    "time-pos",
    "duration",
    "pause",
    "seeking",
    "idle-active",
    "mute",
    "volume",
];

/// Callback used by engine threads to wake the UI thread.
pub type Notifier = Arc<dyn Fn() + Send + Sync>;

/// How a seek offset is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// Offset in seconds from the current position
    Relative,
    /// Target position in seconds from the start
    Absolute,
}

impl SeekMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relative => "relative",
            Self::Absolute => "absolute",
        }
    }
}

/// Commands understood by every backend
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Load a local path or remote URL, replacing the current media
    Play(String),
    Stop,
    Seek { offset: f64, mode: SeekMode },
    SetPause(bool),
    SetMute(bool),
    SetVolume(i64),
}

/// Notifications produced by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Playback position advanced (only sent for known positions)
    PlaybackTime(f64),
    PauseChanged(bool),
    SeekingChanged(bool),
    /// The engine entered the idle state (nothing loaded)
    Idle,
    MuteChanged(bool),
    StartFile,
    FileLoaded,
    /// The engine could not open the requested source
    LoadFailed(String),
    /// The engine went away
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("`{0}` was not found in PATH")]
    NotFound(String),
    #[error("failed to start the media engine: {0}")]
    Spawn(#[source] io::Error),
    #[error("could not connect to the media engine: {0}")]
    Connect(#[source] io::Error),
    #[error("media engine I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("media engine rejected `{command}`: {reason}")]
    #[cfg_attr(not(feature = "libmpv"), allow(dead_code))]
    Rejected { command: String, reason: String },
    #[error("property `{0}` is not available")]
    PropertyUnavailable(&'static str),
    #[error("media engine state is busy")]
    Busy,
    #[error("media engine has terminated")]
    Terminated,
}

impl EngineError {
    /// Transient errors clear up on their own; the next poll simply retries.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::PropertyUnavailable(_) | Self::Busy)
    }
}

/// Typed value carried by a property change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    Flag(bool),
    Number(f64),
    /// Property exists but currently has no value
    Unset,
}

impl PropertyValue {
    fn flag(self) -> Option<bool> {
        match self {
            Self::Flag(v) => Some(v),
            _ => None,
        }
    }

    fn number(self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(v),
            _ => None,
        }
    }
}

/// Last observed engine properties. `None` means unknown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySnapshot {
    pub pause: Option<bool>,
    pub mute: Option<bool>,
    pub volume: Option<f64>,
    pub time_pos: Option<f64>,
    pub duration: Option<f64>,
    pub seeking: Option<bool>,
    pub idle: Option<bool>,
}

impl PropertySnapshot {
    /// Record a property change and return the notification it implies, if any.
    pub fn apply(&mut self, name: &str, value: PropertyValue) -> Option<EngineEvent> {
        match name {
            "time-pos" | "playback-time" => {
                self.time_pos = value.number();
                self.time_pos.map(EngineEvent::PlaybackTime)
            }
            "duration" => {
                self.duration = value.number();
                None
            }
            "volume" => {
                self.volume = value.number();
                None
            }
            "pause" => {
                self.pause = value.flag();
                self.pause.map(EngineEvent::PauseChanged)
            }
            "seeking" => {
                self.seeking = value.flag();
                self.seeking.map(EngineEvent::SeekingChanged)
            }
            "mute" => {
                self.mute = value.flag();
                self.mute.map(EngineEvent::MuteChanged)
            }
            "idle-active" => {
                self.idle = value.flag();
                // Leaving idle is implied by start-file; only entering it matters.
                match self.idle {
                    Some(true) => Some(EngineEvent::Idle),
                    _ => None,
                }
            }
            other => {
                debug!(property = other, "ignoring unobserved property");
                None
            }
        }
    }
}

/// State shared between an engine thread and the UI-side handle.
pub(crate) struct SharedState {
    snapshot: Mutex<PropertySnapshot>,
    alive: AtomicBool,
}

impl SharedState {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(PropertySnapshot::default()),
            alive: AtomicBool::new(true),
        })
    }

    pub(crate) fn observe(&self, name: &str, value: PropertyValue) -> Option<EngineEvent> {
        self.snapshot.lock().apply(name, value)
    }

    /// Copy of the snapshot without ever blocking the caller for long.
    pub(crate) fn read(&self) -> Result<PropertySnapshot, EngineError> {
        if !self.is_alive() {
            return Err(EngineError::Terminated);
        }
        self.snapshot
            .try_lock_for(SNAPSHOT_LOCK_TIMEOUT)
            .map(|snapshot| snapshot.clone())
            .ok_or(EngineError::Busy)
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

/// Sending side of the notification channel.
#[derive(Clone)]
pub(crate) struct EventSink {
    tx: Sender<EngineEvent>,
    notify: Notifier,
}

impl EventSink {
    pub(crate) fn new(tx: Sender<EngineEvent>, notify: Notifier) -> Self {
        Self { tx, notify }
    }

    pub(crate) fn emit(&self, event: EngineEvent) {
        if self.tx.send(event).is_ok() {
            (self.notify)();
        }
    }
}

/// Options used to start an engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Executable name or path of the engine (IPC backend)
    pub executable: String,
    /// Native window handle to render into
    pub window_id: Option<i64>,
    /// URL resolver handed to the engine's ytdl hook
    pub resolver: Option<PathBuf>,
    /// Initial volume (0-100)
    pub volume: i64,
    /// How long to wait for the engine to accept connections
    pub startup_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            executable: "mpv".to_string(),
            window_id: None,
            resolver: None,
            volume: 100,
            startup_timeout: Duration::from_secs(5),
        }
    }
}

/// Command and property surface used by the player.
///
/// Commands are fire-and-forget; property reads return the last observed
/// value and never block for long.
pub trait EngineControl {
    fn send(&self, command: EngineCommand) -> Result<(), EngineError>;

    fn snapshot(&self) -> Result<PropertySnapshot, EngineError>;

    /// Shut the engine down. May fail; callers are free to ignore the error.
    fn terminate(&mut self) -> Result<(), EngineError>;

    fn play(&self, source: &str) -> Result<(), EngineError> {
        self.send(EngineCommand::Play(source.to_string()))
    }

    fn stop(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Stop)
    }

    fn seek(&self, offset: f64, mode: SeekMode) -> Result<(), EngineError> {
        self.send(EngineCommand::Seek { offset, mode })
    }

    fn set_pause(&self, pause: bool) -> Result<(), EngineError> {
        self.send(EngineCommand::SetPause(pause))
    }

    fn set_mute(&self, mute: bool) -> Result<(), EngineError> {
        self.send(EngineCommand::SetMute(mute))
    }

    fn set_volume(&self, volume: i64) -> Result<(), EngineError> {
        self.send(EngineCommand::SetVolume(volume.clamp(0, 100)))
    }

    fn pause(&self) -> Result<bool, EngineError> {
        self.snapshot()?
            .pause
            .ok_or(EngineError::PropertyUnavailable("pause"))
    }

    fn mute(&self) -> Result<bool, EngineError> {
        self.snapshot()?
            .mute
            .ok_or(EngineError::PropertyUnavailable("mute"))
    }

}

/// Backend-specific half of an [`EngineHandle`].
pub(crate) trait EngineBackend: Send {
    fn send(&self, command: EngineCommand) -> Result<(), EngineError>;
    fn snapshot(&self) -> Result<PropertySnapshot, EngineError>;
    fn terminate(&mut self) -> Result<(), EngineError>;
}

/// Owns one running engine and the receiving end of its notifications.
pub struct EngineHandle {
    backend: Box<dyn EngineBackend>,
    events: Receiver<EngineEvent>,
}

impl EngineHandle {
    /// Start the engine selected at build time.
    pub fn start(options: EngineOptions, notify: Notifier) -> Result<Self, EngineError> {
        let (tx, events) = crossbeam_channel::unbounded();
        let sink = EventSink::new(tx, notify);

        #[cfg(feature = "libmpv")]
        let backend: Box<dyn EngineBackend> = Box::new(embedded::EmbeddedEngine::start(&options, sink)?);
        #[cfg(not(feature = "libmpv"))]
        let backend: Box<dyn EngineBackend> = Box::new(ipc::IpcEngine::start(&options, sink)?);

        Ok(Self { backend, events })
    }

    /// Take every notification delivered since the last call.
    pub fn drain_events(&self) -> Vec<EngineEvent> {
        self.events.try_iter().collect()
    }
}

impl EngineControl for EngineHandle {
    fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        self.backend.send(command)
    }

    fn snapshot(&self) -> Result<PropertySnapshot, EngineError> {
        self.backend.snapshot()
    }

    fn terminate(&mut self) -> Result<(), EngineError> {
        self.backend.terminate()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::{Cell, RefCell};

    use super::*;

    /// Engine stand-in that records every command it receives.
    #[derive(Default)]
    pub(crate) struct FakeEngine {
        pub sent: RefCell<Vec<EngineCommand>>,
        pub properties: RefCell<PropertySnapshot>,
        pub fail_commands: Cell<bool>,
        pub read_error: RefCell<Option<fn() -> EngineError>>,
        pub terminated: Cell<bool>,
        pub fail_terminate: Cell<bool>,
    }

    impl FakeEngine {
        pub(crate) fn commands(&self) -> Vec<EngineCommand> {
            self.sent.borrow().clone()
        }

        pub(crate) fn fail_reads_with(&self, make_error: fn() -> EngineError) {
            *self.read_error.borrow_mut() = Some(make_error);
        }
    }

    impl EngineControl for FakeEngine {
        fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
            if self.fail_commands.get() {
                return Err(EngineError::Terminated);
            }
            self.sent.borrow_mut().push(command);
            Ok(())
        }

        fn snapshot(&self) -> Result<PropertySnapshot, EngineError> {
            if let Some(make_error) = *self.read_error.borrow() {
                return Err(make_error());
            }
            Ok(self.properties.borrow().clone())
        }

        fn terminate(&mut self) -> Result<(), EngineError> {
            self.terminated.set(true);
            if self.fail_terminate.get() {
                return Err(EngineError::Terminated);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeEngine;
    use super::*;

    #[test]
    fn idle_is_reported_only_when_entering_idle() {
        let mut snapshot = PropertySnapshot::default();
        assert_eq!(
            snapshot.apply("idle-active", PropertyValue::Flag(true)),
            Some(EngineEvent::Idle)
        );
        assert_eq!(snapshot.apply("idle-active", PropertyValue::Flag(false)), None);
        assert_eq!(snapshot.idle, Some(false));
    }

    #[test]
    fn unset_time_position_produces_no_notification() {
        let mut snapshot = PropertySnapshot::default();
        assert_eq!(
            snapshot.apply("time-pos", PropertyValue::Number(3.5)),
            Some(EngineEvent::PlaybackTime(3.5))
        );
        assert_eq!(snapshot.apply("time-pos", PropertyValue::Unset), None);
        assert_eq!(snapshot.time_pos, None);
    }

    #[test]
    fn duration_and_volume_update_silently() {
        let mut snapshot = PropertySnapshot::default();
        assert_eq!(snapshot.apply("duration", PropertyValue::Number(90.0)), None);
        assert_eq!(snapshot.apply("volume", PropertyValue::Number(40.0)), None);
        assert_eq!(snapshot.duration, Some(90.0));
        assert_eq!(snapshot.volume, Some(40.0));
    }

    #[test]
    fn shared_state_refuses_reads_after_death() {
        let shared = SharedState::new();
        shared.observe("pause", PropertyValue::Flag(true));
        assert_eq!(shared.read().unwrap().pause, Some(true));

        shared.mark_dead();
        assert!(matches!(shared.read(), Err(EngineError::Terminated)));
    }

    #[test]
    fn sink_wakes_the_ui_for_each_event() {
        use std::sync::atomic::AtomicUsize;

        let (tx, rx) = crossbeam_channel::unbounded();
        let wakeups = Arc::new(AtomicUsize::new(0));
        let counter = wakeups.clone();
        let sink = EventSink::new(
            tx,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        sink.emit(EngineEvent::StartFile);
        sink.emit(EngineEvent::FileLoaded);

        assert_eq!(wakeups.load(Ordering::SeqCst), 2);
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![EngineEvent::StartFile, EngineEvent::FileLoaded]
        );
    }

    #[test]
    fn missing_properties_read_as_unavailable() {
        let engine = FakeEngine::default();
        let err = engine.mute().unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, EngineError::PropertyUnavailable("mute")));
    }

    #[test]
    fn volume_commands_are_clamped() {
        let engine = FakeEngine::default();
        engine.set_volume(250).unwrap();
        engine.set_volume(-3).unwrap();
        assert_eq!(
            engine.commands(),
            vec![EngineCommand::SetVolume(100), EngineCommand::SetVolume(0)]
        );
    }

    #[test]
    fn terminated_is_not_transient() {
        assert!(!EngineError::Terminated.is_transient());
        assert!(EngineError::Busy.is_transient());
    }
}
