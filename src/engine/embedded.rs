//! mpv linked in through libmpv.
//!
//! The client handle and its event context live on one engine thread. The UI
//! side only holds a command channel and the shared property snapshot.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use libmpv::events::{Event, PropertyData};
use libmpv::{Format, Mpv};
use tracing::{debug, info, warn};

use super::{
    EngineBackend, EngineCommand, EngineError, EngineEvent, EngineOptions, EventSink,
    PropertySnapshot, PropertyValue, SharedState, OBSERVED_PROPERTIES,
};

/// Longest block in `wait_event` before pending commands are looked at (in seconds)
const EVENT_WAIT: f64 = 0.05;

enum Control {
    Command(EngineCommand),
    Quit,
}

pub struct EmbeddedEngine {
    control: Sender<Control>,
    shared: Arc<SharedState>,
    thread: Option<JoinHandle<()>>,
}

impl EmbeddedEngine {
    pub(crate) fn start(options: &EngineOptions, sink: EventSink) -> Result<Self, EngineError> {
        let (control, commands) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let shared = SharedState::new();

        let thread = {
            let options = options.clone();
            let shared = shared.clone();
            thread::Builder::new()
                .name("mpv-engine".to_string())
                .spawn(move || engine_thread(options, shared, sink, commands, ready_tx))
                .map_err(EngineError::Spawn)?
        };

        match ready_rx.recv_timeout(options.startup_timeout) {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                let _ = thread.join();
                return Err(EngineError::Rejected {
                    command: "initialize".to_string(),
                    reason,
                });
            }
            Err(RecvTimeoutError::Timeout) => {
                let _ = control.send(Control::Quit);
                return Err(EngineError::Connect(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "libmpv did not come up in time",
                )));
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = thread.join();
                return Err(EngineError::Terminated);
            }
        }

        info!(window_id = ?options.window_id, "embedded media engine started");
        Ok(Self {
            control,
            shared,
            thread: Some(thread),
        })
    }
}

fn create_mpv(options: &EngineOptions) -> Result<Mpv, libmpv::Error> {
    let window_id = options.window_id;
    let volume = options.volume.clamp(0, 100);
    let script_opts = options
        .resolver
        .as_ref()
        .map(|path| format!("ytdl_hook-ytdl_path={}", path.display()));

    Mpv::with_initializer(move |init| {
        if let Some(wid) = window_id {
            init.set_property("wid", wid)?;
        } else {
            init.set_property("force-window", "yes")?;
        }
        init.set_property("idle", "yes")?;
        init.set_property("ytdl", "yes")?;
        init.set_property("hwdec", "auto")?;
        init.set_property("input-default-bindings", "yes")?;
        init.set_property("input-vo-keyboard", "yes")?;
        init.set_property("volume", volume)?;
        if let Some(ref opts) = script_opts {
            init.set_property("script-opts", opts.as_str())?;
        }
        Ok(())
    })
}

fn property_format(name: &str) -> Format {
    match name {
        "pause" | "seeking" | "idle-active" | "mute" => Format::Flag,
        _ => Format::Double,
    }
}

fn property_value(data: PropertyData<'_>) -> PropertyValue {
    match data {
        PropertyData::Flag(v) => PropertyValue::Flag(v),
        PropertyData::Double(v) => PropertyValue::Number(v),
        PropertyData::Int64(v) => PropertyValue::Number(v as f64),
        _ => PropertyValue::Unset,
    }
}

fn apply_command(mpv: &Mpv, command: &EngineCommand) -> Result<(), libmpv::Error> {
    match command {
        EngineCommand::Play(source) => mpv.command("loadfile", &[source.as_str(), "replace"]),
        EngineCommand::Stop => mpv.command("stop", &[]),
        EngineCommand::Seek { offset, mode } => {
            mpv.command("seek", &[&offset.to_string(), mode.as_str()])
        }
        EngineCommand::SetPause(pause) => mpv.set_property("pause", *pause),
        EngineCommand::SetMute(mute) => mpv.set_property("mute", *mute),
        EngineCommand::SetVolume(volume) => mpv.set_property("volume", *volume),
    }
}

fn engine_thread(
    options: EngineOptions,
    shared: Arc<SharedState>,
    sink: EventSink,
    commands: Receiver<Control>,
    ready: Sender<Result<(), String>>,
) {
    let mpv = match create_mpv(&options) {
        Ok(mpv) => mpv,
        Err(err) => {
            shared.mark_dead();
            let _ = ready.send(Err(format!("{err:?}")));
            return;
        }
    };

    let mut events = mpv.create_event_context();
    let setup = events.disable_deprecated_events().and_then(|_| {
        OBSERVED_PROPERTIES
            .iter()
            .enumerate()
            .try_for_each(|(index, name)| {
                events.observe_property(name, property_format(name), index as u64 + 1)
            })
    });
    if let Err(err) = setup {
        shared.mark_dead();
        let _ = ready.send(Err(format!("{err:?}")));
        return;
    }
    let _ = ready.send(Ok(()));

    // Source of the most recent loadfile, named in failure reports
    let mut current_source = String::new();

    'run: loop {
        loop {
            match commands.try_recv() {
                Ok(Control::Command(command)) => {
                    debug!(?command, "engine command");
                    if let EngineCommand::Play(ref source) = command {
                        current_source = source.clone();
                    }
                    if let Err(err) = apply_command(&mpv, &command) {
                        warn!(?command, "engine rejected command: {err:?}");
                        if let EngineCommand::Play(ref source) = command {
                            sink.emit(EngineEvent::LoadFailed(format!("{source}: {err:?}")));
                        }
                    }
                }
                Ok(Control::Quit) | Err(TryRecvError::Disconnected) => break 'run,
                Err(TryRecvError::Empty) => break,
            }
        }

        match events.wait_event(EVENT_WAIT) {
            None => {}
            Some(Ok(Event::Shutdown)) => {
                debug!("engine shut down on its own");
                break 'run;
            }
            Some(Ok(Event::StartFile)) => sink.emit(EngineEvent::StartFile),
            Some(Ok(Event::FileLoaded)) => sink.emit(EngineEvent::FileLoaded),
            Some(Ok(Event::PropertyChange { name, change, .. })) => {
                if let Some(event) = shared.observe(name, property_value(change)) {
                    sink.emit(event);
                }
            }
            Some(Ok(_)) => {}
            // End-of-file with an error reason surfaces here
            Some(Err(err)) => {
                warn!(source = %current_source, "playback failed: {err:?}");
                sink.emit(EngineEvent::LoadFailed(format!("{current_source}: {err:?}")));
            }
        }
    }

    shared.mark_dead();
    sink.emit(EngineEvent::Shutdown);
}

impl EngineBackend for EmbeddedEngine {
    fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        if !self.shared.is_alive() {
            return Err(EngineError::Terminated);
        }
        self.control
            .send(Control::Command(command))
            .map_err(|_| EngineError::Terminated)
    }

    fn snapshot(&self) -> Result<PropertySnapshot, EngineError> {
        self.shared.read()
    }

    fn terminate(&mut self) -> Result<(), EngineError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        let result = self
            .control
            .send(Control::Quit)
            .map_err(|_| EngineError::Terminated);
        if thread.join().is_err() {
            warn!("engine thread panicked");
        }
        self.shared.mark_dead();
        info!("embedded media engine terminated");
        result
    }
}

impl Drop for EmbeddedEngine {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.control.send(Control::Quit);
            let _ = thread.join();
        }
    }
}
