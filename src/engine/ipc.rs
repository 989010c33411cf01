//! mpv driven over its JSON IPC protocol.
//!
//! The engine runs as a child process started with `--input-ipc-server`. One
//! connection is split in two: the UI side writes newline-delimited requests,
//! a reader thread parses replies and events, keeps the property snapshot
//! current and forwards notifications to the UI.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use interprocess::local_socket::{prelude::*, GenericFilePath, SendHalf, Stream};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, trace, warn};

use super::{
    EngineBackend, EngineCommand, EngineError, EngineEvent, EngineOptions, EventSink,
    PropertySnapshot, PropertyValue, SharedState, OBSERVED_PROPERTIES,
};
use crate::resolver;

const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(50);
/// How long `quit` gets before the process is killed
const QUIT_GRACE: Duration = Duration::from_secs(2);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Serialize)]
struct IpcRequest {
    command: Vec<Value>,
    request_id: u64,
}

/// Any line mpv writes: either a reply (has `request_id`) or an event.
#[derive(Debug, Default, Deserialize)]
struct IpcMessage {
    event: Option<String>,
    name: Option<String>,
    #[serde(default)]
    data: Value,
    error: Option<String>,
    request_id: Option<u64>,
    reason: Option<String>,
    file_error: Option<String>,
}

/// Decoded meaning of one IPC line
#[derive(Debug, PartialEq)]
enum Incoming {
    Property(String, PropertyValue),
    Event(EngineEvent),
    Reply { request_id: u64, error: Option<String> },
    Ignored,
}

fn decode(line: &str) -> Result<Incoming, serde_json::Error> {
    let message: IpcMessage = serde_json::from_str(line)?;

    let Some(event) = message.event.as_deref() else {
        return Ok(match message.request_id {
            Some(request_id) => Incoming::Reply {
                request_id,
                error: message.error.filter(|e| e != "success"),
            },
            None => Incoming::Ignored,
        });
    };

    let incoming = match event {
        "property-change" => match message.name {
            Some(name) => Incoming::Property(name, property_value(&message.data)),
            None => Incoming::Ignored,
        },
        "start-file" => Incoming::Event(EngineEvent::StartFile),
        "file-loaded" => Incoming::Event(EngineEvent::FileLoaded),
        "end-file" if message.reason.as_deref() == Some("error") => {
            let reason = message
                .file_error
                .unwrap_or_else(|| "unknown error".to_string());
            Incoming::Event(EngineEvent::LoadFailed(reason))
        }
        "shutdown" => Incoming::Event(EngineEvent::Shutdown),
        _ => Incoming::Ignored,
    };
    Ok(incoming)
}

fn property_value(data: &Value) -> PropertyValue {
    match data {
        Value::Bool(v) => PropertyValue::Flag(*v),
        Value::Number(n) => n.as_f64().map(PropertyValue::Number).unwrap_or(PropertyValue::Unset),
        _ => PropertyValue::Unset,
    }
}

fn command_args(command: &EngineCommand) -> Vec<Value> {
    match command {
        EngineCommand::Play(source) => vec![json!("loadfile"), json!(source), json!("replace")],
        EngineCommand::Stop => vec![json!("stop")],
        EngineCommand::Seek { offset, mode } => {
            vec![json!("seek"), json!(offset.to_string()), json!(mode.as_str())]
        }
        EngineCommand::SetPause(pause) => vec![json!("set_property"), json!("pause"), json!(pause)],
        EngineCommand::SetMute(mute) => vec![json!("set_property"), json!("mute"), json!(mute)],
        EngineCommand::SetVolume(volume) => {
            vec![json!("set_property"), json!("volume"), json!(volume)]
        }
    }
}

/// Request id allocation and the sources of in-flight `loadfile` requests.
#[derive(Default)]
struct Requests {
    next_id: AtomicU64,
    pending_loads: Mutex<HashMap<u64, String>>,
}

impl Requests {
    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Reader thread body. Returns when the connection closes.
fn read_loop<R: BufRead>(reader: R, shared: &SharedState, sink: &EventSink, requests: &Requests) {
    let mut saw_shutdown = false;

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("engine connection failed: {err}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match decode(&line) {
            Ok(Incoming::Property(name, value)) => {
                trace!(property = %name, ?value, "property change");
                if let Some(event) = shared.observe(&name, value) {
                    sink.emit(event);
                }
            }
            Ok(Incoming::Event(event)) => {
                debug!(?event, "engine event");
                saw_shutdown |= event == EngineEvent::Shutdown;
                sink.emit(event);
            }
            Ok(Incoming::Reply { request_id, error }) => {
                let load = requests.pending_loads.lock().remove(&request_id);
                match (error, load) {
                    (Some(error), Some(source)) => {
                        warn!(%source, %error, "engine refused to load source");
                        sink.emit(EngineEvent::LoadFailed(format!("{source}: {error}")));
                    }
                    (Some(error), None) => debug!(request_id, %error, "engine request failed"),
                    (None, _) => {}
                }
            }
            Ok(Incoming::Ignored) => {}
            Err(err) => debug!("unparseable engine message: {err}"),
        }
    }

    shared.mark_dead();
    if !saw_shutdown {
        sink.emit(EngineEvent::Shutdown);
    }
}

/// Arguments passed to the engine process.
fn engine_args(options: &EngineOptions, socket: &Path) -> Vec<String> {
    let mut args = vec![
        "--idle=yes".to_string(),
        "--force-window=yes".to_string(),
        "--no-terminal".to_string(),
        "--input-default-bindings=yes".to_string(),
        "--input-vo-keyboard=yes".to_string(),
        "--ytdl=yes".to_string(),
        format!("--volume={}", options.volume.clamp(0, 100)),
        format!("--input-ipc-server={}", socket.display()),
    ];
    if let Some(wid) = options.window_id {
        args.push(format!("--wid={wid}"));
    }
    if let Some(ref resolver) = options.resolver {
        args.push(format!(
            "--script-opts=ytdl_hook-ytdl_path={}",
            resolver.display()
        ));
    }
    args
}

fn socket_path() -> PathBuf {
    let name = format!("blitzplayer-{}", std::process::id());
    if cfg!(windows) {
        PathBuf::from(format!(r"\\.\pipe\{name}"))
    } else {
        std::env::temp_dir().join(format!("{name}.sock"))
    }
}

fn connect(child: &mut Child, socket: &Path, timeout: Duration) -> Result<Stream, EngineError> {
    let deadline = Instant::now() + timeout;
    loop {
        let name = socket
            .as_os_str()
            .to_fs_name::<GenericFilePath>()
            .map_err(EngineError::Connect)?;
        match Stream::connect(name) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                if let Some(status) = child.try_wait().map_err(EngineError::Spawn)? {
                    return Err(EngineError::Spawn(io::Error::new(
                        io::ErrorKind::Other,
                        format!("engine exited during startup ({status})"),
                    )));
                }
                if Instant::now() >= deadline {
                    return Err(EngineError::Connect(err));
                }
                thread::sleep(CONNECT_RETRY_INTERVAL);
            }
        }
    }
}

fn wait_for_exit(child: &mut Child, grace: Duration) -> io::Result<bool> {
    let deadline = Instant::now() + grace;
    loop {
        if child.try_wait()?.is_some() {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

fn remove_socket(socket_path: &Path) {
    if !cfg!(windows) {
        let _ = std::fs::remove_file(socket_path);
    }
}

/// Kill an engine that will never be used and clear its socket.
fn abandon(child: &mut Child, socket_path: &Path) {
    let _ = child.kill();
    let _ = child.wait();
    remove_socket(socket_path);
}

/// mpv child process plus its IPC connection
pub struct IpcEngine {
    child: Child,
    writer: Mutex<SendHalf>,
    shared: Arc<SharedState>,
    requests: Arc<Requests>,
    reader: Option<JoinHandle<()>>,
    socket_path: PathBuf,
    terminated: bool,
}

impl IpcEngine {
    pub(crate) fn start(options: &EngineOptions, sink: EventSink) -> Result<Self, EngineError> {
        let executable = resolver::find_executable(&options.executable)
            .ok_or_else(|| EngineError::NotFound(options.executable.clone()))?;

        let socket_path = socket_path();
        if !cfg!(windows) {
            let _ = std::fs::remove_file(&socket_path);
        }

        let mut child = Command::new(&executable)
            .args(engine_args(options, &socket_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(EngineError::Spawn)?;

        let stream = match connect(&mut child, &socket_path, options.startup_timeout) {
            Ok(stream) => stream,
            Err(err) => {
                abandon(&mut child, &socket_path);
                return Err(err);
            }
        };
        let (recv, send) = stream.split();

        let shared = SharedState::new();
        let requests = Arc::new(Requests::default());
        let reader = {
            let shared = shared.clone();
            let requests = requests.clone();
            let spawned = thread::Builder::new()
                .name("mpv-ipc-reader".to_string())
                .spawn(move || read_loop(BufReader::new(recv), &shared, &sink, &requests));
            match spawned {
                Ok(reader) => reader,
                Err(err) => {
                    abandon(&mut child, &socket_path);
                    return Err(EngineError::Spawn(err));
                }
            }
        };

        let engine = Self {
            child,
            writer: Mutex::new(send),
            shared,
            requests,
            reader: Some(reader),
            socket_path,
            terminated: false,
        };

        for (index, property) in OBSERVED_PROPERTIES.iter().enumerate() {
            let args = vec![json!("observe_property"), json!(index + 1), json!(property)];
            engine.write_request(engine.requests.next(), args)?;
        }

        info!(
            executable = %executable.display(),
            socket = %engine.socket_path.display(),
            "media engine started"
        );
        Ok(engine)
    }

    fn write_request(&self, request_id: u64, command: Vec<Value>) -> Result<(), EngineError> {
        let mut line = serde_json::to_string(&IpcRequest { command, request_id })
            .map_err(io::Error::from)?;
        line.push('\n');

        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn cleanup_socket(&self) {
        remove_socket(&self.socket_path);
    }
}

impl EngineBackend for IpcEngine {
    fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        if !self.shared.is_alive() {
            return Err(EngineError::Terminated);
        }

        let request_id = self.requests.next();
        if let EngineCommand::Play(ref source) = command {
            self.requests
                .pending_loads
                .lock()
                .insert(request_id, source.clone());
        }

        debug!(?command, request_id, "engine command");
        let result = self.write_request(request_id, command_args(&command));
        if result.is_err() {
            self.requests.pending_loads.lock().remove(&request_id);
        }
        result
    }

    fn snapshot(&self) -> Result<PropertySnapshot, EngineError> {
        self.shared.read()
    }

    fn terminate(&mut self) -> Result<(), EngineError> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;

        let quit = self.write_request(self.requests.next(), vec![json!("quit")]);
        if let Err(ref err) = quit {
            warn!("could not ask the engine to quit: {err}");
        }

        let mut result = quit;
        match wait_for_exit(&mut self.child, QUIT_GRACE) {
            Ok(true) => {}
            Ok(false) => {
                warn!("engine ignored quit, killing it");
                if let Err(err) = self.child.kill().and_then(|_| self.child.wait().map(|_| ())) {
                    result = Err(err.into());
                }
            }
            Err(err) => result = Err(err.into()),
        }

        self.shared.mark_dead();
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("engine reader thread panicked");
            }
        }
        self.cleanup_socket();
        info!("media engine terminated");
        result
    }
}

impl Drop for IpcEngine {
    fn drop(&mut self) {
        if !self.terminated {
            abandon(&mut self.child, &self.socket_path);
            self.shared.mark_dead();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::engine::SeekMode;

    fn sink() -> (EventSink, crossbeam_channel::Receiver<EngineEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (EventSink::new(tx, Arc::new(|| {})), rx)
    }

    #[test]
    fn play_replaces_current_media() {
        let args = command_args(&EngineCommand::Play("/media/a.mkv".into()));
        assert_eq!(args, vec![json!("loadfile"), json!("/media/a.mkv"), json!("replace")]);
    }

    #[test]
    fn seek_carries_mode() {
        let args = command_args(&EngineCommand::Seek {
            offset: -10.0,
            mode: SeekMode::Relative,
        });
        assert_eq!(args, vec![json!("seek"), json!("-10"), json!("relative")]);
    }

    #[test]
    fn requests_are_single_json_objects() {
        let request = IpcRequest {
            command: command_args(&EngineCommand::SetPause(true)),
            request_id: 7,
        };
        let line = serde_json::to_string(&request).unwrap();
        assert_eq!(
            line,
            r#"{"command":["set_property","pause",true],"request_id":7}"#
        );
    }

    #[test]
    fn decodes_property_changes() {
        assert_eq!(
            decode(r#"{"event":"property-change","id":3,"name":"pause","data":true}"#).unwrap(),
            Incoming::Property("pause".into(), PropertyValue::Flag(true))
        );
        assert_eq!(
            decode(r#"{"event":"property-change","id":1,"name":"time-pos","data":12.5}"#).unwrap(),
            Incoming::Property("time-pos".into(), PropertyValue::Number(12.5))
        );
        assert_eq!(
            decode(r#"{"event":"property-change","id":1,"name":"time-pos"}"#).unwrap(),
            Incoming::Property("time-pos".into(), PropertyValue::Unset)
        );
    }

    #[test]
    fn end_file_only_fails_on_error_reason() {
        assert_eq!(
            decode(r#"{"event":"end-file","reason":"error","file_error":"loading failed"}"#)
                .unwrap(),
            Incoming::Event(EngineEvent::LoadFailed("loading failed".into()))
        );
        assert_eq!(
            decode(r#"{"event":"end-file","reason":"eof"}"#).unwrap(),
            Incoming::Ignored
        );
    }

    #[test]
    fn success_replies_carry_no_error() {
        assert_eq!(
            decode(r#"{"request_id":4,"error":"success","data":null}"#).unwrap(),
            Incoming::Reply {
                request_id: 4,
                error: None
            }
        );
    }

    #[test]
    fn reader_updates_snapshot_and_forwards_events() {
        let (sink, rx) = sink();
        let shared = SharedState::new();
        let requests = Requests::default();
        let input = concat!(
            "{\"event\":\"start-file\",\"playlist_entry_id\":1}\n",
            "{\"event\":\"property-change\",\"id\":2,\"name\":\"duration\",\"data\":60.0}\n",
            "\n",
            "not json\n",
            "{\"event\":\"file-loaded\"}\n",
            "{\"event\":\"property-change\",\"id\":1,\"name\":\"time-pos\",\"data\":1.5}\n",
        );

        read_loop(Cursor::new(input), &shared, &sink, &requests);

        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![
                EngineEvent::StartFile,
                EngineEvent::FileLoaded,
                EngineEvent::PlaybackTime(1.5),
                EngineEvent::Shutdown,
            ]
        );
        assert!(!shared.is_alive());
        let snapshot = shared.snapshot.lock().clone();
        assert_eq!(snapshot.duration, Some(60.0));
        assert_eq!(snapshot.time_pos, Some(1.5));
    }

    #[test]
    fn rejected_load_is_reported_as_failure() {
        let (sink, rx) = sink();
        let shared = SharedState::new();
        let requests = Requests::default();
        requests
            .pending_loads
            .lock()
            .insert(9, "https://example.invalid/v".into());

        let input = "{\"request_id\":9,\"error\":\"invalid parameter\",\"data\":null}\n\
                     {\"event\":\"shutdown\"}\n";
        read_loop(Cursor::new(input), &shared, &sink, &requests);

        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![
                EngineEvent::LoadFailed("https://example.invalid/v: invalid parameter".into()),
                EngineEvent::Shutdown,
            ]
        );
        assert!(requests.pending_loads.lock().is_empty());
    }

    #[test]
    fn args_embed_window_and_resolver() {
        let options = EngineOptions {
            window_id: Some(4242),
            resolver: Some(PathBuf::from("/usr/bin/yt-dlp")),
            volume: 150,
            ..EngineOptions::default()
        };
        let args = engine_args(&options, Path::new("/tmp/blitz.sock"));

        assert!(args.contains(&"--wid=4242".to_string()));
        assert!(args.contains(&"--volume=100".to_string()));
        assert!(args.contains(&"--input-ipc-server=/tmp/blitz.sock".to_string()));
        assert!(args.contains(&"--script-opts=ytdl_hook-ytdl_path=/usr/bin/yt-dlp".to_string()));
    }

    #[test]
    fn args_without_window_render_standalone() {
        let args = engine_args(&EngineOptions::default(), Path::new("/tmp/blitz.sock"));
        assert!(!args.iter().any(|a| a.starts_with("--wid=")));
        assert!(!args.iter().any(|a| a.starts_with("--script-opts=")));
    }

    #[cfg(unix)]
    #[test]
    fn abandoned_engine_is_reaped_and_socket_removed() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("engine.sock");
        std::fs::write(&socket, "").unwrap();
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();

        abandon(&mut child, &socket);

        assert!(child.try_wait().unwrap().is_some());
        assert!(!socket.exists());
    }

    #[test]
    fn request_ids_start_at_one() {
        let requests = Requests::default();
        assert_eq!(requests.next(), 1);
        assert_eq!(requests.next(), 2);
    }
}
