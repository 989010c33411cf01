//! Configuration module for player settings and keyboard shortcuts.
//! Settings live in an INI file in the platform config directory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::autohide::DEFAULT_HIDE_DELAY;
use crate::playback::DEFAULT_POLL_INTERVAL;
use crate::recent;
use crate::transport::DEFAULT_SKIP_SECONDS;

const DEFAULT_CONFIG_INI: &str = include_str!("../config.ini");

/// Longest accepted fullscreen hide delay (in seconds)
const MAX_HIDE_DELAY: f32 = 3600.0;

/// Keyboard input that can trigger an action
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InputBinding {
    Key(egui::Key),
    KeyWithCtrl(egui::Key),
    KeyWithShift(egui::Key),
    KeyWithAlt(egui::Key),
}

impl InputBinding {
    /// Binding for a key press under the given modifiers.
    /// Ctrl wins over Shift, Shift over Alt.
    pub fn from_press(key: egui::Key, modifiers: egui::Modifiers) -> Self {
        if modifiers.command || modifiers.ctrl {
            Self::KeyWithCtrl(key)
        } else if modifiers.shift {
            Self::KeyWithShift(key)
        } else if modifiers.alt {
            Self::KeyWithAlt(key)
        } else {
            Self::Key(key)
        }
    }

    pub fn key(&self) -> egui::Key {
        match *self {
            Self::Key(key)
            | Self::KeyWithCtrl(key)
            | Self::KeyWithShift(key)
            | Self::KeyWithAlt(key) => key,
        }
    }
}

/// All user commands. Buttons, menus and shortcuts share this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    TogglePlay,
    Stop,
    SkipBack,
    SkipForward,
    ToggleMute,
    ToggleFullscreen,
    ExitFullscreen,
    OpenFile,
    OpenStream,
    Quit,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::TogglePlay,
        Action::Stop,
        Action::SkipBack,
        Action::SkipForward,
        Action::ToggleMute,
        Action::ToggleFullscreen,
        Action::ExitFullscreen,
        Action::OpenFile,
        Action::OpenStream,
        Action::Quit,
    ];

    pub fn from_str(s: &str) -> Option<Action> {
        match s.trim().to_lowercase().as_str() {
            "toggle_play" | "play_pause" | "playpause" => Some(Action::TogglePlay),
            "stop" => Some(Action::Stop),
            "skip_back" | "back" | "rewind" => Some(Action::SkipBack),
            "skip_forward" | "forward" => Some(Action::SkipForward),
            "toggle_mute" | "mute" => Some(Action::ToggleMute),
            "toggle_fullscreen" | "fullscreen" => Some(Action::ToggleFullscreen),
            "exit_fullscreen" | "leave_fullscreen" => Some(Action::ExitFullscreen),
            "open_file" | "open" => Some(Action::OpenFile),
            "open_stream" | "open_url" => Some(Action::OpenStream),
            "quit" | "exit" => Some(Action::Quit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::TogglePlay => "toggle_play",
            Action::Stop => "stop",
            Action::SkipBack => "skip_back",
            Action::SkipForward => "skip_forward",
            Action::ToggleMute => "toggle_mute",
            Action::ToggleFullscreen => "toggle_fullscreen",
            Action::ExitFullscreen => "exit_fullscreen",
            Action::OpenFile => "open_file",
            Action::OpenStream => "open_stream",
            Action::Quit => "quit",
        }
    }
}

/// Parse an input binding from string
pub fn parse_input_binding(s: &str) -> Option<InputBinding> {
    let s = s.trim().to_lowercase();

    if let Some(key_str) = s.strip_prefix("ctrl+") {
        return parse_key(key_str).map(InputBinding::KeyWithCtrl);
    }
    if let Some(key_str) = s.strip_prefix("shift+") {
        return parse_key(key_str).map(InputBinding::KeyWithShift);
    }
    if let Some(key_str) = s.strip_prefix("alt+") {
        return parse_key(key_str).map(InputBinding::KeyWithAlt);
    }

    parse_key(&s).map(InputBinding::Key)
}

/// Parse a single key from string
fn parse_key(s: &str) -> Option<egui::Key> {
    match s.trim().to_lowercase().as_str() {
        // Letters
        "a" => Some(egui::Key::A),
        "b" => Some(egui::Key::B),
        "c" => Some(egui::Key::C),
        "d" => Some(egui::Key::D),
        "e" => Some(egui::Key::E),
        "f" => Some(egui::Key::F),
        "g" => Some(egui::Key::G),
        "h" => Some(egui::Key::H),
        "i" => Some(egui::Key::I),
        "j" => Some(egui::Key::J),
        "k" => Some(egui::Key::K),
        "l" => Some(egui::Key::L),
        "m" => Some(egui::Key::M),
        "n" => Some(egui::Key::N),
        "o" => Some(egui::Key::O),
        "p" => Some(egui::Key::P),
        "q" => Some(egui::Key::Q),
        "r" => Some(egui::Key::R),
        "s" => Some(egui::Key::S),
        "t" => Some(egui::Key::T),
        "u" => Some(egui::Key::U),
        "v" => Some(egui::Key::V),
        "w" => Some(egui::Key::W),
        "x" => Some(egui::Key::X),
        "y" => Some(egui::Key::Y),
        "z" => Some(egui::Key::Z),
        // Numbers
        "0" | "num0" => Some(egui::Key::Num0),
        "1" | "num1" => Some(egui::Key::Num1),
        "2" | "num2" => Some(egui::Key::Num2),
        "3" | "num3" => Some(egui::Key::Num3),
        "4" | "num4" => Some(egui::Key::Num4),
        "5" | "num5" => Some(egui::Key::Num5),
        "6" | "num6" => Some(egui::Key::Num6),
        "7" | "num7" => Some(egui::Key::Num7),
        "8" | "num8" => Some(egui::Key::Num8),
        "9" | "num9" => Some(egui::Key::Num9),
        // Function keys
        "f1" => Some(egui::Key::F1),
        "f2" => Some(egui::Key::F2),
        "f3" => Some(egui::Key::F3),
        "f4" => Some(egui::Key::F4),
        "f5" => Some(egui::Key::F5),
        "f6" => Some(egui::Key::F6),
        "f7" => Some(egui::Key::F7),
        "f8" => Some(egui::Key::F8),
        "f9" => Some(egui::Key::F9),
        "f10" => Some(egui::Key::F10),
        "f11" => Some(egui::Key::F11),
        "f12" => Some(egui::Key::F12),
        // Arrow keys
        "left" | "arrow_left" | "arrowleft" => Some(egui::Key::ArrowLeft),
        "right" | "arrow_right" | "arrowright" => Some(egui::Key::ArrowRight),
        "up" | "arrow_up" | "arrowup" => Some(egui::Key::ArrowUp),
        "down" | "arrow_down" | "arrowdown" => Some(egui::Key::ArrowDown),
        // Special keys
        "escape" | "esc" => Some(egui::Key::Escape),
        "enter" | "return" => Some(egui::Key::Enter),
        "space" | "spacebar" => Some(egui::Key::Space),
        "tab" => Some(egui::Key::Tab),
        "backspace" => Some(egui::Key::Backspace),
        "delete" | "del" => Some(egui::Key::Delete),
        "home" => Some(egui::Key::Home),
        "end" => Some(egui::Key::End),
        "pageup" | "page_up" => Some(egui::Key::PageUp),
        "pagedown" | "page_down" => Some(egui::Key::PageDown),
        // Punctuation
        "minus" | "-" => Some(egui::Key::Minus),
        "plus" | "=" | "equals" => Some(egui::Key::Equals),
        _ => None,
    }
}

/// Application configuration loaded from INI file
#[derive(Debug, Clone)]
pub struct Config {
    /// Map from input binding to action
    pub bindings: HashMap<InputBinding, Action>,
    /// Reverse map for looking up bindings for an action
    pub action_bindings: HashMap<Action, Vec<InputBinding>>,
    /// Mouse inactivity before the fullscreen control bar hides (in seconds)
    pub fullscreen_hide_delay: f32,
    /// Interval of the playback position poll (in milliseconds)
    pub poll_interval_ms: u64,
    /// Number of entries kept in the recent files menu
    pub recent_files_limit: usize,
    /// Seconds jumped by skip back / skip forward
    pub skip_seconds: f64,

    /// Engine executable name or path
    pub engine_executable: String,
    /// Stream resolver executable name or path
    pub resolver: String,
    /// Hand mpv the main window handle (`wid`). mpv's child window then
    /// covers the whole client area, menus and dialogs included.
    pub embed_video: bool,
    /// Volume at startup (0-100)
    pub default_volume: i64,
    /// How long to wait for the engine to come up (in milliseconds)
    pub startup_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self::without_bindings();
        config.set_defaults();
        config
    }
}

impl Config {
    fn without_bindings() -> Self {
        Config {
            bindings: HashMap::new(),
            action_bindings: HashMap::new(),
            fullscreen_hide_delay: DEFAULT_HIDE_DELAY.as_secs_f32(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            recent_files_limit: recent::DEFAULT_LIMIT,
            skip_seconds: DEFAULT_SKIP_SECONDS,
            engine_executable: "mpv".to_string(),
            resolver: "yt-dlp".to_string(),
            embed_video: false,
            default_volume: 100,
            startup_timeout_ms: 5000,
        }
    }

    /// Set default keybindings
    fn set_defaults(&mut self) {
        self.add_binding(InputBinding::Key(egui::Key::Space), Action::TogglePlay);
        self.add_binding(InputBinding::Key(egui::Key::S), Action::Stop);
        self.add_binding(InputBinding::Key(egui::Key::ArrowLeft), Action::SkipBack);
        self.add_binding(InputBinding::Key(egui::Key::ArrowRight), Action::SkipForward);
        self.add_binding(InputBinding::Key(egui::Key::M), Action::ToggleMute);
        self.add_binding(InputBinding::Key(egui::Key::F), Action::ToggleFullscreen);
        self.add_binding(InputBinding::Key(egui::Key::Escape), Action::ExitFullscreen);
        self.add_binding(InputBinding::KeyWithCtrl(egui::Key::O), Action::OpenFile);
        self.add_binding(InputBinding::KeyWithCtrl(egui::Key::U), Action::OpenStream);
        self.add_binding(InputBinding::Key(egui::Key::Q), Action::Quit);
    }

    /// Add a binding
    fn add_binding(&mut self, input: InputBinding, action: Action) {
        if let Some(previous) = self.bindings.insert(input.clone(), action) {
            if previous != action {
                if let Some(list) = self.action_bindings.get_mut(&previous) {
                    list.retain(|b| *b != input);
                }
            }
        }
        let list = self.action_bindings.entry(action).or_default();
        if !list.contains(&input) {
            list.push(input);
        }
    }

    pub fn fullscreen_hide_delay(&self) -> Duration {
        Duration::from_secs_f32(self.fullscreen_hide_delay)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    fn exe_dir() -> Option<PathBuf> {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
    }

    /// Directory holding `config.ini`, created on demand.
    fn config_dir() -> PathBuf {
        let dir = directories::ProjectDirs::from("", "", "BlitzPlayer")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .or_else(Self::exe_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        if let Err(err) = fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), "could not create config directory: {err}");
        }
        dir
    }

    /// Get settings file path. A `config.ini` next to the executable
    /// (portable install) wins over the per-user one.
    pub fn config_path() -> PathBuf {
        if let Some(portable) = Self::exe_dir().map(|dir| dir.join("config.ini")) {
            if portable.is_file() {
                return portable;
            }
        }
        Self::config_dir().join("config.ini")
    }

    /// Load configuration, writing the default template on first run.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            match fs::write(path, DEFAULT_CONFIG_INI) {
                Ok(()) => info!(path = %path.display(), "wrote default configuration"),
                Err(err) => warn!(path = %path.display(), "could not write default configuration: {err}"),
            }
            return Self::parse_ini(DEFAULT_CONFIG_INI);
        }

        match fs::read_to_string(path) {
            Ok(content) => {
                debug!(path = %path.display(), "loaded configuration");
                Self::parse_ini(&content)
            }
            Err(err) => {
                warn!(path = %path.display(), "could not read configuration, using defaults: {err}");
                Self::parse_ini(DEFAULT_CONFIG_INI)
            }
        }
    }

    /// Parse INI content into Config
    pub fn parse_ini(content: &str) -> Self {
        let mut config = Self::without_bindings();

        #[derive(PartialEq)]
        enum Section {
            Settings,
            Engine,
            Shortcuts,
            Other,
        }
        let mut section = Section::Other;

        for line in content.lines() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let name = &line[1..line.len() - 1];
                section = if name.eq_ignore_ascii_case("settings") {
                    Section::Settings
                } else if name.eq_ignore_ascii_case("engine") || name.eq_ignore_ascii_case("mpv") {
                    Section::Engine
                } else if name.eq_ignore_ascii_case("shortcuts") {
                    Section::Shortcuts
                } else {
                    Section::Other
                };
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();

            match section {
                Section::Shortcuts => {
                    let Some(action) = Action::from_str(key) else {
                        warn!(key = key.trim(), "unknown shortcut action");
                        continue;
                    };
                    // Value can be comma-separated for multiple bindings
                    for binding_str in value.split(',') {
                        match parse_input_binding(binding_str) {
                            Some(binding) => config.add_binding(binding, action),
                            None => warn!(binding = binding_str.trim(), "unknown key binding"),
                        }
                    }
                }
                Section::Settings => match key.trim().to_lowercase().as_str() {
                    "fullscreen_hide_delay" | "controls_hide_delay" => {
                        match value.parse::<f32>() {
                            Ok(v) if v.is_finite() => {
                                config.fullscreen_hide_delay = v.clamp(0.1, MAX_HIDE_DELAY);
                            }
                            _ => warn!(value, "invalid fullscreen_hide_delay"),
                        }
                    }
                    "poll_interval_ms" | "poll_interval" => {
                        if let Ok(v) = value.parse::<u64>() {
                            config.poll_interval_ms = v.clamp(50, 5000);
                        }
                    }
                    "recent_files_limit" | "recent_files" => {
                        if let Ok(v) = value.parse::<usize>() {
                            config.recent_files_limit = v.clamp(1, 50);
                        }
                    }
                    "skip_seconds" | "skip" => {
                        match value.parse::<f64>() {
                            Ok(v) if v.is_finite() => config.skip_seconds = v.clamp(1.0, 600.0),
                            _ => warn!(value, "invalid skip_seconds"),
                        }
                    }
                    _ => {}
                },
                Section::Engine => match key.trim().to_lowercase().as_str() {
                    "executable" | "mpv" => {
                        if !value.is_empty() {
                            config.engine_executable = value.to_string();
                        }
                    }
                    "resolver" | "ytdl_path" => {
                        if !value.is_empty() {
                            config.resolver = value.to_string();
                        }
                    }
                    "embed_video" | "embed" => {
                        if let Some(v) = parse_bool(value) {
                            config.embed_video = v;
                        }
                    }
                    "default_volume" | "volume" => {
                        if let Ok(v) = value.parse::<i64>() {
                            config.default_volume = v.clamp(0, 100);
                        }
                    }
                    "startup_timeout_ms" | "startup_timeout" => {
                        if let Ok(v) = value.parse::<u64>() {
                            config.startup_timeout_ms = v.clamp(100, 60_000);
                        }
                    }
                    _ => {}
                },
                Section::Other => {}
            }
        }

        // Fill in defaults for any missing actions
        let default_config = Config::default();
        for action in Action::ALL {
            if config.action_bindings.contains_key(&action) {
                continue;
            }
            for binding in default_config.get_bindings(action) {
                // A user binding for another action takes precedence
                if !config.bindings.contains_key(&binding) {
                    config.add_binding(binding, action);
                }
            }
        }

        config
    }

    /// Action bound to an input, if any
    pub fn action_for(&self, input: &InputBinding) -> Option<Action> {
        self.bindings.get(input).copied()
    }

    /// Get all bindings for an action
    pub fn get_bindings(&self, action: Action) -> Vec<InputBinding> {
        self.action_bindings
            .get(&action)
            .cloned()
            .unwrap_or_default()
    }

    /// Human-readable first binding of an action, for tooltips and menus
    pub fn shortcut_label(&self, action: Action) -> Option<String> {
        self.action_bindings
            .get(&action)
            .and_then(|list| list.first())
            .map(binding_label)
    }
}

fn binding_label(binding: &InputBinding) -> String {
    let key = binding.key().name();
    match binding {
        InputBinding::Key(_) => key.to_string(),
        InputBinding::KeyWithCtrl(_) => format!("Ctrl+{key}"),
        InputBinding::KeyWithShift(_) => format!("Shift+{key}"),
        InputBinding::KeyWithAlt(_) => format!("Alt+{key}"),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
