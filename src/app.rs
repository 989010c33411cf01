//! Main application module
//!
//! Owns the player session and wires it to eframe: input, widgets, dialogs
//! and viewport commands. Engine notifications are drained at the start of
//! every frame.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use raw_window_handle::{HasWindowHandle, RawWindowHandle};
use tracing::{debug, info};

use crate::config::{Action, Config};
use crate::engine::{EngineHandle, EngineOptions, Notifier};
use crate::input;
use crate::player::Player;
use crate::resolver::Resolver;
use crate::transport::TransportCommand;
use crate::ui::{self, StreamDialog, UiAction};

/// Extensions offered first in the open dialog
const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "webm", "avi", "mov", "wmv", "flv", "m4v", "mpg", "mpeg", "ts", "m2ts", "ogv",
    "3gp", "mp3", "flac", "wav", "ogg", "opus", "m4a", "aac", "wma", "m3u", "m3u8",
];

/// Native handle of the main window in the form mpv's `wid` expects.
fn native_window_id(cc: &eframe::CreationContext<'_>) -> Option<i64> {
    let handle = cc.window_handle().ok()?;
    match handle.as_raw() {
        RawWindowHandle::Win32(handle) => Some(handle.hwnd.get() as i64),
        RawWindowHandle::Xlib(handle) => Some(handle.window as i64),
        RawWindowHandle::Xcb(handle) => Some(handle.window.get() as i64),
        RawWindowHandle::AppKit(handle) => Some(handle.ns_view.as_ptr() as i64),
        other => {
            debug!(?other, "window system does not support embedding");
            None
        }
    }
}

pub struct PlayerApp {
    config: Config,
    player: Player<EngineHandle>,
    stream_dialog: StreamDialog,
    show_about: bool,
    /// Close already handled (engine stopped)
    closing: bool,
}

impl PlayerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: Config, initial: Option<String>) -> Self {
        let resolver = Resolver::locate(&config.resolver);

        let window_id = if config.embed_video {
            native_window_id(cc)
        } else {
            None
        };
        let ctx = cc.egui_ctx.clone();
        let notify: Notifier = Arc::new(move || ctx.request_repaint());
        let options = EngineOptions {
            executable: config.engine_executable.clone(),
            window_id,
            resolver: resolver.as_ref().map(|r| r.path().to_path_buf()),
            volume: config.default_volume,
            startup_timeout: config.startup_timeout(),
        };
        let engine = EngineHandle::start(options, notify);

        let mut player = Player::new(engine, resolver, &config);
        if let Some(source) = initial {
            player.open(&source);
        }

        Self {
            config,
            player,
            stream_dialog: StreamDialog::default(),
            show_about: false,
            closing: false,
        }
    }

    fn run_action(&mut self, ctx: &egui::Context, action: Action) {
        debug!(?action, "action");
        match action {
            Action::TogglePlay => self.player.run(TransportCommand::TogglePlay),
            Action::Stop => self.player.run(TransportCommand::Stop),
            Action::SkipBack => self.player.run(TransportCommand::SkipBack),
            Action::SkipForward => self.player.run(TransportCommand::SkipForward),
            Action::ToggleMute => self.player.run(TransportCommand::ToggleMute),
            Action::ToggleFullscreen => {
                let fullscreen = self.player.toggle_fullscreen(Instant::now());
                ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(fullscreen));
            }
            Action::ExitFullscreen => {
                if self.player.exit_fullscreen() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(false));
                }
            }
            Action::OpenFile => self.open_file_dialog(),
            Action::OpenStream => self.stream_dialog.open(),
            Action::Quit => ctx.send_viewport_cmd(egui::ViewportCommand::Close),
        }
    }

    fn apply(&mut self, ctx: &egui::Context, action: UiAction) {
        match action {
            UiAction::Run(action) => self.run_action(ctx, action),
            UiAction::OpenRecent(path) => self.player.play_file(&path),
            UiAction::ShowAbout => self.show_about = true,
            UiAction::SeekBegin(fraction) => self.player.begin_seek(fraction),
            UiAction::SeekUpdate(fraction) => self.player.update_seek(fraction),
            UiAction::SeekEnd => self.player.end_seek(),
            UiAction::SetVolume(volume) => self.player.run(TransportCommand::SetVolume(volume)),
        }
    }

    fn open_file_dialog(&mut self) {
        let picked: Option<PathBuf> = rfd::FileDialog::new()
            .set_title("Open Media File")
            .add_filter("Media Files", MEDIA_EXTENSIONS)
            .add_filter("All Files", &["*"])
            .pick_file();
        if let Some(path) = picked {
            self.player.play_file(&path);
        }
    }

    fn modal_open(&self) -> bool {
        self.stream_dialog.is_open() || self.show_about || self.player.current_notice().is_some()
    }

    fn draw_dialogs(&mut self, ctx: &egui::Context) {
        if let Some(url) = self.stream_dialog.show(ctx) {
            self.player.open_stream(&url);
        }

        if self.show_about {
            ui::about_dialog(ctx, &mut self.show_about);
        }

        if let Some(notice) = self.player.current_notice() {
            if ui::notice_dialog(ctx, notice) {
                self.player.dismiss_notice();
            }
        }
    }

    fn shutdown(&mut self) {
        if !self.closing {
            self.closing = true;
            info!("closing");
            self.player.shutdown();
        }
    }
}

impl eframe::App for PlayerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        if ctx.input(|i| i.viewport().close_requested()) {
            self.shutdown();
            return;
        }

        if let Some(engine) = self.player.engine() {
            let events = engine.drain_events();
            self.player.handle_events(events);
        }
        self.player.poll(now);

        if let Some(path) = input::dropped_file(ctx) {
            self.player.play_file(&path);
        }

        if !self.modal_open() {
            for action in input::shortcut_actions(ctx, &self.config) {
                self.run_action(ctx, action);
            }
        }

        let mut actions = Vec::new();

        if !self.player.is_fullscreen() {
            egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
                actions.extend(ui::menu_bar(ui, &self.player, &self.config));
            });
        }

        if self.player.controls_visible() {
            egui::TopBottomPanel::bottom("playbar")
                .frame(egui::Frame::none())
                .show(ctx, |ui| {
                    actions.extend(ui::playbar(ui, &self.player, &self.config));
                });
        }

        let hovering_video = egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| ui::video_area(ui, &self.player))
            .inner;

        if hovering_video && input::pointer_moved(ctx) {
            self.player.mouse_moved(now);
        }
        if self.player.tick(now) {
            debug!("control bar hidden");
        }

        for action in actions {
            self.apply(ctx, action);
        }

        self.draw_dialogs(ctx);

        ctx.request_repaint_after(self.player.next_wakeup(Instant::now()));
    }
}
