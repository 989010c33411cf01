//! Widgets: menu bar, control bar, video area and dialogs.
//!
//! Drawing functions only report what the user did as [`UiAction`]s; the app
//! applies them after the frame's widgets are laid out.

use std::path::PathBuf;

use crate::config::{Action, Config};
use crate::engine::EngineControl;
use crate::player::{Notice, Player};
use crate::playback::format_time;
use crate::recent;

const BAR_FILL: egui::Color32 = egui::Color32::from_rgba_premultiplied(30, 30, 30, 235);
const VIDEO_FILL: egui::Color32 = egui::Color32::from_rgb(17, 17, 17);
const GLYPH_SIZE: f32 = 18.0;

pub const ABOUT_TEXT: &str = "BlitzPlayer v1.0\nBuilt with Rust + egui + mpv + yt-dlp";

/// What the user asked for this frame
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    Run(Action),
    OpenRecent(PathBuf),
    ShowAbout,
    SeekBegin(f64),
    SeekUpdate(f64),
    SeekEnd,
    SetVolume(i64),
}

fn tooltip(config: &Config, label: &str, action: Action) -> String {
    match config.shortcut_label(action) {
        Some(shortcut) => format!("{label} ({shortcut})"),
        None => label.to_string(),
    }
}

fn menu_item(ui: &mut egui::Ui, config: &Config, label: &str, action: Action) -> bool {
    let mut button = egui::Button::new(label);
    if let Some(shortcut) = config.shortcut_label(action) {
        button = button.shortcut_text(shortcut);
    }
    let clicked = ui.add(button).clicked();
    if clicked {
        ui.close_menu();
    }
    clicked
}

pub fn menu_bar<E: EngineControl>(
    ui: &mut egui::Ui,
    player: &Player<E>,
    config: &Config,
) -> Vec<UiAction> {
    let mut actions = Vec::new();

    egui::menu::bar(ui, |ui| {
        ui.menu_button("File", |ui| {
            if menu_item(ui, config, "Open File", Action::OpenFile) {
                actions.push(UiAction::Run(Action::OpenFile));
            }
            ui.menu_button("Recent Files", |ui| {
                if player.recent().is_empty() {
                    ui.add_enabled(false, egui::Button::new("(No Recent Files)"));
                }
                for path in player.recent().iter() {
                    let response = ui
                        .button(recent::display_name(path))
                        .on_hover_text(path.display().to_string());
                    if response.clicked() {
                        actions.push(UiAction::OpenRecent(path.to_path_buf()));
                        ui.close_menu();
                    }
                }
            });
            ui.separator();
            if menu_item(ui, config, "Quit", Action::Quit) {
                actions.push(UiAction::Run(Action::Quit));
            }
        });

        ui.menu_button("Stream", |ui| {
            if menu_item(ui, config, "Open Stream URL", Action::OpenStream) {
                actions.push(UiAction::Run(Action::OpenStream));
            }
        });

        ui.menu_button("About", |ui| {
            if ui.button("About BlitzPlayer").clicked() {
                actions.push(UiAction::ShowAbout);
                ui.close_menu();
            }
        });
    });

    actions
}

fn glyph_button(ui: &mut egui::Ui, glyph: &str, hover: String) -> bool {
    ui.add(
        egui::Button::new(egui::RichText::new(glyph).size(GLYPH_SIZE))
            .min_size(egui::vec2(32.0, 28.0))
            .frame(false),
    )
    .on_hover_text(hover)
    .clicked()
}

/// The control bar: transport buttons, seek bar, times and volume.
pub fn playbar<E: EngineControl>(
    ui: &mut egui::Ui,
    player: &Player<E>,
    config: &Config,
) -> Vec<UiAction> {
    let mut actions = Vec::new();
    let mirror = player.mirror();
    let skip = player.skip_seconds();

    egui::Frame::none()
        .fill(BAR_FILL)
        .inner_margin(egui::Margin::symmetric(12.0, 6.0))
        .show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.spacing_mut().item_spacing.x = 6.0;

                if glyph_button(ui, "📂", tooltip(config, "Open File", Action::OpenFile)) {
                    actions.push(UiAction::Run(Action::OpenFile));
                }
                if glyph_button(ui, "⏮", tooltip(config, &format!("Back {skip}s"), Action::SkipBack)) {
                    actions.push(UiAction::Run(Action::SkipBack));
                }
                let play_glyph = if mirror.paused() { "▶" } else { "⏸" };
                if glyph_button(ui, play_glyph, tooltip(config, "Play/Pause", Action::TogglePlay)) {
                    actions.push(UiAction::Run(Action::TogglePlay));
                }
                if glyph_button(ui, "⏹", tooltip(config, "Stop", Action::Stop)) {
                    actions.push(UiAction::Run(Action::Stop));
                }
                if glyph_button(ui, "⏭", tooltip(config, &format!("Forward {skip}s"), Action::SkipForward)) {
                    actions.push(UiAction::Run(Action::SkipForward));
                }

                ui.label(
                    egui::RichText::new(format_time(mirror.display_position()))
                        .monospace()
                        .color(egui::Color32::WHITE),
                );

                // Right-hand group, laid out from the edge inwards
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let fullscreen_glyph = if player.is_fullscreen() { "🗗" } else { "⛶" };
                    if glyph_button(ui, fullscreen_glyph, tooltip(config, "Fullscreen", Action::ToggleFullscreen)) {
                        actions.push(UiAction::Run(Action::ToggleFullscreen));
                    }

                    let mut volume = player.volume();
                    ui.spacing_mut().slider_width = 90.0;
                    let response = ui
                        .add(egui::Slider::new(&mut volume, 0..=100).show_value(false))
                        .on_hover_text(format!("Volume {volume}%"));
                    if response.changed() {
                        actions.push(UiAction::SetVolume(volume));
                    }

                    let mute_glyph = if mirror.muted() { "🔇" } else { "🔊" };
                    if glyph_button(ui, mute_glyph, tooltip(config, "Mute", Action::ToggleMute)) {
                        actions.push(UiAction::Run(Action::ToggleMute));
                    }

                    ui.label(
                        egui::RichText::new(format_time(mirror.duration()))
                            .monospace()
                            .color(egui::Color32::GRAY),
                    );

                    // Seek bar takes whatever is left
                    ui.with_layout(egui::Layout::left_to_right(egui::Align::Center), |ui| {
                        let mut fraction = mirror.slider_fraction();
                        ui.spacing_mut().slider_width = ui.available_width().max(40.0);
                        let response = ui.add(
                            egui::Slider::new(&mut fraction, 0.0..=1.0)
                                .show_value(false)
                                .trailing_fill(true),
                        );
                        if response.drag_started() {
                            actions.push(UiAction::SeekBegin(fraction));
                        } else if response.dragged() && response.changed() {
                            actions.push(UiAction::SeekUpdate(fraction));
                        }
                        if response.drag_stopped() {
                            actions.push(UiAction::SeekUpdate(fraction));
                            actions.push(UiAction::SeekEnd);
                        } else if response.clicked() {
                            actions.push(UiAction::SeekBegin(fraction));
                            actions.push(UiAction::SeekEnd);
                        }
                    });
                });
            });
        });

    actions
}

/// Fill the video area. Returns true if the pointer is over it.
pub fn video_area<E: EngineControl>(ui: &mut egui::Ui, player: &Player<E>) -> bool {
    let rect = ui.max_rect();
    let response = ui.allocate_rect(rect, egui::Sense::hover());
    ui.painter().rect_filled(rect, 0.0, VIDEO_FILL);

    if player.engine().is_none() {
        ui.painter().text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            "Media engine unavailable",
            egui::FontId::proportional(16.0),
            egui::Color32::GRAY,
        );
    }

    if player.mirror().loading_visible() {
        loading_overlay(ui, rect);
    }

    response.hovered()
}

/// Dimmed cover with a spinner while a stream resolves.
pub fn loading_overlay(ui: &mut egui::Ui, rect: egui::Rect) {
    ui.painter()
        .rect_filled(rect, 0.0, egui::Color32::from_black_alpha(150));
    let size = 48.0;
    let spinner_rect = egui::Rect::from_center_size(rect.center(), egui::vec2(size, size));
    ui.put(spinner_rect, egui::Spinner::new().size(size));
    ui.ctx().request_repaint();
}

fn dialog(title: &str, id: &str) -> egui::Window<'static> {
    egui::Window::new(title.to_string())
        .id(egui::Id::new(id))
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
}

/// Show the front notice. Returns true once it is dismissed.
pub fn notice_dialog(ctx: &egui::Context, notice: &Notice) -> bool {
    let mut dismissed = false;
    dialog(&notice.title, "notice").show(ctx, |ui| {
        ui.set_min_width(320.0);
        ui.label(notice.body.as_str());
        ui.add_space(8.0);
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
            if ui.button("OK").clicked() {
                dismissed = true;
            }
        });
    });
    dismissed
}

pub fn about_dialog(ctx: &egui::Context, open: &mut bool) {
    let mut close = false;
    dialog("About BlitzPlayer", "about").show(ctx, |ui| {
        ui.label(ABOUT_TEXT);
        ui.add_space(8.0);
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
            if ui.button("OK").clicked() {
                close = true;
            }
        });
    });
    if close {
        *open = false;
    }
}

/// "Open Stream URL" prompt
#[derive(Debug, Default)]
pub struct StreamDialog {
    open: bool,
    url: String,
    focus_pending: bool,
}

impl StreamDialog {
    pub fn open(&mut self) {
        self.open = true;
        self.url.clear();
        self.focus_pending = true;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Draw the prompt. Returns the trimmed URL when accepted.
    pub fn show(&mut self, ctx: &egui::Context) -> Option<String> {
        if !self.open {
            return None;
        }

        let mut accepted = false;
        let mut cancelled = false;
        dialog("Open Stream URL", "open_stream").show(ctx, |ui| {
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.url)
                    .hint_text("Enter stream URL (YouTube, Twitch, etc.)")
                    .desired_width(380.0),
            );
            if self.focus_pending {
                response.request_focus();
                self.focus_pending = false;
            }
            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                accepted = true;
            }

            ui.add_space(8.0);
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
                if ui.button("Cancel").clicked() {
                    cancelled = true;
                }
                if ui.button("OK").clicked() {
                    accepted = true;
                }
            });
        });
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            cancelled = true;
        }

        if accepted {
            self.open = false;
            return Some(self.url.trim().to_string());
        }
        if cancelled {
            self.open = false;
        }
        None
    }
}
