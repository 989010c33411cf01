//! BlitzPlayer: lightweight desktop media player
//! Built with Rust + egui (eframe) on top of mpv, streaming through yt-dlp

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod autohide;
mod config;
mod engine;
mod input;
mod playback;
mod player;
mod recent;
mod resolver;
mod transport;
mod ui;

use std::path::{Path, PathBuf};

use eframe::egui;
use tracing_subscriber::EnvFilter;

use app::PlayerApp;
use config::Config;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("blitzplayer=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Command-line source made absolute, so recent entries stay valid.
fn resolve_source(arg: &str, cwd: &Path) -> String {
    if player::is_remote(arg) || player::file_url_path(arg).is_some() {
        return arg.to_string();
    }
    let path = PathBuf::from(arg);
    if path.is_absolute() {
        arg.to_string()
    } else {
        cwd.join(path).to_string_lossy().into_owned()
    }
}

fn main() -> eframe::Result<()> {
    init_logging();

    let config = Config::load();
    let initial = std::env::args().nth(1).map(|arg| {
        let cwd = std::env::current_dir().unwrap_or_default();
        resolve_source(&arg, &cwd)
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("BlitzPlayer")
            .with_icon(build_app_icon())
            .with_min_inner_size([480.0, 350.0])
            .with_inner_size([900.0, 600.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "BlitzPlayer",
        options,
        Box::new(move |cc| Ok(Box::new(PlayerApp::new(cc, config, initial)))),
    )
}

/// Procedural icon: a white play triangle inside a ring.
fn build_app_icon() -> egui::IconData {
    let w: usize = 64;
    let h: usize = 64;
    let mut rgba = vec![0u8; w * h * 4];

    let set_px = |rgba: &mut [u8], x: usize, y: usize, a: u8| {
        let idx = (y * w + x) * 4;
        rgba[idx] = 255;
        rgba[idx + 1] = 255;
        rgba[idx + 2] = 255;
        rgba[idx + 3] = a;
    };

    let cx = w as f32 / 2.0;
    let cy = h as f32 / 2.0;
    for y in 0..h {
        for x in 0..w {
            let fx = x as f32 + 0.5;
            let fy = y as f32 + 0.5;

            let r = ((fx - cx) * (fx - cx) + (fy - cy) * (fy - cy)).sqrt();
            let on_ring = (r - 27.0).abs() < 2.2;

            // Triangle pointing right, centred slightly right of the middle
            let left = cx - 9.0;
            let right = cx + 13.0;
            let half = (right - fx) / (right - left) * 13.0;
            let in_triangle = fx >= left && fx <= right && (fy - cy).abs() <= half;

            if on_ring || in_triangle {
                set_px(&mut rgba, x, y, 235);
            }
        }
    }

    egui::IconData {
        rgba,
        width: w as u32,
        height: h as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_are_made_absolute() {
        let cwd = Path::new("/home/user/videos");
        assert_eq!(
            resolve_source("clip.mkv", cwd),
            Path::new("/home/user/videos/clip.mkv").to_string_lossy()
        );
    }

    #[test]
    fn urls_pass_through() {
        let url = "https://www.youtube.com/watch?v=abc";
        assert_eq!(resolve_source(url, Path::new("/tmp")), url);
    }

    #[test]
    fn file_urls_pass_through() {
        let url = "file:///home/user/clip.mkv";
        assert_eq!(resolve_source(url, Path::new("/tmp")), url);
    }

    #[test]
    fn icon_has_visible_pixels() {
        let icon = build_app_icon();
        assert_eq!(icon.rgba.len(), 64 * 64 * 4);
        assert!(icon.rgba.chunks(4).any(|px| px[3] > 0));
    }
}
