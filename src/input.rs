//! Input handling module
//!
//! Turns the frame's raw input into player actions:
//! - Keyboard shortcuts through the configured bindings
//! - Mouse movement, for the fullscreen auto-hide
//! - Files dropped onto the window

use std::path::PathBuf;

use crate::config::{Action, Config, InputBinding};

/// Actions that keep firing while their key is held
fn repeats(action: Action) -> bool {
    matches!(action, Action::SkipBack | Action::SkipForward)
}

/// Map key events to actions. Events are returned in the order pressed.
pub fn actions_for_events(events: &[egui::Event], config: &Config) -> Vec<Action> {
    events
        .iter()
        .filter_map(|event| match event {
            egui::Event::Key {
                key,
                pressed: true,
                repeat,
                modifiers,
                ..
            } => {
                let action = config.action_for(&InputBinding::from_press(*key, *modifiers))?;
                (!*repeat || repeats(action)).then_some(action)
            }
            _ => None,
        })
        .collect()
}

/// Shortcuts pressed this frame. Nothing fires while a text field has focus.
pub fn shortcut_actions(ctx: &egui::Context, config: &Config) -> Vec<Action> {
    if ctx.wants_keyboard_input() {
        return Vec::new();
    }
    ctx.input(|input| actions_for_events(&input.events, config))
}

/// True if the pointer moved this frame.
pub fn pointer_moved(ctx: &egui::Context) -> bool {
    ctx.input(|input| {
        input
            .events
            .iter()
            .any(|event| matches!(event, egui::Event::PointerMoved(_)))
    })
}

/// First file dropped onto the window this frame
pub fn dropped_file(ctx: &egui::Context) -> Option<PathBuf> {
    ctx.input(|input| {
        input
            .raw
            .dropped_files
            .iter()
            .find_map(|file| file.path.clone())
    })
}
