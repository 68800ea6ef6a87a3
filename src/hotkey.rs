//! Global hotkey detection.
//!
//! One process-wide `rdev` listener watches for the configured trigger key.
//! The callback only pushes a unit event onto an unbounded channel, so the
//! observer thread never blocks; rapid re-triggers therefore produce
//! overlapping pipeline runs rather than a queue.

use std::thread;

use rdev::{Event, EventType, Key, listen};
use tracing::{debug, error};

use crate::state::SharedState;

/// Maps a config key name to an `rdev` key. Function keys only; the
/// trigger is meant to be a key no application wants for itself.
pub fn parse_key(name: &str) -> Option<Key> {
    match name.to_lowercase().as_str() {
        "f1" => Some(Key::F1),
        "f2" => Some(Key::F2),
        "f3" => Some(Key::F3),
        "f4" => Some(Key::F4),
        "f5" => Some(Key::F5),
        "f6" => Some(Key::F6),
        "f7" => Some(Key::F7),
        "f8" => Some(Key::F8),
        "f9" => Some(Key::F9),
        "f10" => Some(Key::F10),
        "f11" => Some(Key::F11),
        "f12" => Some(Key::F12),
        _ => None,
    }
}

/// Start the global hotkey listener thread.
///
/// Sends one unit event per trigger key-down. The listener runs for the
/// process lifetime; after `state` is stopped the callback goes quiet.
pub fn start_hotkey_listener(trigger: Key, tx: flume::Sender<()>, state: SharedState) {
    thread::spawn(move || {
        let callback = move |event: Event| {
            if !state.is_running() {
                return;
            }
            if let EventType::KeyPress(key) = event.event_type {
                if key == trigger {
                    debug!("trigger key pressed");
                    let _ = tx.send(());
                }
            }
        };

        // Blocks this thread until the hook fails
        if let Err(e) = listen(callback) {
            error!("hotkey listener error: {e:?}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_function_keys_case_insensitively() {
        assert_eq!(parse_key("f9"), Some(Key::F9));
        assert_eq!(parse_key("F9"), Some(Key::F9));
        assert_eq!(parse_key("f12"), Some(Key::F12));
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("space"), None);
        assert_eq!(parse_key("f13"), None);
    }
}
