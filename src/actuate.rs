//! Clipboard, paste keystroke, and pointer output.
//!
//! OS handles are opened per call, never held across runs. The clipboard
//! and pointer stay global last-writer-wins resources shared with every
//! other application.

use std::fmt;
use std::thread;
use std::time::Duration;

use arboard::Clipboard;
use enigo::{Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use tracing::debug;

use crate::locate::PointerHint;

const POINTER_STEP_MS: u64 = 10;

/// Error type for actuation operations
#[derive(Debug)]
pub enum ActuateError {
    Input(String),
    Clipboard(String),
}

impl fmt::Display for ActuateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuateError::Input(msg) => write!(f, "input error: {msg}"),
            ActuateError::Clipboard(msg) => write!(f, "clipboard error: {msg}"),
        }
    }
}

impl std::error::Error for ActuateError {}

/// Output side of the pipeline: clipboard write, synthetic paste chord,
/// and the cosmetic pointer move.
pub trait Actuator: Send + Sync {
    fn set_clipboard(&self, text: &str) -> Result<(), ActuateError>;
    fn paste(&self) -> Result<(), ActuateError>;
    fn move_pointer(&self, target: PointerHint, duration: Duration) -> Result<(), ActuateError>;
}

/// Real desktop actuator backed by `arboard` and `enigo`.
pub struct DesktopActuator;

impl DesktopActuator {
    fn input() -> Result<Enigo, ActuateError> {
        Enigo::new(&Settings::default())
            .map_err(|e| ActuateError::Input(format!("failed to initialize input backend: {e}")))
    }

    /// Platform paste modifier (Cmd on macOS, Ctrl elsewhere)
    fn modifier_key() -> Key {
        #[cfg(target_os = "macos")]
        {
            Key::Meta
        }
        #[cfg(not(target_os = "macos"))]
        {
            Key::Control
        }
    }
}

impl Actuator for DesktopActuator {
    fn set_clipboard(&self, text: &str) -> Result<(), ActuateError> {
        Clipboard::new()
            .and_then(|mut clipboard| clipboard.set_text(text.to_string()))
            .map_err(|e| ActuateError::Clipboard(e.to_string()))
    }

    fn paste(&self) -> Result<(), ActuateError> {
        let mut input = Self::input()?;
        let modifier = Self::modifier_key();
        let key_err = |e: enigo::InputError| ActuateError::Input(e.to_string());

        input.key(modifier, Direction::Press).map_err(key_err)?;
        // Let the modifier register before the main key
        thread::sleep(Duration::from_millis(10));
        input.key(Key::Unicode('v'), Direction::Click).map_err(key_err)?;
        thread::sleep(Duration::from_millis(50));
        input.key(modifier, Direction::Release).map_err(key_err)?;
        debug!("paste chord sent");
        Ok(())
    }

    fn move_pointer(&self, target: PointerHint, duration: Duration) -> Result<(), ActuateError> {
        let mut input = Self::input()?;
        let move_err = |e: enigo::InputError| ActuateError::Input(e.to_string());

        let (start_x, start_y) = input.location().map_err(move_err)?;
        let steps = (duration.as_millis() as u64 / POINTER_STEP_MS).max(1);
        for step in 1..=steps {
            let t = step as f32 / steps as f32;
            let x = lerp(start_x, target.x, t);
            let y = lerp(start_y, target.y, t);
            input.move_mouse(x, y, Coordinate::Abs).map_err(move_err)?;
            thread::sleep(Duration::from_millis(POINTER_STEP_MS));
        }
        debug!("pointer moved to ({}, {})", target.x, target.y);
        Ok(())
    }
}

fn lerp(from: i32, to: i32, t: f32) -> i32 {
    from + ((to - from) as f32 * t).round() as i32
}
