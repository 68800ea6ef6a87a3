//! Shared runtime state - the lifecycle flag and the advisory pointer hint.
//!
//! Pass `SharedState` to components that need to read or modify state.
//! Both fields are best-effort: the hint is written by whichever run
//! located text last, and readers treat it as debugging information only.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::locate::PointerHint;

pub struct RuntimeState {
    /// Listener and wait loop keep going while this is set
    running: AtomicBool,
    /// Last located text position, advisory only
    last_hint: Mutex<Option<PointerHint>>,
}

impl RuntimeState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(true),
            last_hint: Mutex::new(None),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn set_last_hint(&self, hint: PointerHint) {
        if let Ok(mut slot) = self.last_hint.lock() {
            *slot = Some(hint);
        }
    }

    pub fn last_hint(&self) -> Option<PointerHint> {
        self.last_hint.lock().ok().and_then(|slot| *slot)
    }
}

/// Type alias for shared state
pub type SharedState = Arc<RuntimeState>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running_and_stops_once() {
        let state = RuntimeState::new();
        assert!(state.is_running());
        state.stop();
        assert!(!state.is_running());
        state.stop();
        assert!(!state.is_running());
    }

    #[test]
    fn last_hint_round_trips() {
        let state = RuntimeState::new();
        assert_eq!(state.last_hint(), None);
        state.set_last_hint(PointerHint { x: 12, y: 34 });
        assert_eq!(state.last_hint(), Some(PointerHint { x: 12, y: 34 }));
    }
}
