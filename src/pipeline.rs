//! The capture -> extract -> query -> act pipeline.
//!
//! Each hotkey trigger dispatches one run to its own worker thread. Runs
//! are independent and never cancelled; the clipboard and pointer are
//! shared last-writer-wins resources, so overlapping runs race there and
//! the second writer wins.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::actuate::Actuator;
use crate::assistant::Assistant;
use crate::capture::ScreenGrabber;
use crate::locate;
use crate::ocr::TextExtractor;
use crate::state::SharedState;

/// Pipeline stages. A run advances strictly in order; a failure at any
/// step drops straight to `Failed` and terminates the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Capturing,
    Extracting,
    Querying,
    Copying,
    Locating,
    Pasting,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Capturing => "capturing",
            Stage::Extracting => "extracting",
            Stage::Querying => "querying",
            Stage::Copying => "copying",
            Stage::Locating => "locating",
            Stage::Pasting => "pasting",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Everything a run needs, constructed once at startup and shared across
/// worker threads. Stage implementations sit behind traits so tests can
/// substitute doubles for the OS and network.
pub struct Context {
    pub grabber: Box<dyn ScreenGrabber>,
    pub extractor: Box<dyn TextExtractor>,
    pub assistant: Box<dyn Assistant>,
    pub actuator: Box<dyn Actuator>,
    pub state: SharedState,
    pub pointer_move: Duration,
    pub paste_delay: Duration,
}

/// Dispatches a run to its own worker thread and returns immediately.
pub fn spawn(ctx: Arc<Context>) -> JoinHandle<Stage> {
    thread::spawn(move || run(&ctx))
}

fn enter(stage: Stage) {
    debug!("stage -> {stage}");
}

fn fail(stage: Stage, err: &dyn fmt::Display) -> Stage {
    error!("{stage} failed: {err}");
    Stage::Failed
}

/// Executes one full run and returns the terminal stage.
pub fn run(ctx: &Context) -> Stage {
    info!("pipeline run started");
    enter(Stage::Idle);

    enter(Stage::Capturing);
    let image = match ctx.grabber.grab() {
        Ok(image) => image,
        Err(e) => return fail(Stage::Capturing, &e),
    };

    enter(Stage::Extracting);
    let text = match ctx.extractor.extract(&image) {
        Ok(Some(text)) => text,
        // Nothing readable on screen is a valid end of the run, reached
        // before any network call
        Ok(None) => {
            info!("pipeline run finished: nothing to ask");
            return Stage::Done;
        }
        Err(e) => return fail(Stage::Extracting, &e),
    };

    enter(Stage::Querying);
    let answer = match ctx.assistant.ask(&text) {
        Ok(answer) => answer,
        Err(e) => return fail(Stage::Querying, &e),
    };

    enter(Stage::Copying);
    if let Err(e) = ctx.actuator.set_clipboard(&answer) {
        return fail(Stage::Copying, &e);
    }
    info!("answer copied to clipboard ({} characters)", answer.len());

    // Cosmetic: point at the text we read. Never fatal.
    enter(Stage::Locating);
    match locate::locate_text(&image) {
        Some(hint) => {
            ctx.state.set_last_hint(hint);
            if let Err(e) = ctx.actuator.move_pointer(hint, ctx.pointer_move) {
                warn!("pointer move failed: {e}");
            }
        }
        None => warn!("no text region located, leaving the pointer alone"),
    }

    enter(Stage::Pasting);
    thread::sleep(ctx.paste_delay);
    if let Err(e) = ctx.actuator.paste() {
        return fail(Stage::Pasting, &e);
    }

    info!("pipeline run finished");
    Stage::Done
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuate::ActuateError;
    use crate::locate::PointerHint;
    use crate::state::RuntimeState;
    use anyhow::{Result, anyhow};
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubGrabber {
        frame: Option<RgbaImage>,
    }

    impl ScreenGrabber for StubGrabber {
        fn grab(&self) -> Result<RgbaImage> {
            self.frame.clone().ok_or_else(|| anyhow!("no display"))
        }
    }

    struct StubExtractor {
        text: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl TextExtractor for StubExtractor {
        fn extract(&self, _img: &RgbaImage) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.map(str::to_string))
        }
    }

    struct StubAssistant {
        answer: Option<&'static str>,
        calls: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Assistant for StubAssistant {
        fn ask(&self, text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(text.to_string());
            self.answer
                .map(str::to_string)
                .ok_or_else(|| anyhow!("quota exceeded"))
        }
    }

    struct RecordingActuator {
        actions: Arc<Mutex<Vec<String>>>,
        fail_paste: bool,
    }

    impl Actuator for RecordingActuator {
        fn set_clipboard(&self, text: &str) -> Result<(), ActuateError> {
            self.actions.lock().unwrap().push(format!("copy:{text}"));
            Ok(())
        }

        fn paste(&self) -> Result<(), ActuateError> {
            if self.fail_paste {
                return Err(ActuateError::Input("focus lost".to_string()));
            }
            self.actions.lock().unwrap().push("paste".to_string());
            Ok(())
        }

        fn move_pointer(
            &self,
            target: PointerHint,
            _duration: Duration,
        ) -> Result<(), ActuateError> {
            self.actions
                .lock()
                .unwrap()
                .push(format!("move:{},{}", target.x, target.y));
            Ok(())
        }
    }

    struct Probes {
        extract_calls: Arc<AtomicUsize>,
        ask_calls: Arc<AtomicUsize>,
        asked: Arc<Mutex<Vec<String>>>,
        actions: Arc<Mutex<Vec<String>>>,
    }

    fn blank_frame() -> RgbaImage {
        RgbaImage::from_pixel(64, 64, Rgba([0, 0, 0, 255]))
    }

    /// Frame with one bright block so the locator has something to find
    fn block_frame() -> RgbaImage {
        let mut frame = RgbaImage::from_pixel(200, 160, Rgba([0, 0, 0, 255]));
        for y in 40..100 {
            for x in 60..140 {
                frame.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        frame
    }

    fn context(
        frame: Option<RgbaImage>,
        text: Option<&'static str>,
        answer: Option<&'static str>,
        fail_paste: bool,
    ) -> (Arc<Context>, Probes) {
        let probes = Probes {
            extract_calls: Arc::new(AtomicUsize::new(0)),
            ask_calls: Arc::new(AtomicUsize::new(0)),
            asked: Arc::new(Mutex::new(Vec::new())),
            actions: Arc::new(Mutex::new(Vec::new())),
        };
        let ctx = Arc::new(Context {
            grabber: Box::new(StubGrabber { frame }),
            extractor: Box::new(StubExtractor {
                text,
                calls: Arc::clone(&probes.extract_calls),
            }),
            assistant: Box::new(StubAssistant {
                answer,
                calls: Arc::clone(&probes.ask_calls),
                seen: Arc::clone(&probes.asked),
            }),
            actuator: Box::new(RecordingActuator {
                actions: Arc::clone(&probes.actions),
                fail_paste,
            }),
            state: RuntimeState::new(),
            pointer_move: Duration::from_millis(1),
            paste_delay: Duration::from_millis(1),
        });
        (ctx, probes)
    }

    #[test]
    fn empty_extraction_halts_before_any_query() {
        let (ctx, probes) = context(Some(blank_frame()), None, Some("unused"), false);
        assert_eq!(run(&ctx), Stage::Done);
        assert_eq!(probes.ask_calls.load(Ordering::SeqCst), 0);
        assert!(probes.actions.lock().unwrap().is_empty());
    }

    #[test]
    fn full_run_copies_then_pastes() {
        let (ctx, probes) = context(Some(blank_frame()), Some("what is 6 x 7"), Some("42"), false);
        assert_eq!(run(&ctx), Stage::Done);
        assert_eq!(probes.asked.lock().unwrap().as_slice(), ["what is 6 x 7"]);
        // Blank frame: the locator finds nothing, so no pointer move
        assert_eq!(probes.actions.lock().unwrap().as_slice(), ["copy:42", "paste"]);
        assert_eq!(ctx.state.last_hint(), None);
    }

    #[test]
    fn located_text_records_hint_and_moves_pointer() {
        let (ctx, probes) = context(Some(block_frame()), Some("question"), Some("answer"), false);
        assert_eq!(run(&ctx), Stage::Done);
        let hint = ctx.state.last_hint().expect("no hint recorded");
        assert!((hint.x - 100).abs() <= 3 && (hint.y - 70).abs() <= 3);
        let actions = probes.actions.lock().unwrap();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0], "copy:answer");
        assert!(actions[1].starts_with("move:"));
        assert_eq!(actions[2], "paste");
    }

    #[test]
    fn capture_failure_fails_the_run_before_extraction() {
        let (ctx, probes) = context(None, Some("text"), Some("answer"), false);
        assert_eq!(run(&ctx), Stage::Failed);
        assert_eq!(probes.extract_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn assistant_failure_leaves_the_clipboard_untouched() {
        let (ctx, probes) = context(Some(blank_frame()), Some("text"), None, false);
        assert_eq!(run(&ctx), Stage::Failed);
        assert!(probes.actions.lock().unwrap().is_empty());
    }

    #[test]
    fn paste_failure_fails_the_run_without_panicking() {
        let (ctx, probes) = context(Some(blank_frame()), Some("text"), Some("answer"), true);
        assert_eq!(run(&ctx), Stage::Failed);
        assert_eq!(probes.actions.lock().unwrap().as_slice(), ["copy:answer"]);
    }

    #[test]
    fn overlapping_runs_both_reach_a_terminal_stage() {
        let (ctx, probes) = context(Some(blank_frame()), Some("text"), Some("answer"), false);
        let first = spawn(Arc::clone(&ctx));
        let second = spawn(Arc::clone(&ctx));
        assert_eq!(first.join().unwrap(), Stage::Done);
        assert_eq!(second.join().unwrap(), Stage::Done);
        let actions = probes.actions.lock().unwrap();
        assert_eq!(actions.iter().filter(|a| *a == "paste").count(), 2);
    }
}
