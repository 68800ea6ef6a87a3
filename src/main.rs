mod actuate;
mod assistant;
mod capture;
mod config;
mod hotkey;
mod locate;
mod logging;
mod ocr;
mod pipeline;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::actuate::DesktopActuator;
use crate::assistant::ChatAssistant;
use crate::capture::PrimaryDisplay;
use crate::config::Config;
use crate::ocr::TesseractExtractor;
use crate::state::{RuntimeState, SharedState};

#[derive(Parser)]
#[command(name = "glance")]
struct Cli {
    /// Path to the config file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline once and exit (no hotkey listener)
    Once,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config);
    logging::init(&config.log);

    let state = RuntimeState::new();
    let ctx = Arc::new(build_context(&config, state.clone())?);

    if matches!(cli.command, Some(Command::Once)) {
        let stage = pipeline::run(&ctx);
        info!("single run ended in stage '{stage}'");
        return Ok(());
    }

    let trigger = hotkey::parse_key(&config.hotkey.trigger)
        .with_context(|| format!("unknown trigger key '{}'", config.hotkey.trigger))?;

    let (trigger_tx, trigger_rx) = flume::unbounded::<()>();
    hotkey::start_hotkey_listener(trigger, trigger_tx, state.clone());

    {
        let state = state.clone();
        ctrlc::set_handler(move || state.stop()).context("failed to install interrupt handler")?;
    }

    info!(
        "ready: press {} to ask about the screen, ctrl-c to quit",
        config.hotkey.trigger
    );

    // Workers are fire-and-forget; a run still in flight when we stop is
    // left to finish on its own
    while state.is_running() {
        match trigger_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(()) => {
                info!("trigger received, dispatching pipeline run");
                let _ = pipeline::spawn(Arc::clone(&ctx));
            }
            Err(flume::RecvTimeoutError::Timeout) => continue,
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }
    }

    if let Some(hint) = state.last_hint() {
        info!("last located text was near ({}, {})", hint.x, hint.y);
    }
    info!("stopped");
    Ok(())
}

fn build_context(config: &Config, state: SharedState) -> Result<pipeline::Context> {
    Ok(pipeline::Context {
        grabber: Box::new(PrimaryDisplay),
        extractor: Box::new(TesseractExtractor::new(&config.ocr)),
        assistant: Box::new(ChatAssistant::new(&config.assistant)?),
        actuator: Box::new(DesktopActuator),
        state,
        pointer_move: Duration::from_millis(config.actuate.pointer_move_ms),
        paste_delay: Duration::from_millis(config.actuate.paste_delay_ms),
    })
}
