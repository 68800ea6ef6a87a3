//! Screen capture for the primary display.

use anyhow::{Context as _, Result, bail};
use image::RgbaImage;
use tracing::debug;
use xcap::Monitor;

/// One screen grab per call. Implementations must be cheap to share across
/// worker threads; test doubles stand in for the OS capture API.
pub trait ScreenGrabber: Send + Sync {
    fn grab(&self) -> Result<RgbaImage>;
}

/// Captures the primary monitor's framebuffer with `xcap`.
pub struct PrimaryDisplay;

impl ScreenGrabber for PrimaryDisplay {
    fn grab(&self) -> Result<RgbaImage> {
        let monitors = Monitor::all().context("failed to enumerate monitors")?;
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .or_else(|| monitors.first())
            .context("no display device available")?;

        let frame = monitor.capture_image().context("screen grab failed")?;
        if frame.width() == 0 || frame.height() == 0 {
            bail!("captured an empty frame");
        }
        debug!("captured {}x{} frame", frame.width(), frame.height());
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires a display and screen recording permission"]
    fn grabs_primary_display() {
        let frame = PrimaryDisplay.grab().expect("grab failed");
        assert!(frame.width() > 0 && frame.height() > 0);
    }
}
