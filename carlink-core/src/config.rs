//! Session configuration sent to the dongle when a session starts.

use serde::{Deserialize, Serialize};

/// Display and timing parameters for one mirroring session.
///
/// This is the payload of the `Start` command — the dongle scales the
/// phone's video stream to `width`×`height` at `fps` and delays audio
/// by `media_delay` milliseconds to keep lip-sync with the decoded
/// video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Target video width in pixels.
    pub width: u32,
    /// Target video height in pixels.
    pub height: u32,
    /// Target frame rate.
    pub fps: u32,
    /// Audio delay in milliseconds applied by the dongle.
    pub media_delay: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
            fps: 60,
            media_delay: 300,
        }
    }
}

impl SessionConfig {
    /// Config for an explicit display size, keeping default timing.
    pub fn for_display(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.fps, 60);
        assert_eq!(cfg.media_delay, 300);
    }

    #[test]
    fn for_display_keeps_timing() {
        let cfg = SessionConfig::for_display(1280, 720);
        assert_eq!(cfg.width, 1280);
        assert_eq!(cfg.height, 720);
        assert_eq!(cfg.fps, 60);
    }
}
