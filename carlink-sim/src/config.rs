//! Harness configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use carlink_core::SessionConfig;

/// Top-level configuration for the session harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Session/display settings forwarded to the dongle.
    pub session: SessionConfig,
    /// Audio feature switches.
    pub audio: AudioConfig,
    /// Scripted dongle behavior.
    pub dongle: DongleConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Audio feature switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Open cpal playback sinks for simulated streams.
    pub playback: bool,
    /// Acquire the microphone at mount.
    pub capture: bool,
}

/// Scripted dongle behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DongleConfig {
    /// Seconds of simulated session before an injected failure;
    /// 0 disables failure injection.
    pub fail_after_secs: u64,
    /// Simulated audio chunk cadence in milliseconds.
    pub audio_interval_ms: u64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            audio: AudioConfig::default(),
            dongle: DongleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            playback: false,
            capture: false,
        }
    }
}

impl Default for DongleConfig {
    fn default() -> Self {
        Self {
            fail_after_secs: 0,
            audio_interval_ms: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl SimConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
