//! Session lifecycle state machine.
//!
//! Models the full lifecycle of one mirroring session, with validated
//! transitions that return `Result` instead of panicking.

use std::time::Instant;

use crate::error::LinkError;

// ── SessionPhase ─────────────────────────────────────────────────

/// The current phase of a mirroring session.
///
/// ```text
///  Idle ──► Probing ──► Starting ──► Plugged ◄──► Unplugged
///             │  ▲                      │             │
///             ▼  │                      ▼             ▼
///     AwaitingDevice                  Failed ──► Probing (retry)
///
///  Stopped is terminal and reachable from every phase.
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Not yet started. Initial state.
    #[default]
    Idle,

    /// Querying the device watcher for the dongle.
    Probing,

    /// No dongle enumerable; an interactive probe must be requested
    /// by the user.
    AwaitingDevice,

    /// Dongle found, `Start` sent; waiting for the phone to plug.
    Starting {
        /// When the start command was issued.
        since: Instant,
    },

    /// Phone attached; the display is live.
    Plugged,

    /// Phone detached; display hidden, session still wired.
    Unplugged,

    /// Unrecoverable protocol failure; a reload is (or was) pending.
    Failed,

    /// Explicitly stopped. Terminal state.
    Stopped,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Probing => write!(f, "Probing"),
            Self::AwaitingDevice => write!(f, "AwaitingDevice"),
            Self::Starting { .. } => write!(f, "Starting"),
            Self::Plugged => write!(f, "Plugged"),
            Self::Unplugged => write!(f, "Unplugged"),
            Self::Failed => write!(f, "Failed"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

impl SessionPhase {
    /// Returns `true` while the phone is attached and the display is
    /// visible.
    pub fn is_plugged(&self) -> bool {
        matches!(self, Self::Plugged)
    }

    /// Returns `true` once the session has been explicitly stopped.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns `true` while a session is wired to the dongle
    /// (started, whether or not a phone is attached).
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Starting { .. } | Self::Plugged | Self::Unplugged)
    }

    /// How long the session has been waiting for the phone to plug.
    ///
    /// Returns `None` outside the `Starting` phase.
    pub fn starting_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Starting { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Probing`.
    ///
    /// Valid from every phase except `Stopped`: mount, user-requested
    /// probes, the scheduled failure retry, and hot-unplug
    /// confirmation all re-enter the probe path.
    pub fn begin_probe(&mut self) -> Result<(), LinkError> {
        match self {
            Self::Stopped => Err(LinkError::InvalidTransition(
                "cannot probe after explicit stop",
            )),
            _ => {
                *self = Self::Probing;
                Ok(())
            }
        }
    }

    /// Transition to `Starting`.
    ///
    /// Valid from: `Probing`.
    pub fn device_found(&mut self) -> Result<(), LinkError> {
        match self {
            Self::Probing => {
                *self = Self::Starting {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(LinkError::InvalidTransition(
                "device found outside of Probing",
            )),
        }
    }

    /// Transition to `AwaitingDevice`.
    ///
    /// Valid from: `Probing`.
    pub fn device_missing(&mut self) -> Result<(), LinkError> {
        match self {
            Self::Probing => {
                *self = Self::AwaitingDevice;
                Ok(())
            }
            _ => Err(LinkError::InvalidTransition(
                "device missing outside of Probing",
            )),
        }
    }

    /// Transition to `Plugged`.
    ///
    /// Valid from: `Starting`, `Unplugged`.
    pub fn plugged(&mut self) -> Result<(), LinkError> {
        match self {
            Self::Starting { .. } | Self::Unplugged => {
                *self = Self::Plugged;
                Ok(())
            }
            _ => Err(LinkError::InvalidTransition(
                "plugged event outside of a live session",
            )),
        }
    }

    /// Transition to `Unplugged`.
    ///
    /// Valid from: `Starting` (phone never attached), `Plugged`.
    pub fn unplugged(&mut self) -> Result<(), LinkError> {
        match self {
            Self::Starting { .. } | Self::Plugged => {
                *self = Self::Unplugged;
                Ok(())
            }
            _ => Err(LinkError::InvalidTransition(
                "unplugged event outside of a live session",
            )),
        }
    }

    /// Transition back to a live phase after a failure proved
    /// transient (stream traffic resumed before the reload fired).
    ///
    /// Valid from: `Failed`.
    pub fn recover(&mut self, plugged: bool) -> Result<(), LinkError> {
        match self {
            Self::Failed => {
                *self = if plugged { Self::Plugged } else { Self::Unplugged };
                Ok(())
            }
            _ => Err(LinkError::InvalidTransition(
                "recovery outside of Failed",
            )),
        }
    }

    /// Transition to `Failed`.
    ///
    /// Valid from: any phase except `Stopped`.
    pub fn fail(&mut self) -> Result<(), LinkError> {
        match self {
            Self::Stopped => Err(LinkError::InvalidTransition(
                "failure after explicit stop",
            )),
            _ => {
                *self = Self::Failed;
                Ok(())
            }
        }
    }

    /// Transition to `Stopped`. Valid from any phase; idempotent
    /// stops are rejected so callers notice double teardown.
    pub fn stop(&mut self) -> Result<(), LinkError> {
        match self {
            Self::Stopped => Err(LinkError::InvalidTransition("already stopped")),
            _ => {
                *self = Self::Stopped;
                Ok(())
            }
        }
    }
}

// ── SessionStatus ────────────────────────────────────────────────

/// Snapshot published to the UI over a watch channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionStatus {
    /// Current lifecycle phase.
    pub phase: SessionPhase,
    /// `None` before the first probe completes.
    pub device_found: Option<bool>,
    /// Whether the phone is attached and the display is live.
    pub plugged: bool,
}

impl SessionStatus {
    /// The UI shows a loading/retry affordance while not plugged.
    pub fn is_loading(&self) -> bool {
        !self.plugged
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_lifecycle() {
        let mut phase = SessionPhase::Idle;

        phase.begin_probe().unwrap();
        assert_eq!(phase, SessionPhase::Probing);

        phase.device_found().unwrap();
        assert!(phase.starting_duration().is_some());
        assert!(phase.is_live());

        phase.plugged().unwrap();
        assert!(phase.is_plugged());

        phase.unplugged().unwrap();
        assert_eq!(phase, SessionPhase::Unplugged);
        assert!(phase.is_live());

        phase.plugged().unwrap();
        assert!(phase.is_plugged());

        phase.stop().unwrap();
        assert!(phase.is_stopped());
    }

    #[test]
    fn not_found_awaits_user_action() {
        let mut phase = SessionPhase::Idle;
        phase.begin_probe().unwrap();
        phase.device_missing().unwrap();
        assert_eq!(phase, SessionPhase::AwaitingDevice);

        // User-requested interactive probe re-enters Probing.
        phase.begin_probe().unwrap();
        assert_eq!(phase, SessionPhase::Probing);
    }

    #[test]
    fn failure_then_retry_probe() {
        let mut phase = SessionPhase::Plugged;
        phase.fail().unwrap();
        assert_eq!(phase, SessionPhase::Failed);
        phase.begin_probe().unwrap();
        assert_eq!(phase, SessionPhase::Probing);
    }

    #[test]
    fn transient_failure_recovers_to_live_phase() {
        let mut phase = SessionPhase::Plugged;
        phase.fail().unwrap();
        phase.recover(true).unwrap();
        assert_eq!(phase, SessionPhase::Plugged);

        let mut phase = SessionPhase::Unplugged;
        phase.fail().unwrap();
        phase.recover(false).unwrap();
        assert_eq!(phase, SessionPhase::Unplugged);

        // A recovered session accepts plug events again.
        phase.plugged().unwrap();
        assert!(phase.is_plugged());
    }

    #[test]
    fn recover_only_valid_from_failed() {
        let mut phase = SessionPhase::Plugged;
        assert!(phase.recover(true).is_err());
        let mut phase = SessionPhase::Probing;
        assert!(phase.recover(false).is_err());
    }

    #[test]
    fn hot_unplug_reprobe_from_live_session() {
        let mut phase = SessionPhase::Unplugged;
        phase.begin_probe().unwrap();
        assert_eq!(phase, SessionPhase::Probing);
    }

    #[test]
    fn invalid_transitions_rejected() {
        let mut phase = SessionPhase::Idle;
        assert!(phase.plugged().is_err());
        assert!(phase.device_found().is_err());

        let mut phase = SessionPhase::Probing;
        assert!(phase.unplugged().is_err());
        assert!(phase.plugged().is_err());
    }

    #[test]
    fn reprobe_while_probing_allowed() {
        // An attach event can land while a probe is already underway.
        let mut phase = SessionPhase::Probing;
        assert!(phase.begin_probe().is_ok());
        assert_eq!(phase, SessionPhase::Probing);
    }

    #[test]
    fn stop_is_terminal() {
        let mut phase = SessionPhase::Plugged;
        phase.stop().unwrap();
        assert!(phase.stop().is_err());
        assert!(phase.fail().is_err());
        assert!(phase.begin_probe().is_err());
    }

    #[test]
    fn unplugged_during_starting() {
        let mut phase = SessionPhase::Starting {
            since: Instant::now(),
        };
        phase.unplugged().unwrap();
        assert_eq!(phase, SessionPhase::Unplugged);
    }

    #[test]
    fn display_format() {
        assert_eq!(SessionPhase::Idle.to_string(), "Idle");
        assert_eq!(
            SessionPhase::Starting {
                since: Instant::now()
            }
            .to_string(),
            "Starting"
        );
        assert_eq!(SessionPhase::AwaitingDevice.to_string(), "AwaitingDevice");
    }

    #[test]
    fn status_loading_mirrors_plugged() {
        let status = SessionStatus::default();
        assert!(status.is_loading());
        let status = SessionStatus {
            phase: SessionPhase::Plugged,
            device_found: Some(true),
            plugged: true,
        };
        assert!(!status.is_loading());
    }
}
