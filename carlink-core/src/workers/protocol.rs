//! Protocol worker boundary.
//!
//! The wire-level dongle session runs in its own execution context: a
//! spawned task driving a [`DongleDriver`] implementation. This module
//! owns only the boundary — the typed command/event channels, the
//! spawn plumbing, and the [`ProtocolHandle`] the controller uses to
//! talk across it. Driver failures are never swallowed here; they are
//! surfaced to the orchestrator as a [`ProtocolEvent::Failure`].

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

use crate::audio::{PcmChunk, SharedPcmRing};
use crate::channel::Endpoint;
use crate::config::SessionConfig;
use crate::error::LinkError;
use crate::messages::{AudioStreamKey, ProtocolCommand, ProtocolEvent, TouchEvent, VideoFrame};

/// Command/event queue depth across the worker boundary.
const BOUNDARY_CAPACITY: usize = 64;

// ── DongleDriver ─────────────────────────────────────────────────

/// Channels handed to a driver when its worker context starts.
pub struct ProtocolContext {
    /// Commands from the controller, in send order.
    pub commands: mpsc::Receiver<ProtocolCommand>,
    /// Events toward the controller, delivered in protocol order.
    pub events: mpsc::Sender<ProtocolEvent>,
}

/// The wire-level session implementation, injected from outside the
/// core. Runs until the command channel closes or the session is
/// unrecoverable.
#[async_trait]
pub trait DongleDriver: Send + 'static {
    async fn run(self: Box<Self>, ctx: ProtocolContext) -> Result<(), LinkError>;
}

// ── ProtocolWorker ───────────────────────────────────────────────

/// A spawned protocol worker: its task handle and event stream.
pub struct ProtocolWorker {
    pub handle: ProtocolHandle,
    pub events: mpsc::Receiver<ProtocolEvent>,
    pub task: JoinHandle<()>,
}

impl ProtocolWorker {
    /// Spawn the worker context around a driver.
    pub fn spawn(driver: Box<dyn DongleDriver>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(BOUNDARY_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(BOUNDARY_CAPACITY);

        let failure_tx = event_tx.clone();
        let task = tokio::spawn(async move {
            let ctx = ProtocolContext {
                commands: command_rx,
                events: event_tx,
            };
            if let Err(e) = driver.run(ctx).await {
                error!("dongle driver failed: {e}");
                let _ = failure_tx.send(ProtocolEvent::Failure).await;
            }
        });

        Self {
            handle: ProtocolHandle {
                tx: command_tx,
                initialised: false,
            },
            events: event_rx,
            task,
        }
    }
}

// ── ProtocolHandle ───────────────────────────────────────────────

/// Controller-side sender for the worker boundary.
///
/// Enforces the one-time channel handoff: `initialise` consumes the
/// endpoints and refuses to run twice.
pub struct ProtocolHandle {
    tx: mpsc::Sender<ProtocolCommand>,
    initialised: bool,
}

impl ProtocolHandle {
    /// Transfer the worker's channel endpoints. Must be called exactly
    /// once, before `start`.
    pub async fn initialise(
        &mut self,
        video: Endpoint<VideoFrame>,
        microphone: Endpoint<PcmChunk>,
    ) -> Result<(), LinkError> {
        if self.initialised {
            return Err(LinkError::AlreadyInitialised);
        }
        self.tx
            .send(ProtocolCommand::Initialise { video, microphone })
            .await?;
        self.initialised = true;
        Ok(())
    }

    /// Begin a session with the given configuration.
    pub async fn start(&self, config: SessionConfig) -> Result<(), LinkError> {
        self.tx.send(ProtocolCommand::Start { config }).await?;
        Ok(())
    }

    /// End the session.
    pub async fn stop(&self) -> Result<(), LinkError> {
        self.tx.send(ProtocolCommand::Stop).await?;
        Ok(())
    }

    /// Register playback backing storage for a stream.
    pub async fn register_buffer(
        &self,
        key: AudioStreamKey,
        ring: SharedPcmRing,
    ) -> Result<(), LinkError> {
        self.tx
            .send(ProtocolCommand::RegisterBuffer { key, ring })
            .await?;
        Ok(())
    }

    /// Forward a normalized touch command.
    pub async fn touch(&self, event: TouchEvent) -> Result<(), LinkError> {
        self.tx.send(ProtocolCommand::Touch(event)).await?;
        Ok(())
    }

    /// A raw command sender for components that issue their own
    /// boundary messages (the audio pipeline's buffer registration).
    pub fn sender(&self) -> mpsc::Sender<ProtocolCommand> {
        self.tx.clone()
    }
}

// ── Tests ────────────────────────────────────────────────────────
