//! Session orchestration.
//!
//! The orchestrator is the only component with cross-cutting knowledge
//! of the others: it wires the media channels to the workers, drives
//! the hot-plug/retry state machine, and routes events between the
//! protocol worker, the audio pipeline, and the touch path. It runs as
//! a single event loop; everything it waits on is a channel.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioPipeline, PipelineOptions};
use crate::channel::MediaChannelPair;
use crate::config::SessionConfig;
use crate::device::{DeviceEvent, DeviceWatcher};
use crate::error::LinkError;
use crate::messages::{AudioMetadata, DongleCommand, ProtocolEvent, RenderInit};
use crate::session::state::{SessionPhase, SessionStatus};
use crate::touch::{PointerEvent, TouchNormalizer};
use crate::workers::protocol::{DongleDriver, ProtocolHandle, ProtocolWorker};
use crate::workers::render::{DrawSurface, RenderWorker};

// ── Options ──────────────────────────────────────────────────────

/// Backoff before a full session reload after a protocol failure.
pub const RETRY_DELAY: Duration = Duration::from_secs(30);

/// Orchestrator policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub audio: PipelineOptions,
    /// Failure-reload backoff. [`RETRY_DELAY`] unless overridden
    /// (tests use short delays).
    pub retry_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            audio: PipelineOptions::default(),
            retry_delay: RETRY_DELAY,
        }
    }
}

// ── Control messages ─────────────────────────────────────────────

/// Requests into the orchestrator loop from the owning context.
enum ControlMsg {
    /// Probe for the dongle; interactive on explicit user action.
    Probe { interactive: bool },
    /// Raw pointer input from the display surface.
    Touch(PointerEvent),
    /// The display surface became available; spawn the render worker.
    AttachSurface(Box<dyn DrawSurface>),
    /// The failure backoff elapsed.
    RetryElapsed,
    /// Explicit stop.
    Stop,
}

// ── SessionHandle ────────────────────────────────────────────────

/// Cloneable handle for driving a running orchestrator.
#[derive(Clone)]
pub struct SessionHandle {
    control: mpsc::Sender<ControlMsg>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    /// Request a probe; `interactive` for first-time pairing.
    pub async fn check_device(&self, interactive: bool) -> Result<(), LinkError> {
        self.control
            .send(ControlMsg::Probe { interactive })
            .await
            .map_err(Into::into)
    }

    /// Forward a raw pointer event.
    pub async fn send_touch(&self, event: PointerEvent) -> Result<(), LinkError> {
        self.control
            .send(ControlMsg::Touch(event))
            .await
            .map_err(Into::into)
    }

    /// Hand the display surface to the render worker. One-way: the
    /// surface is unreachable from the caller afterwards.
    pub async fn attach_surface(&self, surface: Box<dyn DrawSurface>) -> Result<(), LinkError> {
        self.control
            .send(ControlMsg::AttachSurface(surface))
            .await
            .map_err(Into::into)
    }

    /// Stop the session and end the orchestrator loop.
    pub async fn stop(&self) -> Result<(), LinkError> {
        self.control
            .send(ControlMsg::Stop)
            .await
            .map_err(Into::into)
    }

    /// Subscribe to status snapshots.
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }
}

// ── Orchestrator ─────────────────────────────────────────────────

/// Owns one mirroring session end to end.
pub struct Orchestrator {
    config: SessionConfig,
    options: SessionOptions,
    phase: SessionPhase,
    device_found: Option<bool>,
    /// Phone attachment, driven solely by `Plugged`/`Unplugged`
    /// events (and session teardown) so the failure/reload path can
    /// never strand it.
    plugged: bool,

    watcher: Box<dyn DeviceWatcher>,
    protocol: ProtocolHandle,
    events: mpsc::Receiver<ProtocolEvent>,
    channels: MediaChannelPair,
    render: Option<RenderWorker>,
    audio: AudioPipeline,
    touch: TouchNormalizer,

    pending_retry: Option<JoinHandle<()>>,

    control_tx: mpsc::Sender<ControlMsg>,
    control_rx: mpsc::Receiver<ControlMsg>,
    status_tx: watch::Sender<SessionStatus>,
}

impl Orchestrator {
    /// Build an orchestrator around a device watcher and a dongle
    /// driver. The protocol worker is spawned immediately; channel
    /// handoff happens when [`run`](Self::run) mounts the session.
    pub fn new(
        config: SessionConfig,
        options: SessionOptions,
        watcher: Box<dyn DeviceWatcher>,
        driver: Box<dyn DongleDriver>,
    ) -> (Self, SessionHandle) {
        let worker = ProtocolWorker::spawn(driver);
        let audio = AudioPipeline::new(worker.handle.sender(), options.audio);
        let (control_tx, control_rx) = mpsc::channel(32);
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());

        let handle = SessionHandle {
            control: control_tx.clone(),
            status: status_rx,
        };

        let orchestrator = Self {
            touch: TouchNormalizer::new(config.width, config.height),
            config,
            options,
            phase: SessionPhase::Idle,
            device_found: None,
            plugged: false,
            watcher,
            protocol: worker.handle,
            events: worker.events,
            channels: MediaChannelPair::new(),
            render: None,
            audio,
            pending_retry: None,
            control_tx,
            control_rx,
            status_tx,
        };

        (orchestrator, handle)
    }

    /// Mount the session and run the event loop until stopped.
    pub async fn run(mut self) -> Result<(), LinkError> {
        // One-time channel handoff to the protocol worker, then the
        // microphone binding for the controller side.
        let video_port = self.channels.video.take_first()?;
        let microphone_port = self.channels.microphone.take_first()?;
        self.protocol.initialise(video_port, microphone_port).await?;

        let microphone_local = self.channels.microphone.take_second()?;
        self.audio.mount_microphone(microphone_local);

        let mut device_events = self.watcher.watch()?;
        let mut device_events_open = true;

        self.probe(false).await?;

        loop {
            tokio::select! {
                msg = self.control_rx.recv() => match msg {
                    Some(ControlMsg::Stop) | None => {
                        self.teardown().await;
                        return Ok(());
                    }
                    Some(msg) => self.handle_control(msg).await?,
                },
                event = self.events.recv() => match event {
                    Some(event) => self.handle_protocol_event(event).await?,
                    None => {
                        error!("protocol worker terminated unexpectedly");
                        self.teardown().await;
                        return Err(LinkError::ChannelClosed);
                    }
                },
                event = device_events.recv(), if device_events_open => match event {
                    Some(event) => self.handle_device_event(event).await?,
                    None => {
                        warn!("device event stream ended");
                        device_events_open = false;
                    }
                },
            }
        }
    }

    // ── Probing ──────────────────────────────────────────────────

    async fn probe(&mut self, interactive: bool) -> Result<(), LinkError> {
        if let Err(e) = self.phase.begin_probe() {
            warn!("probe request ignored: {e}");
            return Ok(());
        }

        match self.watcher.probe(interactive).await {
            Ok(Some(device)) => {
                info!(
                    "dongle found ({:04x}:{:04x}), starting session",
                    device.vendor_id, device.product_id
                );
                self.device_found = Some(true);
                if let Err(e) = self.phase.device_found() {
                    warn!("{e}");
                }
                self.protocol.start(self.config).await?;
            }
            Ok(None) => {
                debug!("no dongle enumerable");
                self.device_found = Some(false);
                if let Err(e) = self.phase.device_missing() {
                    warn!("{e}");
                }
            }
            Err(e) => {
                warn!("probe failed: {e}");
                self.device_found = Some(false);
                if let Err(e) = self.phase.device_missing() {
                    warn!("{e}");
                }
            }
        }

        self.publish_status();
        Ok(())
    }

    // ── Control handling ─────────────────────────────────────────

    async fn handle_control(&mut self, msg: ControlMsg) -> Result<(), LinkError> {
        match msg {
            ControlMsg::Probe { interactive } => self.probe(interactive).await?,
            ControlMsg::Touch(event) => {
                if let Some(touch) = self.touch.normalize(&event) {
                    self.protocol.touch(touch).await?;
                }
            }
            ControlMsg::AttachSurface(surface) => {
                if self.render.is_some() {
                    warn!("render worker already attached");
                    return Ok(());
                }
                let video = self.channels.video.take_second()?;
                self.render = Some(RenderWorker::spawn(RenderInit { surface, video }));
                debug!("render worker spawned");
            }
            ControlMsg::RetryElapsed => {
                self.pending_retry = None;
                info!("failure backoff elapsed, reloading session");
                self.reload().await?;
            }
            ControlMsg::Stop => unreachable!("handled by the run loop"),
        }
        Ok(())
    }

    /// Full session reload after the failure backoff: stop the wire
    /// session, drop the audio players, and probe again. The media
    /// channels and the worker itself are reused; the plug status
    /// resets and is re-established by the fresh session's events.
    async fn reload(&mut self) -> Result<(), LinkError> {
        self.protocol.stop().await?;
        self.audio.reset_players();
        self.plugged = false;
        self.probe(false).await
    }

    // ── Protocol events ──────────────────────────────────────────

    async fn handle_protocol_event(&mut self, event: ProtocolEvent) -> Result<(), LinkError> {
        match event {
            ProtocolEvent::Plugged => {
                self.plugged = true;
                if let Err(e) = self.phase.plugged() {
                    warn!("{e}");
                } else {
                    info!("phone plugged");
                }
                self.publish_status();
            }
            ProtocolEvent::Unplugged => {
                self.plugged = false;
                if let Err(e) = self.phase.unplugged() {
                    warn!("{e}");
                } else {
                    info!("phone unplugged");
                }
                self.publish_status();
            }
            ProtocolEvent::RequestBuffer(key) => {
                self.note_session_alive();
                let meta = AudioMetadata::stream(key.decode_type, key.audio_type);
                self.audio.get_or_create_player(&meta).await?;
            }
            ProtocolEvent::Audio(meta) => {
                self.note_session_alive();
                self.audio.process_audio(&meta).await?;
            }
            ProtocolEvent::Command(command) => match command {
                DongleCommand::StartRecordAudio => self.audio.start_recording(),
                DongleCommand::StopRecordAudio => self.audio.stop_recording(),
                other => debug!(?other, "dongle command ignored"),
            },
            ProtocolEvent::Failure => self.handle_failure(),
        }
        Ok(())
    }

    /// Schedule a full reload, single-flight: a second failure while
    /// one is pending is swallowed.
    fn handle_failure(&mut self) {
        if let Err(e) = self.phase.fail() {
            warn!("{e}");
            return;
        }
        self.publish_status();

        if self.pending_retry.is_some() {
            debug!("failure while reload already pending, ignored");
            return;
        }

        let delay = self.options.retry_delay;
        error!("session failed, reloading in {delay:?}");
        let control = self.control_tx.clone();
        self.pending_retry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = control.send(ControlMsg::RetryElapsed).await;
        }));
    }

    /// Stream traffic means the wire session is alive: drop any
    /// pending reload and, if a failure had been recorded, return the
    /// phase to the live state the plug status says we are in.
    fn note_session_alive(&mut self) {
        self.clear_pending_retry();
        if matches!(self.phase, SessionPhase::Failed) {
            if let Err(e) = self.phase.recover(self.plugged) {
                warn!("{e}");
            } else {
                info!("session recovered after failure");
            }
            self.publish_status();
        }
    }

    fn clear_pending_retry(&mut self) {
        if let Some(task) = self.pending_retry.take() {
            task.abort();
            debug!("pending reload cancelled");
        }
    }

    // ── Device events ────────────────────────────────────────────

    async fn handle_device_event(&mut self, event: DeviceEvent) -> Result<(), LinkError> {
        match event {
            DeviceEvent::Attached(device) => {
                if self.phase.is_live() {
                    debug!("attach event while session live, ignored");
                    return Ok(());
                }
                debug!(
                    "dongle attached ({:04x}:{:04x})",
                    device.vendor_id, device.product_id
                );
                self.probe(false).await?;
            }
            DeviceEvent::Detached => {
                if !self.phase.is_live() {
                    return Ok(());
                }
                // A momentary bus glitch must not kill a live session:
                // confirm the dongle is truly gone before tearing down.
                match self.watcher.probe(false).await {
                    Ok(Some(_)) => {
                        debug!("detach event but dongle still enumerable, ignored");
                    }
                    Ok(None) | Err(_) => {
                        info!("dongle gone, stopping session");
                        self.protocol.stop().await?;
                        self.audio.reset_players();
                        self.device_found = Some(false);
                        self.plugged = false;
                        if let Err(e) = self.phase.begin_probe() {
                            warn!("{e}");
                        }
                        self.publish_status();
                    }
                }
            }
        }
        Ok(())
    }

    // ── Teardown ─────────────────────────────────────────────────

    async fn teardown(&mut self) {
        self.clear_pending_retry();
        if let Err(e) = self.protocol.stop().await {
            warn!("stop command not delivered: {e}");
        }
        if let Some(render) = &self.render {
            render.terminate();
        }
        self.audio.shutdown();
        self.plugged = false;
        if let Err(e) = self.phase.stop() {
            warn!("{e}");
        }
        self.publish_status();
        info!("session stopped");
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(SessionStatus {
            phase: self.phase.clone(),
            device_found: self.device_found,
            plugged: self.plugged,
        });
    }
}

// ── Tests ────────────────────────────────────────────────────────
