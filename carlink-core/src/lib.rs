//! # carlink-core
//!
//! Session layer for CarLink phone-mirroring dongles.
//!
//! This crate contains:
//! - **Device**: dongle discovery and hot-plug watching over `nusb`
//! - **Messages**: typed worker-boundary tagged unions (commands,
//!   events, audio metadata, touch, video frames)
//! - **Channel**: duplex media channels with move-once endpoints
//! - **Audio**: SPSC ring buffers, per-stream players with volume
//!   ramps, cpal playback sinks, microphone capture
//! - **Workers**: protocol and render worker boundaries
//! - **Session**: the orchestrator and its hot-plug/retry state machine
//! - **Error**: `LinkError` — typed, `thiserror`-based error hierarchy

pub mod audio;
pub mod channel;
pub mod config;
pub mod device;
pub mod error;
pub mod messages;
pub mod session;
pub mod touch;
pub mod workers;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use audio::{AudioPipeline, AudioPlayer, PcmChunk, PcmRing, PipelineOptions, SharedPcmRing};
pub use channel::{Endpoint, MediaChannel, MediaChannelPair};
pub use config::SessionConfig;
pub use device::{
    DeviceEvent, DeviceInfo, DeviceWatcher, DongleId, KNOWN_DONGLES, MockWatcher, UsbWatcher,
};
pub use error::LinkError;
pub use messages::{
    AudioCommand, AudioMetadata, AudioStreamKey, DecodeType, DongleCommand, ProtocolCommand,
    ProtocolEvent, RenderInit, TouchAction, TouchEvent, VideoFrame,
};
pub use session::{Orchestrator, RETRY_DELAY, SessionHandle, SessionOptions, SessionPhase, SessionStatus};
pub use touch::{PointerEvent, PointerPhase, TouchNormalizer};
pub use workers::{DongleDriver, DrawSurface, ProtocolContext, ProtocolHandle, ProtocolWorker, RenderWorker};
