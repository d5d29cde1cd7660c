//! Worker boundary message types.
//!
//! Every message crossing an execution-context boundary is a variant of
//! a tagged union here: [`ProtocolCommand`] flows controller → protocol
//! worker, [`ProtocolEvent`] flows protocol worker → controller, and
//! [`RenderInit`] is the render worker's one-time handoff. Numeric
//! enums carry the dongle protocol's wire discriminants and convert via
//! `TryFrom` — no panics on unknown values.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;

use crate::audio::{PcmChunk, SharedPcmRing};
use crate::channel::Endpoint;
use crate::config::SessionConfig;
use crate::error::LinkError;

// ── DecodeType ───────────────────────────────────────────────────

/// PCM stream format selector carried in audio events.
///
/// The dongle identifies formats by number; the mapping to sample rate
/// and channel count is fixed by the protocol.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeType {
    /// 44.1 kHz stereo.
    Stereo44k = 1,
    /// 44.1 kHz stereo (alternate stream id).
    Stereo44kAux = 2,
    /// 8 kHz mono (phone-call downlink).
    Mono8k = 3,
    /// 48 kHz stereo.
    Stereo48k = 4,
    /// 16 kHz mono (voice assistant).
    Mono16k = 5,
    /// 24 kHz mono.
    Mono24k = 6,
    /// 16 kHz stereo.
    Stereo16k = 7,
}

impl DecodeType {
    /// Sample rate in Hz.
    pub const fn sample_rate(self) -> u32 {
        match self {
            DecodeType::Stereo44k | DecodeType::Stereo44kAux => 44_100,
            DecodeType::Mono8k => 8_000,
            DecodeType::Stereo48k => 48_000,
            DecodeType::Mono16k | DecodeType::Stereo16k => 16_000,
            DecodeType::Mono24k => 24_000,
        }
    }

    /// Interleaved channel count.
    pub const fn channels(self) -> u16 {
        match self {
            DecodeType::Mono8k | DecodeType::Mono16k | DecodeType::Mono24k => 1,
            _ => 2,
        }
    }

    /// Bits per sample. All formats are 16-bit PCM.
    pub const fn bit_depth(self) -> u16 {
        16
    }
}

impl TryFrom<u8> for DecodeType {
    type Error = LinkError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(DecodeType::Stereo44k),
            2 => Ok(DecodeType::Stereo44kAux),
            3 => Ok(DecodeType::Mono8k),
            4 => Ok(DecodeType::Stereo48k),
            5 => Ok(DecodeType::Mono16k),
            6 => Ok(DecodeType::Mono24k),
            7 => Ok(DecodeType::Stereo16k),
            _ => Err(LinkError::UnknownVariant {
                type_name: "DecodeType",
                value: value as u64,
            }),
        }
    }
}

// ── AudioStreamKey ───────────────────────────────────────────────

/// Identity of one audio stream: `(decode_type, audio_type)`.
///
/// At most one audio player exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioStreamKey {
    pub decode_type: DecodeType,
    pub audio_type: u8,
}

impl fmt::Display for AudioStreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.decode_type as u8, self.audio_type)
    }
}

// ── AudioCommand ─────────────────────────────────────────────────

/// Stream lifecycle commands carried in metadata-only audio events.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioCommand {
    OutputStart = 1,
    OutputStop = 2,
    InputConfig = 3,
    PhonecallStart = 4,
    PhonecallStop = 5,
    NaviStart = 6,
    NaviStop = 7,
    SiriStart = 8,
    SiriStop = 9,
    MediaStart = 10,
    MediaStop = 11,
    AlertStart = 12,
    AlertStop = 13,
}

impl TryFrom<u8> for AudioCommand {
    type Error = LinkError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AudioCommand::OutputStart),
            2 => Ok(AudioCommand::OutputStop),
            3 => Ok(AudioCommand::InputConfig),
            4 => Ok(AudioCommand::PhonecallStart),
            5 => Ok(AudioCommand::PhonecallStop),
            6 => Ok(AudioCommand::NaviStart),
            7 => Ok(AudioCommand::NaviStop),
            8 => Ok(AudioCommand::SiriStart),
            9 => Ok(AudioCommand::SiriStop),
            10 => Ok(AudioCommand::MediaStart),
            11 => Ok(AudioCommand::MediaStop),
            12 => Ok(AudioCommand::AlertStart),
            13 => Ok(AudioCommand::AlertStop),
            _ => Err(LinkError::UnknownVariant {
                type_name: "AudioCommand",
                value: value as u64,
            }),
        }
    }
}

// ── DongleCommand ────────────────────────────────────────────────

/// Control signals emitted by the dongle outside the audio path.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DongleCommand {
    Invalid = 0,
    /// Begin forwarding microphone capture.
    StartRecordAudio = 1,
    /// Stop forwarding microphone capture.
    StopRecordAudio = 2,
    /// Phone asks the head unit to show its own UI.
    RequestHostUi = 3,
    /// Voice assistant session toggle.
    Siri = 5,
    /// Microphone hardware toggle.
    Mic = 7,
    /// Video frame pacing marker.
    Frame = 12,
}

impl TryFrom<u16> for DongleCommand {
    type Error = LinkError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DongleCommand::Invalid),
            1 => Ok(DongleCommand::StartRecordAudio),
            2 => Ok(DongleCommand::StopRecordAudio),
            3 => Ok(DongleCommand::RequestHostUi),
            5 => Ok(DongleCommand::Siri),
            7 => Ok(DongleCommand::Mic),
            12 => Ok(DongleCommand::Frame),
            _ => Err(LinkError::UnknownVariant {
                type_name: "DongleCommand",
                value: value as u64,
            }),
        }
    }
}

// ── TouchAction / TouchEvent ─────────────────────────────────────

/// Touch phases, with the protocol's wire discriminants.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchAction {
    Down = 14,
    Move = 15,
    Up = 16,
}

impl TryFrom<u8> for TouchAction {
    type Error = LinkError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            14 => Ok(TouchAction::Down),
            15 => Ok(TouchAction::Move),
            16 => Ok(TouchAction::Up),
            _ => Err(LinkError::UnknownVariant {
                type_name: "TouchAction",
                value: value as u64,
            }),
        }
    }
}

/// A normalized, protocol-ready touch command.
///
/// Coordinates are fractions of the configured display size, so they
/// are resolution-independent on the phone side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub x: f32,
    pub y: f32,
    pub action: TouchAction,
}

// ── AudioMetadata ────────────────────────────────────────────────

/// Metadata-only audio event: volume changes and stream commands.
/// Raw samples never travel this path — they go through the
/// registered ring buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioMetadata {
    pub decode_type: DecodeType,
    pub audio_type: u8,
    /// Target volume, 0.0..=1.0.
    pub volume: Option<f32>,
    /// Ramp duration for `volume`.
    pub volume_duration: Option<Duration>,
    pub command: Option<AudioCommand>,
}

impl AudioMetadata {
    /// The stream this event belongs to.
    pub fn key(&self) -> AudioStreamKey {
        AudioStreamKey {
            decode_type: self.decode_type,
            audio_type: self.audio_type,
        }
    }

    /// A bare stream reference with no volume or command payload.
    pub fn stream(decode_type: DecodeType, audio_type: u8) -> Self {
        Self {
            decode_type,
            audio_type,
            volume: None,
            volume_duration: None,
            command: None,
        }
    }

    /// A command-carrying event for the given stream.
    pub fn command(decode_type: DecodeType, audio_type: u8, command: AudioCommand) -> Self {
        Self {
            command: Some(command),
            ..Self::stream(decode_type, audio_type)
        }
    }

    /// A volume ramp for the given stream.
    pub fn volume_ramp(
        decode_type: DecodeType,
        audio_type: u8,
        volume: f32,
        duration: Duration,
    ) -> Self {
        Self {
            volume: Some(volume),
            volume_duration: Some(duration),
            ..Self::stream(decode_type, audio_type)
        }
    }
}

// ── VideoFrame ───────────────────────────────────────────────────

/// One encoded video frame, delivered worker-to-worker over the video
/// channel without transiting the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Encoded frame payload (H.264 from the dongle).
    pub data: Bytes,
}

// ── ProtocolCommand ──────────────────────────────────────────────

/// Controller → protocol worker messages.
#[derive(Debug)]
pub enum ProtocolCommand {
    /// One-time channel handoff: the worker's video producer endpoint
    /// and microphone consumer endpoint. Sent exactly once.
    Initialise {
        video: Endpoint<VideoFrame>,
        microphone: Endpoint<PcmChunk>,
    },
    /// Begin a mirroring session.
    Start { config: SessionConfig },
    /// End the session.
    Stop,
    /// Register playback backing storage for a stream so the worker
    /// can write samples directly into the ring.
    RegisterBuffer {
        key: AudioStreamKey,
        ring: SharedPcmRing,
    },
    /// Forward normalized touch input.
    Touch(TouchEvent),
}

// ── ProtocolEvent ────────────────────────────────────────────────

/// Protocol worker → controller messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// Phone attached; display becomes visible.
    Plugged,
    /// Phone detached; display hidden, session still wired.
    Unplugged,
    /// The worker saw a stream it has no ring buffer for.
    RequestBuffer(AudioStreamKey),
    /// Volume/command metadata for a stream.
    Audio(AudioMetadata),
    /// Control signal from the dongle.
    Command(DongleCommand),
    /// Unrecoverable session error.
    Failure,
}

// ── RenderInit ───────────────────────────────────────────────────

/// Render worker handoff: the offscreen draw surface and the video
/// consumer endpoint. Consumed by value — the controller loses both
/// the instant the worker is spawned.
pub struct RenderInit {
    pub surface: Box<dyn crate::workers::DrawSurface>,
    pub video: Endpoint<VideoFrame>,
}

// ── Tests ────────────────────────────────────────────────────────
