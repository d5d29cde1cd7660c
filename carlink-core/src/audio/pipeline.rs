//! Audio stream management for a mirroring session.
//!
//! Maps `(decode_type, audio_type)` keys to ring-buffer-backed
//! players, created lazily when the dongle first references a stream.
//! Creating a player registers its ring with the protocol worker so
//! samples flow directly into it; this pipeline only ever sees
//! metadata (volume ramps and stream commands).

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::audio::buffer::PcmChunk;
use crate::audio::microphone::Microphone;
use crate::audio::output::PcmOutput;
use crate::audio::player::AudioPlayer;
use crate::channel::Endpoint;
use crate::error::LinkError;
use crate::messages::{AudioCommand, AudioMetadata, AudioStreamKey, ProtocolCommand};

// ── Volume policy ────────────────────────────────────────────────

/// Default volume for media/output streams.
pub const DEFAULT_MEDIA_VOLUME: f32 = 1.0;

/// Navigation prompts sit under the media stream rather than over it.
pub const DEFAULT_NAV_VOLUME: f32 = 0.5;

// ── PipelineOptions ──────────────────────────────────────────────

/// Feature switches for environments without audio hardware
/// (tests, headless harnesses).
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Spawn cpal playback sinks for created players.
    pub playback: bool,
    /// Acquire the microphone at mount.
    pub capture: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            playback: true,
            capture: true,
        }
    }
}

// ── AudioPipeline ────────────────────────────────────────────────

/// Per-session audio state: players, playback sinks, microphone.
pub struct AudioPipeline {
    commands: mpsc::Sender<ProtocolCommand>,
    options: PipelineOptions,
    players: HashMap<AudioStreamKey, AudioPlayer>,
    outputs: HashMap<AudioStreamKey, PcmOutput>,
    microphone: Option<Microphone>,
}

impl AudioPipeline {
    pub fn new(commands: mpsc::Sender<ProtocolCommand>, options: PipelineOptions) -> Self {
        Self {
            commands,
            options,
            players: HashMap::new(),
            outputs: HashMap::new(),
            microphone: None,
        }
    }

    /// Acquire the microphone and bind it to the worker's channel.
    ///
    /// Non-fatal on failure: recording stays disabled and the session
    /// proceeds without uplink audio.
    pub fn mount_microphone(&mut self, endpoint: Endpoint<PcmChunk>) {
        if !self.options.capture {
            debug!("microphone capture disabled");
            return;
        }
        match Microphone::acquire(endpoint) {
            Ok(mic) => self.microphone = Some(mic),
            Err(e) => warn!("failed to init microphone: {e}"),
        }
    }

    /// Look up or lazily create the player for a stream.
    ///
    /// Creation allocates a ring sized for the stream format and
    /// registers it with the protocol worker. Idempotent: a second
    /// call with the same key returns the existing player without
    /// re-registering.
    pub async fn get_or_create_player(
        &mut self,
        meta: &AudioMetadata,
    ) -> Result<&AudioPlayer, LinkError> {
        let key = meta.key();
        if !self.players.contains_key(&key) {
            let player = AudioPlayer::new(key);
            player.set_volume(DEFAULT_MEDIA_VOLUME);

            self.commands
                .send(ProtocolCommand::RegisterBuffer {
                    key,
                    ring: player.ring(),
                })
                .await?;

            if self.options.playback {
                match PcmOutput::spawn(&player) {
                    Ok(output) => {
                        self.outputs.insert(key, output);
                    }
                    Err(e) => warn!("no playback for stream {key}: {e}"),
                }
            }

            debug!(%key, rate = player.sample_rate(), channels = player.channels(), "created audio player");
            self.players.insert(key, player);
        }
        Ok(self.players.get(&key).expect("player just inserted"))
    }

    /// Apply a metadata-only audio event.
    pub async fn process_audio(&mut self, meta: &AudioMetadata) -> Result<(), LinkError> {
        if let (Some(volume), Some(duration)) = (meta.volume, meta.volume_duration) {
            let player = self.get_or_create_player(meta).await?;
            player.ramp_volume(volume, duration);
        } else if let Some(command) = meta.command {
            match command {
                AudioCommand::NaviStart => {
                    let player = self.get_or_create_player(meta).await?;
                    player.set_volume(DEFAULT_NAV_VOLUME);
                }
                AudioCommand::MediaStart | AudioCommand::OutputStart => {
                    let player = self.get_or_create_player(meta).await?;
                    player.set_volume(DEFAULT_MEDIA_VOLUME);
                }
                other => debug!(?other, "audio command ignored"),
            }
        }
        Ok(())
    }

    /// Begin forwarding microphone capture, if a microphone is bound.
    pub fn start_recording(&self) {
        if let Some(mic) = &self.microphone {
            mic.start_recording();
        }
    }

    /// Stop forwarding microphone capture.
    pub fn stop_recording(&self) {
        if let Some(mic) = &self.microphone {
            mic.stop_recording();
        }
    }

    pub fn is_recording(&self) -> bool {
        self.microphone.as_ref().is_some_and(|m| m.is_recording())
    }

    pub fn player(&self, key: &AudioStreamKey) -> Option<&AudioPlayer> {
        self.players.get(key)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Stop and drop every player and sink. The microphone binding
    /// survives — a session reload reuses it.
    pub fn reset_players(&mut self) {
        for player in self.players.values() {
            player.stop();
        }
        self.outputs.clear();
        self.players.clear();
    }

    /// Full teardown at session end.
    pub fn shutdown(&mut self) {
        self.reset_players();
        if let Some(mut mic) = self.microphone.take() {
            mic.release();
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
