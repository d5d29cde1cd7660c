//! Scripted dongle driver.
//!
//! Plays the dongle's side of the boundary contract: acknowledges
//! `Start` with `Plugged`, requests an audio buffer, then streams
//! synthetic video frames and PCM into the transferred channels until
//! stopped. Optionally injects a `Failure` after a configured runtime
//! so retry behavior can be exercised end to end.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use carlink_core::{
    AudioCommand, AudioMetadata, AudioStreamKey, DecodeType, DongleDriver, Endpoint, LinkError,
    PcmChunk, ProtocolCommand, ProtocolContext, ProtocolEvent, SessionConfig, SharedPcmRing,
    VideoFrame,
};

/// The one stream the simulated dongle plays.
const MEDIA_STREAM: AudioStreamKey = AudioStreamKey {
    decode_type: DecodeType::Stereo48k,
    audio_type: 1,
};

/// Scripted dongle behavior knobs.
#[derive(Debug, Clone, Copy)]
pub struct SimDriver {
    /// Inject a `Failure` this long after each `Start`; `None` runs
    /// clean.
    pub fail_after: Option<Duration>,
    /// Cadence of synthetic PCM chunks.
    pub audio_interval: Duration,
}

struct Session {
    config: SessionConfig,
    started: Instant,
    frames_sent: u64,
    chunks_written: u64,
}

#[async_trait]
impl DongleDriver for SimDriver {
    async fn run(self: Box<Self>, mut ctx: ProtocolContext) -> Result<(), LinkError> {
        let mut video: Option<Endpoint<VideoFrame>> = None;
        let mut microphone: Option<Endpoint<PcmChunk>> = None;
        let mut rings: HashMap<AudioStreamKey, SharedPcmRing> = HashMap::new();
        let mut session: Option<Session> = None;
        let mut mic_samples: u64 = 0;

        let mut video_tick = tokio::time::interval(Duration::from_millis(16));
        let mut audio_tick = tokio::time::interval(self.audio_interval);

        loop {
            tokio::select! {
                cmd = ctx.commands.recv() => match cmd {
                    None => {
                        info!(mic_samples, "simulated dongle shutting down");
                        return Ok(());
                    }
                    Some(cmd) => {
                        self.handle_command(
                            cmd,
                            &mut video,
                            &mut microphone,
                            &mut rings,
                            &mut session,
                            &mut video_tick,
                            &ctx,
                        )
                        .await?;
                    }
                },

                _ = video_tick.tick(), if session.is_some() => {
                    let sess = session.as_mut().expect("session checked by guard");

                    if let Some(fail_after) = self.fail_after {
                        if sess.started.elapsed() >= fail_after {
                            info!("injecting session failure");
                            session = None;
                            ctx.events.send(ProtocolEvent::Failure).await?;
                            continue;
                        }
                    }

                    if let Some(video) = &video {
                        let frame = synthetic_frame(sess.config, sess.frames_sent);
                        // Drop the frame if the render worker lags.
                        video.try_send(frame);
                        sess.frames_sent += 1;
                    }
                },

                _ = audio_tick.tick(), if session.is_some() => {
                    let sess = session.as_mut().expect("session checked by guard");
                    if let Some(ring) = rings.get(&MEDIA_STREAM) {
                        ring.push(synthetic_chunk(&MEDIA_STREAM, self.audio_interval));
                        sess.chunks_written += 1;
                    }
                },

                chunk = recv_mic(&mut microphone), if microphone.is_some() => match chunk {
                    Some(chunk) => mic_samples += chunk.samples.len() as u64,
                    // Controller side released the microphone binding.
                    None => microphone = None,
                },
            }
        }
    }
}

impl SimDriver {
    /// Apply one controller command.
    #[allow(clippy::too_many_arguments)]
    async fn handle_command(
        &self,
        cmd: ProtocolCommand,
        video: &mut Option<Endpoint<VideoFrame>>,
        microphone: &mut Option<Endpoint<PcmChunk>>,
        rings: &mut HashMap<AudioStreamKey, SharedPcmRing>,
        session: &mut Option<Session>,
        video_tick: &mut tokio::time::Interval,
        ctx: &ProtocolContext,
    ) -> Result<(), LinkError> {
        match cmd {
            ProtocolCommand::Initialise {
                video: v,
                microphone: m,
            } => {
                *video = Some(v);
                *microphone = Some(m);
                debug!("channels transferred");
            }
            ProtocolCommand::Start { config } => {
                info!(
                    width = config.width,
                    height = config.height,
                    fps = config.fps,
                    "session start"
                );
                *video_tick = tokio::time::interval(Duration::from_millis(
                    1000 / u64::from(config.fps.max(1)),
                ));
                *session = Some(Session {
                    config,
                    started: Instant::now(),
                    frames_sent: 0,
                    chunks_written: 0,
                });
                ctx.events.send(ProtocolEvent::Plugged).await?;
                ctx.events
                    .send(ProtocolEvent::RequestBuffer(MEDIA_STREAM))
                    .await?;
                ctx.events
                    .send(ProtocolEvent::Audio(AudioMetadata::command(
                        MEDIA_STREAM.decode_type,
                        MEDIA_STREAM.audio_type,
                        AudioCommand::MediaStart,
                    )))
                    .await?;
            }
            ProtocolCommand::Stop => {
                if let Some(sess) = session.take() {
                    info!(
                        frames = sess.frames_sent,
                        chunks = sess.chunks_written,
                        "session stop"
                    );
                }
                ctx.events.send(ProtocolEvent::Unplugged).await?;
            }
            ProtocolCommand::RegisterBuffer { key, ring } => {
                debug!(%key, capacity = ring.capacity(), "buffer registered");
                rings.insert(key, ring);
            }
            ProtocolCommand::Touch(touch) => {
                debug!(
                    action = ?touch.action,
                    x = f64::from(touch.x),
                    y = f64::from(touch.y),
                    "touch forwarded to phone"
                );
            }
        }
        Ok(())
    }
}

async fn recv_mic(microphone: &mut Option<Endpoint<PcmChunk>>) -> Option<PcmChunk> {
    match microphone {
        Some(endpoint) => endpoint.recv().await,
        None => std::future::pending().await,
    }
}

fn synthetic_frame(config: SessionConfig, index: u64) -> VideoFrame {
    // A tiny rolling-pattern payload; real frames are H.264.
    let payload: Vec<u8> = (0..256).map(|i| (i as u64 + index) as u8).collect();
    VideoFrame {
        width: config.width,
        height: config.height,
        data: Bytes::from(payload),
    }
}

fn synthetic_chunk(key: &AudioStreamKey, interval: Duration) -> PcmChunk {
    let frames =
        (key.decode_type.sample_rate() as u128 * interval.as_millis() / 1000) as usize;
    let samples = frames * key.decode_type.channels() as usize;
    PcmChunk::new(vec![0i16; samples])
}

// ── Tests ────────────────────────────────────────────────────────
