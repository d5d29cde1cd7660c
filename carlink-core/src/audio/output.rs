//! cpal-backed playback sink.
//!
//! One sink per audio player: a dedicated thread owns the output
//! stream, the callback drains the player's ring and applies the
//! current gain. Underruns produce silence, never blocking.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};

use crate::audio::player::AudioPlayer;
use crate::error::LinkError;

/// Playback sink for one [`AudioPlayer`].
pub struct PcmOutput {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PcmOutput {
    /// Build and start an output stream for the player's format.
    ///
    /// Fails with [`LinkError::Audio`] when no output device exists or
    /// the stream cannot be built; the caller treats that as
    /// non-fatal (the ring still buffers, there is just nothing to
    /// hear).
    pub fn spawn(player: &AudioPlayer) -> Result<Self, LinkError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| LinkError::Audio("no output device".into()))?;

        let config = StreamConfig {
            channels: player.channels(),
            sample_rate: SampleRate(player.sample_rate()),
            buffer_size: BufferSize::Default,
        };

        let ring = player.ring();
        let volume = player.volume_control();
        let channels = player.channels();
        let running = player.running_flag();
        let running_for_loop = Arc::clone(&running);
        let key = player.key();

        let handle = thread::Builder::new()
            .name(format!("audio-out-{key}"))
            .spawn(move || {
                // Partial chunk carried between callbacks.
                let mut pending: VecDeque<i16> = VecDeque::new();

                let stream = device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let frames = (data.len() / channels.max(1) as usize) as u32;
                        let gain = volume.advance(frames);

                        let mut i = 0;
                        while i < data.len() {
                            if pending.is_empty() {
                                match ring.pop() {
                                    Some(chunk) => pending.extend(chunk.samples),
                                    // One underrun counted; pad with silence.
                                    None => break,
                                }
                            }
                            while i < data.len() {
                                match pending.pop_front() {
                                    Some(s) => {
                                        data[i] = (s as f32 / i16::MAX as f32) * gain;
                                        i += 1;
                                    }
                                    None => break,
                                }
                            }
                        }
                        for slot in &mut data[i..] {
                            *slot = 0.0;
                        }
                    },
                    move |err| {
                        tracing::warn!("audio output stream error: {err}");
                    },
                    None,
                );

                match stream {
                    Ok(stream) => {
                        if let Err(e) = stream.play() {
                            tracing::warn!("failed to start output stream: {e}");
                            return;
                        }
                        while running_for_loop.load(Ordering::Relaxed) {
                            thread::sleep(Duration::from_millis(10));
                        }
                        // Stream drops here, ending playback.
                    }
                    Err(e) => {
                        tracing::warn!("failed to build output stream: {e}");
                    }
                }
            })
            .map_err(|e| LinkError::Audio(e.to_string()))?;

        Ok(Self {
            running,
            thread: Some(handle),
        })
    }

    /// Stop the sink and join its thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PcmOutput {
    fn drop(&mut self) {
        self.stop();
    }
}
