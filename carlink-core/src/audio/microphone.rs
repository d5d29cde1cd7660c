//! Microphone capture and forwarding.
//!
//! The microphone is acquired once at session mount and bound to the
//! pipeline's microphone channel endpoint; captured PCM streams to the
//! protocol worker from the capture callback. Recording start/stop
//! gates the forwarding with an atomic flag — the stream itself stays
//! up so recording can resume without re-acquisition.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};

use crate::audio::buffer::PcmChunk;
use crate::channel::Endpoint;
use crate::error::LinkError;

/// Capture format expected by the dongle for uplink audio.
pub const MIC_SAMPLE_RATE: u32 = 16_000;
pub const MIC_CHANNELS: u16 = 1;

/// An acquired microphone bound to the protocol worker's channel.
pub struct Microphone {
    recording: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Microphone {
    /// Acquire the default input device and start the capture stream.
    ///
    /// The stream runs immediately but forwards nothing until
    /// [`start_recording`](Self::start_recording). Failure here is
    /// expected to be treated as non-fatal by the caller.
    pub fn acquire(endpoint: Endpoint<PcmChunk>) -> Result<Self, LinkError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| LinkError::Microphone("no input device".into()))?;

        let config = StreamConfig {
            channels: MIC_CHANNELS,
            sample_rate: SampleRate(MIC_SAMPLE_RATE),
            buffer_size: BufferSize::Default,
        };

        let recording = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let recording_cb = Arc::clone(&recording);
        let running_for_loop = Arc::clone(&running);
        let (error_tx, error_rx) = std::sync::mpsc::sync_channel::<LinkError>(1);

        let handle = thread::Builder::new()
            .name("microphone".into())
            .spawn(move || {
                let stream = device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if !recording_cb.load(Ordering::Relaxed) {
                            return;
                        }
                        let samples: Vec<i16> = data
                            .iter()
                            .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                            .collect();
                        // Drop the chunk if the worker is backed up;
                        // never block the capture thread.
                        endpoint.try_send(PcmChunk::new(samples));
                    },
                    move |err| {
                        tracing::warn!("microphone stream error: {err}");
                    },
                    None,
                );

                match stream {
                    Ok(stream) => {
                        if let Err(e) = stream.play() {
                            let _ = error_tx.try_send(LinkError::Microphone(e.to_string()));
                            return;
                        }
                        drop(error_tx);
                        while running_for_loop.load(Ordering::Relaxed) {
                            thread::sleep(Duration::from_millis(10));
                        }
                    }
                    Err(e) => {
                        let _ = error_tx.try_send(LinkError::Microphone(e.to_string()));
                    }
                }
            })
            .map_err(|e| LinkError::Microphone(e.to_string()))?;

        // Give the capture thread a moment to report a build failure.
        if let Ok(err) = error_rx.recv_timeout(Duration::from_millis(200)) {
            let _ = handle.join();
            return Err(err);
        }

        Ok(Self {
            recording,
            running,
            thread: Some(handle),
        })
    }

    /// Begin forwarding captured samples.
    pub fn start_recording(&self) {
        self.recording.store(true, Ordering::SeqCst);
    }

    /// Stop forwarding without tearing down the stream.
    pub fn stop_recording(&self) {
        self.recording.store(false, Ordering::SeqCst);
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Tear down the capture stream.
    pub fn release(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        self.release();
    }
}
