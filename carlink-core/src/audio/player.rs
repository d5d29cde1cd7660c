//! Per-stream audio players.
//!
//! An [`AudioPlayer`] owns the ring buffer the protocol worker writes
//! into, plus the volume state the playback sink reads from its
//! real-time callback. Volume is a pair of atomics (current gain and a
//! per-frame step toward a target) so ramps never take a lock on the
//! audio thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use crate::audio::buffer::{PcmRing, SharedPcmRing};
use crate::messages::AudioStreamKey;

// ── VolumeControl ────────────────────────────────────────────────

/// Wait-free gain control shared between the control path and the
/// audio callback. Gains are stored as `f32` bit patterns.
#[derive(Debug)]
pub struct VolumeControl {
    current: AtomicU32,
    target: AtomicU32,
    /// Signed per-frame delta applied while ramping; zero when settled.
    step: AtomicU32,
}

impl VolumeControl {
    pub fn new(gain: f32) -> Self {
        Self {
            current: AtomicU32::new(gain.to_bits()),
            target: AtomicU32::new(gain.to_bits()),
            step: AtomicU32::new(0f32.to_bits()),
        }
    }

    /// Jump to a gain immediately, cancelling any ramp in progress.
    pub fn set(&self, gain: f32) {
        let gain = gain.clamp(0.0, 1.0);
        self.current.store(gain.to_bits(), Ordering::Relaxed);
        self.target.store(gain.to_bits(), Ordering::Relaxed);
        self.step.store(0f32.to_bits(), Ordering::Relaxed);
    }

    /// Ramp linearly to a gain over `duration` at the given sample
    /// rate. A zero duration behaves like [`set`](Self::set).
    pub fn ramp(&self, gain: f32, duration: Duration, sample_rate: u32) {
        let gain = gain.clamp(0.0, 1.0);
        let frames = duration.as_secs_f32() * sample_rate as f32;
        if frames < 1.0 {
            self.set(gain);
            return;
        }
        let current = f32::from_bits(self.current.load(Ordering::Relaxed));
        self.target.store(gain.to_bits(), Ordering::Relaxed);
        self.step
            .store(((gain - current) / frames).to_bits(), Ordering::Relaxed);
    }

    /// The gain the stream is heading toward (the commanded volume).
    pub fn target(&self) -> f32 {
        f32::from_bits(self.target.load(Ordering::Relaxed))
    }

    /// The gain as of the last callback.
    pub fn current(&self) -> f32 {
        f32::from_bits(self.current.load(Ordering::Relaxed))
    }

    /// Advance the ramp by `frames` sample frames and return the gain
    /// to apply. Called from the audio callback only.
    pub fn advance(&self, frames: u32) -> f32 {
        let current = f32::from_bits(self.current.load(Ordering::Relaxed));
        let target = f32::from_bits(self.target.load(Ordering::Relaxed));
        let step = f32::from_bits(self.step.load(Ordering::Relaxed));
        if step == 0.0 || current == target {
            return target;
        }
        let moved = current + step * frames as f32;
        let next = if step > 0.0 {
            moved.min(target)
        } else {
            moved.max(target)
        };
        self.current.store(next.to_bits(), Ordering::Relaxed);
        next
    }
}

// ── AudioPlayer ──────────────────────────────────────────────────

/// Playback state for one audio stream key.
#[derive(Debug, Clone)]
pub struct AudioPlayer {
    key: AudioStreamKey,
    ring: SharedPcmRing,
    volume: Arc<VolumeControl>,
    running: Arc<AtomicBool>,
}

impl AudioPlayer {
    /// Create a player for a stream key, allocating a ring sized for
    /// the key's decode format.
    pub fn new(key: AudioStreamKey) -> Self {
        let decode = key.decode_type;
        Self {
            key,
            ring: Arc::new(PcmRing::for_stream(decode.sample_rate(), decode.channels())),
            volume: Arc::new(VolumeControl::new(1.0)),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn key(&self) -> AudioStreamKey {
        self.key
    }

    pub fn sample_rate(&self) -> u32 {
        self.key.decode_type.sample_rate()
    }

    pub fn channels(&self) -> u16 {
        self.key.decode_type.channels()
    }

    /// The ring buffer handle registered with the protocol worker.
    pub fn ring(&self) -> SharedPcmRing {
        Arc::clone(&self.ring)
    }

    /// Shared volume state for the playback sink.
    pub fn volume_control(&self) -> Arc<VolumeControl> {
        Arc::clone(&self.volume)
    }

    /// The commanded volume.
    pub fn volume(&self) -> f32 {
        self.volume.target()
    }

    /// Set volume immediately.
    pub fn set_volume(&self, gain: f32) {
        self.volume.set(gain);
    }

    /// Ramp volume over `duration`.
    pub fn ramp_volume(&self, gain: f32, duration: Duration) {
        self.volume.ramp(gain, duration, self.sample_rate());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Shared running flag for the playback sink.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Stop playback and drop any buffered samples.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.ring.clear();
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::DecodeType;

    fn key(decode: DecodeType, audio_type: u8) -> AudioStreamKey {
        AudioStreamKey {
            decode_type: decode,
            audio_type,
        }
    }

    #[test]
    fn set_volume_is_immediate() {
        let vol = VolumeControl::new(1.0);
        vol.set(0.5);
        assert!((vol.current() - 0.5).abs() < f32::EPSILON);
        assert!((vol.advance(128) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn ramp_moves_toward_target() {
        let vol = VolumeControl::new(0.0);
        // 1 second ramp at 1000 Hz: step = 0.001/frame.
        vol.ramp(1.0, Duration::from_secs(1), 1000);

        let half = vol.advance(500);
        assert!((half - 0.5).abs() < 0.01, "got {half}");

        let full = vol.advance(1000);
        assert!((full - 1.0).abs() < f32::EPSILON);
        // Settled: further advances stay at target.
        assert!((vol.advance(1000) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn ramp_down_clamps_at_target() {
        let vol = VolumeControl::new(1.0);
        vol.ramp(0.2, Duration::from_millis(100), 1000);
        let settled = vol.advance(10_000);
        assert!((settled - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_duration_ramp_is_a_set() {
        let vol = VolumeControl::new(0.0);
        vol.ramp(0.8, Duration::ZERO, 48_000);
        assert!((vol.current() - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn gain_clamped_to_unit_range() {
        let vol = VolumeControl::new(1.0);
        vol.set(3.0);
        assert!((vol.target() - 1.0).abs() < f32::EPSILON);
        vol.set(-1.0);
        assert!(vol.target().abs() < f32::EPSILON);
    }

    #[test]
    fn player_ring_matches_format() {
        let player = AudioPlayer::new(key(DecodeType::Stereo48k, 1));
        assert_eq!(player.sample_rate(), 48_000);
        assert_eq!(player.channels(), 2);
        assert_eq!(player.ring().sample_rate(), 48_000);
        assert!(player.is_running());
    }

    #[test]
    fn stop_clears_ring() {
        let player = AudioPlayer::new(key(DecodeType::Mono16k, 2));
        player.ring().push(crate::audio::PcmChunk::new(vec![1, 2, 3]));
        player.stop();
        assert!(!player.is_running());
        assert!(player.ring().is_empty());
    }
}
