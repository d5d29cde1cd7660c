//! Lock-free PCM ring buffers for the audio playback path.
//!
//! Each [`PcmRing`] is a single-producer single-consumer queue: the
//! protocol worker writes sample chunks as they arrive off the wire,
//! the playback sink drains them from the audio callback. One writer
//! and one reader, fixed for the ring's lifetime — no locks.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::queue::ArrayQueue;

// ── PcmChunk ─────────────────────────────────────────────────────

/// A batch of interleaved 16-bit PCM samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmChunk {
    /// Interleaved samples.
    pub samples: Vec<i16>,
}

impl PcmChunk {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// Number of sample frames given the stream's channel count.
    pub fn frames(&self, channels: u16) -> usize {
        self.samples.len() / channels.max(1) as usize
    }
}

// ── PcmRing ──────────────────────────────────────────────────────

/// Assumed chunk granularity used when sizing a ring for a stream.
const ASSUMED_CHUNK_SAMPLES: usize = 480;

/// Buffered-audio target when sizing a ring for a stream.
const TARGET_BUFFER_MS: usize = 200;

/// Fixed-capacity SPSC ring of PCM chunks with overflow/underrun
/// accounting.
pub struct PcmRing {
    queue: ArrayQueue<PcmChunk>,
    sample_rate: u32,
    channels: u16,
    overflows: AtomicUsize,
    underruns: AtomicUsize,
}

impl PcmRing {
    /// Create a ring with an explicit chunk capacity.
    pub fn new(capacity: usize, sample_rate: u32, channels: u16) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            sample_rate,
            channels,
            overflows: AtomicUsize::new(0),
            underruns: AtomicUsize::new(0),
        }
    }

    /// Create a ring sized for a stream format: roughly
    /// [`TARGET_BUFFER_MS`] of audio at the stream's sample rate and
    /// channel count, clamped to a sane chunk range.
    pub fn for_stream(sample_rate: u32, channels: u16) -> Self {
        let samples_per_sec = sample_rate as usize * channels.max(1) as usize;
        let chunks = (samples_per_sec * TARGET_BUFFER_MS / 1000) / ASSUMED_CHUNK_SAMPLES;
        Self::new(chunks.clamp(16, 128), sample_rate, channels)
    }

    /// Push a chunk. Returns `false` and counts an overflow when full.
    pub fn push(&self, chunk: PcmChunk) -> bool {
        match self.queue.push(chunk) {
            Ok(()) => true,
            Err(_) => {
                self.overflows.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Pop a chunk. Returns `None` and counts an underrun when empty.
    pub fn pop(&self) -> Option<PcmChunk> {
        match self.queue.pop() {
            Some(chunk) => Some(chunk),
            None => {
                self.underruns.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Pop without counting an underrun.
    pub fn try_pop(&self) -> Option<PcmChunk> {
        self.queue.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn overflows(&self) -> usize {
        self.overflows.load(Ordering::Relaxed)
    }

    pub fn underruns(&self) -> usize {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Drop all buffered chunks.
    pub fn clear(&self) {
        while self.queue.pop().is_some() {}
    }
}

impl std::fmt::Debug for PcmRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcmRing")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish()
    }
}

/// Shared handle to a ring — the form registered with the protocol
/// worker so it can write samples directly.
pub type SharedPcmRing = Arc<PcmRing>;

// ── Tests ────────────────────────────────────────────────────────
