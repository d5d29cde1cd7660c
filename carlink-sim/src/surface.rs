//! Headless draw surface.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use carlink_core::{DrawSurface, VideoFrame};
use tracing::info;

/// Surface that discards pixels but keeps count, logging throughput
/// once a second's worth of frames has arrived.
pub struct NullSurface {
    painted: Arc<AtomicU64>,
    bytes: u64,
    log_every: u64,
}

impl NullSurface {
    pub fn new(log_every: u64) -> (Self, Arc<AtomicU64>) {
        let painted = Arc::new(AtomicU64::new(0));
        (
            Self {
                painted: Arc::clone(&painted),
                bytes: 0,
                log_every: log_every.max(1),
            },
            painted,
        )
    }
}

impl DrawSurface for NullSurface {
    fn paint(&mut self, frame: &VideoFrame) {
        self.bytes += frame.data.len() as u64;
        let n = self.painted.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.log_every == 0 {
            info!(
                frames = n,
                bytes = self.bytes,
                width = frame.width,
                height = frame.height,
                "render sink"
            );
        }
    }
}
