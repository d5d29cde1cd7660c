//! Render worker boundary.
//!
//! The render context receives exactly one init message — the draw
//! surface and the video channel endpoint, both moved in — and then
//! consumes frames straight off the channel with no further
//! control-path traffic. Rendering is a sink: nothing flows back.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::messages::{RenderInit, VideoFrame};

// ── DrawSurface ──────────────────────────────────────────────────

/// An offscreen drawing target whose ownership has been transferred
/// to the render worker.
pub trait DrawSurface: Send {
    /// Paint one decoded frame.
    fn paint(&mut self, frame: &VideoFrame);
}

// ── RenderWorker ─────────────────────────────────────────────────

/// Handle to a spawned render worker.
pub struct RenderWorker {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RenderWorker {
    /// Spawn the worker, consuming the init payload.
    ///
    /// Taking [`RenderInit`] by value is the one-way handoff: the
    /// surface and endpoint are unreachable from the controller the
    /// moment this returns.
    pub fn spawn(init: RenderInit) -> Self {
        let cancel = CancellationToken::new();
        let child = cancel.clone();

        let task = tokio::spawn(async move {
            let RenderInit {
                mut surface,
                mut video,
            } = init;
            let mut painted: u64 = 0;

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    frame = video.recv() => match frame {
                        Some(frame) => {
                            surface.paint(&frame);
                            painted += 1;
                        }
                        // Producer endpoint gone; nothing left to paint.
                        None => break,
                    },
                }
            }
            debug!(painted, "render worker exiting");
        });

        Self { cancel, task }
    }

    /// Terminate the worker. Safe to call more than once.
    pub fn terminate(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MediaChannel;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    /// Surface that counts paints.
    struct CountingSurface(Arc<AtomicU64>);

    impl DrawSurface for CountingSurface {
        fn paint(&mut self, _frame: &VideoFrame) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn frame() -> VideoFrame {
        VideoFrame {
            width: 800,
            height: 480,
            data: Bytes::from_static(&[0u8; 16]),
        }
    }

    #[tokio::test]
    async fn frames_reach_the_surface_in_order() {
        let mut channel: MediaChannel<VideoFrame> = MediaChannel::new("video", 16);
        let producer = channel.take_first().unwrap();
        let consumer = channel.take_second().unwrap();

        let painted = Arc::new(AtomicU64::new(0));
        let worker = RenderWorker::spawn(RenderInit {
            surface: Box::new(CountingSurface(Arc::clone(&painted))),
            video: consumer,
        });

        for _ in 0..5 {
            producer.send(frame()).await.unwrap();
        }
        drop(producer);

        // Worker drains the channel then exits on producer drop.
        tokio::time::timeout(Duration::from_secs(1), async {
            while !worker.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(painted.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn terminate_stops_the_worker() {
        let mut channel: MediaChannel<VideoFrame> = MediaChannel::new("video", 16);
        let _producer = channel.take_first().unwrap();
        let consumer = channel.take_second().unwrap();

        let painted = Arc::new(AtomicU64::new(0));
        let worker = RenderWorker::spawn(RenderInit {
            surface: Box::new(CountingSurface(Arc::clone(&painted))),
            video: consumer,
        });

        worker.terminate();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !worker.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}
