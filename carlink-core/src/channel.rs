//! Duplex media channels with single-transfer endpoint ownership.
//!
//! A [`MediaChannel`] is the in-process equivalent of a two-port message
//! channel: two [`Endpoint`]s, each able to send to and receive from the
//! other. Each endpoint is handed to its owning worker exactly once —
//! taking an endpoint is a move, and a second take returns
//! [`LinkError::EndpointMoved`] instead of silently aliasing a channel
//! that another execution context already owns.

use tokio::sync::mpsc;

use crate::error::LinkError;

// ── Endpoint ─────────────────────────────────────────────────────

/// One end of a duplex media channel.
///
/// Holds the sending half toward the peer and the receiving half from
/// the peer. `send`/`recv` are async; [`try_send`](Self::try_send) is
/// for non-async producers (audio callbacks) and drops the item when
/// the channel is full rather than blocking a real-time thread.
#[derive(Debug)]
pub struct Endpoint<T> {
    tx: mpsc::Sender<T>,
    rx: mpsc::Receiver<T>,
}

impl<T> Endpoint<T> {
    /// Send an item to the peer endpoint.
    pub async fn send(&self, item: T) -> Result<(), LinkError> {
        self.tx.send(item).await.map_err(|_| LinkError::ChannelClosed)
    }

    /// Non-blocking send for real-time contexts.
    ///
    /// Returns `false` if the channel is full or the peer is gone.
    pub fn try_send(&self, item: T) -> bool {
        self.tx.try_send(item).is_ok()
    }

    /// Receive the next item from the peer endpoint.
    ///
    /// Returns `None` when the peer endpoint has been dropped.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

// ── MediaChannel ─────────────────────────────────────────────────

/// A duplex channel whose two endpoints are each taken exactly once.
#[derive(Debug)]
pub struct MediaChannel<T> {
    label: &'static str,
    first: Option<Endpoint<T>>,
    second: Option<Endpoint<T>>,
}

impl<T> MediaChannel<T> {
    /// Create a channel with the given per-direction capacity.
    pub fn new(label: &'static str, capacity: usize) -> Self {
        let (a_tx, b_rx) = mpsc::channel(capacity);
        let (b_tx, a_rx) = mpsc::channel(capacity);
        Self {
            label,
            first: Some(Endpoint { tx: a_tx, rx: a_rx }),
            second: Some(Endpoint { tx: b_tx, rx: b_rx }),
        }
    }

    /// Take the first endpoint, transferring its ownership to a worker.
    pub fn take_first(&mut self) -> Result<Endpoint<T>, LinkError> {
        self.first.take().ok_or(LinkError::EndpointMoved(self.label))
    }

    /// Take the second endpoint, transferring its ownership to a worker.
    pub fn take_second(&mut self) -> Result<Endpoint<T>, LinkError> {
        self.second.take().ok_or(LinkError::EndpointMoved(self.label))
    }
}

// ── MediaChannelPair ─────────────────────────────────────────────

/// The two media channels a session needs: video (protocol worker →
/// render worker) and microphone (audio pipeline → protocol worker).
///
/// Created once per orchestrator and never recreated within its
/// lifetime — plug/unplug cycles and session reloads reuse the same
/// channels.
#[derive(Debug)]
pub struct MediaChannelPair {
    pub video: MediaChannel<crate::messages::VideoFrame>,
    pub microphone: MediaChannel<crate::audio::PcmChunk>,
}

impl MediaChannelPair {
    /// Channel capacities: video is small (frames are large and the
    /// render worker must not lag behind real time), microphone is
    /// deeper (capture chunks are tiny).
    pub fn new() -> Self {
        Self {
            video: MediaChannel::new("video", 16),
            microphone: MediaChannel::new("microphone", 64),
        }
    }
}

impl Default for MediaChannelPair {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn endpoints_are_duplex() {
        let mut ch: MediaChannel<u32> = MediaChannel::new("test", 4);
        let mut a = ch.take_first().unwrap();
        let mut b = ch.take_second().unwrap();

        a.send(7).await.unwrap();
        assert_eq!(b.recv().await, Some(7));

        b.send(9).await.unwrap();
        assert_eq!(a.recv().await, Some(9));
    }

    #[test]
    fn second_take_is_an_error() {
        let mut ch: MediaChannel<u32> = MediaChannel::new("video", 4);
        let _first = ch.take_first().unwrap();
        match ch.take_first() {
            Err(LinkError::EndpointMoved(label)) => assert_eq!(label, "video"),
            other => panic!("expected EndpointMoved, got {other:?}"),
        }
    }

    #[test]
    fn try_send_reports_full() {
        let mut ch: MediaChannel<u32> = MediaChannel::new("test", 1);
        let a = ch.take_first().unwrap();
        let _b = ch.take_second().unwrap();

        assert!(a.try_send(1));
        assert!(!a.try_send(2));
    }

    #[tokio::test]
    async fn recv_none_after_peer_drop() {
        let mut ch: MediaChannel<u32> = MediaChannel::new("test", 4);
        let a = ch.take_first().unwrap();
        let mut b = ch.take_second().unwrap();
        drop(a);
        assert_eq!(b.recv().await, None);
    }
}
