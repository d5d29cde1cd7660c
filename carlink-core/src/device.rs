//! Dongle discovery and hot-plug watching.
//!
//! Wraps the OS USB stack behind the [`DeviceWatcher`] trait so the
//! orchestrator (and tests) can run against a scripted device. The
//! real implementation enumerates via `nusb` and converts its hotplug
//! stream into typed attach/detach events.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::LinkError;

// ── Known hardware ───────────────────────────────────────────────

/// USB identity of a supported dongle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DongleId {
    pub vendor_id: u16,
    pub product_id: u16,
}

/// The adapter hardware this session layer speaks to.
pub const KNOWN_DONGLES: [DongleId; 2] = [
    DongleId {
        vendor_id: 0x1314,
        product_id: 0x1520,
    },
    DongleId {
        vendor_id: 0x1314,
        product_id: 0x1521,
    },
];

/// Whether a vendor/product pair is a supported dongle.
pub fn is_known_dongle(vendor_id: u16, product_id: u16) -> bool {
    KNOWN_DONGLES
        .iter()
        .any(|d| d.vendor_id == vendor_id && d.product_id == product_id)
}

// ── DeviceInfo / DeviceEvent ─────────────────────────────────────

/// An enumerated dongle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial: Option<String>,
}

/// Hot-plug notifications.
///
/// `Detached` is deliberately untyped: the OS reports removals for any
/// USB device, and the dongle may or may not be among them. The
/// orchestrator re-probes before acting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Attached(DeviceInfo),
    Detached,
}

// ── DeviceWatcher ────────────────────────────────────────────────

/// Boundary to the OS device stack.
#[async_trait]
pub trait DeviceWatcher: Send + Sync {
    /// Query for a supported dongle.
    ///
    /// Non-interactive probes silently enumerate already-accessible
    /// devices and are safe to run on every hotplug event.
    /// Interactive probes (first-time pairing) additionally open the
    /// device so missing OS permissions surface as
    /// [`LinkError::DeviceAccess`] for the UI to present.
    async fn probe(&self, interactive: bool) -> Result<Option<DeviceInfo>, LinkError>;

    /// Subscribe to attach/detach events. Called once per session.
    fn watch(&self) -> Result<mpsc::Receiver<DeviceEvent>, LinkError>;
}

// ── UsbWatcher ───────────────────────────────────────────────────

/// `nusb`-backed watcher for real hardware.
#[derive(Debug, Default)]
pub struct UsbWatcher;

impl UsbWatcher {
    pub fn new() -> Self {
        Self
    }

    fn find_dongle() -> Result<Option<nusb::DeviceInfo>, LinkError> {
        let devices = nusb::list_devices()?;
        Ok(devices.into_iter().find(|d| is_known_dongle(d.vendor_id(), d.product_id())))
    }
}

#[async_trait]
impl DeviceWatcher for UsbWatcher {
    async fn probe(&self, interactive: bool) -> Result<Option<DeviceInfo>, LinkError> {
        let Some(info) = Self::find_dongle()? else {
            return Ok(None);
        };

        if interactive {
            // Opening verifies we actually have access, the closest
            // native equivalent of a permission prompt outcome.
            info.open()
                .map_err(|e| LinkError::DeviceAccess(e.to_string()))?;
        }

        Ok(Some(DeviceInfo {
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            serial: info.serial_number().map(str::to_owned),
        }))
    }

    fn watch(&self) -> Result<mpsc::Receiver<DeviceEvent>, LinkError> {
        let mut hotplug = nusb::watch_devices()?;
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            while let Some(event) = hotplug.next().await {
                let mapped = match event {
                    nusb::hotplug::HotplugEvent::Connected(info) => {
                        if !is_known_dongle(info.vendor_id(), info.product_id()) {
                            continue;
                        }
                        DeviceEvent::Attached(DeviceInfo {
                            vendor_id: info.vendor_id(),
                            product_id: info.product_id(),
                            serial: info.serial_number().map(str::to_owned),
                        })
                    }
                    nusb::hotplug::HotplugEvent::Disconnected(_) => DeviceEvent::Detached,
                };
                if tx.send(mapped).await.is_err() {
                    break;
                }
            }
            debug!("hotplug stream ended");
        });

        Ok(rx)
    }
}

#[async_trait]
impl<W: DeviceWatcher + ?Sized> DeviceWatcher for std::sync::Arc<W> {
    async fn probe(&self, interactive: bool) -> Result<Option<DeviceInfo>, LinkError> {
        (**self).probe(interactive).await
    }

    fn watch(&self) -> Result<mpsc::Receiver<DeviceEvent>, LinkError> {
        (**self).watch()
    }
}

// ── MockWatcher ──────────────────────────────────────────────────

/// Scripted watcher for tests and the session harness.
///
/// Presence is toggled externally; hotplug events are injected
/// through [`emit`](Self::emit).
pub struct MockWatcher {
    present: std::sync::atomic::AtomicBool,
    events: std::sync::Mutex<Option<mpsc::Receiver<DeviceEvent>>>,
    event_tx: mpsc::Sender<DeviceEvent>,
}

impl MockWatcher {
    pub fn new(present: bool) -> Self {
        let (event_tx, event_rx) = mpsc::channel(16);
        Self {
            present: std::sync::atomic::AtomicBool::new(present),
            events: std::sync::Mutex::new(Some(event_rx)),
            event_tx,
        }
    }

    /// Toggle whether probes find the device.
    pub fn set_present(&self, present: bool) {
        self.present
            .store(present, std::sync::atomic::Ordering::SeqCst);
    }

    /// Inject a hotplug event.
    pub async fn emit(&self, event: DeviceEvent) {
        let _ = self.event_tx.send(event).await;
    }

    fn device() -> DeviceInfo {
        DeviceInfo {
            vendor_id: KNOWN_DONGLES[0].vendor_id,
            product_id: KNOWN_DONGLES[0].product_id,
            serial: Some("MOCK0001".into()),
        }
    }
}

#[async_trait]
impl DeviceWatcher for MockWatcher {
    async fn probe(&self, _interactive: bool) -> Result<Option<DeviceInfo>, LinkError> {
        if self.present.load(std::sync::atomic::Ordering::SeqCst) {
            Ok(Some(Self::device()))
        } else {
            Ok(None)
        }
    }

    fn watch(&self) -> Result<mpsc::Receiver<DeviceEvent>, LinkError> {
        self.events
            .lock()
            .expect("watcher lock")
            .take()
            .ok_or(LinkError::EndpointMoved("device events"))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_dongle_table() {
        assert!(is_known_dongle(0x1314, 0x1520));
        assert!(is_known_dongle(0x1314, 0x1521));
        assert!(!is_known_dongle(0x1314, 0x1522));
        assert!(!is_known_dongle(0xdead, 0x1520));
    }

    #[tokio::test]
    async fn mock_probe_follows_presence() {
        let watcher = MockWatcher::new(false);
        assert!(watcher.probe(false).await.unwrap().is_none());

        watcher.set_present(true);
        let found = watcher.probe(true).await.unwrap().unwrap();
        assert!(is_known_dongle(found.vendor_id, found.product_id));
    }

    #[tokio::test]
    async fn mock_events_delivered_in_order() {
        let watcher = MockWatcher::new(true);
        let mut rx = watcher.watch().unwrap();

        watcher.emit(DeviceEvent::Detached).await;
        watcher
            .emit(DeviceEvent::Attached(MockWatcher::device()))
            .await;

        assert_eq!(rx.recv().await, Some(DeviceEvent::Detached));
        assert!(matches!(rx.recv().await, Some(DeviceEvent::Attached(_))));
    }

    #[tokio::test]
    async fn mock_watch_is_single_use() {
        let watcher = MockWatcher::new(true);
        let _rx = watcher.watch().unwrap();
        assert!(watcher.watch().is_err());
    }
}
