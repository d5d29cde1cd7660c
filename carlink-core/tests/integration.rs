//! Integration tests — full session lifecycle, failure/retry
//! behavior, and hot-plug scenarios against a scripted dongle driver
//! and a mock device watcher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use carlink_core::{
    AudioMetadata, AudioStreamKey, DecodeType, DeviceEvent, DeviceWatcher, DongleDriver, LinkError,
    MockWatcher, Orchestrator, PipelineOptions, PointerEvent, PointerPhase, ProtocolCommand,
    ProtocolContext, ProtocolEvent, SessionConfig, SessionHandle, SessionOptions, SessionPhase,
    TouchAction,
};

// ── Helpers ──────────────────────────────────────────────────────

/// Driver that records every command it receives and forwards
/// externally injected events, exiting when the command channel
/// closes.
struct BridgeDriver {
    inject: mpsc::Receiver<ProtocolEvent>,
    seen: mpsc::Sender<ProtocolCommand>,
}

#[async_trait]
impl DongleDriver for BridgeDriver {
    async fn run(self: Box<Self>, mut ctx: ProtocolContext) -> Result<(), LinkError> {
        let BridgeDriver { mut inject, seen } = *self;
        let mut inject_open = true;
        loop {
            tokio::select! {
                cmd = ctx.commands.recv() => match cmd {
                    Some(cmd) => seen.send(cmd).await?,
                    None => return Ok(()),
                },
                event = inject.recv(), if inject_open => match event {
                    Some(event) => ctx.events.send(event).await?,
                    None => inject_open = false,
                },
            }
        }
    }
}

/// A running orchestrator with scripted device and dongle sides.
struct Rig {
    handle: SessionHandle,
    watcher: Arc<MockWatcher>,
    inject: mpsc::Sender<ProtocolEvent>,
    seen: mpsc::Receiver<ProtocolCommand>,
    task: tokio::task::JoinHandle<Result<(), LinkError>>,
}

const RETRY: Duration = Duration::from_millis(50);

async fn rig(device_present: bool) -> Rig {
    let watcher = Arc::new(MockWatcher::new(device_present));
    let (inject_tx, inject_rx) = mpsc::channel(32);
    let (seen_tx, seen_rx) = mpsc::channel(64);

    let options = SessionOptions {
        audio: PipelineOptions {
            playback: false,
            capture: false,
        },
        retry_delay: RETRY,
    };

    let (orchestrator, handle) = Orchestrator::new(
        SessionConfig::default(),
        options,
        Box::new(Arc::clone(&watcher)),
        Box::new(BridgeDriver {
            inject: inject_rx,
            seen: seen_tx,
        }),
    );

    let task = tokio::spawn(orchestrator.run());

    Rig {
        handle,
        watcher,
        inject: inject_tx,
        seen: seen_rx,
        task,
    }
}

async fn next_command(rig: &mut Rig) -> ProtocolCommand {
    timeout(Duration::from_secs(2), rig.seen.recv())
        .await
        .expect("timeout waiting for command")
        .expect("command channel closed")
}

/// Assert no further command arrives within the given window.
async fn expect_quiet(rig: &mut Rig, window: Duration) {
    if let Ok(Some(cmd)) = timeout(window, rig.seen.recv()).await {
        panic!("unexpected command: {cmd:?}");
    }
}

fn stream_key(decode: DecodeType, audio_type: u8) -> AudioStreamKey {
    AudioStreamKey {
        decode_type: decode,
        audio_type,
    }
}

// ── Session lifecycle ────────────────────────────────────────────

#[tokio::test]
async fn mount_initialises_then_starts() {
    let mut rig = rig(true).await;

    assert!(matches!(
        next_command(&mut rig).await,
        ProtocolCommand::Initialise { .. }
    ));
    assert!(matches!(
        next_command(&mut rig).await,
        ProtocolCommand::Start { config } if config == SessionConfig::default()
    ));

    rig.handle.stop().await.unwrap();
    assert!(matches!(
        next_command(&mut rig).await,
        ProtocolCommand::Stop
    ));
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn plugged_state_reaches_status() {
    let mut rig = rig(true).await;
    let mut status = rig.handle.status();

    // Consume the mount traffic.
    next_command(&mut rig).await;
    next_command(&mut rig).await;

    rig.inject.send(ProtocolEvent::Plugged).await.unwrap();
    status.wait_for(|s| s.plugged).await.unwrap();
    assert!(!status.borrow().is_loading());

    rig.inject.send(ProtocolEvent::Unplugged).await.unwrap();
    status.wait_for(|s| !s.plugged).await.unwrap();

    rig.handle.stop().await.unwrap();
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn no_device_means_no_start() {
    let mut rig = rig(false).await;
    let mut status = rig.handle.status();

    assert!(matches!(
        next_command(&mut rig).await,
        ProtocolCommand::Initialise { .. }
    ));
    status
        .wait_for(|s| s.device_found == Some(false))
        .await
        .unwrap();

    // No Start without a device; only the teardown Stop follows.
    rig.handle.stop().await.unwrap();
    assert!(matches!(
        next_command(&mut rig).await,
        ProtocolCommand::Stop
    ));
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn interactive_probe_after_not_found() {
    let mut rig = rig(false).await;
    let mut status = rig.handle.status();

    next_command(&mut rig).await; // Initialise
    status
        .wait_for(|s| s.device_found == Some(false))
        .await
        .unwrap();

    // Device appears; the UI requests an interactive probe.
    rig.watcher.set_present(true);
    rig.handle.check_device(true).await.unwrap();

    assert!(matches!(
        next_command(&mut rig).await,
        ProtocolCommand::Start { .. }
    ));
    status
        .wait_for(|s| s.device_found == Some(true))
        .await
        .unwrap();

    rig.handle.stop().await.unwrap();
    rig.task.await.unwrap().unwrap();
}

// ── Audio registration ───────────────────────────────────────────

#[tokio::test]
async fn request_buffer_registers_exactly_once() {
    let mut rig = rig(true).await;
    next_command(&mut rig).await; // Initialise
    next_command(&mut rig).await; // Start

    let key = stream_key(DecodeType::Stereo48k, 1);
    rig.inject
        .send(ProtocolEvent::RequestBuffer(key))
        .await
        .unwrap();

    match next_command(&mut rig).await {
        ProtocolCommand::RegisterBuffer { key: seen, ring } => {
            assert_eq!(seen, key);
            assert_eq!(ring.sample_rate(), 48_000);
            assert_eq!(ring.channels(), 2);
        }
        other => panic!("expected RegisterBuffer, got {other:?}"),
    }

    // Same stream again: the player already exists, nothing crosses
    // the boundary.
    rig.inject
        .send(ProtocolEvent::RequestBuffer(key))
        .await
        .unwrap();
    expect_quiet(&mut rig, Duration::from_millis(100)).await;

    rig.handle.stop().await.unwrap();
    rig.task.await.unwrap().unwrap();
}

// ── Failure / retry ──────────────────────────────────────────────

#[tokio::test]
async fn failure_schedules_single_flight_reload() {
    let mut rig = rig(true).await;
    next_command(&mut rig).await; // Initialise
    next_command(&mut rig).await; // Start

    // Two failures in quick succession: only one reload may fire.
    rig.inject.send(ProtocolEvent::Failure).await.unwrap();
    rig.inject.send(ProtocolEvent::Failure).await.unwrap();

    assert!(matches!(
        next_command(&mut rig).await,
        ProtocolCommand::Stop
    ));
    assert!(matches!(
        next_command(&mut rig).await,
        ProtocolCommand::Start { .. }
    ));

    // No second Stop/Start pair from the swallowed failure.
    expect_quiet(&mut rig, RETRY * 3).await;

    rig.handle.stop().await.unwrap();
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn stop_cancels_pending_reload() {
    let mut rig = rig(true).await;
    next_command(&mut rig).await; // Initialise
    next_command(&mut rig).await; // Start

    rig.inject.send(ProtocolEvent::Failure).await.unwrap();
    // Stop before the backoff elapses.
    rig.handle.stop().await.unwrap();

    assert!(matches!(
        next_command(&mut rig).await,
        ProtocolCommand::Stop
    ));

    // The backoff window passes without a reload Start.
    expect_quiet(&mut rig, RETRY * 3).await;
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn audio_traffic_cancels_pending_reload() {
    let mut rig = rig(true).await;
    let mut status = rig.handle.status();
    next_command(&mut rig).await; // Initialise
    next_command(&mut rig).await; // Start

    rig.inject.send(ProtocolEvent::Failure).await.unwrap();
    status
        .wait_for(|s| s.phase == SessionPhase::Failed)
        .await
        .unwrap();

    // The session recovers: buffer traffic arrives before the
    // backoff elapses, so no reload fires and the phase leaves
    // Failed.
    rig.inject
        .send(ProtocolEvent::RequestBuffer(stream_key(
            DecodeType::Stereo44k,
            2,
        )))
        .await
        .unwrap();

    assert!(matches!(
        next_command(&mut rig).await,
        ProtocolCommand::RegisterBuffer { .. }
    ));
    status
        .wait_for(|s| s.phase == SessionPhase::Unplugged)
        .await
        .unwrap();
    expect_quiet(&mut rig, RETRY * 3).await;

    // A recovered session accepts plug events again.
    rig.inject.send(ProtocolEvent::Plugged).await.unwrap();
    status.wait_for(|s| s.plugged).await.unwrap();

    rig.handle.stop().await.unwrap();
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn plugged_status_survives_transient_failure() {
    let mut rig = rig(true).await;
    let mut status = rig.handle.status();
    next_command(&mut rig).await; // Initialise
    next_command(&mut rig).await; // Start

    rig.inject.send(ProtocolEvent::Plugged).await.unwrap();
    status.wait_for(|s| s.plugged).await.unwrap();

    // A failure does not hide the display; only unplug events do.
    rig.inject.send(ProtocolEvent::Failure).await.unwrap();
    status
        .wait_for(|s| s.phase == SessionPhase::Failed)
        .await
        .unwrap();
    assert!(status.borrow().plugged);

    // Renewed audio traffic restores the plugged phase.
    rig.inject
        .send(ProtocolEvent::Audio(AudioMetadata::stream(
            DecodeType::Stereo48k,
            1,
        )))
        .await
        .unwrap();
    status
        .wait_for(|s| s.phase == SessionPhase::Plugged)
        .await
        .unwrap();
    assert!(status.borrow().plugged);

    rig.inject.send(ProtocolEvent::Unplugged).await.unwrap();
    status.wait_for(|s| !s.plugged).await.unwrap();

    rig.handle.stop().await.unwrap();
    rig.task.await.unwrap().unwrap();
}

// ── Hot-plug ─────────────────────────────────────────────────────

#[tokio::test]
async fn detach_glitch_does_not_stop_session() {
    let mut rig = rig(true).await;
    next_command(&mut rig).await; // Initialise
    next_command(&mut rig).await; // Start
    rig.inject.send(ProtocolEvent::Plugged).await.unwrap();

    // OS-level detach, but the dongle is still enumerable.
    rig.watcher.emit(DeviceEvent::Detached).await;
    expect_quiet(&mut rig, Duration::from_millis(100)).await;

    // The session state is untouched.
    let mut status = rig.handle.status();
    status.wait_for(|s| s.plugged).await.unwrap();

    rig.handle.stop().await.unwrap();
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn confirmed_detach_stops_and_reprobes() {
    let mut rig = rig(true).await;
    let mut status = rig.handle.status();
    next_command(&mut rig).await; // Initialise
    next_command(&mut rig).await; // Start
    rig.inject.send(ProtocolEvent::Plugged).await.unwrap();
    status.wait_for(|s| s.plugged).await.unwrap();

    // Dongle truly gone.
    rig.watcher.set_present(false);
    rig.watcher.emit(DeviceEvent::Detached).await;

    assert!(matches!(
        next_command(&mut rig).await,
        ProtocolCommand::Stop
    ));
    status
        .wait_for(|s| s.device_found == Some(false))
        .await
        .unwrap();

    // Re-attach: the same worker and channels carry the new session —
    // only a fresh Start crosses the boundary, never a second
    // Initialise.
    rig.watcher.set_present(true);
    rig.watcher
        .emit(DeviceEvent::Attached(
            rig.watcher.probe(false).await.unwrap().unwrap(),
        ))
        .await;

    assert!(matches!(
        next_command(&mut rig).await,
        ProtocolCommand::Start { .. }
    ));

    rig.handle.stop().await.unwrap();
    rig.task.await.unwrap().unwrap();
}

// ── Touch ────────────────────────────────────────────────────────

#[tokio::test]
async fn touch_events_normalized_and_ordered() {
    let mut rig = rig(true).await;
    next_command(&mut rig).await; // Initialise
    next_command(&mut rig).await; // Start

    // A move with no active press is dropped at the normalizer.
    rig.handle
        .send_touch(PointerEvent::new(PointerPhase::Move, 10.0, 10.0))
        .await
        .unwrap();

    // Default config is 800×480.
    rig.handle
        .send_touch(PointerEvent::new(PointerPhase::Down, 400.0, 240.0))
        .await
        .unwrap();
    rig.handle
        .send_touch(PointerEvent::new(PointerPhase::Up, 400.0, 240.0))
        .await
        .unwrap();

    match next_command(&mut rig).await {
        ProtocolCommand::Touch(touch) => {
            assert_eq!(touch.action, TouchAction::Down);
            assert!((touch.x - 0.5).abs() < f32::EPSILON);
            assert!((touch.y - 0.5).abs() < f32::EPSILON);
        }
        other => panic!("expected Touch, got {other:?}"),
    }
    match next_command(&mut rig).await {
        ProtocolCommand::Touch(touch) => assert_eq!(touch.action, TouchAction::Up),
        other => panic!("expected Touch, got {other:?}"),
    }

    rig.handle.stop().await.unwrap();
    rig.task.await.unwrap().unwrap();
}
