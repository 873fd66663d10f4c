//! End-to-end tests for the input engine: host calls in, decoded PDUs out.
//!
//! Every test runs on a paused Tokio clock so cycle timing is exact.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rdpei_client::application::engine::{
    ChannelTransport, CycleOutcome, EngineError, EngineOptions, InputEngine,
};
use rdpei_client::application::host::{HostSession, TouchControlHandler};
use rdpei_client::infrastructure::host_control::mock::RecordingControlHandler;
use rdpei_client::infrastructure::host_control::SessionControlHandler;
use rdpei_client::infrastructure::transport::mock::RecordingTransport;
use rdpei_core::protocol::messages::{
    cs_ready_flags, sc_ready_features, ScReadyPdu, PROTOCOL_V101, PROTOCOL_V200, PROTOCOL_V300,
};
use rdpei_core::{encode_pdu, ChannelState, ContactFlags, PenOptionalFields, RdpeiPdu};
use tokio::time::advance;
use tokio_test::assert_ok;

const TICK: Duration = Duration::from_millis(20);

fn begin_flags() -> ContactFlags {
    ContactFlags::DOWN | ContactFlags::INRANGE | ContactFlags::INCONTACT
}

fn sc_ready(version: u32, features: u32) -> Vec<u8> {
    encode_pdu(&RdpeiPdu::ScReady(ScReadyPdu {
        protocol_version: version,
        features: Some(features),
    }))
    .unwrap()
}

struct Harness {
    engine: Arc<InputEngine>,
    transport: Arc<RecordingTransport>,
    control: Arc<RecordingControlHandler>,
    host: Arc<HostSession>,
}

fn harness(synchronous_mode: bool) -> Harness {
    let transport = Arc::new(RecordingTransport::new());
    let control = Arc::new(RecordingControlHandler::new());
    let host = Arc::new(HostSession::default());
    let engine = InputEngine::new(
        EngineOptions {
            synchronous_mode,
            poll_interval: TICK,
        },
        Arc::clone(&transport) as Arc<dyn ChannelTransport>,
        Arc::clone(&control) as Arc<dyn TouchControlHandler>,
        Arc::clone(&host),
    );
    engine.open();
    Harness {
        engine,
        transport,
        control,
        host,
    }
}

async fn ready_harness() -> Harness {
    let h = harness(true);
    assert_ok!(h.engine.on_data_received(&sc_ready(PROTOCOL_V300, 0)).await);
    h.transport.clear();
    h
}

// ── Negotiation ───────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_cs_ready_advertises_allowed_flags() {
    // Arrange
    let h = harness(true);

    // Act
    let received = h
        .engine
        .on_data_received(&sc_ready(
            PROTOCOL_V300,
            sc_ready_features::MULTIPEN_INJECTION_SUPPORTED,
        ))
        .await;

    // Assert
    assert_ok!(received);
    let pdus = h.transport.pdus();
    let RdpeiPdu::CsReady(reply) = &pdus[0] else {
        panic!("expected CS_READY, got {:?}", pdus[0]);
    };
    assert_eq!(reply.protocol_version, PROTOCOL_V300);
    assert_eq!(
        reply.flags,
        cs_ready_flags::SHOW_TOUCH_VISUALS
            | cs_ready_flags::DISABLE_TIMESTAMP_INJECTION
            | cs_ready_flags::ENABLE_MULTIPEN_INJECTION
    );
    assert_eq!(h.engine.features(), sc_ready_features::MULTIPEN_INJECTION_SUPPORTED);
}

#[tokio::test(start_paused = true)]
async fn test_feature_mask_restricts_cs_ready_flags() {
    let h = harness(true);
    h.host.set_feature_mask(cs_ready_flags::SHOW_TOUCH_VISUALS);

    assert_ok!(h.engine.on_data_received(&sc_ready(PROTOCOL_V300, 1)).await);

    let pdus = h.transport.pdus();
    let RdpeiPdu::CsReady(reply) = &pdus[0] else {
        panic!("expected CS_READY");
    };
    assert_eq!(reply.flags, cs_ready_flags::SHOW_TOUCH_VISUALS);
}

#[tokio::test(start_paused = true)]
async fn test_older_peer_version_is_adopted() {
    // Arrange
    let h = harness(true);

    // Act
    assert_ok!(h.engine.on_data_received(&sc_ready(PROTOCOL_V200, 0)).await);

    // Assert
    let pdus = h.transport.pdus();
    let RdpeiPdu::CsReady(reply) = &pdus[0] else {
        panic!("expected CS_READY");
    };
    assert_eq!(reply.protocol_version, PROTOCOL_V200);
    assert_eq!(h.engine.version(), PROTOCOL_V200);
}

#[tokio::test(start_paused = true)]
async fn test_newer_peer_version_keeps_ours() {
    let h = harness(true);
    assert_ok!(h.engine.on_data_received(&sc_ready(0x0004_0000, 0)).await);
    assert_eq!(h.engine.version(), PROTOCOL_V300);
    assert_eq!(h.engine.channel_state(), ChannelState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_several_pdus_in_one_read() {
    // Arrange
    let h = harness(true);
    let mut wire = sc_ready(PROTOCOL_V101, 0);
    wire.extend(encode_pdu(&RdpeiPdu::SuspendInput).unwrap());

    // Act
    assert_ok!(h.engine.on_data_received(&wire).await);

    // Assert
    assert_eq!(h.engine.version(), PROTOCOL_V101);
    assert_eq!(h.engine.channel_state(), ChannelState::Suspended);
    assert_eq!(h.control.suspend_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_event_id_is_ignored() {
    let h = ready_harness().await;
    let unknown = [0x42, 0x00, 0x08, 0x00, 0x00, 0x00, 0xAA, 0xBB];

    assert_ok!(h.engine.on_data_received(&unknown).await);

    assert_eq!(h.engine.channel_state(), ChannelState::Ready);
    assert!(h.transport.writes().is_empty());
}

// ── Touch scenarios ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_end_then_new_contact_reuses_slot() {
    // Arrange
    let h = ready_harness().await;
    assert_eq!(h.engine.touch_begin(5, 10, 10), Some(0));
    assert_ok!(h.engine.poll_cycle().await);

    // Act
    advance(TICK).await;
    h.engine.touch_end(5, 12, 12);
    let up_cycle = h.engine.poll_cycle().await.unwrap();
    advance(TICK).await;
    let idle_cycle = h.engine.poll_cycle().await.unwrap();
    let reused = h.engine.touch_begin(6, 20, 20);

    // Assert
    assert_eq!(
        up_cycle,
        CycleOutcome::Sent {
            touch_contacts: 1,
            pen_contacts: 0
        }
    );
    assert_eq!(idle_cycle, CycleOutcome::Idle);
    assert_eq!(reused, Some(0));
    let frames = h.transport.touch_frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].frames[0].contacts[0].contact_flags, ContactFlags::UP);
}

#[tokio::test(start_paused = true)]
async fn test_two_fingers_share_one_frame_in_slot_order() {
    let h = ready_harness().await;
    h.engine.touch_begin(200, 1, 1);
    h.engine.touch_begin(100, 2, 2);

    let outcome = h.engine.poll_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Sent {
            touch_contacts: 2,
            pen_contacts: 0
        }
    );
    let frames = h.transport.touch_frames();
    let ids: Vec<u8> = frames[0].frames[0]
        .contacts
        .iter()
        .map(|c| c.contact_id)
        .collect();
    assert_eq!(ids, vec![0, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_sixty_fifth_finger_is_dropped() {
    // Arrange
    let h = ready_harness().await;
    for id in 0..64 {
        assert!(h.engine.touch_begin(id, 0, 0).is_some());
    }

    // Act
    let overflow = h.engine.touch_begin(64, 0, 0);
    let outcome = h.engine.poll_cycle().await.unwrap();

    // Assert
    assert_eq!(overflow, None);
    assert_eq!(
        outcome,
        CycleOutcome::Sent {
            touch_contacts: 64,
            pen_contacts: 0
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_update_without_begin_is_dropped() {
    let h = ready_harness().await;
    assert_eq!(h.engine.touch_update(9, 0, 0), None);
    assert_eq!(h.engine.poll_cycle().await.unwrap(), CycleOutcome::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_reports_canceled_and_frees_slot() {
    let h = ready_harness().await;
    h.engine.touch_begin(1, 0, 0);
    assert_ok!(h.engine.poll_cycle().await);
    advance(TICK).await;

    h.engine.touch_cancel(1, 0, 0);
    assert_ok!(h.engine.poll_cycle().await);

    let frames = h.transport.touch_frames();
    assert_eq!(
        frames[1].frames[0].contacts[0].contact_flags,
        ContactFlags::UP | ContactFlags::CANCELED
    );
    assert_eq!(h.engine.touch_begin(2, 0, 0), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_frame_offsets_track_cycle_spacing() {
    // Arrange
    let h = ready_harness().await;
    h.engine.touch_begin(1, 0, 0);

    // Act
    assert_ok!(h.engine.poll_cycle().await);
    advance(Duration::from_millis(35)).await;
    assert_ok!(h.engine.poll_cycle().await);
    advance(TICK).await;
    assert_ok!(h.engine.poll_cycle().await);

    // Assert
    let offsets: Vec<u64> = h
        .transport
        .touch_frames()
        .iter()
        .map(|e| e.frames[0].frame_offset)
        .collect();
    assert_eq!(offsets, vec![0, 35_000, 20_000]);
}

// ── Suspension ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_peer_suspend_holds_frames_until_resume() {
    // Arrange: the control handler mirrors suspend/resume into the host flags.
    let transport = Arc::new(RecordingTransport::new());
    let host = Arc::new(HostSession::default());
    let engine = InputEngine::new(
        EngineOptions {
            synchronous_mode: true,
            poll_interval: TICK,
        },
        Arc::clone(&transport) as Arc<dyn ChannelTransport>,
        Arc::new(SessionControlHandler::new(Arc::clone(&host))),
        Arc::clone(&host),
    );
    engine.open();
    assert_ok!(engine.on_data_received(&sc_ready(PROTOCOL_V300, 0)).await);
    transport.clear();

    // Act
    engine.touch_begin(1, 0, 0);
    engine.pen_begin(3, 0, 0, PenOptionalFields::new().pressure(100));
    assert_ok!(
        engine
            .on_data_received(&encode_pdu(&RdpeiPdu::SuspendInput).unwrap())
            .await
    );
    for x in 1..=5 {
        engine.touch_update(1, x, 0);
        engine.pen_update(3, x * 2, 0, PenOptionalFields::new().pressure(100 + x as u32));
    }
    let held = engine.poll_cycle().await.unwrap();
    assert_ok!(
        engine
            .on_data_received(&encode_pdu(&RdpeiPdu::ResumeInput).unwrap())
            .await
    );
    advance(TICK).await;
    let released = engine.poll_cycle().await.unwrap();

    // Assert
    assert_eq!(held, CycleOutcome::Suspended);
    assert_eq!(
        released,
        CycleOutcome::Sent {
            touch_contacts: 1,
            pen_contacts: 1
        }
    );
    let frames = transport.touch_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].frames[0].contacts[0].x, 5);
    let pen_frames = transport.pen_frames();
    assert_eq!(pen_frames.len(), 1);
    let pen = &pen_frames[0].frames[0].contacts[0];
    assert_eq!(pen.x, 10);
    assert_eq!(pen.pressure, Some(105));
    assert_eq!(pen.contact_flags, ContactFlags::ONGOING);
}

#[tokio::test(start_paused = true)]
async fn test_failing_callback_does_not_terminate() {
    let h = ready_harness().await;
    h.control.should_fail.store(true, Ordering::SeqCst);

    let result = h
        .engine
        .on_data_received(&encode_pdu(&RdpeiPdu::SuspendInput).unwrap())
        .await;

    assert!(matches!(result, Err(EngineError::HostCallback(_))));
    assert_eq!(h.engine.channel_state(), ChannelState::Suspended);
}

#[tokio::test(start_paused = true)]
async fn test_failing_callback_still_applies_rest_of_read() {
    // Arrange
    let h = ready_harness().await;
    h.control.should_fail.store(true, Ordering::SeqCst);
    let mut wire = encode_pdu(&RdpeiPdu::SuspendInput).unwrap();
    wire.extend(encode_pdu(&RdpeiPdu::ResumeInput).unwrap());

    // Act
    let result = h.engine.on_data_received(&wire).await;

    // Assert
    assert!(matches!(result, Err(EngineError::HostCallback(_))));
    assert_eq!(h.engine.channel_state(), ChannelState::Ready);
    assert_eq!(h.control.suspend_calls(), 1);
    assert_eq!(h.control.resume_calls(), 1);
}

// ── Failure ───────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_transport_failure_on_cs_ready_terminates() {
    let h = harness(true);
    h.transport.fail_writes(true);

    let result = h.engine.on_data_received(&sc_ready(PROTOCOL_V300, 0)).await;

    assert!(matches!(result, Err(EngineError::Transport(_))));
    assert_eq!(h.engine.channel_state(), ChannelState::Terminated);
    assert!(matches!(
        h.engine.on_data_received(&sc_ready(PROTOCOL_V300, 0)).await,
        Err(EngineError::Terminated)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_truncated_pdu_terminates() {
    let h = ready_harness().await;
    let mut wire = encode_pdu(&RdpeiPdu::SuspendInput).unwrap();
    wire[2] = 0x10;

    let result = h.engine.on_data_received(&wire).await;

    assert!(matches!(result, Err(EngineError::Protocol(_))));
    assert_eq!(h.engine.channel_state(), ChannelState::Terminated);
}

// ── Pen ───────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_touch_and_pen_in_same_cycle() {
    let h = ready_harness().await;
    h.engine.touch_begin(1, 0, 0);
    h.engine
        .pen_begin(1, 5, 5, PenOptionalFields::new().pressure(300));

    let outcome = h.engine.poll_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Sent {
            touch_contacts: 1,
            pen_contacts: 1
        }
    );
    let pdus = h.transport.pdus();
    assert!(matches!(pdus[0], RdpeiPdu::Touch(_)));
    assert!(matches!(pdus[1], RdpeiPdu::Pen(_)));
}

#[tokio::test(start_paused = true)]
async fn test_pen_stays_bound_after_lift_until_cancel() {
    // Arrange
    let h = ready_harness().await;
    let none = PenOptionalFields::new();
    h.engine.pen_begin(3, 0, 0, none);
    assert_ok!(h.engine.poll_cycle().await);

    // Act
    advance(TICK).await;
    h.engine.pen_end(3, 0, 0, none);
    assert_ok!(h.engine.poll_cycle().await);
    advance(TICK).await;
    let hovering = h.engine.poll_cycle().await.unwrap();
    let hover_update = h.engine.pen_hover_update(3, 1, 1, none);
    advance(TICK).await;
    h.engine.pen_hover_cancel(3, 1, 1, none);
    assert_ok!(h.engine.poll_cycle().await);
    advance(TICK).await;
    let gone = h.engine.poll_cycle().await.unwrap();

    // Assert
    assert!(matches!(hovering, CycleOutcome::Sent { pen_contacts: 1, .. }));
    assert_eq!(hover_update, Some(0));
    assert_eq!(gone, CycleOutcome::Idle);
    let frames = h.transport.pen_frames();
    assert_eq!(
        frames[1].frames[0].contacts[0].contact_flags,
        ContactFlags::UP | ContactFlags::INRANGE
    );
}

#[tokio::test(start_paused = true)]
async fn test_fifth_pen_is_dropped() {
    let h = ready_harness().await;
    for id in 0..4 {
        assert!(h
            .engine
            .pen_hover_begin(id, 0, 0, PenOptionalFields::new())
            .is_some());
    }
    assert_eq!(
        h.engine.pen_hover_begin(4, 0, 0, PenOptionalFields::new()),
        None
    );
}

// ── Drivers ───────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_wake_handle_fires_on_input() {
    let h = ready_harness().await;
    let wake = h.engine.wake_handle();

    h.engine.touch_begin(1, 0, 0);

    assert!(wake.wait_timeout(TICK).await);
}

#[tokio::test(start_paused = true)]
async fn test_cadence_task_sends_frames_until_close() {
    // Arrange
    let h = harness(false);
    assert_ok!(h.engine.on_data_received(&sc_ready(PROTOCOL_V300, 0)).await);

    // Act
    h.engine.touch_begin(1, 10, 10);
    tokio::time::sleep(Duration::from_millis(70)).await;
    h.engine.touch_end(1, 10, 10);
    tokio::time::sleep(Duration::from_millis(70)).await;
    let sent_before_close = h.transport.touch_frames().len();
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.engine.close().await;

    // Assert
    let frames = h.transport.touch_frames();
    assert!(frames.len() >= 3);
    assert_eq!(frames[0].frames[0].contacts[0].contact_flags, begin_flags());
    let last = frames.last().unwrap();
    assert_eq!(last.frames[0].contacts[0].contact_flags, ContactFlags::UP);
    assert_eq!(frames.len(), sent_before_close);
    assert!(!h.engine.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_cadence_task_stops_after_transport_failure() {
    let h = harness(false);
    assert_ok!(h.engine.on_data_received(&sc_ready(PROTOCOL_V300, 0)).await);
    h.transport.fail_writes(true);

    h.engine.touch_begin(1, 0, 0);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.engine.channel_state(), ChannelState::Terminated);
    h.engine.close().await;
}
