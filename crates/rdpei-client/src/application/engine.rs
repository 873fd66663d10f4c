//! InputEngine: batches host touch/pen input into channel PDUs.
//!
//! This use case owns the contact registries, the negotiation state machine
//! and the frame timelines for one channel instance.  It depends only on
//! traits ([`ChannelTransport`], [`TouchControlHandler`]) and the pure types
//! from `rdpei_core`; infrastructure is injected at construction time.
//!
//! # Threads and locks
//!
//! - Producer calls (`touch_*`, `pen_*`) lock the state mutex, upsert one
//!   contact, unlock, then signal the wake [`Notify`].  They never block on
//!   I/O.
//! - A drive cycle ([`InputEngine::poll_cycle`]) holds the cycle gate for its
//!   whole duration so writes leave in order.  The state mutex is held only
//!   while draining; encoding and the transport write happen outside it.
//! - In autonomous mode a cadence task runs the cycles (see
//!   [`crate::application::cadence`]); in synchronous mode the host calls
//!   `poll_cycle` itself, typically after a [`WakeHandle`] fires.
//!
//! [`WakeHandle`]: crate::application::cadence::WakeHandle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rdpei_core::domain::batcher::{drain, pen_event, touch_event, FrameTimeline};
use rdpei_core::domain::contact::{PenOptionalFields, TouchOptionalFields};
use rdpei_core::domain::registry::{ExternalId, PenRegistry, TouchRegistry};
use rdpei_core::protocol::messages::{ContactFlags, PenContact, RdpeiPdu, TouchContact};
use rdpei_core::protocol::negotiation::{ChannelState, ProtocolSession, SessionAction};
use rdpei_core::{decode_pdu, encode_pdu, ProtocolError};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::application::cadence::{run_cadence, WakeHandle};
use crate::application::host::{HostFlags, HostSession, TouchControlHandler};

/// Minimum spacing between two drive cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

// ── Seams ─────────────────────────────────────────────────────────────────────

/// Error returned by a [`ChannelTransport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The channel was closed underneath the engine.
    #[error("channel is closed")]
    Closed,
    /// The transport rejected the write.
    #[error("write failed: {0}")]
    Write(String),
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sink for encoded PDUs.
///
/// `Ok` means "accepted for sending", not delivered.  Any error is fatal to
/// the channel instance; the engine never retries.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn write(&self, pdu: &[u8]) -> Result<(), TransportError>;
}

/// Error type for the input engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An inbound PDU was malformed or an outbound one could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// The host's suspend or resume callback reported a failure.
    #[error("host callback failed: {0}")]
    HostCallback(String),
    /// The channel was closed or failed earlier.
    #[error("input channel is terminated")]
    Terminated,
}

/// Result of one drive cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// At least one frame was written.
    Sent {
        touch_contacts: usize,
        pen_contacts: usize,
    },
    /// No contact to report.
    Idle,
    /// The previous cycle ran less than one poll interval ago.
    RateLimited,
    /// The host has input suspended; contacts stay dirty.
    Suspended,
    /// Negotiation has not completed yet.
    NotReady,
}

/// Construction-time engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// `true`: the host drives cycles.  `false`: a cadence task does.
    pub synchronous_mode: bool,
    pub poll_interval: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            synchronous_mode: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// Everything guarded by the engine's single state lock.
#[derive(Debug, Default)]
struct EngineState {
    session: ProtocolSession,
    touch: TouchRegistry,
    pen: PenRegistry,
    touch_timeline: FrameTimeline,
    pen_timeline: FrameTimeline,
    last_cycle: Option<Instant>,
}

/// One input channel instance.
pub struct InputEngine {
    state: Mutex<EngineState>,
    wake: Arc<Notify>,
    cycle_gate: tokio::sync::Mutex<()>,
    transport: Arc<dyn ChannelTransport>,
    control: Arc<dyn TouchControlHandler>,
    host: Arc<HostSession>,
    options: EngineOptions,
    epoch: Instant,
    running: AtomicBool,
    cadence: Mutex<Option<JoinHandle<()>>>,
}

impl InputEngine {
    /// Creates an engine in the `Uninitialized` state.  Call [`open`] once
    /// the channel is connected.
    ///
    /// [`open`]: InputEngine::open
    pub fn new(
        options: EngineOptions,
        transport: Arc<dyn ChannelTransport>,
        control: Arc<dyn TouchControlHandler>,
        host: Arc<HostSession>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(EngineState::default()),
            wake: Arc::new(Notify::new()),
            cycle_gate: tokio::sync::Mutex::new(()),
            transport,
            control,
            host,
            options,
            epoch: Instant::now(),
            running: AtomicBool::new(false),
            cadence: Mutex::new(None),
        })
    }

    /// Marks the channel open and, in autonomous mode, spawns the cadence
    /// task.  Must be called from within a Tokio runtime.
    pub fn open(self: &Arc<Self>) {
        self.lock_state().session.open();
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        if !self.options.synchronous_mode {
            let handle = tokio::spawn(run_cadence(Arc::clone(self)));
            *self.lock_cadence() = Some(handle);
        }
        info!(
            synchronous = self.options.synchronous_mode,
            "input channel opened, waiting for peer"
        );
    }

    /// Stops the cadence task and terminates the session.
    ///
    /// Pending contacts are discarded, not flushed.
    pub async fn close(&self) {
        self.running.store(false, Ordering::Release);
        self.wake.notify_one();

        let handle = self.lock_cadence().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("cadence task ended abnormally: {e}");
            }
        }

        let mut state = self.lock_state();
        state.session.terminate();
        state.touch.clear();
        state.pen.clear();
        info!("input channel closed");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Handle the host can await in synchronous mode.
    pub fn wake_handle(&self) -> WakeHandle {
        WakeHandle::new(Arc::clone(&self.wake))
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn channel_state(&self) -> ChannelState {
        self.lock_state().session.state()
    }

    /// Negotiated protocol version.
    pub fn version(&self) -> u32 {
        self.lock_state().session.version()
    }

    /// Feature bits advertised by the peer.
    pub fn features(&self) -> u32 {
        self.lock_state().session.features()
    }

    pub(crate) fn wake(&self) -> &Notify {
        &self.wake
    }

    // ── Touch input ───────────────────────────────────────────────────────────

    /// A finger touched down.  Returns the contact id, or `None` if all 64
    /// slots are in use.
    pub fn touch_begin(&self, external_id: ExternalId, x: i32, y: i32) -> Option<u8> {
        self.touch_raw_event(
            external_id,
            x,
            y,
            ContactFlags::DOWN | ContactFlags::INRANGE | ContactFlags::INCONTACT,
            TouchOptionalFields::new(),
        )
    }

    pub fn touch_update(&self, external_id: ExternalId, x: i32, y: i32) -> Option<u8> {
        self.touch_raw_event(
            external_id,
            x,
            y,
            ContactFlags::ONGOING,
            TouchOptionalFields::new(),
        )
    }

    /// A finger lifted.  The contact is reported once with UP, then freed.
    pub fn touch_end(&self, external_id: ExternalId, x: i32, y: i32) -> Option<u8> {
        self.touch_raw_event(external_id, x, y, ContactFlags::UP, TouchOptionalFields::new())
    }

    pub fn touch_cancel(&self, external_id: ExternalId, x: i32, y: i32) -> Option<u8> {
        self.touch_raw_event(
            external_id,
            x,
            y,
            ContactFlags::UP | ContactFlags::CANCELED,
            TouchOptionalFields::new(),
        )
    }

    /// Records a touch event with explicit flags and optional fields.
    ///
    /// A DOWN flag may allocate a slot; anything else updates an existing
    /// contact or is dropped.
    pub fn touch_raw_event(
        &self,
        external_id: ExternalId,
        x: i32,
        y: i32,
        flags: ContactFlags,
        fields: TouchOptionalFields,
    ) -> Option<u8> {
        let contact = TouchContact::from_event(x, y, flags, fields);
        let slot = self.lock_state().touch.upsert(external_id, contact);
        if slot.is_some() {
            self.wake.notify_one();
        }
        slot
    }

    // ── Pen input ─────────────────────────────────────────────────────────────

    pub fn pen_begin(
        &self,
        external_id: ExternalId,
        x: i32,
        y: i32,
        fields: PenOptionalFields,
    ) -> Option<u8> {
        self.pen_raw_event(
            external_id,
            ContactFlags::DOWN | ContactFlags::INRANGE | ContactFlags::INCONTACT,
            x,
            y,
            fields,
        )
    }

    pub fn pen_update(
        &self,
        external_id: ExternalId,
        x: i32,
        y: i32,
        fields: PenOptionalFields,
    ) -> Option<u8> {
        self.pen_raw_event(external_id, ContactFlags::ONGOING, x, y, fields)
    }

    /// The pen left the surface but is still in range.  The slot stays bound
    /// until [`pen_hover_cancel`](InputEngine::pen_hover_cancel).
    pub fn pen_end(
        &self,
        external_id: ExternalId,
        x: i32,
        y: i32,
        fields: PenOptionalFields,
    ) -> Option<u8> {
        self.pen_raw_event(external_id, ContactFlags::UP | ContactFlags::INRANGE, x, y, fields)
    }

    pub fn pen_hover_begin(
        &self,
        external_id: ExternalId,
        x: i32,
        y: i32,
        fields: PenOptionalFields,
    ) -> Option<u8> {
        self.pen_raw_event(external_id, ContactFlags::UPDATE | ContactFlags::INRANGE, x, y, fields)
    }

    pub fn pen_hover_update(
        &self,
        external_id: ExternalId,
        x: i32,
        y: i32,
        fields: PenOptionalFields,
    ) -> Option<u8> {
        self.pen_raw_event(external_id, ContactFlags::UPDATE | ContactFlags::INRANGE, x, y, fields)
    }

    /// The pen left detection range; its slot is freed after the next frame.
    pub fn pen_hover_cancel(
        &self,
        external_id: ExternalId,
        x: i32,
        y: i32,
        fields: PenOptionalFields,
    ) -> Option<u8> {
        self.pen_raw_event(external_id, ContactFlags::UPDATE | ContactFlags::CANCELED, x, y, fields)
    }

    /// Records a pen event with explicit flags and optional fields.
    ///
    /// An INRANGE flag may allocate one of the four pen slots.
    pub fn pen_raw_event(
        &self,
        external_id: ExternalId,
        flags: ContactFlags,
        x: i32,
        y: i32,
        fields: PenOptionalFields,
    ) -> Option<u8> {
        let contact = PenContact::from_event(x, y, flags, fields);
        let slot = self.lock_state().pen.upsert(external_id, contact);
        if slot.is_some() {
            self.wake.notify_one();
        }
        slot
    }

    // ── Drive cycle ───────────────────────────────────────────────────────────

    /// Runs one drive cycle with the host's current flags.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if encoding or the transport write fails; the
    /// channel is terminated in that case.
    pub async fn poll_cycle(&self) -> Result<CycleOutcome, EngineError> {
        self.drive_cycle(self.host.snapshot()).await
    }

    /// Runs one drive cycle with an explicit flag snapshot.
    ///
    /// # Errors
    ///
    /// See [`InputEngine::poll_cycle`].
    pub async fn drive_cycle(&self, flags: HostFlags) -> Result<CycleOutcome, EngineError> {
        let _gate = self.cycle_gate.lock().await;
        let now = Instant::now();

        let (touch, pen) = {
            let mut state = self.lock_state();
            if state.session.is_terminated() {
                return Err(EngineError::Terminated);
            }
            if let Some(last) = state.last_cycle {
                if now.duration_since(last) < self.options.poll_interval {
                    return Ok(CycleOutcome::RateLimited);
                }
            }
            if !matches!(
                state.session.state(),
                ChannelState::Ready | ChannelState::Suspended
            ) {
                return Ok(CycleOutcome::NotReady);
            }
            state.last_cycle = Some(now);
            if flags.input_suspended {
                return Ok(CycleOutcome::Suspended);
            }

            let since_epoch = now.duration_since(self.epoch);
            let touch_contacts = drain(&mut state.touch);
            let touch = if touch_contacts.is_empty() {
                None
            } else {
                let offset = state.touch_timeline.stamp(since_epoch);
                Some(touch_event(touch_contacts, offset))
            };
            let pen_contacts = drain(&mut state.pen);
            let pen = if pen_contacts.is_empty() {
                None
            } else {
                let offset = state.pen_timeline.stamp(since_epoch);
                Some(pen_event(pen_contacts, offset))
            };
            (touch, pen)
        };

        if touch.is_none() && pen.is_none() {
            return Ok(CycleOutcome::Idle);
        }

        let mut touch_contacts = 0;
        if let Some(event) = touch {
            touch_contacts = event.frames.iter().map(|f| f.contacts.len()).sum();
            self.send(&RdpeiPdu::Touch(event)).await?;
            self.lock_state().touch_timeline.commit();
        }
        let mut pen_contacts = 0;
        if let Some(event) = pen {
            pen_contacts = event.frames.iter().map(|f| f.contacts.len()).sum();
            self.send(&RdpeiPdu::Pen(event)).await?;
            self.lock_state().pen_timeline.commit();
        }

        Ok(CycleOutcome::Sent {
            touch_contacts,
            pen_contacts,
        })
    }

    // ── Inbound ───────────────────────────────────────────────────────────────

    /// Processes bytes received from the peer.  `data` may hold several
    /// complete PDUs.
    ///
    /// # Errors
    ///
    /// A malformed PDU or a failed CS_READY write terminates the channel and
    /// is returned.  A failed host callback does not stop the remaining PDUs
    /// from being applied; the first such failure is returned at the end.
    pub async fn on_data_received(&self, data: &[u8]) -> Result<(), EngineError> {
        if self.lock_state().session.is_terminated() {
            return Err(EngineError::Terminated);
        }

        let mut callback_error = None;
        let mut rest = data;
        while !rest.is_empty() {
            let (pdu, consumed) = match decode_pdu(rest) {
                Ok(decoded) => decoded,
                Err(e) => return Err(self.fail(e.into())),
            };
            debug!(event_id = pdu.event_id(), len = consumed, "PDU received");
            rest = &rest[consumed..];
            match self.handle_pdu(&pdu).await {
                Ok(()) => {}
                Err(EngineError::HostCallback(reason)) => {
                    warn!(event_id = pdu.event_id(), "host callback failed: {reason}");
                    callback_error.get_or_insert(EngineError::HostCallback(reason));
                }
                Err(e) => return Err(e),
            }
        }
        callback_error.map_or(Ok(()), Err)
    }

    async fn handle_pdu(&self, pdu: &RdpeiPdu) -> Result<(), EngineError> {
        // SC_READY flips the session to Ready; hold the gate from then until
        // CS_READY is written so no frame can overtake the reply.
        let _gate = match pdu {
            RdpeiPdu::ScReady(_) => Some(self.cycle_gate.lock().await),
            _ => None,
        };
        let feature_mask = self.host.feature_mask();
        let action = self.lock_state().session.handle_pdu(pdu, feature_mask);

        match action {
            SessionAction::SendCsReady(reply) => {
                self.send(&RdpeiPdu::CsReady(reply)).await?;
                info!(
                    version = reply.protocol_version,
                    flags = reply.flags,
                    "input channel ready"
                );
                self.wake.notify_one();
            }
            SessionAction::SuspendInput => {
                info!("peer suspended input");
                self.control
                    .suspend_touch()
                    .map_err(EngineError::HostCallback)?;
            }
            SessionAction::ResumeInput => {
                info!("peer resumed input");
                self.control
                    .resume_touch()
                    .map_err(EngineError::HostCallback)?;
                self.wake.notify_one();
            }
            SessionAction::Ignore => {}
        }
        Ok(())
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Encodes and writes one PDU.  Callers hold the cycle gate.
    async fn send(&self, pdu: &RdpeiPdu) -> Result<(), EngineError> {
        let bytes = encode_pdu(pdu).map_err(|e| self.fail(e.into()))?;
        self.transport
            .write(&bytes)
            .await
            .map_err(|e| self.fail(e.into()))?;
        debug!(event_id = pdu.event_id(), len = bytes.len(), "PDU sent");
        Ok(())
    }

    /// Terminates the session and passes the error through.
    fn fail(&self, err: EngineError) -> EngineError {
        error!("input channel failed: {err}");
        self.lock_state().session.terminate();
        err
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_cadence(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.cadence.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
