//! rdpei-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does rdpei-client do? (for beginners)
//!
//! A remote-display client forwards the local user's fingers and stylus to
//! the remote machine over a dedicated input channel.  The host application
//! (the part that owns the window and receives OS touch events) calls
//! [`InputEngine`](application::engine::InputEngine) once per event:
//!
//! 1. `touch_begin`, `touch_update`, `pen_hover_begin`, ... record the
//!    latest state of each contact in a fixed-size registry.
//! 2. When the peer sends SC_READY, the engine answers with CS_READY and the
//!    channel becomes ready.
//! 3. Every 20 ms (or sooner, when new input arrives) a drive cycle turns the
//!    registries into one TOUCH_EVENT and/or PEN_EVENT frame and hands the
//!    encoded bytes to the injected
//!    [`ChannelTransport`](application::engine::ChannelTransport).
//! 4. If the peer sends SUSPEND_INPUT, the host's
//!    [`TouchControlHandler`](application::host::TouchControlHandler) is
//!    told to stop; frames are held back until input resumes.

/// Application layer: the input engine and its seams.
pub mod application;

/// Infrastructure layer: transports, host callbacks and config storage.
pub mod infrastructure;
