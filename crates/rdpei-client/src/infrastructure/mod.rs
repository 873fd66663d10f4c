//! Infrastructure layer for the input channel client.
//!
//! Contains the adapters injected into the engine and the config loader.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `rdpei_core`, but MUST NOT be imported by the `application` layer
//! outside of tests.
//!
//! # Sub-modules
//!
//! - **`transport`** – `ChannelTransport` implementations: a byte-stream
//!   writer, a logging sink and a recording mock.
//! - **`host_control`** – `TouchControlHandler` implementations that mirror
//!   suspend/resume into the shared `HostSession`.
//! - **`storage`** – TOML configuration loading.

pub mod host_control;
pub mod storage;
pub mod transport;
