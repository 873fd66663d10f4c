//! Application layer use cases for the input channel client.
//!
//! - **`engine`** – `InputEngine`: records host input into the contact
//!   registries, negotiates with the peer and runs drive cycles that turn
//!   registry state into TOUCH_EVENT / PEN_EVENT PDUs.  Transport and host
//!   callbacks are injected as trait objects.
//!
//! - **`cadence`** – The autonomous cycle driver and the `WakeHandle` a host
//!   awaits when it drives cycles itself.
//!
//! - **`host`** – Host-owned flags (`HostSession`) and the suspend/resume
//!   callback trait (`TouchControlHandler`).

pub mod cadence;
pub mod engine;
pub mod host;
