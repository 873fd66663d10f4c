//! Contact bookkeeping for the input channel.
//!
//! This module contains pure logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! The innermost layer of the workspace is the **domain**.  Domain code has
//! no imports from OS APIs, network libraries or async runtimes, and can be
//! tested on any platform without external setup.  Here it answers one
//! question: given the events the host reported so far, which contacts go
//! into the next frame, and with which flags?

/// Normalised touch and pen contacts built from host events.
pub mod contact;

/// Fixed-capacity slot tables for touch and pen contacts.
///
/// See [`registry::ContactRegistry`] for the main type.
pub mod registry;

/// Draining registries into frames and tracking frame timestamps.
pub mod batcher;
