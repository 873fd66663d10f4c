//! Storage infrastructure: configuration file loading.
//!
//! The `config` sub-module reads the engine's TOML configuration and falls
//! back to defaults when no file exists yet.

pub mod config;
