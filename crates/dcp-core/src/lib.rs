//! Core domain + application logic for the Discord channel purge.
//!
//! This crate is intentionally transport-agnostic. The Discord REST API lives
//! behind the `ChannelApi` port, implemented in the adapter crate.

pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod ports;
pub mod retry;
pub mod sweep;

pub use errors::{Error, Result};
