//! Transport layer for the Vector robot handler.
//!
//! Provides:
//! - Wire protocol (routes, envelope, status mapping)
//! - HTTP transport (feature: http)

pub mod protocol;

#[cfg(feature = "http")]
pub mod http;

pub use protocol::{Envelope, ResponseBody};
