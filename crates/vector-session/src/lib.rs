//! Device session lifecycle for the Vector robot handler.
//!
//! Provides:
//! - `DeviceSession` - Own the single robot connection and its state machine
//! - `DeviceLease` - Mediated access to the connected device
//! - Driver implementations (simulated)

pub mod driver;
pub mod manager;

pub use manager::{DeviceLease, DeviceSession, SessionError, SessionState};
