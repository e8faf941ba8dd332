//! Core abstractions for the Vector robot handler.
//!
//! This crate provides the fundamental building blocks:
//! - `Device` / `DeviceFactory` - the driver interface the SDK must satisfy
//! - `ActionRequest` / `Command` / `ActionOutcome` - typed requests and their results
//! - `catalog` - payload validation and the animation table
//! - `SessionSettings` - identity and timeouts for the device session

pub mod action;
pub mod catalog;
pub mod device;
pub mod identity;

pub use action::{ActionKind, ActionOutcome, ActionRequest, Command, Unavailable};
pub use catalog::{ValidationError, parse_request};
pub use device::{BatteryState, Device, DeviceError, DeviceFactory};
pub use identity::{DeviceIdentity, SessionSettings};
