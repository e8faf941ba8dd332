//! Single-flight action executor for the Vector robot handler.
//!
//! Provides:
//! - `ActionExecutor` - Serialize mutating actions against the device session
//! - `Gate` - Atomic busy token with scoped release

pub mod executor;
pub mod gate;

pub use executor::ActionExecutor;
pub use gate::{Gate, GateGuard};
