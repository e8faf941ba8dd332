//! Device driver implementations.

#[cfg(feature = "simulated")]
pub mod simulated;

#[cfg(feature = "simulated")]
pub use simulated::{DeviceCall, Fault, SimulatedRobot};
