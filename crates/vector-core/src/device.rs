//! Driver-facing traits for the robot SDK.
//!
//! The SDK itself lives outside this workspace. Anything that can connect to
//! a robot and run the capability calls below can back a session.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::DeviceIdentity;

/// Battery reading reported by the robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryState {
    /// Battery voltage in volts.
    pub voltage: f64,
    /// Coarse battery level as reported by the SDK (0 unknown, 1 low, 2 nominal, 3 full).
    pub level: u8,
    pub is_charging: bool,
    pub on_charger: bool,
    /// Suggested remaining time on the charger, in seconds.
    #[serde(rename = "suggestedChargerTime")]
    pub suggested_charger_secs: f64,
}

/// Device-level failure raised by a driver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),
    #[error("Device not connected")]
    NotConnected,
    #[error("Device command failed: {0}")]
    Command(String),
}

/// A connection handle to one physical robot.
///
/// Methods take `&self`: a handle is shared between the in-flight mutating
/// action and concurrent battery reads, so drivers synchronise internally.
#[async_trait]
pub trait Device: Send + Sync {
    /// Open the connection.
    async fn connect(&self, timeout: Duration) -> Result<(), DeviceError>;

    /// Close the connection.
    async fn disconnect(&self) -> Result<(), DeviceError>;

    /// Leave the charger and move onto the table.
    async fn drive_off_charger(&self) -> Result<(), DeviceError>;

    /// Find and dock onto the charger.
    async fn drive_on_charger(&self) -> Result<(), DeviceError>;

    /// Drive in a straight line.
    async fn drive_straight(&self, distance_mm: f64, speed_mmps: f64) -> Result<(), DeviceError>;

    /// Turn in place; positive is counter-clockwise (left).
    async fn turn_in_place(&self, degrees: f64) -> Result<(), DeviceError>;

    /// Speak `text` through the robot's speaker.
    async fn say_text(&self, text: &str) -> Result<(), DeviceError>;

    /// Play an animation by its SDK identifier.
    async fn play_animation(&self, animation_id: &str) -> Result<(), DeviceError>;

    /// Read the battery state; `None` when the robot returned nothing.
    async fn battery_state(&self) -> Result<Option<BatteryState>, DeviceError>;
}

/// Creates fresh, unconnected device handles.
pub trait DeviceFactory: Send + Sync {
    /// Build a new handle bound to `identity`.
    fn create(&self, identity: &DeviceIdentity) -> Box<dyn Device>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_state_wire_names() {
        let state = BatteryState {
            voltage: 3.9,
            level: 2,
            is_charging: false,
            on_charger: true,
            suggested_charger_secs: 0.0,
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["isCharging"], false);
        assert_eq!(json["onCharger"], true);
        assert_eq!(json["suggestedChargerTime"], 0.0);
        assert!(json.get("suggestedChargerSecs").is_none());
    }
}
