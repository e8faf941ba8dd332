//! Typed action requests and their outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::BatteryState;

/// Reply for every successful command.
pub const MSG_SUCCESS: &str = "Command processed successfully";
/// Reply when another action holds the robot.
pub const MSG_BUSY: &str = "Vector not available while executing other action";
/// Reply when the session is not connected.
pub const MSG_NOT_CONNECTED: &str =
    "Vector not available, make sure it's on, place it on charger and invoke LEAVECHARGER action";
/// Reply when leave-charger could not reach the robot.
pub const MSG_RECOVERY_FAILED: &str =
    "Vector not available, make sure it's on, on its charger and try again";
/// Reply when the robot returned no battery data.
pub const MSG_NO_BATTERY_DATA: &str = "battery_state not available";
/// Reply when reading the battery failed.
pub const MSG_BATTERY_ERROR: &str = "error getting battery_state";

/// Every action the handler exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    LeaveCharger,
    GoToCharger,
    DriveStraight,
    TurnLeft,
    TurnRight,
    Talk,
    PlayAnimation,
    Ping,
    Info,
}

impl ActionKind {
    /// All kinds, in route order.
    pub const ALL: [Self; 9] = [
        Self::LeaveCharger,
        Self::GoToCharger,
        Self::DriveStraight,
        Self::TurnLeft,
        Self::TurnRight,
        Self::Talk,
        Self::PlayAnimation,
        Self::Ping,
        Self::Info,
    ];

    /// Upper-case label used in request logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::LeaveCharger => "LEAVECHARGER",
            Self::GoToCharger => "GOTOCHARGER",
            Self::DriveStraight => "DRIVESTRAIGHT",
            Self::TurnLeft => "TURNLEFT",
            Self::TurnRight => "TURNRIGHT",
            Self::Talk => "TALK",
            Self::PlayAnimation => "ANIMATION",
            Self::Ping => "PING",
            Self::Info => "INFO",
        }
    }

    /// Whether the action reads fields from a request body.
    #[must_use]
    pub const fn has_payload(self) -> bool {
        matches!(
            self,
            Self::DriveStraight | Self::TurnLeft | Self::TurnRight | Self::Talk | Self::PlayAnimation
        )
    }

    /// Whether the action moves or drives the robot and therefore needs the gate.
    #[must_use]
    pub const fn is_mutating(self) -> bool {
        !matches!(self, Self::Info)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A validated command that drives the robot. Runs under the execution gate.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LeaveCharger,
    GoToCharger,
    DriveStraight { distance_mm: f64, speed_mmps: f64 },
    TurnLeft { degrees: f64 },
    TurnRight { degrees: f64 },
    Talk { message: String },
    /// `animation_id` is the SDK identifier resolved from the catalog.
    PlayAnimation { name: String, animation_id: &'static str },
    Ping,
}

impl Command {
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::LeaveCharger => ActionKind::LeaveCharger,
            Self::GoToCharger => ActionKind::GoToCharger,
            Self::DriveStraight { .. } => ActionKind::DriveStraight,
            Self::TurnLeft { .. } => ActionKind::TurnLeft,
            Self::TurnRight { .. } => ActionKind::TurnRight,
            Self::Talk { .. } => ActionKind::Talk,
            Self::PlayAnimation { .. } => ActionKind::PlayAnimation,
            Self::Ping => ActionKind::Ping,
        }
    }
}

/// A validated request, ready for the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionRequest {
    /// Drives the robot.
    Command(Command),
    /// Read-only battery query.
    Info,
}

impl ActionRequest {
    /// The kind this request belongs to.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Command(command) => command.kind(),
            Self::Info => ActionKind::Info,
        }
    }
}

impl From<Command> for ActionRequest {
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}

/// Why the robot could not be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    /// The session is not connected; leave-charger must run first.
    NotConnected,
    /// Leave-charger spent both connect attempts.
    RecoveryFailed,
    /// The robot answered a read with no data.
    NoData,
}

impl Unavailable {
    /// Human-readable reason.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotConnected => MSG_NOT_CONNECTED,
            Self::RecoveryFailed => MSG_RECOVERY_FAILED,
            Self::NoData => MSG_NO_BATTERY_DATA,
        }
    }
}

/// Result of running one action. Exactly one is produced per request.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// A mutating action completed.
    Success(String),
    /// The read-only battery query completed.
    Battery(BatteryState),
    /// Another mutating action is in flight.
    Busy,
    Unavailable(Unavailable),
    /// The device raised an error while running the action.
    DeviceError(String),
    /// The payload was rejected before touching the session.
    InvalidRequest(String),
}

impl ActionOutcome {
    /// Success with the standard reply.
    #[must_use]
    pub fn success() -> Self {
        Self::Success(MSG_SUCCESS.to_string())
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Battery(_))
    }

    /// Short tag for structured logs.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Battery(_) => "battery",
            Self::Busy => "busy",
            Self::Unavailable(_) => "unavailable",
            Self::DeviceError(_) => "device_error",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }

    /// Human-readable message for the response envelope.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Success(msg) | Self::DeviceError(msg) | Self::InvalidRequest(msg) => {
                msg.clone()
            }
            Self::Battery(_) => MSG_SUCCESS.to_string(),
            Self::Busy => MSG_BUSY.to_string(),
            Self::Unavailable(reason) => reason.message().to_string(),
        }
    }
}
