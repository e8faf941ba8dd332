//! Wire protocol: routes and response bodies.

use serde::{Deserialize, Serialize};
use vector_core::{ActionKind, ActionOutcome, BatteryState};

/// HTTP verb an action is exposed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
}

/// Path and verb for an action.
#[must_use]
pub const fn route(kind: ActionKind) -> (Verb, &'static str) {
    match kind {
        ActionKind::LeaveCharger => (Verb::Post, "/vector/action/leavecharger"),
        ActionKind::GoToCharger => (Verb::Post, "/vector/action/gotocharger"),
        ActionKind::DriveStraight => (Verb::Post, "/vector/action/drivestraight"),
        ActionKind::TurnLeft => (Verb::Post, "/vector/action/turnleft"),
        ActionKind::TurnRight => (Verb::Post, "/vector/action/turnright"),
        ActionKind::Talk => (Verb::Post, "/vector/action/talk"),
        ActionKind::PlayAnimation => (Verb::Post, "/vector/action/animation"),
        ActionKind::Ping => (Verb::Get, "/vector/ping"),
        ActionKind::Info => (Verb::Get, "/vector/info"),
    }
}

/// Result envelope for every action: `result` is 0 on success, -1 otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub result: i32,
    pub message: String,
}

impl Envelope {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            result: 0,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            result: -1,
            message: message.into(),
        }
    }
}

/// Response body: the envelope, or a flat battery reading for info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Battery(BatteryState),
    Envelope(Envelope),
}

impl From<&ActionOutcome> for ResponseBody {
    fn from(outcome: &ActionOutcome) -> Self {
        match outcome {
            ActionOutcome::Battery(state) => Self::Battery(state.clone()),
            ActionOutcome::Success(message) => Self::Envelope(Envelope::ok(message.clone())),
            other => Self::Envelope(Envelope::error(other.message())),
        }
    }
}

/// Status class for an outcome, kept independent of any HTTP crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    Conflict,
    InternalError,
}

impl Status {
    /// Numeric HTTP status code.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::Conflict => 409,
            Self::InternalError => 500,
        }
    }
}

/// Status for an outcome of `kind`.
///
/// Busy and an unconnected session are conflicts. Leave-charger running out
/// of connect attempts and info failures are bad requests.
#[must_use]
pub const fn status_for(kind: ActionKind, outcome: &ActionOutcome) -> Status {
    use vector_core::Unavailable;

    match outcome {
        ActionOutcome::Success(_) | ActionOutcome::Battery(_) => Status::Ok,
        ActionOutcome::InvalidRequest(_)
        | ActionOutcome::Unavailable(Unavailable::RecoveryFailed | Unavailable::NoData) => {
            Status::BadRequest
        }
        ActionOutcome::Busy | ActionOutcome::Unavailable(Unavailable::NotConnected) => {
            Status::Conflict
        }
        ActionOutcome::DeviceError(_) => {
            if matches!(kind, ActionKind::Info) {
                Status::BadRequest
            } else {
                Status::InternalError
            }
        }
    }
}
