//! Action catalog: payload validation and the animation table.

use serde_json::Value;
use thiserror::Error;

use crate::{ActionKind, ActionRequest, Command};

/// SDK identifier of the animation played by ping.
pub const PING_ANIMATION: &str = "anim_blackjack_swipe_01";
/// Phrase spoken by ping after the animation.
pub const PING_PHRASE: &str = "Yes, I'm here";
/// Phrase spoken once the robot has left its charger.
pub const READY_PHRASE: &str = "I am ready";

/// Friendly animation names accepted over HTTP, mapped to SDK identifiers.
pub const ANIMATIONS: &[(&str, &str)] = &[
    ("blackjack_swipe", "anim_blackjack_swipe_01"),
    ("blackjack_win", "anim_blackjack_victorwin_01"),
    ("blackjack_lose", "anim_blackjack_victorlose_01"),
    ("bored", "anim_bored_event_01"),
    ("dance", "anim_dancebeat_getout_01"),
    ("fistbump", "anim_fistbump_success_01"),
    ("happy", "anim_feedback_goodrobot_01"),
    ("hello", "anim_greeting_hello_01"),
    ("love", "anim_feedback_iloveyou_01"),
    ("no", "anim_feedback_shutup_01"),
    ("pounce", "anim_pounce_success_02"),
    ("sad", "anim_feedback_badrobot_01"),
    ("sleepy", "anim_gotosleep_getin_01"),
    ("surprised", "anim_reacttoface_unidentified_01"),
    ("yes", "anim_rtpickup_loop_01"),
];

/// Reason a payload was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid request. Missing field '{0}'")]
    MissingField(&'static str),
    #[error("Invalid request. Field '{0}' must be a number")]
    NotANumber(&'static str),
    #[error("Invalid request. Field '{0}' must be a non-empty string")]
    EmptyText(&'static str),
    #[error("Invalid request. Animation not found")]
    UnknownAnimation(String),
}

/// Look up the SDK identifier for an animation name.
#[must_use]
pub fn animation_id(name: &str) -> Option<&'static str> {
    ANIMATIONS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, id)| *id)
}

/// Validate a JSON body for `kind` and build the typed request.
///
/// Kinds without a payload ignore `body` entirely.
///
/// # Errors
/// Returns an error if a required field is missing, has the wrong type,
/// or names an unknown animation.
pub fn parse_request(kind: ActionKind, body: &Value) -> Result<ActionRequest, ValidationError> {
    let command = match kind {
        ActionKind::Info => return Ok(ActionRequest::Info),
        ActionKind::LeaveCharger => Command::LeaveCharger,
        ActionKind::GoToCharger => Command::GoToCharger,
        ActionKind::Ping => Command::Ping,
        ActionKind::DriveStraight => Command::DriveStraight {
            distance_mm: number(body, "distance")?,
            speed_mmps: number(body, "speed")?,
        },
        ActionKind::TurnLeft => Command::TurnLeft {
            degrees: number(body, "degrees")?,
        },
        ActionKind::TurnRight => Command::TurnRight {
            degrees: number(body, "degrees")?,
        },
        ActionKind::Talk => Command::Talk {
            message: text(body, "message")?,
        },
        ActionKind::PlayAnimation => {
            let name = text(body, "animation")?;
            let animation_id = animation_id(&name)
                .ok_or_else(|| ValidationError::UnknownAnimation(name.clone()))?;
            Command::PlayAnimation { name, animation_id }
        }
    };
    Ok(command.into())
}

fn field<'a>(body: &'a Value, name: &'static str) -> Result<&'a Value, ValidationError> {
    match body.get(name) {
        None | Some(Value::Null) => Err(ValidationError::MissingField(name)),
        Some(value) => Ok(value),
    }
}

fn number(body: &Value, name: &'static str) -> Result<f64, ValidationError> {
    field(body, name)?
        .as_f64()
        .ok_or(ValidationError::NotANumber(name))
}

fn text(body: &Value, name: &'static str) -> Result<String, ValidationError> {
    match field(body, name)? {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        _ => Err(ValidationError::EmptyText(name)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_drive_straight_passes_signs_through() {
        let req = parse_request(
            ActionKind::DriveStraight,
            &json!({"distance": -100, "speed": -50.5}),
        )
        .unwrap();
        assert_eq!(
            req,
            ActionRequest::Command(Command::DriveStraight {
                distance_mm: -100.0,
                speed_mmps: -50.5
            })
        );
    }

    #[test]
    fn test_drive_straight_requires_both_fields() {
        let err = parse_request(ActionKind::DriveStraight, &json!({"distance": 100})).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("speed"));

        let err = parse_request(
            ActionKind::DriveStraight,
            &json!({"distance": "far", "speed": 10}),
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::NotANumber("distance"));
    }

    #[test]
    fn test_turn_keeps_raw_degrees() {
        let req = parse_request(ActionKind::TurnLeft, &json!({"degrees": -30})).unwrap();
        assert_eq!(req, ActionRequest::from(Command::TurnLeft { degrees: -30.0 }));
    }

    #[test]
    fn test_talk_rejects_empty_message() {
        assert_eq!(
            parse_request(ActionKind::Talk, &json!({"message": ""})).unwrap_err(),
            ValidationError::EmptyText("message")
        );
        assert_eq!(
            parse_request(ActionKind::Talk, &json!({"message": 42})).unwrap_err(),
            ValidationError::EmptyText("message")
        );
        assert_eq!(
            parse_request(ActionKind::Talk, &Value::Null).unwrap_err(),
            ValidationError::MissingField("message")
        );
    }

    #[test]
    fn test_animation_lookup() {
        let req = parse_request(ActionKind::PlayAnimation, &json!({"animation": "happy"})).unwrap();
        assert_eq!(
            req,
            ActionRequest::Command(Command::PlayAnimation {
                name: "happy".to_string(),
                animation_id: "anim_feedback_goodrobot_01"
            })
        );

        let err =
            parse_request(ActionKind::PlayAnimation, &json!({"animation": "moonwalk"})).unwrap_err();
        assert_eq!(err, ValidationError::UnknownAnimation("moonwalk".to_string()));
        assert_eq!(err.to_string(), "Invalid request. Animation not found");
    }

    #[test]
    fn test_payloadless_kinds_ignore_body() {
        for kind in [
            ActionKind::LeaveCharger,
            ActionKind::GoToCharger,
            ActionKind::Ping,
            ActionKind::Info,
        ] {
            let req = parse_request(kind, &json!({"junk": true})).unwrap();
            assert_eq!(req.kind(), kind);
        }
    }

    #[test]
    fn test_animation_names_are_unique() {
        for (i, (name, _)) in ANIMATIONS.iter().enumerate() {
            assert!(ANIMATIONS[i + 1..].iter().all(|(other, _)| other != name));
        }
    }
}
