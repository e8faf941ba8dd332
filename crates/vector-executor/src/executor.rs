//! Single-flight action executor.

use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;
use vector_core::{
    ActionKind, ActionOutcome, ActionRequest, Command, DeviceError, Unavailable,
    action::MSG_BATTERY_ERROR,
    catalog::{PING_ANIMATION, PING_PHRASE, READY_PHRASE},
    parse_request,
};
use vector_session::{DeviceLease, DeviceSession};

use crate::gate::Gate;

/// Runs actions against the device session, one mutating action at a time.
///
/// Busy means reject: nothing is queued. Every path returns exactly one
/// [`ActionOutcome`], and the gate is released before it is returned.
#[derive(Debug)]
pub struct ActionExecutor {
    session: Arc<DeviceSession>,
    gate: Arc<Gate>,
}

impl ActionExecutor {
    /// Create an executor over `session`.
    #[must_use]
    pub fn new(session: Arc<DeviceSession>) -> Self {
        Self {
            session,
            gate: Arc::new(Gate::new()),
        }
    }

    /// The session this executor drives.
    #[must_use]
    pub const fn session(&self) -> &Arc<DeviceSession> {
        &self.session
    }

    /// Whether a mutating action is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Validate a raw payload for `kind` and run it.
    ///
    /// Invalid payloads are rejected here and never reach the session.
    pub async fn submit(&self, kind: ActionKind, body: &Value) -> ActionOutcome {
        match parse_request(kind, body) {
            Ok(request) => self.execute(request).await,
            Err(e) => {
                tracing::warn!(action = %kind, "{e}");
                ActionOutcome::InvalidRequest(e.to_string())
            }
        }
    }

    /// Run a validated request.
    pub async fn execute(&self, request: impl Into<ActionRequest>) -> ActionOutcome {
        let request = request.into();
        let span = tracing::info_span!(
            "action",
            action = %request.kind(),
            request_id = %Uuid::new_v4()
        );

        async move {
            let outcome = match request {
                ActionRequest::Command(command) => self.execute_command(command).await,
                ActionRequest::Info => self.read_battery().await,
            };
            tracing::debug!(outcome = outcome.tag(), "Action finished");
            outcome
        }
        .instrument(span)
        .await
    }

    async fn execute_command(&self, command: Command) -> ActionOutcome {
        if command.kind() != ActionKind::LeaveCharger && !self.session.is_usable() {
            tracing::warn!("Vector not available");
            return ActionOutcome::Unavailable(Unavailable::NotConnected);
        }

        let Some(guard) = self.gate.try_acquire() else {
            tracing::warn!("Vector marked as busy, ignoring");
            return ActionOutcome::Busy;
        };

        // The action runs in its own task: a caller that goes away cannot
        // cancel it halfway, and the guard drops when the task ends, panics
        // included.
        let session = Arc::clone(&self.session);
        let task = tokio::spawn(
            async move {
                let _guard = guard;
                run(&session, &command).await
            }
            .in_current_span(),
        );

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Action aborted: {e}");
                self.session.mark_disconnected();
                ActionOutcome::DeviceError(format!("Action aborted: {e}"))
            }
        }
    }

    /// Battery query: needs a usable session, never touches the gate.
    async fn read_battery(&self) -> ActionOutcome {
        let Some(lease) = self.session.lease() else {
            tracing::warn!("Vector not available");
            return ActionOutcome::Unavailable(Unavailable::NotConnected);
        };

        match lease.battery_state().await {
            Ok(Some(state)) => ActionOutcome::Battery(state),
            Ok(None) => {
                tracing::warn!("battery_state not available");
                ActionOutcome::Unavailable(Unavailable::NoData)
            }
            Err(e) => {
                tracing::error!("Error getting battery_state: {e}");
                ActionOutcome::DeviceError(MSG_BATTERY_ERROR.to_string())
            }
        }
    }
}

async fn run(session: &DeviceSession, command: &Command) -> ActionOutcome {
    if matches!(command, Command::LeaveCharger) {
        if let Err(outcome) = recover(session).await {
            return outcome;
        }
    }

    let Some(lease) = session.lease() else {
        return ActionOutcome::Unavailable(Unavailable::NotConnected);
    };

    match invoke(&lease, command).await {
        Ok(()) => ActionOutcome::success(),
        Err(e) => {
            tracing::error!("Device error: {e}");
            ActionOutcome::DeviceError(e.to_string())
        }
    }
}

/// Leave-charger recovery: reconnect the current handle, then at most one
/// `reconnect_fresh`. Two connect attempts at most.
///
/// The first attempt runs even when the session reads `Connected`, since the
/// link may have died while the robot sat on its charger.
async fn recover(session: &DeviceSession) -> Result<(), ActionOutcome> {
    let timeout = session.settings().recovery_timeout;

    let Err(first) = session.refresh(timeout).await else {
        return Ok(());
    };
    tracing::warn!(attempt = 1, "Connect failed, retrying with a fresh handle: {first}");

    match session.reconnect_fresh(timeout).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(attempt = 2, "Robot unreachable: {e}");
            Err(ActionOutcome::Unavailable(Unavailable::RecoveryFailed))
        }
    }
}

async fn invoke(lease: &DeviceLease, command: &Command) -> Result<(), DeviceError> {
    match command {
        Command::LeaveCharger => {
            tracing::debug!("Leaving charger");
            lease.drive_off_charger().await?;
            lease.say_text(READY_PHRASE).await
        }
        Command::GoToCharger => {
            tracing::debug!("Going to charger");
            lease.drive_on_charger().await
        }
        Command::DriveStraight {
            distance_mm,
            speed_mmps,
        } => {
            tracing::debug!(distance_mm, speed_mmps, "Drive straight");
            lease.drive_straight(*distance_mm, *speed_mmps).await
        }
        Command::TurnLeft { degrees } => {
            let degrees = degrees.abs();
            tracing::debug!(degrees, "Turn left");
            lease.turn_in_place(degrees).await
        }
        Command::TurnRight { degrees } => {
            let degrees = -degrees.abs();
            tracing::debug!(degrees, "Turn right");
            lease.turn_in_place(degrees).await
        }
        Command::Talk { message } => {
            tracing::debug!("Talk request: {message}");
            lease.say_text(message).await
        }
        Command::PlayAnimation { name, animation_id } => {
            tracing::debug!("Playing animation: '{name}' ({animation_id})");
            lease.play_animation(animation_id).await
        }
        Command::Ping => {
            tracing::debug!("Shake head");
            lease.play_animation(PING_ANIMATION).await?;
            lease.say_text(PING_PHRASE).await
        }
    }
}
