//! HTTP transport for robot actions.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use vector_core::{ActionKind, ActionOutcome};
use vector_executor::ActionExecutor;

use crate::protocol::{ResponseBody, Verb, route, status_for};

/// HTTP handler state.
#[derive(Clone)]
pub struct HttpState {
    /// Executor every request is dispatched to.
    pub executor: Arc<ActionExecutor>,
}

impl HttpState {
    /// Create new HTTP state.
    #[must_use]
    pub const fn new(executor: Arc<ActionExecutor>) -> Self {
        Self { executor }
    }
}

/// Create the action router.
///
/// # Example
/// ```ignore
/// let app = create_router(executor).layer(CorsLayer::permissive());
/// ```
#[must_use]
pub fn create_router(executor: Arc<ActionExecutor>) -> Router {
    let mut router: Router<HttpState> = Router::new().route("/healthz", get(health_check));

    for kind in ActionKind::ALL {
        let handler = move |State(state): State<HttpState>, body: Bytes| async move {
            dispatch(&state, kind, &body).await
        };
        let (verb, path) = route(kind);
        router = match verb {
            Verb::Get => router.route(path, get(handler)),
            Verb::Post => router.route(path, post(handler)),
        };
    }

    router
        .layer(TraceLayer::new_for_http())
        .with_state(HttpState::new(executor))
}

async fn health_check() -> &'static str {
    "ok"
}

async fn dispatch(state: &HttpState, kind: ActionKind, body: &Bytes) -> Response {
    tracing::info!("{kind} incoming request");

    // Bodies are parsed whatever the Content-Type says.
    let payload = if kind.has_payload() {
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Unparseable body: {e}");
                let outcome = ActionOutcome::InvalidRequest(format!(
                    "Invalid request. Body is not valid JSON: {e}"
                ));
                return reply(kind, &outcome);
            }
        }
    } else {
        Value::Null
    };
    tracing::debug!("Body: {payload}");

    let outcome = state.executor.submit(kind, &payload).await;
    reply(kind, &outcome)
}

fn reply(kind: ActionKind, outcome: &ActionOutcome) -> Response {
    let status = StatusCode::from_u16(status_for(kind, outcome).code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ResponseBody::from(outcome))).into_response()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::{self, Body},
        http::Request,
    };
    use serde_json::json;
    use tower::util::ServiceExt;
    use vector_core::{DeviceIdentity, SessionSettings, action::MSG_BUSY};
    use vector_session::{
        DeviceSession,
        driver::{DeviceCall, Fault, SimulatedRobot},
    };

    use super::*;

    fn app(robot: &SimulatedRobot) -> (Router, Arc<ActionExecutor>) {
        let settings = SessionSettings::new(DeviceIdentity::new("10.0.0.7", "0dd1cdcf"))
            .with_recovery_timeout(Duration::from_millis(200));
        let session = Arc::new(DeviceSession::new(Arc::new(robot.clone()), settings));
        let executor = Arc::new(ActionExecutor::new(session));
        (create_router(Arc::clone(&executor)), executor)
    }

    async fn connected_app() -> (SimulatedRobot, Router, Arc<ActionExecutor>) {
        let robot = SimulatedRobot::new();
        let (router, executor) = app(&robot);
        executor.session().register().await.unwrap();
        (robot, router, executor)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request_body = body.map_or_else(Body::empty, |b| Body::from(b.to_string()));
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(request_body)
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, _) = app(&SimulatedRobot::new());
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_leave_charger_from_cold_start() {
        let robot = SimulatedRobot::new();
        let (app, _) = app(&robot);

        let (status, body) = call(&app, "POST", "/vector/action/leavecharger", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"result": 0, "message": "Command processed successfully"}));
        assert!(robot.capability_calls().contains(&DeviceCall::DriveOffCharger));
    }

    #[tokio::test]
    async fn test_leave_charger_unreachable() {
        let robot = SimulatedRobot::new();
        robot.fail_next_connects(2);
        let (app, _) = app(&robot);

        let (status, body) = call(&app, "POST", "/vector/action/leavecharger", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["result"], -1);
        assert_eq!(
            body["message"],
            "Vector not available, make sure it's on, on its charger and try again"
        );
    }

    #[tokio::test]
    async fn test_actions_need_connected_session() {
        let robot = SimulatedRobot::new();
        let (app, _) = app(&robot);

        let (status, body) = call(
            &app,
            "POST",
            "/vector/action/drivestraight",
            Some(json!({"distance": 100, "speed": 50})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["result"], -1);
        assert!(robot.calls().is_empty());
    }

    #[tokio::test]
    async fn test_turn_right_without_content_type() {
        let (robot, app, _) = connected_app().await;

        let (status, _) = call(
            &app,
            "POST",
            "/vector/action/turnright",
            Some(json!({"degrees": 30})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(robot.capability_calls(), vec![DeviceCall::TurnInPlace(-30.0)]);
    }

    #[tokio::test]
    async fn test_invalid_payloads_are_bad_requests() {
        let (robot, app, _) = connected_app().await;
        robot.clear_calls();

        let (status, body) = call(
            &app,
            "POST",
            "/vector/action/animation",
            Some(json!({"animation": "moonwalk"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid request. Animation not found");

        let (status, _) = call(&app, "POST", "/vector/action/talk", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, "POST", "/vector/action/turnleft", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(robot.calls().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_busy_is_conflict() {
        let (robot, app, executor) = connected_app().await;
        robot.set_action_delay(Duration::from_millis(300));

        let background = app.clone();
        let ping = tokio::spawn(async move { call(&background, "GET", "/vector/ping", None).await });
        while !executor.is_busy() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let (status, body) = call(
            &app,
            "POST",
            "/vector/action/talk",
            Some(json!({"message": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], MSG_BUSY);

        let (status, _) = ping.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_info_reports_battery() {
        let (_, app, _) = connected_app().await;

        let (status, body) = call(&app, "GET", "/vector/info", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["level"], 2);
        assert_eq!(body["onCharger"], false);
        assert!(body.get("voltage").is_some());
        assert!(body.get("suggestedChargerTime").is_some());
        assert!(body.get("result").is_none());
    }

    #[tokio::test]
    async fn test_info_without_data() {
        let (robot, app, _) = connected_app().await;
        robot.set_battery(None);

        let (status, body) = call(&app, "GET", "/vector/info", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"result": -1, "message": "battery_state not available"}));
    }

    #[tokio::test]
    async fn test_device_error_is_server_error() {
        let (robot, app, _) = connected_app().await;
        robot.set_fault(Fault::Error);

        let (status, body) = call(&app, "POST", "/vector/action/gotocharger", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["result"], -1);

        // The failure dropped the session.
        let (status, _) = call(&app, "GET", "/vector/ping", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
