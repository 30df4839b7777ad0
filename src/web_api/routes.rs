//! API Routes

use axum::{
    routing::{get, post},
    Router,
};

use super::ptz_routes::{
    ptz_connect, ptz_disconnect, ptz_events, ptz_press, ptz_release, ptz_reset, ptz_status,
};
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        // PTZ
        .route("/api/ptz/status", get(ptz_status))
        .route("/api/ptz/press", post(ptz_press))
        .route("/api/ptz/release", post(ptz_release))
        .route("/api/ptz/reset", post(ptz_reset))
        .route("/api/ptz/connect", post(ptz_connect))
        .route("/api/ptz/disconnect", post(ptz_disconnect))
        .route("/api/ptz/events", get(ptz_events))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ptz_controller::ControllerConfig;
    use crate::state::{ActuatorKind, AppConfig};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn state() -> AppState {
        let config = AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            actuator: ActuatorKind::Simulated,
            onvif_endpoint: None,
            onvif_username: String::new(),
            onvif_password: String::new(),
            onvif_profile_token: "profile_1".to_string(),
            sim_latency_ms: 1,
            controller: ControllerConfig::default(),
        };
        AppState::new(config).unwrap()
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_press_before_connect_is_unavailable() {
        let router = create_router(state());
        let (status, body) = call(
            &router,
            "POST",
            "/api/ptz/press",
            Some(json!({"direction": "right"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error_code"], "CONNECTION_ERROR");
    }

    #[tokio::test]
    async fn test_connect_press_release_reset() {
        let state = state();
        let router = create_router(state.clone());

        let (status, body) = call(&router, "POST", "/api/ptz/connect", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["label"], "Simulated PTZ");

        let (status, body) = call(
            &router,
            "POST",
            "/api/ptz/press",
            Some(json!({"axis": "pan", "increment": 6.0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "started");

        let (status, _) = call(&router, "POST", "/api/ptz/release", None).await;
        assert_eq!(status, StatusCode::OK);
        state.controller.wait_idle().await;

        let (status, body) = call(&router, "GET", "/api/ptz/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "idle");
        assert!(body["position"]["pan"].as_f64().unwrap() > 0.0);

        let (status, body) = call(&router, "POST", "/api/ptz/reset", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pan"], 0.0);
        assert_eq!(body["zoom"], 100.0);
    }

    #[tokio::test]
    async fn test_invalid_axis_rejected() {
        let router = create_router(state());
        call(&router, "POST", "/api/ptz/connect", None).await;
        let (status, body) = call(
            &router,
            "POST",
            "/api/ptz/press",
            Some(json!({"axis": "roll", "increment": 1.0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "INVALID_AXIS");
    }
}
