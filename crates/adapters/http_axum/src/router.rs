//! Axum router assembly.

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Mounts the JSON API under `/api` and adds a [`TraceLayer`] that logs
/// each request/response through the `tracing` ecosystem.
pub fn build(state: AppState) -> Router {
    Router::new()
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use verdant_adapter_virtual::{MemoryEventSink, VirtualRelayBank, VirtualSensorRig};
    use verdant_app::control::{ControlActor, ControlConfig};
    use verdant_app::event_bus::InProcessEventBus;
    use verdant_domain::device::{Device, DeviceRegistry, DeviceState};
    use verdant_domain::id::DeviceId;

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(vec![
            Device::new("ventilation_main", "Main Ventilation Fan"),
            Device::new("led_primary", "Primary LED Panel").requires("ventilation_main"),
        ])
        .unwrap()
    }

    struct TestApp {
        router: Router,
        relay: Arc<VirtualRelayBank>,
    }

    fn test_app() -> TestApp {
        let relay = Arc::new(VirtualRelayBank::new());
        let sensors = Arc::new(VirtualSensorRig::default());
        let bus = Arc::new(InProcessEventBus::new(64));
        let sink = Arc::new(MemoryEventSink::default());
        let config = ControlConfig {
            // Keep the periodic tick out of the way; tests drive the
            // actor through commands only.
            tick_interval: Duration::from_secs(3600),
            ..ControlConfig::default()
        };
        let actor = ControlActor::new(
            config,
            registry(),
            Vec::new(),
            Arc::clone(&relay),
            sensors,
            Arc::clone(&bus),
            sink,
        )
        .unwrap();
        let handle = actor.spawn();
        let state = AppState::new(handle, bus, Duration::from_secs(600));
        TestApp {
            router: build(state),
            relay,
        }
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn should_serve_status() {
        let app = test_app();
        let response = app
            .router
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["devices"].as_array().unwrap().len(), 2);
        assert_eq!(json["emergency_stop"], false);
        assert_eq!(json["overrides"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn should_serve_health() {
        let app = test_app();
        let response = app
            .router
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn should_set_override_and_raise_prerequisite() {
        let app = test_app();
        let response = app
            .router
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/devices/led_primary/override",
                r#"{"state": "on", "duration_secs": 600}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // The LED requires the fan, so both relays were driven ON.
        assert_eq!(
            app.relay.state_of(&DeviceId::new("led_primary")),
            DeviceState::On
        );
        assert_eq!(
            app.relay.state_of(&DeviceId::new("ventilation_main")),
            DeviceState::On
        );

        let status = app
            .router
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(status).await;
        assert_eq!(json["overrides"][0]["device"], "led_primary");
    }

    #[tokio::test]
    async fn should_return_404_for_override_on_unknown_device() {
        let app = test_app();
        let response = app
            .router
            .oneshot(json_request(
                "PUT",
                "/api/devices/led_missing/override",
                r#"{"state": "on"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn should_return_404_when_clearing_absent_override() {
        let app = test_app();
        let response = app
            .router
            .oneshot(
                Request::delete("/api/devices/led_primary/override")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn should_engage_emergency_stop() {
        let app = test_app();
        let response = app
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/emergency-stop",
                r#"{"active": true}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let status = app
            .router
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(status).await;
        assert_eq!(json["emergency_stop"], true);
    }

    #[tokio::test]
    async fn should_reject_invalid_rule_reload() {
        let app = test_app();
        let body = r#"[{
            "name": "Ghost",
            "device": "led_missing",
            "condition": {
                "type": "threshold",
                "conditions": [
                    {"kind": "temperature", "operator": ">", "threshold": 25.0}
                ]
            },
            "active": true,
            "priority": 0
        }]"#;
        let response = app
            .router
            .oneshot(json_request("PUT", "/api/rules", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn should_accept_valid_rule_reload() {
        let app = test_app();
        let body = r#"[{
            "name": "Cool",
            "device": "ventilation_main",
            "condition": {
                "type": "threshold",
                "conditions": [
                    {"kind": "temperature", "operator": ">", "threshold": 25.0}
                ]
            },
            "active": true,
            "priority": 0
        }]"#;
        let response = app
            .router
            .oneshot(json_request("PUT", "/api/rules", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn should_open_event_stream_with_status_snapshot() {
        let app = test_app();
        let response = app
            .router
            .oneshot(
                Request::get("/api/events/stream")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );

        // The first frame is the status snapshot.
        let mut body = response.into_body();
        let frame = body.frame().await.unwrap().unwrap();
        let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
        assert!(text.contains("event: status"));
        assert!(text.contains("\"devices\""));
    }
}
