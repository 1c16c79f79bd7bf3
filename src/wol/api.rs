//! JSON API and static front end for the Wake-on-LAN service.
use std::{path::Path, sync::Arc};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::any,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    adapters::middleware::cors_middleware,
    wol::{
        liveness::LivenessChecker,
        magic_packet::{WakeTransport, wake},
    },
};

/// Shared handler state.
#[derive(Clone)]
pub struct WolState {
    pub transport: Arc<dyn WakeTransport>,
    pub liveness: Arc<LivenessChecker>,
}

#[derive(Debug, Deserialize)]
pub struct WakeParams {
    mac: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    ip: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// `GET /api/wake?mac=…`
pub async fn wake_handler(
    State(state): State<WolState>,
    Query(params): Query<WakeParams>,
) -> Response {
    let Some(mac) = non_empty(params.mac) else {
        return Json(json!({"error": "MAC address required"})).into_response();
    };

    match wake(state.transport.as_ref(), &mac).await {
        Ok(_) => Json(json!({"message": format!("WoL packet sent to {mac}")})).into_response(),
        Err(e) => {
            tracing::warn!(%mac, error = %e, "Wake request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

/// `GET /api/status?ip=…`
pub async fn status_handler(
    State(state): State<WolState>,
    Query(params): Query<StatusParams>,
) -> Response {
    let Some(host) = non_empty(params.ip) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "IP address required", "online": false})),
        )
            .into_response();
    };

    let liveness = state.liveness.check(&host).await;
    tracing::debug!(%host, online = liveness.online, method = %liveness.method, "Status probe");
    Json(liveness).into_response()
}

/// API routes with CORS, everything else served from `static_dir`.
pub fn router(state: WolState, static_dir: impl AsRef<Path>) -> Router {
    let api = Router::new()
        .route("/api/wake", any(wake_handler))
        .route("/api/status", any(status_handler))
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state);

    Router::new()
        .merge(api)
        .fallback_service(ServeDir::new(static_dir).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    use super::*;
    use crate::wol::magic_packet::{MagicPacket, WakeError};

    #[derive(Default)]
    struct CapturingTransport {
        sent: Mutex<Vec<MagicPacket>>,
    }

    #[async_trait]
    impl WakeTransport for CapturingTransport {
        async fn send(&self, packet: &MagicPacket) -> Result<(), WakeError> {
            self.sent.lock().unwrap().push(packet.clone());
            Ok(())
        }
    }

    fn app(transport: Arc<CapturingTransport>, ports: Vec<u16>, static_dir: &Path) -> Router {
        let state = WolState {
            transport,
            liveness: Arc::new(
                LivenessChecker::new()
                    .without_ping()
                    .with_ports(ports)
                    .with_connect_timeout(std::time::Duration::from_millis(300)),
            ),
        };
        router(state, static_dir)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_wake_requires_mac() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(CapturingTransport::default());

        let (status, body) = get(app(transport.clone(), vec![], dir.path()), "/api/wake").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"error": "MAC address required"}));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wake_sends_packet() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(CapturingTransport::default());

        let (status, body) = get(
            app(transport.clone(), vec![], dir.path()),
            "/api/wake?mac=00:11:22:33:44:55",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"message": "WoL packet sent to 00:11:22:33:44:55"})
        );
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_wake_rejects_invalid_mac() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(CapturingTransport::default());

        let (status, body) = get(
            app(transport, vec![], dir.path()),
            "/api/wake?mac=invalid-mac",
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("invalid-mac"));
    }

    #[tokio::test]
    async fn test_status_requires_ip() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(CapturingTransport::default());

        let (status, body) = get(app(transport, vec![], dir.path()), "/api/status?ip=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "IP address required", "online": false}));
    }

    #[tokio::test]
    async fn test_status_reports_open_port() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let transport = Arc::new(CapturingTransport::default());

        let (status, body) = get(
            app(transport, vec![port], dir.path()),
            "/api/status?ip=127.0.0.1",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"online": true, "method": format!("port {port}")}));
    }

    #[tokio::test]
    async fn test_static_files_and_cors_scope() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>wake</h1>").unwrap();
        let transport = Arc::new(CapturingTransport::default());

        let response = app(transport, vec![], dir.path())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .get("access-control-allow-origin")
                .is_none()
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"<h1>wake</h1>");
    }
}
