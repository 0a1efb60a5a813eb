use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub model: String,
}

/// Liveness: answers whenever the process can serve HTTP.
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "healthy" }))
}

/// Readiness: reports the configured model id. Does not check that the
/// model server has actually loaded it.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = ReadyResponse {
        status: "ready",
        model: state.settings.model_id.clone(),
    };

    (StatusCode::OK, Json(response))
}

#[cfg(test)]
mod tests {
    use crate::config::ProbeSettings;
    use crate::{AppState, create_router};
    use axum::body::{Body, to_bytes};
    use http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
        let response = create_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_is_always_healthy() {
        let (status, body) = get(AppState::default(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "healthy"}));
    }

    #[tokio::test]
    async fn ready_reports_default_model() {
        let (status, body) = get(AppState::default(), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ready", "model": "nvidia/personaplex-7b-v1"}));
    }

    #[tokio::test]
    async fn ready_reports_configured_model() {
        let state = AppState::new(ProbeSettings {
            model_id: "org/model".to_string(),
            ..ProbeSettings::default()
        });
        let (status, body) = get(state, "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["model"], "org/model");
    }

    #[tokio::test]
    async fn unknown_paths_are_not_probes() {
        let response = create_router(AppState::default())
            .oneshot(Request::builder().uri("/v1/models").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
