use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use inspection_service::workflows::inspection::{
    inspection_router, InspectionRepository, InspectionService,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_inspection_routes<R>(service: Arc<InspectionService<R>>) -> axum::Router
where
    R: InspectionRepository + 'static,
{
    inspection_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Ready once the listener is bound and while the event queue is running.
pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let events = state.events.stats();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready", "events": events })
    } else {
        json!({ "status": "initializing", "events": events })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use inspection_service::config::PeersConfig;
    use inspection_service::workflows::inspection::peers::http::http_peers;
    use inspection_service::workflows::inspection::{
        DocxTemplateRenderer, EventSystemConfig, InMemoryInspectionRepository,
        InspectionEventSystem, LogEventPublisher,
    };
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    fn app(ready: bool) -> axum::Router {
        let (_system, events) =
            InspectionEventSystem::new(Arc::new(LogEventPublisher), EventSystemConfig::default());
        let unreachable = "http://127.0.0.1:9".to_string();
        let peers = http_peers(&PeersConfig {
            analyzer_url: unreachable.clone(),
            brigade_url: unreachable.clone(),
            file_url: unreachable.clone(),
            subscriber_url: unreachable.clone(),
            task_url: unreachable,
            timeout_secs: 1,
        })
        .expect("peer clients build");
        let service = Arc::new(InspectionService::new(
            Arc::new(InMemoryInspectionRepository::new()),
            peers,
            Arc::new(DocxTemplateRenderer::new("universal.docx", "control.docx")),
            events.clone(),
        ));

        let state = AppState {
            readiness: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            events,
        };
        state.readiness.store(ready, Ordering::Relaxed);

        with_inspection_routes(service).layer(Extension(state))
    }

    async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let (status, body) = get(app(false), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_reflects_flag_and_reports_queue() {
        let (status, body) = get(app(false), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "initializing");

        let (status, body) = get(app(true), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["events"]["capacity"], 1024);
    }

    #[tokio::test]
    async fn inspection_routes_are_mounted() {
        let (status, body) = get(app(true), "/inspections").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }
}
