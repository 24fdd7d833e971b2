//! HTTP route handlers for the status and metrics listeners.
//!
//! These handlers are intentionally small single-purpose responders; the
//! supervisor only owns starting and stopping the listeners.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use pgkeeper_postgres::Instance;
use serde::Serialize;

use crate::url;

/// Status payload reported by the instance status endpoint.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Name of the cluster this instance belongs to.
    pub cluster_name: String,

    /// Name of this instance within the cluster.
    pub instance_name: String,

    /// The data directory of the instance.
    pub pgdata: String,

    /// The port the engine listens for connections on.
    pub port: u16,
}

pub(crate) fn status_router(instance: Arc<Instance>) -> Router {
    Router::new()
        .route(url::PATH_HEALTH, get(health))
        .route(url::PATH_READY, get(ready))
        .route(url::PATH_PG_STATUS, get(pg_status))
        .route(url::PATH_PG_BACKUP, post(pg_backup))
        .route(url::PATH_METRICS, get(metrics))
        .route(&format!("{}{{*key}}", url::PATH_CACHE), get(cache))
        .with_state(instance)
}

pub(crate) fn metrics_router() -> Router {
    Router::new().route(url::PATH_METRICS, get(metrics))
}

async fn health() -> &'static str {
    "OK"
}

async fn ready(State(instance): State<Arc<Instance>>) -> StatusCode {
    // The instance is ready to serve once its data directory is initialized.
    if instance.pgdata().join("PG_VERSION").exists() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn pg_status(State(instance): State<Arc<Instance>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        cluster_name: instance.cluster_name().to_string(),
        instance_name: instance.instance_name().to_string(),
        pgdata: instance.pgdata().display().to_string(),
        port: instance.port(),
    })
}

async fn pg_backup() -> impl IntoResponse {
    (StatusCode::NOT_IMPLEMENTED, "backup is handled by the operator\n")
}

async fn metrics() -> &'static str {
    "pgkeeper_up 1\n"
}

async fn cache() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "no such cached resource\n")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use axum::body::Body;
    use http::Request;
    use http_body_util::BodyExt;
    use pgkeeper_postgres::InstanceOptions;
    use tower::ServiceExt;

    use super::*;

    fn test_instance(pgdata: PathBuf) -> Arc<Instance> {
        Arc::new(Instance::new(InstanceOptions {
            bin_dir: None,
            cluster_name: "cluster-example".to_string(),
            expected_major_version: None,
            instance_name: "cluster-example-1".to_string(),
            pgdata,
            port: 5432,
        }))
    }

    #[tokio::test]
    async fn health_always_answers() {
        let router = status_router(test_instance(PathBuf::from("/nonexistent")));

        let response = router
            .oneshot(Request::get(url::PATH_HEALTH).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_tracks_data_directory_initialization() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().to_path_buf();
        let router = status_router(test_instance(dir.clone()));

        let response = router
            .clone()
            .oneshot(Request::get(url::PATH_READY).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        std::fs::write(dir.join("PG_VERSION"), "17\n").unwrap();

        let response = router
            .oneshot(Request::get(url::PATH_READY).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_reports_the_instance_identity() {
        let router = status_router(test_instance(PathBuf::from("/data/pg")));

        let response = router
            .oneshot(Request::get(url::PATH_PG_STATUS).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["cluster_name"], "cluster-example");
        assert_eq!(value["port"], 5432);
    }

    #[tokio::test]
    async fn cache_namespace_is_registered_under_its_prefix() {
        let router = status_router(test_instance(PathBuf::from("/data/pg")));

        let uri = format!("{}some/entry", url::PATH_CACHE);
        let response = router
            .oneshot(Request::get(uri.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();

        // The handler answers, as opposed to the router's bare 404.
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"no such cached resource\n");
    }

    #[tokio::test]
    async fn metrics_listener_serves_only_metrics() {
        let router = metrics_router();

        let response = router
            .clone()
            .oneshot(Request::get(url::PATH_METRICS).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::get(url::PATH_HEALTH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
