//! Routing constants for the status web server.

/// Port for requests coming from the engine itself, bound on loopback only.
pub const LOCAL_PORT: u16 = 8010;

/// Port serving only the metrics endpoint.
pub const METRICS_PORT: u16 = 9187;

/// Port for status and probe HTTP requests.
pub const STATUS_PORT: u16 = 8000;

/// URL path for the health state.
pub const PATH_HEALTH: &str = "/healthz";

/// URL path for the readiness state.
pub const PATH_READY: &str = "/readyz";

/// URL path for the instance status report.
pub const PATH_PG_STATUS: &str = "/pg/status";

/// URL path for triggering a backup.
pub const PATH_PG_BACKUP: &str = "/pg/backup";

/// URL path for metrics.
pub const PATH_METRICS: &str = "/metrics";

/// URL path prefix for cached resources.
pub const PATH_CACHE: &str = "/cache/";

/// Builds a URL for the provided path on localhost, pointing to the status
/// web server.
#[must_use]
pub fn local(path: &str, port: u16) -> String {
    build("localhost", path, port)
}

/// Builds a URL for the provided hostname and path, pointing to the status
/// web server.
#[must_use]
pub fn build(hostname: &str, path: &str, port: u16) -> String {
    let path = path.strip_prefix('/').unwrap_or(path);
    format!("http://{hostname}:{port}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_strips_leading_slash() {
        assert_eq!(
            build("pod-1.cluster", PATH_PG_STATUS, STATUS_PORT),
            "http://pod-1.cluster:8000/pg/status"
        );
    }

    #[test]
    fn build_accepts_path_without_slash() {
        assert_eq!(build("example", "metrics", 9187), "http://example:9187/metrics");
    }

    #[test]
    fn local_points_to_localhost() {
        assert_eq!(local(PATH_HEALTH, LOCAL_PORT), "http://localhost:8010/healthz");
    }
}
