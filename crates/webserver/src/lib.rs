//! Status, probe and metrics HTTP listeners for a supervised PostgreSQL
//! instance.
//!
//! Three listeners are served: the status listener (probes, instance
//! status, backup trigger, metrics, cache namespace), a loopback-only
//! listener with the same routes for the engine itself, and a listener
//! exposing only the metrics endpoint. The supervisor owns start and stop;
//! the handlers themselves are thin.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod routes;
pub mod url;

pub use error::Error;
pub use routes::StatusResponse;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use pgkeeper_postgres::Instance;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Options for configuring a [`StatusWebServer`].
pub struct WebServerOptions {
    /// The instance the server reports on.
    pub instance: Arc<Instance>,

    /// Address of the loopback listener used by the engine itself.
    pub local_addr: SocketAddr,

    /// Address of the metrics-only listener.
    pub metrics_addr: SocketAddr,

    /// Address of the status and probe listener.
    pub status_addr: SocketAddr,
}

/// Serves the status, probe and metrics endpoints of one instance.
#[derive(Clone)]
pub struct StatusWebServer {
    instance: Arc<Instance>,
    local_addr: SocketAddr,
    metrics_addr: SocketAddr,
    shutdown_token: CancellationToken,
    status_addr: SocketAddr,
}

impl StatusWebServer {
    /// Creates a new status web server.
    #[must_use]
    pub fn new(
        WebServerOptions {
            instance,
            local_addr,
            metrics_addr,
            status_addr,
        }: WebServerOptions,
    ) -> Self {
        Self {
            instance,
            local_addr,
            metrics_addr,
            shutdown_token: CancellationToken::new(),
            status_addr,
        }
    }

    /// Binds all listeners and serves until [`shutdown`](Self::shutdown) is
    /// requested.
    ///
    /// Returns `Ok(())` on a requested shutdown and an error when any
    /// listener stops on its own; the caller logs that error, it is never
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns an error if a listener cannot be bound or stops serving
    /// unexpectedly.
    pub async fn listen_and_serve(&self) -> Result<(), Error> {
        let status_router = routes::status_router(self.instance.clone());
        let metrics_router = routes::metrics_router();

        let status_listener = tokio::net::TcpListener::bind(self.status_addr)
            .await
            .map_err(|e| Error::Bind("status", e))?;
        let local_listener = tokio::net::TcpListener::bind(self.local_addr)
            .await
            .map_err(|e| Error::Bind("local", e))?;
        let metrics_listener = tokio::net::TcpListener::bind(self.metrics_addr)
            .await
            .map_err(|e| Error::Bind("metrics", e))?;

        info!("status server listening on {}", self.status_addr);
        info!("local status server listening on {}", self.local_addr);
        info!("metrics server listening on {}", self.metrics_addr);

        let shutdown_token = self.shutdown_token.clone();

        tokio::select! {
            result = axum::serve(status_listener, status_router.clone().into_make_service()).into_future() => {
                listener_result("status", result)
            }
            result = axum::serve(local_listener, status_router.into_make_service()).into_future() => {
                listener_result("local", result)
            }
            result = axum::serve(metrics_listener, metrics_router.into_make_service()).into_future() => {
                listener_result("metrics", result)
            }
            () = shutdown_token.cancelled() => Ok(()),
        }
    }

    /// Requests a graceful stop of all listeners.
    ///
    /// Idempotent, and safe to call even if the server never started.
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }
}

fn listener_result(name: &'static str, result: std::io::Result<()>) -> Result<(), Error> {
    match result {
        Ok(()) => Err(Error::ListenerStopped(name)),
        Err(e) => Err(Error::Serve(name, e)),
    }
}
