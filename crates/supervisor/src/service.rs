//! Trait seams between the supervisor and its collaborators.
//!
//! The supervisor coordinates three kinds of collaborator: the status web
//! server, the reconciliation loop, and the managed database process. Each
//! is reached through a narrow trait so the orchestration and shutdown
//! ordering can be exercised against recording doubles in tests.

use async_trait::async_trait;
use nix::sys::signal::Signal;
use pgkeeper_postgres::{ExitOutcome, Instance, PostgresProcess};
use pgkeeper_reconciler::InstanceReconciler;
use pgkeeper_webserver::StatusWebServer;

use std::sync::Arc;

/// Boxed error type used at the collaborator boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The status/probe web server as seen by the supervisor.
#[async_trait]
pub trait WebService: Send + Sync + 'static {
    /// Binds the listeners and blocks until they stop or shutdown is
    /// requested.
    ///
    /// # Errors
    ///
    /// Returns an error when a listener stops unexpectedly.
    async fn listen_and_serve(&self) -> Result<(), BoxError>;

    /// Requests a graceful stop. Safe even if the server never started.
    fn shutdown(&self);
}

/// The reconciliation loop as seen by the supervisor.
#[async_trait]
pub trait ReconcileService: Send + Sync + 'static {
    /// One-shot pre-flight check of the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the on-disk state does not match the expected
    /// identity of this instance.
    async fn verify_coherence(&self) -> Result<(), BoxError>;

    /// Blocking reconciliation loop; returns once stopped.
    async fn run(&self);

    /// Requests loop termination. Safe before `run` and after it exits.
    fn stop(&self);
}

/// Spawning and inspection of the managed database process.
#[async_trait]
pub trait ProcessService: Send + Sync + 'static {
    /// The handle type produced by a successful spawn.
    type Handle: ProcessHandle;

    /// Runs the read-only diagnostic inspection of the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the diagnostic command fails.
    async fn run_diagnostics(&self) -> Result<(), BoxError>;

    /// Spawns the engine; non-blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be created.
    fn spawn(&self) -> Result<Self::Handle, BoxError>;
}

/// A live handle to the spawned engine process.
#[async_trait]
pub trait ProcessHandle: Send + Sync + 'static {
    /// Blocks until the process exits.
    ///
    /// # Errors
    ///
    /// Returns an error if the exit status could not be collected.
    async fn wait(&self) -> Result<ExitOutcome, BoxError>;

    /// Best-effort delivery of a termination request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be delivered.
    fn terminate(&self) -> Result<(), BoxError>;
}

#[async_trait]
impl WebService for StatusWebServer {
    async fn listen_and_serve(&self) -> Result<(), BoxError> {
        StatusWebServer::listen_and_serve(self).await.map_err(Into::into)
    }

    fn shutdown(&self) {
        StatusWebServer::shutdown(self);
    }
}

#[async_trait]
impl ReconcileService for InstanceReconciler {
    async fn verify_coherence(&self) -> Result<(), BoxError> {
        InstanceReconciler::verify_coherence(self).await.map_err(Into::into)
    }

    async fn run(&self) {
        InstanceReconciler::run(self).await;
    }

    fn stop(&self) {
        InstanceReconciler::stop(self);
    }
}

/// [`ProcessService`] implementation backed by a real PostgreSQL instance.
pub struct PostgresManager {
    instance: Arc<Instance>,
}

impl PostgresManager {
    /// Creates a manager for the given instance.
    #[must_use]
    pub const fn new(instance: Arc<Instance>) -> Self {
        Self { instance }
    }
}

#[async_trait]
impl ProcessService for PostgresManager {
    type Handle = PostgresProcess;

    async fn run_diagnostics(&self) -> Result<(), BoxError> {
        self.instance.print_control_data().await.map_err(Into::into)
    }

    fn spawn(&self) -> Result<Self::Handle, BoxError> {
        self.instance.start_postgres().map_err(Into::into)
    }
}

#[async_trait]
impl ProcessHandle for PostgresProcess {
    async fn wait(&self) -> Result<ExitOutcome, BoxError> {
        PostgresProcess::wait(self).await.map_err(Into::into)
    }

    fn terminate(&self) -> Result<(), BoxError> {
        self.signal(Signal::SIGTERM).map_err(Into::into)
    }
}
