//! Lifecycle supervisor for a managed PostgreSQL instance.
//!
//! The [`Supervisor`] is the orchestrating entry point of the sidecar: it
//! performs pre-flight validation, launches the status web server and the
//! reconciliation loop as background tasks, registers the termination
//! signal handler, runs a diagnostic inspection, then starts the database
//! engine in the foreground and blocks on its exit.
//!
//! Startup failures (construction, coherence, spawn, and optionally
//! diagnostics) are fatal and abort before the engine runs. Once the engine
//! is up, the supervisor only ever reacts to one event: the first
//! termination request, which drives the fixed three-step shutdown
//! sequence ([`Supervisor::shutdown`]).
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
pub mod service;
mod shutdown;

pub use error::Error;
pub use service::{
    BoxError, PostgresManager, ProcessHandle, ProcessService, ReconcileService, WebService,
};

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use pgkeeper_postgres::Instance;
use pgkeeper_reconciler::InstanceReconciler;
use pgkeeper_webserver::{StatusWebServer, WebServerOptions, url};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use shutdown::{ProcessSlot, ShutdownSequence};

/// The supervisor composed with its real collaborators.
pub type InstanceSupervisor = Supervisor<StatusWebServer, InstanceReconciler, PostgresManager>;

/// Options for composing a [`Supervisor`].
pub struct SupervisorOptions<W, R, P> {
    /// Whether a failing diagnostic step aborts startup. The diagnostic is
    /// informational, so the default composition leaves this off and only
    /// warns.
    pub fail_on_diagnostics_error: bool,

    /// Spawner for the managed database process.
    pub process_service: P,

    /// The reconciliation loop.
    pub reconciler: R,

    /// The status web server.
    pub web_server: W,
}

/// Options for [`Supervisor::bootstrap`].
pub struct BootstrapOptions {
    /// Whether a failing diagnostic step aborts startup.
    pub fail_on_diagnostics_error: bool,

    /// Address of the loopback listener used by the engine itself.
    pub local_addr: SocketAddr,

    /// Address of the metrics-only listener.
    pub metrics_addr: SocketAddr,

    /// Address of the status and probe listener.
    pub status_addr: SocketAddr,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            fail_on_diagnostics_error: false,
            local_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, url::LOCAL_PORT)),
            metrics_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, url::METRICS_PORT)),
            status_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, url::STATUS_PORT)),
        }
    }
}

/// Orchestrates the lifecycle of one managed database instance.
pub struct Supervisor<W, R, P>
where
    W: WebService,
    R: ReconcileService,
    P: ProcessService,
{
    fail_on_diagnostics_error: bool,
    process: ProcessSlot<P::Handle>,
    process_service: P,
    reconciler: Arc<R>,
    sequence: Arc<ShutdownSequence<W, R, P::Handle>>,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
    web_server: Arc<W>,
}

impl Supervisor<StatusWebServer, InstanceReconciler, PostgresManager> {
    /// Composes a supervisor with the real collaborators for the given
    /// instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Construction`] if the reconciler rejects the
    /// instance configuration; nothing is started in that case.
    pub fn bootstrap(instance: Arc<Instance>, options: BootstrapOptions) -> Result<Self, Error> {
        let reconciler = InstanceReconciler::new(instance.clone())
            .map_err(|e| Error::Construction(e.into()))?;

        let web_server = StatusWebServer::new(WebServerOptions {
            instance: instance.clone(),
            local_addr: options.local_addr,
            metrics_addr: options.metrics_addr,
            status_addr: options.status_addr,
        });

        Ok(Self::new(SupervisorOptions {
            fail_on_diagnostics_error: options.fail_on_diagnostics_error,
            process_service: PostgresManager::new(instance),
            reconciler,
            web_server,
        }))
    }
}

impl<W, R, P> Supervisor<W, R, P>
where
    W: WebService,
    R: ReconcileService,
    P: ProcessService,
{
    /// Composes a supervisor from already-constructed collaborators.
    #[must_use]
    pub fn new(
        SupervisorOptions {
            fail_on_diagnostics_error,
            process_service,
            reconciler,
            web_server,
        }: SupervisorOptions<W, R, P>,
    ) -> Self {
        let web_server = Arc::new(web_server);
        let reconciler = Arc::new(reconciler);
        let process: ProcessSlot<P::Handle> = Arc::new(Mutex::new(None));

        let sequence = Arc::new(ShutdownSequence::new(
            web_server.clone(),
            reconciler.clone(),
            process.clone(),
        ));

        Self {
            fail_on_diagnostics_error,
            process,
            process_service,
            reconciler,
            sequence,
            shutdown_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
            web_server,
        }
    }

    /// Token cancelled by the first termination request. Cancelling it
    /// programmatically triggers the same shutdown sequence as an OS
    /// signal.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs the supervisor until the managed process exits.
    ///
    /// A non-zero or signal-terminated engine exit is logged but does not
    /// change the supervisor's own return value; that mirrors the behavior
    /// operators rely on today, where the pod restart decision belongs to
    /// the controller and not to this exit status.
    ///
    /// # Errors
    ///
    /// Returns a fatal startup error; see [`Error`]. After the engine has
    /// been spawned no error is ever returned.
    pub async fn run(&self) -> Result<(), Error> {
        self.reconciler
            .verify_coherence()
            .await
            .map_err(Error::Coherence)?;

        self.start_background_services();
        self.register_signal_handler();
        self.run_diagnostics().await?;

        let handle = Arc::new(self.process_service.spawn().map_err(Error::Spawn)?);
        self.process.lock().await.replace(handle.clone());
        info!("database engine started");

        match handle.wait().await {
            Ok(outcome) if outcome.success() => info!("database engine exited cleanly"),
            Ok(outcome) => error!("database engine exited with errors: {:?}", outcome),
            Err(e) => error!("error while waiting for the database engine: {}", e),
        }

        Ok(())
    }

    /// Runs the three-step shutdown sequence: web server, reconciler, then
    /// the managed process. At most one invocation has any effect.
    pub async fn shutdown(&self) {
        self.sequence.execute().await;
    }

    /// Launches the web server and the reconciliation loop as
    /// fire-and-forget background tasks. Their failures are logged, never
    /// surfaced to the startup path.
    fn start_background_services(&self) {
        let web_server = self.web_server.clone();
        self.task_tracker.spawn(async move {
            if let Err(e) = web_server.listen_and_serve().await {
                error!("error while running the web server: {}", e);
            }
        });

        let reconciler = self.reconciler.clone();
        self.task_tracker.spawn(async move {
            reconciler.run().await;
        });
    }

    /// Registers the signal-wait task and the shutdown driver.
    fn register_signal_handler(&self) {
        let token = self.shutdown_token.clone();
        self.task_tracker.spawn(async move {
            match shutdown::wait_for_termination_signal().await {
                Ok(()) => {
                    info!("received termination signal");
                    token.cancel();
                }
                Err(e) => error!("unable to listen for termination signals: {}", e),
            }
        });

        let token = self.shutdown_token.clone();
        let sequence = self.sequence.clone();
        self.task_tracker.spawn(async move {
            token.cancelled().await;
            sequence.execute().await;
        });
    }

    async fn run_diagnostics(&self) -> Result<(), Error> {
        match self.process_service.run_diagnostics().await {
            Ok(()) => Ok(()),
            Err(e) if self.fail_on_diagnostics_error => Err(Error::Diagnostics(e)),
            Err(e) => {
                warn!("diagnostic inspection of the data directory failed: {}", e);
                Ok(())
            }
        }
    }
}
