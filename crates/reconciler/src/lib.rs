//! Continuous reconciliation for a supervised PostgreSQL instance.
//!
//! The [`InstanceReconciler`] owns two responsibilities: a one-shot
//! pre-flight coherence check of the data directory before anything is
//! allowed to start, and a background loop that keeps re-observing the
//! instance until asked to stop. The decisions taken inside a reconcile
//! pass are deliberately minimal here; the loop machinery and its stop
//! semantics are the contract.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::sync::Arc;
use std::time::Duration;

use pgkeeper_postgres::Instance;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// File inside the data directory recording which cluster the directory
/// belongs to. Written on first adoption, verified on every start.
pub const CLUSTER_IDENTITY_FILE: &str = "cluster_identity";

const RECONCILE_INTERVAL: Duration = Duration::from_secs(10);

/// Reconciles the actual state of one instance with its desired state.
#[derive(Clone)]
pub struct InstanceReconciler {
    instance: Arc<Instance>,
    shutdown_token: CancellationToken,
}

impl InstanceReconciler {
    /// Creates a new reconciler for the given instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the instance configuration is invalid.
    pub fn new(instance: Arc<Instance>) -> Result<Self, Error> {
        if instance.cluster_name().is_empty() {
            return Err(Error::Config("cluster name must not be empty"));
        }

        if instance.instance_name().is_empty() {
            return Err(Error::Config("instance name must not be empty"));
        }

        if !instance.pgdata().is_absolute() {
            return Err(Error::Config("data directory must be an absolute path"));
        }

        if instance.port() == 0 {
            return Err(Error::Config("port must not be zero"));
        }

        Ok(Self {
            instance,
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Pre-flight check that the on-disk data directory matches the
    /// expected identity of this instance.
    ///
    /// Guards against attaching the wrong storage volume or starting with a
    /// data directory initialized for a different cluster. A directory that
    /// carries no identity marker yet is adopted by writing one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Coherence`] if the directory is missing, belongs to
    /// another cluster, or was initialized by an unexpected PostgreSQL
    /// major version.
    pub async fn verify_coherence(&self) -> Result<(), Error> {
        let pgdata = self.instance.pgdata();

        let metadata = tokio::fs::metadata(pgdata).await.map_err(|_| {
            Error::Coherence(format!("data directory {} is not accessible", pgdata.display()))
        })?;

        if !metadata.is_dir() {
            return Err(Error::Coherence(format!(
                "{} is not a directory",
                pgdata.display()
            )));
        }

        self.verify_major_version().await?;
        self.verify_cluster_identity().await?;

        info!("data directory {} passed coherence checks", pgdata.display());

        Ok(())
    }

    async fn verify_major_version(&self) -> Result<(), Error> {
        let version_file = self.instance.pgdata().join("PG_VERSION");

        let raw = tokio::fs::read_to_string(&version_file).await.map_err(|_| {
            Error::Coherence(format!(
                "{} is missing; the data directory is not initialized",
                version_file.display()
            ))
        })?;

        let found: u32 = raw
            .trim()
            .parse()
            .map_err(|_| Error::Coherence(format!("unparsable PG_VERSION content {raw:?}")))?;

        if let Some(expected) = self.instance.expected_major_version() {
            if found != expected {
                return Err(Error::Coherence(format!(
                    "data directory was initialized by PostgreSQL {found}, expected {expected}"
                )));
            }
        }

        Ok(())
    }

    async fn verify_cluster_identity(&self) -> Result<(), Error> {
        let marker = self.instance.pgdata().join(CLUSTER_IDENTITY_FILE);

        match tokio::fs::read_to_string(&marker).await {
            Ok(recorded) => {
                let recorded = recorded.trim();
                if recorded == self.instance.cluster_name() {
                    Ok(())
                } else {
                    Err(Error::Coherence(format!(
                        "data directory belongs to cluster {recorded:?}, expected {:?}",
                        self.instance.cluster_name()
                    )))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // First start on a freshly initialized directory: adopt it.
                tokio::fs::write(&marker, format!("{}\n", self.instance.cluster_name()))
                    .await
                    .map_err(|e| Error::Io("failed to write cluster identity marker", e))?;
                info!(
                    "adopted data directory for cluster {}",
                    self.instance.cluster_name()
                );
                Ok(())
            }
            Err(e) => Err(Error::Io("failed to read cluster identity marker", e)),
        }
    }

    /// Runs the reconciliation loop until [`stop`](Self::stop) is called.
    pub async fn run(&self) {
        info!("reconciliation loop started");

        let mut interval = tokio::time::interval(RECONCILE_INTERVAL);

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.reconcile_once().await {
                        warn!("reconcile pass failed: {}", e);
                    }
                }
            }
        }

        info!("reconciliation loop stopped");
    }

    /// Requests loop termination.
    ///
    /// Safe to call before [`run`](Self::run) has started, after it has
    /// exited, and any number of times.
    pub fn stop(&self) {
        self.shutdown_token.cancel();
    }

    async fn reconcile_once(&self) -> Result<(), Error> {
        let pgdata = self.instance.pgdata();

        // Re-observe the storage between passes; losing the volume under a
        // running instance is the drift we can detect from here.
        if tokio::fs::metadata(pgdata).await.is_err() {
            warn!("data directory {} has disappeared", pgdata.display());
        } else {
            debug!(
                "instance {} aligned with desired state",
                self.instance.instance_name()
            );
        }

        Ok(())
    }
}
