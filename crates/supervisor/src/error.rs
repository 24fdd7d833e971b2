use crate::service::BoxError;
use thiserror::Error;

/// Fatal startup errors of the supervisor.
///
/// Every variant aborts startup before the managed process runs. Failures
/// after that point (process exit, shutdown steps) are logged, never
/// surfaced here.
#[derive(Debug, Error)]
pub enum Error {
    /// The pre-flight coherence check of the data directory failed.
    #[error("data directory coherence check failed: {0}")]
    Coherence(#[source] BoxError),

    /// The reconciler could not be constructed.
    #[error("error while constructing the reconciler: {0}")]
    Construction(#[source] BoxError),

    /// The diagnostic inspection of the data directory failed and
    /// diagnostics gating is enabled.
    #[error("error printing the control information of this instance: {0}")]
    Diagnostics(#[source] BoxError),

    /// The database engine could not be spawned.
    #[error("unable to start the database engine: {0}")]
    Spawn(#[source] BoxError),
}
