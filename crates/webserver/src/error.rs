use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Binding a listener failed.
    #[error("failed to bind {0} listener: {1}")]
    Bind(&'static str, #[source] std::io::Error),

    /// A listener stopped serving without being asked to shut down.
    #[error("{0} listener stopped unexpectedly")]
    ListenerStopped(&'static str),

    /// A listener failed while serving.
    #[error("{0} listener failed: {1}")]
    Serve(&'static str, #[source] std::io::Error),
}
