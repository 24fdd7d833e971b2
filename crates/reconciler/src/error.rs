use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The on-disk data directory does not match the expected identity or
    /// state of this instance.
    #[error("data directory coherence check failed: {0}")]
    Coherence(String),

    /// The reconciler was constructed with an invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(&'static str),

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),
}
