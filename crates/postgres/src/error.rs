use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A required PostgreSQL binary could not be located.
    #[error("binary not found in PATH: {0}")]
    BinaryNotFound(&'static str),

    /// `pg_controldata` ran but reported failure.
    #[error("pg_controldata exited with {0}")]
    ControlData(std::process::ExitStatus),

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// The home directory could not be determined.
    #[error("home directory is not set")]
    NoHomeDirectory,

    /// The process exited before a pid could be read.
    #[error("process exited before a pid was assigned")]
    NoPid,

    /// Signal delivery to the managed process failed.
    #[error("failed to signal postgres: {0}")]
    Signal(#[source] nix::Error),
}
