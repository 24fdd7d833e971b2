//! Configuration and process management for a supervised PostgreSQL
//! instance.
//!
//! The [`Instance`] describes one managed database engine: where its data
//! directory lives, how to reach it, and which cluster it belongs to. It can
//! spawn the engine itself ([`Instance::start_postgres`]), run the read-only
//! `pg_controldata` inspection ([`Instance::print_control_data`]), and
//! install credential and configuration files next to the data directory.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod pgpass;
mod process;

pub use error::Error;
pub use pgpass::{
    CUSTOM_CONFIGURATION_FILE, create_pgpass, create_pgpass_into,
    install_custom_configuration_file, install_pg_hba_file, install_pgpass, install_pgpass_into,
};
pub use process::{ExitOutcome, PostgresProcess};

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

/// Options for configuring an [`Instance`].
pub struct InstanceOptions {
    /// Optional directory containing the PostgreSQL binaries. When `None`
    /// the binaries are looked up on the `PATH`.
    pub bin_dir: Option<PathBuf>,

    /// Name of the cluster this instance belongs to.
    pub cluster_name: String,

    /// Expected PostgreSQL major version of the data directory, when known.
    pub expected_major_version: Option<u32>,

    /// Name of this instance within the cluster.
    pub instance_name: String,

    /// The data directory of the instance.
    pub pgdata: PathBuf,

    /// The port the engine listens for connections on.
    pub port: u16,
}

/// Immutable description of one managed PostgreSQL instance.
pub struct Instance {
    bin_dir: Option<PathBuf>,
    cluster_name: String,
    expected_major_version: Option<u32>,
    instance_name: String,
    pgdata: PathBuf,
    port: u16,
}

impl Instance {
    /// Creates a new instance description.
    #[must_use]
    pub fn new(
        InstanceOptions {
            bin_dir,
            cluster_name,
            expected_major_version,
            instance_name,
            pgdata,
            port,
        }: InstanceOptions,
    ) -> Self {
        Self {
            bin_dir,
            cluster_name,
            expected_major_version,
            instance_name,
            pgdata,
            port,
        }
    }

    /// The data directory of the instance.
    #[must_use]
    pub fn pgdata(&self) -> &Path {
        &self.pgdata
    }

    /// The port the engine listens for connections on.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Name of the cluster this instance belongs to.
    #[must_use]
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Name of this instance within the cluster.
    #[must_use]
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Expected PostgreSQL major version of the data directory, when known.
    #[must_use]
    pub const fn expected_major_version(&self) -> Option<u32> {
        self.expected_major_version
    }

    /// Spawns the database engine.
    ///
    /// The engine inherits the supervisor's standard streams and receives
    /// the data directory through the `PGDATA` environment variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the binary cannot be located or the process
    /// cannot be created.
    pub fn start_postgres(&self) -> Result<PostgresProcess, Error> {
        let mut command = Command::new(self.resolve_bin("postgres")?);
        command
            .env("PGDATA", &self.pgdata)
            .arg("-p")
            .arg(self.port.to_string())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        debug!("starting postgres for {}", self.pgdata.display());

        PostgresProcess::spawn(command)
    }

    /// Prints the control information of the data directory to the
    /// supervisor's standard streams, for operator visibility only.
    ///
    /// # Errors
    ///
    /// Returns an error if `pg_controldata` cannot be located, cannot be
    /// spawned, or exits unsuccessfully.
    pub async fn print_control_data(&self) -> Result<(), Error> {
        let status = Command::new(self.resolve_bin("pg_controldata")?)
            .env("PGDATA", &self.pgdata)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| Error::Io("failed to run pg_controldata", e))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::ControlData(status))
        }
    }

    fn resolve_bin(&self, name: &'static str) -> Result<PathBuf, Error> {
        self.bin_dir.as_ref().map_or_else(
            || which::which(name).map_err(|_| Error::BinaryNotFound(name)),
            |dir| Ok(dir.join(name)),
        )
    }
}
