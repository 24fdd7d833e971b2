//! Sidecar binary supervising one PostgreSQL instance.
//!
//! Configuration is taken from the environment; the flag-parsing CLI layer
//! lives outside this binary.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::path::PathBuf;
use std::sync::Arc;

use pgkeeper_postgres::{Instance, InstanceOptions};
use pgkeeper_supervisor::{BootstrapOptions, BoxError, Supervisor};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(Level::INFO).finish(),
    )?;

    let instance = Arc::new(instance_from_env()?);
    info!(
        "supervising instance {} of cluster {}",
        instance.instance_name(),
        instance.cluster_name()
    );

    let options = BootstrapOptions {
        fail_on_diagnostics_error: env_flag("PGKEEPER_STRICT_DIAGNOSTICS"),
        ..BootstrapOptions::default()
    };

    let supervisor = Supervisor::bootstrap(instance, options)?;
    supervisor.run().await?;

    Ok(())
}

fn instance_from_env() -> Result<Instance, BoxError> {
    let pgdata = PathBuf::from(require_env("PGDATA")?);
    let cluster_name = require_env("PGKEEPER_CLUSTER_NAME")?;

    let instance_name = std::env::var("PGKEEPER_INSTANCE_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .map_err(|_| "neither PGKEEPER_INSTANCE_NAME nor HOSTNAME is set")?;

    let port = match std::env::var("PGPORT") {
        Ok(raw) => raw.parse::<u16>().map_err(|_| "PGPORT is not a valid port")?,
        Err(_) => 5432,
    };

    let expected_major_version = match std::env::var("PGKEEPER_EXPECTED_MAJOR_VERSION") {
        Ok(raw) => Some(
            raw.parse::<u32>()
                .map_err(|_| "PGKEEPER_EXPECTED_MAJOR_VERSION is not a number")?,
        ),
        Err(_) => None,
    };

    let bin_dir = std::env::var_os("PGKEEPER_BIN_DIR").map(PathBuf::from);

    Ok(Instance::new(InstanceOptions {
        bin_dir,
        cluster_name,
        expected_major_version,
        instance_name,
        pgdata,
        port,
    }))
}

fn require_env(name: &'static str) -> Result<String, BoxError> {
    std::env::var(name).map_err(|_| format!("{name} is not set").into())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}
