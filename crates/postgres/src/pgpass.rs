//! Installation of credential and configuration files for the managed
//! instance.

use std::path::Path;

use tracing::debug;

use crate::Error;

/// File name of the operator-generated configuration fragment inside the
/// data directory.
pub const CUSTOM_CONFIGURATION_FILE: &str = "custom.conf";

/// Creates and installs a `.pgpass` file allowing password connections to
/// the local server, reading the password from `password_file`. The file is
/// installed into the user home directory.
///
/// # Errors
///
/// Returns an error if the home directory is not set, the password file
/// cannot be read, or the `.pgpass` file cannot be installed.
pub async fn create_pgpass(password_file: &Path) -> Result<(), Error> {
    let home = home_dir()?;
    create_pgpass_into(&home, password_file).await
}

/// Creates and installs a `.pgpass` file into `target_dir`, reading the
/// password from `password_file`.
///
/// # Errors
///
/// Returns an error if the password file cannot be read or the `.pgpass`
/// file cannot be installed.
pub async fn create_pgpass_into(target_dir: &Path, password_file: &Path) -> Result<(), Error> {
    let password = tokio::fs::read_to_string(password_file)
        .await
        .map_err(|e| Error::Io("failed to read password file", e))?;
    let password = password.trim_end();

    // One entry for normal connections, one for replication connections.
    let mut content = format!("*:{}:{}:{}:{}\n", 5432, "postgres", "postgres", password);
    content.push_str(&format!(
        "*:{}:{}:{}:{}\n",
        5432, "replication", "postgres", password
    ));

    install_pgpass_into(target_dir, &content).await
}

/// Installs a `.pgpass` file with the given content into the user home
/// directory.
///
/// # Errors
///
/// Returns an error if the home directory is not set or the file cannot be
/// written.
pub async fn install_pgpass(content: &str) -> Result<(), Error> {
    let home = home_dir()?;
    install_pgpass_into(&home, content).await
}

fn home_dir() -> Result<std::path::PathBuf, Error> {
    std::env::var_os("HOME")
        .map(std::path::PathBuf::from)
        .ok_or(Error::NoHomeDirectory)
}

/// Installs a `.pgpass` file with the given content into `target_dir`.
///
/// # Errors
///
/// Returns an error if the file cannot be written or its permissions cannot
/// be restricted.
pub async fn install_pgpass_into(target_dir: &Path, content: &str) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;

    let target = target_dir.join(".pgpass");

    tokio::fs::write(&target, content)
        .await
        .map_err(|e| Error::Io("failed to write .pgpass", e))?;

    // libpq ignores the file unless it is private to the owner
    tokio::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| Error::Io("failed to set .pgpass permissions", e))?;

    debug!("installed {}", target.display());

    Ok(())
}

/// Installs the operator-generated configuration fragment into the data
/// directory.
///
/// # Errors
///
/// Returns an error if the file cannot be copied.
pub async fn install_custom_configuration_file(pgdata: &Path, source: &Path) -> Result<(), Error> {
    install_pgdata_file(pgdata, source, CUSTOM_CONFIGURATION_FILE).await
}

/// Installs the operator-managed host-based access rules into the data
/// directory.
///
/// # Errors
///
/// Returns an error if the file cannot be copied.
pub async fn install_pg_hba_file(pgdata: &Path, source: &Path) -> Result<(), Error> {
    install_pgdata_file(pgdata, source, "pg_hba.conf").await
}

async fn install_pgdata_file(
    pgdata: &Path,
    source: &Path,
    destination: &str,
) -> Result<(), Error> {
    let target = pgdata.join(destination);

    tokio::fs::copy(source, &target)
        .await
        .map_err(|e| Error::Io("failed to install file into PGDATA", e))?;

    debug!("installed {}", target.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn pgpass_has_entries_for_both_connection_kinds() {
        let dir = TempDir::new().expect("tempdir");
        let password_file = dir.path().join("pwfile");
        tokio::fs::write(&password_file, "s3cret\n").await.expect("write");

        create_pgpass_into(dir.path(), &password_file)
            .await
            .expect("install");

        let installed = tokio::fs::read_to_string(dir.path().join(".pgpass"))
            .await
            .expect("read installed");
        assert_eq!(
            installed,
            "*:5432:postgres:postgres:s3cret\n*:5432:replication:postgres:s3cret\n"
        );
    }

    #[tokio::test]
    async fn pgpass_is_private_to_the_owner() {
        let dir = TempDir::new().expect("tempdir");
        install_pgpass_into(dir.path(), "*:5432:postgres:postgres:pw\n")
            .await
            .expect("install");

        let mode = std::fs::metadata(dir.path().join(".pgpass"))
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn pg_hba_lands_in_the_data_directory() {
        let dir = TempDir::new().expect("tempdir");
        let pgdata = dir.path().join("pgdata");
        tokio::fs::create_dir(&pgdata).await.expect("mkdir");

        let source = dir.path().join("generated_hba");
        tokio::fs::write(&source, "host all all 0.0.0.0/0 md5\n")
            .await
            .expect("write");

        install_pg_hba_file(&pgdata, &source).await.expect("install");

        let installed = tokio::fs::read_to_string(pgdata.join("pg_hba.conf"))
            .await
            .expect("read");
        assert_eq!(installed, "host all all 0.0.0.0/0 md5\n");
    }

    #[tokio::test]
    async fn custom_configuration_lands_under_its_reserved_name() {
        let dir = TempDir::new().expect("tempdir");
        let pgdata = dir.path().join("pgdata");
        tokio::fs::create_dir(&pgdata).await.expect("mkdir");

        let source = dir.path().join("generated.conf");
        tokio::fs::write(&source, "shared_buffers = '256MB'\n")
            .await
            .expect("write");

        install_custom_configuration_file(&pgdata, &source)
            .await
            .expect("install");

        let installed = tokio::fs::read_to_string(pgdata.join(CUSTOM_CONFIGURATION_FILE))
            .await
            .expect("read");
        assert_eq!(installed, "shared_buffers = '256MB'\n");
    }
}
