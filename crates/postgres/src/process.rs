//! Wrapper around the externally-spawned PostgreSQL engine process.

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::debug;

use crate::Error;

/// How the managed process terminated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The process exited on its own with the given status code.
    Exited(i32),

    /// The process was terminated by the given signal number.
    Signaled(i32),
}

impl ExitOutcome {
    /// Whether the outcome is a clean zero exit.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        status.code().map_or_else(
            || Self::Signaled(status.signal().unwrap_or(0)),
            Self::Exited,
        )
    }
}

/// A live handle to the spawned engine process.
///
/// The handle is created by the supervisor and published once; the shutdown
/// path only ever reads it to forward a termination signal by pid, so waiting
/// and signalling never contend on the same state.
pub struct PostgresProcess {
    child: Mutex<Child>,
    pid: Pid,
}

impl PostgresProcess {
    pub(crate) fn spawn(mut command: Command) -> Result<Self, Error> {
        let child = command
            .spawn()
            .map_err(|e| Error::Io("failed to spawn process", e))?;

        let pid = child
            .id()
            .map(|id| Pid::from_raw(id as i32))
            .ok_or(Error::NoPid)?;

        debug!("spawned process with pid {}", pid);

        Ok(Self {
            child: Mutex::new(child),
            pid,
        })
    }

    /// Returns the process ID.
    #[must_use]
    pub const fn pid(&self) -> Pid {
        self.pid
    }

    /// Waits for the process to exit and returns the termination outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the exit status could not be collected.
    pub async fn wait(&self) -> Result<ExitOutcome, Error> {
        let status = self
            .child
            .lock()
            .await
            .wait()
            .await
            .map_err(|e| Error::Io("failed to wait for process", e))?;

        Ok(ExitOutcome::from(status))
    }

    /// Best-effort delivery of a signal to the running process.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel refused the signal, for example because
    /// the process has already exited.
    pub fn signal(&self, signal: Signal) -> Result<(), Error> {
        signal::kill(self.pid, signal).map_err(Error::Signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[tokio::test]
    async fn wait_reports_exit_code() {
        let process = PostgresProcess::spawn(sh("exit 3")).expect("spawn failed");
        let outcome = process.wait().await.expect("wait failed");
        assert_eq!(outcome, ExitOutcome::Exited(3));
        assert!(!outcome.success());
    }

    #[tokio::test]
    async fn wait_reports_clean_exit() {
        let process = PostgresProcess::spawn(sh("true")).expect("spawn failed");
        let outcome = process.wait().await.expect("wait failed");
        assert!(outcome.success());
    }

    #[tokio::test]
    async fn signal_terminates_long_running_process() {
        let process = PostgresProcess::spawn(sh("sleep 30")).expect("spawn failed");
        process.signal(Signal::SIGTERM).expect("signal failed");
        let outcome = process.wait().await.expect("wait failed");
        assert_eq!(outcome, ExitOutcome::Signaled(libc_sigterm()));
    }

    const fn libc_sigterm() -> i32 {
        Signal::SIGTERM as i32
    }
}
