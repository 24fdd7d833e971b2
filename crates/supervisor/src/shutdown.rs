//! The signal-triggered coordinated shutdown protocol.
//!
//! The shutdown sequence runs at most once per supervisor lifetime and
//! always in the same order: web server, reconciler, then the managed
//! process. No step has a timeout and no escalation is attempted; each
//! outcome is logged and the sequence moves on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::service::{ProcessHandle, ReconcileService, WebService};

/// Slot through which the process handle is published from the startup path
/// to the shutdown path.
pub(crate) type ProcessSlot<H> = Arc<Mutex<Option<Arc<H>>>>;

pub(crate) struct ShutdownSequence<W, R, H> {
    process: ProcessSlot<H>,
    reconciler: Arc<R>,
    triggered: AtomicBool,
    web_server: Arc<W>,
}

impl<W, R, H> ShutdownSequence<W, R, H>
where
    W: WebService,
    R: ReconcileService,
    H: ProcessHandle,
{
    pub(crate) fn new(web_server: Arc<W>, reconciler: Arc<R>, process: ProcessSlot<H>) -> Self {
        Self {
            process,
            reconciler,
            triggered: AtomicBool::new(false),
            web_server,
        }
    }

    /// Runs the three shutdown steps in order. Every invocation after the
    /// first is silently ignored.
    pub(crate) async fn execute(&self) {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("shutting down web server");
        self.web_server.shutdown();
        info!("web server shutdown");

        info!("shutting down reconciler");
        self.reconciler.stop();
        info!("reconciler stopped");

        // Only a process that was actually started is signalled.
        let handle = self.process.lock().await.clone();
        if let Some(handle) = handle {
            info!("shutting down database engine");
            match handle.terminate() {
                Ok(()) => info!("termination signal forwarded"),
                Err(e) => error!("unable to forward termination signal: {}", e),
            }
        }
    }
}

/// Completes when the process receives a termination request from the host
/// environment (SIGINT or SIGTERM, with `ctrl_c` as a fallback).
pub(crate) async fn wait_for_termination_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }

    Ok(())
}
