//! Worker event loops and shutdown signalling.
//!
//! The reactor owns a multi-thread tokio runtime. Accept loops and
//! per-connection tasks are spawned onto it; a `watch` channel carries the
//! stop request so every task can observe shutdown promptly without being
//! polled on a timer.

use std::time::Duration;

use crate::error::ServerError;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::watch;
use tracing::debug;

/// How long `shutdown` waits for in-flight tasks before abandoning them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct Reactor {
    runtime: Option<Runtime>,
    handle: Handle,
    shutdown_tx: watch::Sender<bool>,
}

impl Reactor {
    /// Builds a runtime with `worker_threads` I/O workers.
    ///
    /// Failure to create the runtime is a configuration error reported
    /// synchronously to the caller.
    pub fn new(worker_threads: usize) -> Result<Self, ServerError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("hearth-worker")
            .enable_all()
            .build()
            .map_err(ServerError::Reactor)?;

        let handle = runtime.handle().clone();
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            runtime: Some(runtime),
            handle,
            shutdown_tx,
        })
    }

    /// Handle for spawning tasks onto the worker runtime.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// A receiver that flips to `true` once stop is requested.
    pub fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Requests the loops to stop. Idempotent, safe from any thread.
    ///
    /// Only sets the flag; teardown happens in [`Reactor::shutdown`] on a
    /// normal thread, never here.
    pub fn request_stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Whether stop has been requested.
    pub fn is_stopping(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Signals stop and joins the worker threads, bounded by a grace period.
    ///
    /// After this returns no further callbacks fire and all descriptors
    /// owned by reactor tasks are closed. Must be called from a thread that
    /// may block, i.e. not from inside the runtime itself.
    pub fn shutdown(&mut self) {
        self.request_stop();
        if let Some(runtime) = self.runtime.take() {
            debug!("shutting down reactor workers");
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
        }
    }
}
