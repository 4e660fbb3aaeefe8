//! Serialization boundary between reactor worker threads and host callbacks.
//!
//! The host runtime this core embeds into is single-threaded and not
//! reentrant, so every call into a host-supplied callable goes through one
//! global gate: acquire, invoke, catch any failure, release. No two host
//! calls ever execute concurrently, across all servers sharing a bridge.
//!
//! The gate being global means one slow callback stalls delivery on every
//! connection of every worker. That trade-off is intentional; sharding the
//! gate or handing off to a worker pool is the place to change it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::error;

/// A host callback failed while being dispatched.
#[derive(Debug, Error)]
#[error("host callback failed: {message}")]
pub struct HandlerError {
    pub message: String,
}

/// Funnels callback invocations from reactor threads into the host, one at
/// a time. Cheap to clone; clones share the same gate.
#[derive(Clone, Default)]
pub struct CallbackBridge {
    gate: Arc<Mutex<()>>,
}

impl CallbackBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` under the global gate.
    ///
    /// A panic raised by `f` is caught and converted into a
    /// [`HandlerError`]; it never unwinds into the reactor. The gate is
    /// released either way.
    pub fn dispatch<T>(&self, f: impl FnOnce() -> T) -> Result<T, HandlerError> {
        let _guard = self
            .gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
            let message = panic_message(payload.as_ref());
            error!(error = %message, "host callback panicked");
            HandlerError { message }
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_returns_value() {
        let bridge = CallbackBridge::new();
        let out = bridge.dispatch(|| 41 + 1).unwrap();
        assert_eq!(out, 42);
    }

    #[test]
    fn dispatch_catches_panic() {
        let bridge = CallbackBridge::new();
        let err = bridge.dispatch(|| panic!("boom")).unwrap_err();
        assert!(err.message.contains("boom"));
    }

    #[test]
    fn gate_survives_panicking_callback() {
        let bridge = CallbackBridge::new();
        let _ = bridge.dispatch(|| panic!("first"));
        // A failed callback must not wedge the gate for the next one.
        assert_eq!(bridge.dispatch(|| 7).unwrap(), 7);
    }
}
