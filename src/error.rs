use std::io;
use thiserror::Error;

/// Errors surfaced by server configuration and lifecycle calls.
///
/// Configuration errors (`InvalidPort`, `Bind`, `Reactor`) are returned
/// synchronously from the failing setup call and are fatal only to that
/// operation. Per-connection failures never appear here; they are reported
/// through the connection's close event instead.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Port is outside the valid 1..=65535 range. Checked before any
    /// socket is created.
    #[error("invalid port {0}: must be between 1 and 65535")]
    InvalidPort(u32),

    /// Binding the listen socket failed (address in use, permission denied, ...).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Building the worker runtime failed.
    #[error("failed to create event loop: {0}")]
    Reactor(#[source] io::Error),

    /// An operation required a listener but none was created.
    #[error("no listener: call create_listener before start")]
    NoListener,

    /// An HTTP server was started without a service attached.
    #[error("no service: call set_service before start")]
    NoService,

    /// A pre-start configuration call arrived after `start`.
    #[error("server already started")]
    AlreadyStarted,

    /// `start` was called on a server that already ran its one
    /// start/stop cycle. Servers are single-use.
    #[error("server was stopped and cannot be restarted")]
    Stopped,

    /// `write` targeted a channel id that is unknown or already closed.
    #[error("unknown or closed channel {0}")]
    ChannelClosed(u64),
}

/// Error returned when a second response is sent on an exchange.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("a response was already sent for this exchange")]
    AlreadySent,
}
