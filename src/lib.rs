//! Hearth - Embeddable Asynchronous Server Core
//!
//! A host application registers connection- and request-level callbacks;
//! the core owns socket I/O, buffering, and protocol framing. Callbacks
//! fire on reactor worker threads but cross the [`bridge::CallbackBridge`]
//! one at a time, so a single-threaded, non-reentrant host runtime is safe
//! to embed. Host-side failures become well-defined protocol outcomes
//! (a logged no-op for TCP, a 500 response for HTTP), never reactor
//! crashes.

pub mod bridge;
pub mod config;
pub mod error;
pub mod http;
pub mod reactor;
pub mod tcp;

use tracing::{debug, info};

pub use bridge::CallbackBridge;
pub use error::{ExchangeError, ServerError};
pub use tcp::{ChannelId, TcpServer};

/// Crate version as reported at runtime.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Version string baked in at compile time, including the crate name.
pub fn compile_version() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

/// Version as a single comparable number: major * 10000 + minor * 100 + patch.
pub fn version_number() -> u32 {
    let major: u32 = env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0);
    let minor: u32 = env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0);
    let patch: u32 = env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0);
    major * 10000 + minor * 100 + patch
}

/// Runs a TCP echo server on `0.0.0.0:port`, blocking the calling thread.
///
/// Every byte received on a channel is written back to the same channel
/// unchanged. Returns once the server is stopped, either by ctrl-c or by
/// a `request_stop` from another thread.
pub fn run_echo_server(port: u32) -> anyhow::Result<()> {
    let mut server = TcpServer::new();
    server.create_listener(port, "0.0.0.0")?;

    let writer = server.writer();
    server.on_message(move |id, data| {
        if let Err(e) = writer.write(id, data) {
            debug!(channel = id, error = %e, "echo write failed");
        }
    });
    server.on_connection(|event| {
        if event.connected {
            info!(channel = event.channel_id, peer = %event.peer_addr, fd = event.fd,
                "client connected");
        } else {
            info!(channel = event.channel_id, peer = %event.peer_addr, "client disconnected");
        }
    });

    info!(port, "tcp echo server starting");
    server.run()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_number_matches_version_string() {
        let parts: Vec<u32> = version()
            .split('.')
            .map(|p| p.parse().unwrap())
            .collect();
        assert_eq!(
            version_number(),
            parts[0] * 10000 + parts[1] * 100 + parts[2]
        );
    }
}
