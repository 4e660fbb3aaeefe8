//! Raw TCP server: listen-socket lifecycle, per-connection channels,
//! accept/read/close event routing, outbound write and broadcast.
//!
//! Each accepted connection becomes a [`channel::ChannelId`]-addressed
//! channel served by a single reactor task, so events on one channel are
//! FIFO by construction. Host callbacks cross the
//! [`crate::bridge::CallbackBridge`] before touching host state.

pub mod channel;
pub mod server;

pub use channel::{ChannelId, ChannelInfo, ChannelState, ConnectionEvent};
pub use server::{ServerState, TcpServer, TcpWriter};
