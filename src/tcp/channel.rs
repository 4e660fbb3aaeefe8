use std::collections::HashMap;
use std::net::SocketAddr;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::mpsc;

/// Stable handle for one TCP connection.
///
/// Identifiers increase monotonically for the life of the process and are
/// never reused, unlike file descriptors, which the OS recycles after
/// close. Callbacks address channels by id, never by fd.
pub type ChannelId = u64;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_channel_id() -> ChannelId {
    NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed)
}

/// Lifecycle of a channel, driven by its owning reactor task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Registered and receiving read events.
    Connected,
    /// Teardown started; the disconnect event has not fired yet.
    Closing,
    /// Deregistered. No further callbacks fire for this channel.
    Closed,
}

/// Immutable connection facts captured at accept time.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub fd: RawFd,
    pub local_addr: SocketAddr,
    pub peer_addr: SocketAddr,
}

/// Payload of the `on_connection` callback, fired once when a channel
/// connects and once more when it disconnects.
#[derive(Debug, Clone)]
pub struct ConnectionEvent {
    pub peer_addr: SocketAddr,
    pub connected: bool,
    pub fd: RawFd,
    pub channel_id: ChannelId,
}

impl ConnectionEvent {
    pub(crate) fn new(info: &ChannelInfo, connected: bool) -> Self {
        Self {
            peer_addr: info.peer_addr,
            connected,
            fd: info.fd,
            channel_id: info.id,
        }
    }
}

/// Registry entry for a live channel: its facts plus the outbound queue
/// drained by the channel's writer half.
pub(crate) struct ChannelHandle {
    pub info: ChannelInfo,
    pub outbound: mpsc::UnboundedSender<Bytes>,
}

/// Shared map of live channels, keyed by id.
///
/// Presence in the map means the channel is `Connected`; removal is the
/// single close point, so at most one disconnect event can fire per
/// channel (whoever removes the entry fires it).
#[derive(Clone, Default)]
pub(crate) struct ChannelRegistry {
    inner: Arc<Mutex<HashMap<ChannelId, ChannelHandle>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, HashMap<ChannelId, ChannelHandle>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, handle: ChannelHandle) {
        self.lock().insert(handle.info.id, handle);
    }

    /// Removes the channel, returning its info if this call won the close.
    pub fn remove(&self, id: ChannelId) -> Option<ChannelInfo> {
        self.lock().remove(&id).map(|handle| handle.info)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_ids_are_unique_and_increasing() {
        let a = next_channel_id();
        let b = next_channel_id();
        assert!(b > a);
    }

    #[test]
    fn registry_remove_wins_only_once() {
        let registry = ChannelRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let info = ChannelInfo {
            id: 7,
            fd: -1,
            local_addr: "127.0.0.1:0".parse().unwrap(),
            peer_addr: "127.0.0.1:0".parse().unwrap(),
        };
        registry.insert(ChannelHandle {
            info,
            outbound: tx,
        });

        assert!(registry.remove(7).is_some());
        assert!(registry.remove(7).is_none());
    }
}
