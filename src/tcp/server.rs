use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::bridge::CallbackBridge;
use crate::error::ServerError;
use crate::reactor::Reactor;
use crate::tcp::channel::{
    next_channel_id, ChannelHandle, ChannelId, ChannelInfo, ChannelRegistry, ChannelState,
    ConnectionEvent,
};

/// Read buffer size per channel.
const BUFFER_SIZE: usize = 8192;

/// How long `stop` waits for channel tasks to fire their disconnect
/// events before the workers are joined.
const DRAIN_WINDOW: Duration = Duration::from_secs(2);

/// Host callback for connect/disconnect events.
pub type ConnectionCallback = Box<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// Host callback for inbound data. Receives the channel id and the bytes
/// read, in arrival order for that channel.
pub type MessageCallback = Box<dyn Fn(ChannelId, Bytes) + Send + Sync>;

/// Lifecycle of a server instance. One start/stop cycle only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// Callback slots shared between the registration API and in-flight
/// dispatch. Replacement is an atomic pointer swap; dispatch loads an
/// owned `Arc`, so a replaced callable is never freed mid-call and loads
/// after the swap only see the new one.
#[derive(Default)]
struct Callbacks {
    on_connection: ArcSwapOption<ConnectionCallback>,
    on_message: ArcSwapOption<MessageCallback>,
}

/// Asynchronous TCP server.
///
/// Owns the listen socket and all per-connection state. Configuration
/// calls (`create_listener`, `set_worker_count`) happen before `start`;
/// callback registration is allowed at any time. `start` is non-blocking;
/// `stop` is graceful and idempotent.
pub struct TcpServer {
    state: ServerState,
    listener: Option<std::net::TcpListener>,
    worker_threads: usize,
    reactor: Option<Reactor>,
    channels: ChannelRegistry,
    callbacks: Arc<Callbacks>,
    bridge: CallbackBridge,
}

impl TcpServer {
    pub fn new() -> Self {
        Self::with_bridge(CallbackBridge::new())
    }

    /// Builds a server sharing an existing callback gate, so host calls
    /// from several servers still serialize against each other.
    pub fn with_bridge(bridge: CallbackBridge) -> Self {
        Self {
            state: ServerState::Created,
            listener: None,
            worker_threads: 1,
            reactor: None,
            channels: ChannelRegistry::new(),
            callbacks: Arc::new(Callbacks::default()),
            bridge,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Binds and listens on `bind_addr:port`, returning the listen fd.
    ///
    /// The port is validated before any socket is created; bind failures
    /// (address in use, permission denied) are returned synchronously.
    pub fn create_listener(&mut self, port: u32, bind_addr: &str) -> Result<RawFd, ServerError> {
        if self.state != ServerState::Created {
            return Err(ServerError::AlreadyStarted);
        }
        if port == 0 || port > 65535 {
            return Err(ServerError::InvalidPort(port));
        }

        let addr = format!("{bind_addr}:{port}");
        let listener = std::net::TcpListener::bind(&addr).map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| ServerError::Bind { addr, source })?;

        let fd = listener.as_raw_fd();
        info!(%port, bind = %bind_addr, fd, "listener created");
        self.listener = Some(listener);
        Ok(fd)
    }

    /// Sets how many reactor worker threads service connections. Must be
    /// called before `start`.
    pub fn set_worker_count(&mut self, n: usize) -> Result<(), ServerError> {
        if self.state != ServerState::Created {
            return Err(ServerError::AlreadyStarted);
        }
        self.worker_threads = n.max(1);
        Ok(())
    }

    /// Registers (or replaces) the connect/disconnect callback.
    pub fn on_connection(&self, callback: impl Fn(&ConnectionEvent) + Send + Sync + 'static) {
        self.callbacks
            .on_connection
            .store(Some(Arc::new(Box::new(callback))));
    }

    /// Registers (or replaces) the inbound-data callback.
    pub fn on_message(&self, callback: impl Fn(ChannelId, Bytes) + Send + Sync + 'static) {
        self.callbacks
            .on_message
            .store(Some(Arc::new(Box::new(callback))));
    }

    /// Spawns the worker threads and the accept loop, then returns.
    ///
    /// Requires a listener. A stopped server cannot be restarted; build a
    /// new instance instead.
    pub fn start(&mut self) -> Result<(), ServerError> {
        match self.state {
            ServerState::Created => {}
            ServerState::Running => return Err(ServerError::AlreadyStarted),
            ServerState::Stopping | ServerState::Stopped => return Err(ServerError::Stopped),
        }
        let listener = self.listener.take().ok_or(ServerError::NoListener)?;

        let reactor = Reactor::new(self.worker_threads)?;
        let shutdown = reactor.shutdown_rx();
        let channels = self.channels.clone();
        let callbacks = self.callbacks.clone();
        let bridge = self.bridge.clone();

        reactor.handle().spawn(accept_loop(
            listener, channels, callbacks, bridge, shutdown,
        ));

        self.reactor = Some(reactor);
        self.state = ServerState::Running;
        Ok(())
    }

    /// Graceful stop: stops accepting, closes all channels, joins the
    /// worker threads. Idempotent. After this returns, no further
    /// callbacks fire.
    pub fn stop(&mut self) {
        if self.state != ServerState::Running {
            return;
        }
        self.state = ServerState::Stopping;

        if let Some(mut reactor) = self.reactor.take() {
            reactor.request_stop();

            // Give channel tasks a bounded window to fire their
            // disconnect events before the runtime is torn down.
            let deadline = Instant::now() + DRAIN_WINDOW;
            while !self.channels.is_empty() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(10));
            }

            reactor.shutdown();
        }

        self.channels.lock().clear();
        self.state = ServerState::Stopped;
        info!("tcp server stopped");
    }

    /// Requests stop without tearing anything down. Safe from any thread.
    pub fn request_stop(&self) {
        if let Some(reactor) = &self.reactor {
            reactor.request_stop();
        }
    }

    /// A cloneable handle for writing to channels from host callbacks.
    pub fn writer(&self) -> TcpWriter {
        TcpWriter {
            channels: self.channels.clone(),
        }
    }

    /// Enqueues `data` for asynchronous send on `id`. Returns the number
    /// of bytes accepted. Never blocks past buffering.
    pub fn write(&self, id: ChannelId, data: impl Into<Bytes>) -> Result<usize, ServerError> {
        self.writer().write(id, data)
    }

    /// Writes `data` to every connected channel; returns how many channels
    /// accepted it. A channel closing mid-broadcast is skipped, the rest
    /// proceed.
    pub fn broadcast(&self, data: impl Into<Bytes>) -> usize {
        self.writer().broadcast(data)
    }

    /// Number of currently connected channels.
    pub fn connection_count(&self) -> usize {
        self.channels.len()
    }

    /// Blocking variant of `start`: runs until ctrl-c or `request_stop`,
    /// then stops gracefully. Must be called from a plain (non-runtime)
    /// thread.
    pub fn run(&mut self) -> Result<(), ServerError> {
        self.start()?;
        if let Some(reactor) = &self.reactor {
            let mut shutdown = reactor.shutdown_rx();
            reactor.handle().clone().block_on(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("interrupt received, shutting down");
                    }
                    _ = shutdown.wait_for(|stop| *stop) => {}
                }
            });
        }
        self.stop();
        Ok(())
    }
}

impl Default for TcpServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Write/broadcast handle decoupled from the server's lifecycle, so host
/// callbacks (which only see channel ids) can send without holding a
/// reference to the server itself.
#[derive(Clone)]
pub struct TcpWriter {
    channels: ChannelRegistry,
}

impl TcpWriter {
    pub fn write(&self, id: ChannelId, data: impl Into<Bytes>) -> Result<usize, ServerError> {
        let data = data.into();
        let len = data.len();
        let channels = self.channels.lock();
        let handle = channels.get(&id).ok_or(ServerError::ChannelClosed(id))?;
        handle
            .outbound
            .send(data)
            .map_err(|_| ServerError::ChannelClosed(id))?;
        Ok(len)
    }

    pub fn broadcast(&self, data: impl Into<Bytes>) -> usize {
        let data = data.into();

        // Snapshot the senders so the lock is not held across sends.
        let targets: Vec<(ChannelId, mpsc::UnboundedSender<Bytes>)> = self
            .channels
            .lock()
            .iter()
            .map(|(id, handle)| (*id, handle.outbound.clone()))
            .collect();

        let mut reached = 0;
        for (id, outbound) in targets {
            match outbound.send(data.clone()) {
                Ok(()) => reached += 1,
                Err(_) => debug!(channel = id, "broadcast skipped closed channel"),
            }
        }
        reached
    }
}

async fn accept_loop(
    listener: std::net::TcpListener,
    channels: ChannelRegistry,
    callbacks: Arc<Callbacks>,
    bridge: CallbackBridge,
    mut shutdown: watch::Receiver<bool>,
) {
    let listener = match tokio::net::TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(e) => {
            warn!(error = %e, "failed to register listener with reactor");
            return;
        }
    };

    let channel_shutdown = shutdown.clone();
    loop {
        tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => break,

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let task = serve_channel(
                        stream,
                        peer,
                        channels.clone(),
                        callbacks.clone(),
                        bridge.clone(),
                        channel_shutdown.clone(),
                    );
                    tokio::spawn(task);
                }
                Err(e) => {
                    // Transient accept failures must not kill the loop.
                    warn!(error = %e, "accept failed");
                }
            },
        }
    }

    debug!("accept loop finished");
}

/// Serves one channel for its whole lifetime on a single reactor task,
/// which makes per-channel event delivery FIFO without locking.
async fn serve_channel(
    stream: TcpStream,
    peer_addr: SocketAddr,
    channels: ChannelRegistry,
    callbacks: Arc<Callbacks>,
    bridge: CallbackBridge,
    mut shutdown: watch::Receiver<bool>,
) {
    let fd = stream.as_raw_fd();
    let local_addr = stream
        .local_addr()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));

    let info = ChannelInfo {
        id: next_channel_id(),
        fd,
        local_addr,
        peer_addr,
    };
    let id = info.id;

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Bytes>();
    channels.insert(ChannelHandle {
        info: info.clone(),
        outbound: outbound_tx,
    });

    debug!(channel = id, peer = %peer_addr, fd, "connection accepted");
    if let Some(cb) = callbacks.on_connection.load_full() {
        let _ = bridge.dispatch(|| cb(&ConnectionEvent::new(&info, true)));
    }

    let (mut reader, mut writer) = stream.into_split();
    let mut buf = BytesMut::with_capacity(BUFFER_SIZE);
    let mut state = ChannelState::Connected;

    while state == ChannelState::Connected {
        tokio::select! {
            // Discard the non-Send watch::Ref inside the branch so the
            // select's intermediate value stays Send-able.
            _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
                state = ChannelState::Closing;
            }

            read = reader.read_buf(&mut buf) => match read {
                Ok(0) => {
                    debug!(channel = id, "peer closed connection");
                    state = ChannelState::Closing;
                }
                Ok(_) => {
                    let data = buf.split().freeze();
                    if let Some(cb) = callbacks.on_message.load_full() {
                        // Handler failures are logged by the bridge and
                        // suppressed; TCP has no response channel to
                        // report them through.
                        let _ = bridge.dispatch(|| cb(id, data.clone()));
                    }
                }
                Err(e) => {
                    debug!(channel = id, error = %e, "read failed");
                    state = ChannelState::Closing;
                }
            },

            queued = outbound_rx.recv() => match queued {
                Some(data) => {
                    if let Err(e) = writer.write_all(&data).await {
                        debug!(channel = id, error = %e, "write failed");
                        state = ChannelState::Closing;
                    }
                }
                None => state = ChannelState::Closing,
            },
        }
    }

    // Removal is the single close point; only the winner fires the
    // disconnect event, so it fires at most once per channel.
    if channels.remove(id).is_some() {
        if let Some(cb) = callbacks.on_connection.load_full() {
            let _ = bridge.dispatch(|| cb(&ConnectionEvent::new(&info, false)));
        }
    }
    debug!(channel = id, "channel closed");
}
