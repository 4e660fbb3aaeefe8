use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::bridge::CallbackBridge;
use crate::error::ServerError;
use crate::http::connection::HttpConnection;
use crate::http::service::HttpService;
use crate::reactor::Reactor;
use crate::tcp::server::ServerState;

/// HTTP server: binds a listening port to one [`HttpService`] and runs it
/// on the reactor, adding request framing on top of the raw byte stream.
///
/// The service is shared (`Arc`), so it outlives any server referencing
/// it and several servers may serve the same route table.
pub struct HttpServer {
    state: ServerState,
    port: u32,
    https_port: Option<u32>,
    bind_addr: String,
    worker_threads: usize,
    service: Option<Arc<HttpService>>,
    reactor: Option<Reactor>,
    bridge: CallbackBridge,
}

impl HttpServer {
    pub fn new() -> Self {
        Self::with_bridge(CallbackBridge::new())
    }

    /// Builds a server sharing an existing callback gate.
    pub fn with_bridge(bridge: CallbackBridge) -> Self {
        Self {
            state: ServerState::Created,
            port: 8080,
            https_port: None,
            bind_addr: "0.0.0.0".to_string(),
            worker_threads: 1,
            service: None,
            reactor: None,
            bridge,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn port(&self) -> u32 {
        self.port
    }

    pub fn set_port(&mut self, port: u32) {
        self.port = port;
    }

    pub fn https_port(&self) -> Option<u32> {
        self.https_port
    }

    /// Stored for interface parity; serving TLS requires an external
    /// transport, so a configured https port is ignored at `start` with a
    /// warning.
    pub fn set_https_port(&mut self, port: u32) {
        self.https_port = Some(port);
    }

    pub fn set_bind_addr(&mut self, addr: impl Into<String>) {
        self.bind_addr = addr.into();
    }

    /// Sets how many reactor worker threads service connections.
    pub fn set_thread_num(&mut self, n: usize) -> Result<(), ServerError> {
        if self.state != ServerState::Created {
            return Err(ServerError::AlreadyStarted);
        }
        self.worker_threads = n.max(1);
        Ok(())
    }

    /// Attaches the service whose route table handles requests.
    pub fn set_service(&mut self, service: Arc<HttpService>) {
        self.service = Some(service);
    }

    pub fn service(&self) -> Option<Arc<HttpService>> {
        self.service.clone()
    }

    /// Binds the port and spawns the accept loop, then returns.
    ///
    /// Port validation and bind failures are reported synchronously. A
    /// stopped server cannot be restarted.
    pub fn start(&mut self) -> Result<(), ServerError> {
        match self.state {
            ServerState::Created => {}
            ServerState::Running => return Err(ServerError::AlreadyStarted),
            ServerState::Stopping | ServerState::Stopped => return Err(ServerError::Stopped),
        }
        let service = self.service.clone().ok_or(ServerError::NoService)?;

        if self.port == 0 || self.port > 65535 {
            return Err(ServerError::InvalidPort(self.port));
        }
        if let Some(https_port) = self.https_port {
            warn!(https_port, "https port configured but no TLS transport is available; ignoring");
        }

        let addr = format!("{}:{}", self.bind_addr, self.port);
        let listener = std::net::TcpListener::bind(&addr).map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;

        let reactor = Reactor::new(self.worker_threads)?;
        let shutdown = reactor.shutdown_rx();
        let bridge = self.bridge.clone();

        reactor
            .handle()
            .spawn(accept_loop(listener, service, bridge, shutdown));

        info!(addr = %addr, "http server listening");
        self.reactor = Some(reactor);
        self.state = ServerState::Running;
        Ok(())
    }

    /// Graceful stop: stops accepting, closes connections, joins the
    /// workers. Idempotent.
    pub fn stop(&mut self) {
        if self.state != ServerState::Running {
            return;
        }
        self.state = ServerState::Stopping;
        if let Some(mut reactor) = self.reactor.take() {
            reactor.shutdown();
        }
        self.state = ServerState::Stopped;
        info!("http server stopped");
    }

    /// Requests stop without tearing anything down. Safe from any thread.
    pub fn request_stop(&self) {
        if let Some(reactor) = &self.reactor {
            reactor.request_stop();
        }
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

impl Default for HttpServer {
    fn default() -> Self {
        Self::new()
    }
}

async fn accept_loop(
    listener: std::net::TcpListener,
    service: Arc<HttpService>,
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

    let conn_shutdown = shutdown.clone();
    loop {
        tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => break,

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let service = service.clone();
                    let bridge = bridge.clone();
                    let shutdown = conn_shutdown.clone();

                    tokio::spawn(async move {
                        let mut conn = HttpConnection::new(stream, service, bridge, shutdown);
                        if let Err(e) = conn.run().await {
                            // Per-connection errors (parse failures, resets)
                            // end this connection only.
                            error!(peer = %peer, error = %e, "connection error");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                }
            },
        }
    }
}
