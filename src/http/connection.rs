use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, error};

use crate::bridge::CallbackBridge;
use crate::http::exchange::HttpExchange;
use crate::http::parser::{parse_http_request, ParseError};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::service::HttpService;
use crate::http::writer::ResponseWriter;

/// Per-connection request/response state machine.
///
/// Reading → Processing → Writing, then back to Reading when the exchange
/// keeps the connection alive, or Closed otherwise. A malformed request
/// ends the connection with an error before any handler runs.
pub struct HttpConnection {
    stream: TcpStream,
    buffer: BytesMut,
    state: ConnectionState,
    service: Arc<HttpService>,
    bridge: CallbackBridge,
    shutdown: watch::Receiver<bool>,
}

enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(ResponseWriter, bool), // bool = keep_alive?
    Closed,
}

impl HttpConnection {
    pub fn new(
        stream: TcpStream,
        service: Arc<HttpService>,
        bridge: CallbackBridge,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
            state: ConnectionState::Reading,
            service,
            bridge,
            shutdown,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    match self.read_request().await? {
                        Some(req) => {
                            self.state = ConnectionState::Processing(req);
                        }
                        None => {
                            self.state = ConnectionState::Closed;
                        }
                    }
                }

                ConnectionState::Processing(req) => {
                    let keep_alive = req.keep_alive();
                    let response = self.process(req);

                    let writer = ResponseWriter::new(&response);
                    self.state = ConnectionState::Writing(writer, keep_alive);
                }

                ConnectionState::Writing(mut writer, keep_alive) => {
                    writer.write_to(&mut self.stream).await?;

                    if keep_alive {
                        self.state = ConnectionState::Reading; // go back for next request
                    } else {
                        self.state = ConnectionState::Closed;
                    }
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    async fn read_request(&mut self) -> anyhow::Result<Option<Request>> {
        loop {
            // Try parsing whatever we already have
            match parse_http_request(&self.buffer) {
                Ok((request, consumed)) => {
                    self.buffer.advance(consumed);
                    return Ok(Some(request));
                }

                Err(ParseError::Incomplete) => {
                    // Need more data → fall through to read
                }

                Err(e) => {
                    // Malformed request → close without invoking a handler
                    return Err(anyhow::anyhow!("HTTP parse error: {:?}", e));
                }
            }

            tokio::select! {
                _ = self.shutdown.wait_for(|stop| *stop) => {
                    return Ok(None);
                }

                read = self.stream.read_buf(&mut self.buffer) => {
                    if read? == 0 {
                        // Client closed connection
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Runs one exchange: resolve the handler, dispatch it through the
    /// bridge, convert any failure into the fixed 500 response.
    fn process(&self, request: Request) -> Response {
        let method = request.method;
        let path = request.path.clone();
        let mut exchange = HttpExchange::new(request);

        let response = match self.service.resolve(method, &path) {
            None => {
                debug!(method = method.as_str(), path = %path, "no handler registered");
                Response::not_found()
            }
            Some(handler) => {
                let outcome = self.bridge.dispatch(|| handler(exchange.request()));
                match outcome {
                    Ok(Ok(response)) => response,
                    Ok(Err(e)) => {
                        error!(method = method.as_str(), path = %path, error = %e,
                            "handler returned an error");
                        Response::internal_error()
                    }
                    Err(e) => {
                        error!(method = method.as_str(), path = %path, error = %e,
                            "handler panicked");
                        Response::internal_error()
                    }
                }
            }
        };

        // One response per exchange. `send` cannot fail here because this
        // is the only send on a fresh exchange.
        if let Err(e) = exchange.send(response) {
            error!(error = %e, "dropping duplicate response");
        }
        let (_, response) = exchange.into_parts();
        response.unwrap_or_else(Response::internal_error)
    }
}
