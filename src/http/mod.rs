//! HTTP server layer.
//!
//! Builds request framing and routing on top of the reactor primitives,
//! with keep-alive support.
//!
//! # Architecture
//!
//! - **`server`**: binds a port to an [`service::HttpService`] and runs the accept loop
//! - **`service`**: route table plus the optional catch-all handler
//! - **`connection`**: per-connection request-response state machine
//! - **`exchange`**: one request/response cycle with a one-shot response guard
//! - **`parser`**: parses incoming HTTP requests from byte buffers
//! - **`request`** / **`response`**: request and response representations
//! - **`writer`**: serializes and writes responses to the client
//!
//! # Connection state machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for incoming request data
//!        └──────┬──────┘
//!               │ Request received
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Resolve handler, dispatch via bridge
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```
//!
//! Handler failures are caught at the bridge and completed as a fixed 500
//! response; malformed requests close the connection before any handler
//! runs.

pub mod connection;
pub mod exchange;
pub mod parser;
pub mod request;
pub mod response;
pub mod server;
pub mod service;
pub mod writer;

pub use exchange::HttpExchange;
pub use request::{Method, Request, RequestBuilder};
pub use response::{Body, Response, ResponseBuilder, StatusCode};
pub use server::HttpServer;
pub use service::{HttpService, RouteHandler};
