use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};

use crate::http::request::{Method, Request};
use crate::http::response::Response;

/// A host-supplied request handler.
///
/// Returning `Err` (or panicking) completes the exchange with a 500; the
/// failure never reaches the reactor.
pub type RouteHandler = Box<dyn Fn(&Request) -> anyhow::Result<Response> + Send + Sync>;

type RouteKey = (Method, String);
type RouteTable = HashMap<RouteKey, Arc<RouteHandler>>;

/// Route table plus one optional catch-all handler.
///
/// An exact method+path match wins; the catch-all receives everything
/// else. Registration uses read-copy-update, so routes may be added or
/// replaced while the server is running: dispatch loads a full snapshot
/// of the table and never observes a partial update, and a replaced
/// handler stays alive until in-flight calls that loaded it return.
#[derive(Default)]
pub struct HttpService {
    routes: ArcSwap<RouteTable>,
    catch_all: ArcSwapOption<RouteHandler>,
}

impl HttpService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a handler for an exact method+path.
    pub fn route(
        &self,
        method: Method,
        path: impl Into<String>,
        handler: impl Fn(&Request) -> anyhow::Result<Response> + Send + Sync + 'static,
    ) {
        let key = (method, path.into());
        let handler: Arc<RouteHandler> = Arc::new(Box::new(handler));

        let mut table: RouteTable = (**self.routes.load()).clone();
        table.insert(key, handler);
        self.routes.store(Arc::new(table));
    }

    /// Shorthand for a GET route.
    pub fn get(
        &self,
        path: impl Into<String>,
        handler: impl Fn(&Request) -> anyhow::Result<Response> + Send + Sync + 'static,
    ) {
        self.route(Method::GET, path, handler);
    }

    /// Registers (or replaces) the catch-all handler, which receives every
    /// request not matched by an exact route.
    pub fn set_catch_all(
        &self,
        handler: impl Fn(&Request) -> anyhow::Result<Response> + Send + Sync + 'static,
    ) {
        self.catch_all.store(Some(Arc::new(Box::new(handler))));
    }

    /// Finds the handler for a request: exact route first, catch-all
    /// second, `None` when neither is registered.
    pub fn resolve(&self, method: Method, path: &str) -> Option<Arc<RouteHandler>> {
        let routes = self.routes.load();
        if let Some(handler) = routes.get(&(method, path.to_string())) {
            return Some(handler.clone());
        }
        self.catch_all.load_full()
    }

    pub fn route_count(&self) -> usize {
        self.routes.load().len()
    }

    pub fn has_catch_all(&self) -> bool {
        self.catch_all.load().is_some()
    }
}
