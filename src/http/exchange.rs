use crate::error::ExchangeError;
use crate::http::request::Request;
use crate::http::response::Response;

/// One request/response cycle.
///
/// Created when a complete request has been parsed, destroyed after the
/// response is written. Exactly one response may be sent; the second and
/// later attempts fail with [`ExchangeError::AlreadySent`] and leave the
/// first response in place.
pub struct HttpExchange {
    request: Request,
    response: Option<Response>,
}

impl HttpExchange {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: None,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Completes the exchange with `response`.
    pub fn send(&mut self, response: Response) -> Result<(), ExchangeError> {
        if self.response.is_some() {
            return Err(ExchangeError::AlreadySent);
        }
        self.response = Some(response);
        Ok(())
    }

    pub fn is_sent(&self) -> bool {
        self.response.is_some()
    }

    /// Consumes the exchange, yielding the response to write out.
    pub fn into_parts(self) -> (Request, Option<Response>) {
        (self.request, self.response)
    }
}
