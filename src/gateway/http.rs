// src/gateway/http.rs
use crate::Error as CrateError;
use snafu::Snafu;

/// Outcome of one failed exchange with the document endpoint.
///
/// Transports (such as [`ReqwestService`](super::reqwest_integration::ReqwestService))
/// produce `Transport` and `Timeout`; the [`Gateway`](super::Gateway) itself
/// classifies statuses and decoding failures.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HttpError {
    /// Connect, DNS, TLS or socket failure: no usable answer came back.
    #[snafu(display("HTTP transport error: {}", source))]
    Transport { source: CrateError },

    /// The transport's own connect or call timeout fired.
    #[snafu(display("HTTP request timed out"))]
    Timeout,

    /// The server answered 4xx.
    #[snafu(display("HTTP client error response (status {}): {}", status, body))]
    ClientError { status: u16, body: String },

    /// The server answered 5xx.
    #[snafu(display("HTTP server error response (status {}): {}", status, body))]
    ServerError { status: u16, body: String },

    /// Any status other than 200, 201, 4xx or 5xx.
    #[snafu(display("Unexpected HTTP status {}: {}", status, body))]
    UnexpectedStatus { status: u16, body: String },

    /// A 200/201 body that does not decode into the requested shape.
    #[snafu(display("Failed to decode response body (status {}): {}", status, source))]
    ResponseParse {
        status: u16,
        body: String,
        source: serde_json::Error,
    },

    #[snafu(display("Failed to serialize request body: {}", source))]
    Serialization { source: serde_json::Error },

    #[snafu(display("Failed to build HTTP request: {}", source))]
    BuildRequest { source: http::Error },
}

impl HttpError {
    /// Status code of the response this error was built from, if any.
    pub const fn status(&self) -> Option<u16> {
        match self {
            HttpError::ClientError { status, .. }
            | HttpError::ServerError { status, .. }
            | HttpError::UnexpectedStatus { status, .. }
            | HttpError::ResponseParse { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Turns a boxed transport error back into an `HttpError`, keeping
    /// anything foreign as `Transport`.
    pub(crate) fn from_boxed(error: CrateError) -> Self {
        match error.downcast::<HttpError>() {
            Ok(http) => *http,
            Err(other) => HttpError::Transport { source: other },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn from_boxed_recovers_http_errors() {
        let boxed: CrateError = Box::new(HttpError::Timeout);
        assert!(matches!(HttpError::from_boxed(boxed), HttpError::Timeout));
    }

    #[test]
    fn from_boxed_wraps_foreign_errors_as_transport() {
        let boxed: CrateError = Box::new(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        let error = HttpError::from_boxed(boxed);
        assert!(matches!(error, HttpError::Transport { .. }));
        assert_eq!(error.to_string(), "HTTP transport error: reset");
    }

    #[test]
    fn status_is_reported_for_response_errors_only() {
        let error = HttpError::ServerError {
            status: 503,
            body: String::new(),
        };
        assert_eq!(error.status(), Some(503));
        assert_eq!(HttpError::Timeout.status(), None);
    }
}
