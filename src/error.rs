use snafu::Snafu;

use crate::{Error as CrateError, gateway::http::HttpError, model::ValidationError};

/// Everything [`CrptApi`](crate::CrptApi) can report back to a caller.
///
/// Gateway failures map one-to-one onto the HTTP variants; nothing is
/// retried or swallowed on the way.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CrptApiError {
    #[snafu(display("Invalid configuration: {message}"))]
    Configuration { message: String },

    #[snafu(display("Document failed validation: {source}"))]
    Validation { source: ValidationError },

    #[snafu(display("Submission cancelled by the caller"))]
    Cancelled,

    #[snafu(display("Submission deadline exceeded"))]
    Timeout,

    #[snafu(display("Transport error: {source}"))]
    Transport { source: CrateError },

    #[snafu(display("API rejected the document (status {status}): {body}"))]
    ClientError { status: u16, body: String },

    #[snafu(display("API server error (status {status}): {body}"))]
    ServerError { status: u16, body: String },

    #[snafu(display("Unexpected API status {status}: {body}"))]
    UnexpectedStatus { status: u16, body: String },

    #[snafu(display("Failed to decode API response (status {status}): {source}"))]
    ResponseParse {
        status: u16,
        body: String,
        source: serde_json::Error,
    },

    #[snafu(display("Failed to serialize document: {source}"))]
    Serialization { source: serde_json::Error },

    #[snafu(display("Failed to build HTTP request: {source}"))]
    InvalidRequest { source: http::Error },

    #[snafu(display("Submitter is shut down"))]
    ShutDown,

    #[snafu(display("Submission worker panicked before producing a result"))]
    WorkerPanicked,
}

impl CrptApiError {
    /// Whether the error was raised before the document reached the network.
    pub const fn is_pre_dispatch(&self) -> bool {
        matches!(
            self,
            CrptApiError::Configuration { .. }
                | CrptApiError::Validation { .. }
                | CrptApiError::Serialization { .. }
                | CrptApiError::InvalidRequest { .. }
        )
    }
}

impl From<HttpError> for CrptApiError {
    fn from(error: HttpError) -> Self {
        match error {
            HttpError::Transport { source } => CrptApiError::Transport { source },
            HttpError::Timeout => CrptApiError::Timeout,
            HttpError::ClientError { status, body } => CrptApiError::ClientError { status, body },
            HttpError::ServerError { status, body } => CrptApiError::ServerError { status, body },
            HttpError::UnexpectedStatus { status, body } => {
                CrptApiError::UnexpectedStatus { status, body }
            }
            HttpError::ResponseParse {
                status,
                body,
                source,
            } => CrptApiError::ResponseParse {
                status,
                body,
                source,
            },
            HttpError::Serialization { source } => CrptApiError::Serialization { source },
            HttpError::BuildRequest { source } => CrptApiError::InvalidRequest { source },
        }
    }
}

impl From<ValidationError> for CrptApiError {
    fn from(source: ValidationError) -> Self {
        CrptApiError::Validation { source }
    }
}

pub type Result<T, E = CrptApiError> = std::result::Result<T, E>;
