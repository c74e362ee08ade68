use thiserror::Error;

/// Errors surfaced by a media server capability.
///
/// `BulkRejected` is its own variant because the batch writer keys its
/// degradation path on it: a bulk-add call answered with the server's
/// "must include items" class of rejection (or any 400 on a bulk
/// endpoint) is retried item by item instead of failing the container.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication rejected by {server} (status {status})")]
    Auth { server: String, status: u16 },

    #[error("bulk add rejected: {message}")]
    BulkRejected { message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response shape: {0}")]
    InvalidResponse(String),
}

impl ServerError {
    /// Whether this error means "the bulk path refused this request" as
    /// opposed to a transport or server-side failure.
    pub fn is_bulk_rejection(&self) -> bool {
        matches!(self, ServerError::BulkRejected { .. })
    }
}
