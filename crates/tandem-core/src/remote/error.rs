//! Remote error handling

use thiserror::Error;

/// Errors from the GraphQL transport
#[derive(Error, Debug)]
pub enum RemoteError {
    /// No endpoint configured
    #[error("Remote endpoint not configured. Set it with:\n  tandem config set endpoint https://your-api/graphql")]
    NotConfigured,

    /// Transport failure (connect, timeout, TLS...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response carried a GraphQL `errors` array
    #[error("GraphQL error: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    /// Response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether the failure happened before the server processed the request
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Http(_))
    }
}

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;
