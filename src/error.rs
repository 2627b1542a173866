use std::io;
use thiserror::Error;

/// Error kinds surfaced by the overlay, storage, and boundary layers.
///
/// `Transport` failures are never fatal: stabilization swallows them and
/// retries next cycle, while client-facing routes translate them into a
/// retry (bounded by `MAX_HOPS`) and then a 5xx. `Internal` is the one kind
/// that should abort the node rather than let it run with corrupt state.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error contacting {address}: {reason}")]
    Transport { address: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("node has already joined a ring")]
    AlreadyBootstrapped,

    #[error("internal invariant violation: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn transport(address: impl Into<String>, reason: impl ToString) -> Self {
        Error::Transport {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    /// Maps this error onto an HTTP status code for the boundary adapter.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::InvalidArgument(_) => 400,
            Error::Transport { .. } => 502,
            Error::AlreadyBootstrapped => 409,
            Error::Internal(_) => 500,
            Error::Io(_) => 500,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        let address = e
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        Error::transport(address, e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::InvalidArgument(format!("malformed body: {e}"))
    }
}
