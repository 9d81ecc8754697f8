pub mod api;
pub mod reconcile;
pub mod retry;
pub mod store;
pub mod submit;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Failures talking to the session store. All of them are recoverable:
/// callers report them and carry on with the local session.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("store accepted the session but returned no session_id")]
    MissingSessionId,

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("session {0} not found")]
    NotFound(i64),

    #[error("built without the network feature")]
    Offline,
}
