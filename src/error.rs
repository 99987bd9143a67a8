// Error types for the library side of the crate.
// The binary wraps these in `anyhow` for reporting; inside the library every
// fallible call returns `Result<T, Error>` so callers can match on the kind.

use reqwest::{Method, StatusCode};
use std::path::PathBuf;
use std::time::Duration;

/// Failures of a single HTTP exchange. Produced only by a `Transport`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network error on {method} {url}: {source}")]
    Network {
        method: Method,
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("received {actual} from {method} {url}, expected {expected}")]
    UnexpectedStatus {
        method: Method,
        url: String,
        actual: StatusCode,
        expected: String,
    },
}

impl TransportError {
    /// Status code of the response, when there was one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::UnexpectedStatus { actual, .. } => Some(*actual),
            TransportError::Network { .. } => None,
        }
    }
}

/// Errors produced by upload sessions, picture sessions and query calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("upload verification failed: {0}")]
    Verification(String),

    #[error("upload completion failed: {0}")]
    Completion(String),

    #[error("no upload ticket has been acquired")]
    MissingTicket,

    #[error("picture activation still failing after {attempts} attempts in {elapsed:?}: {last}")]
    ActivationTimeout {
        attempts: u32,
        elapsed: Duration,
        #[source]
        last: Box<Error>,
    },

    #[error("upload stalled at byte {offset} after {passes} passes without progress")]
    Stalled { offset: u64, passes: u32 },

    #[error("file is empty: {}", .0.display())]
    EmptyFile(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    #[error("credential error: {0}")]
    Credential(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
