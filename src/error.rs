//! Unified infrastructure error type.

use thiserror::Error;

/// The error type returned by keel's fallible bootstrap and engine operations.
///
/// Request-level failures (401, 404, 422, …) are expressed as
/// [`Exception`](crate::Exception) values and turned into responses at the
/// dispatch boundary. This type surfaces everything else: configuration,
/// lifecycle misuse, route binding and socket failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration for `{field}`: {message}")]
    Config { field: &'static str, message: String },

    /// A lifecycle operation was called in the wrong server state.
    #[error("cannot {operation} while the server is {state}")]
    State { operation: &'static str, state: &'static str },

    /// The route path uses syntax the engine cannot express.
    #[error("unsupported route path `{path}`: {reason}")]
    UnsupportedPath { path: String, reason: String },

    /// The engine refused the route (conflicting or malformed pattern).
    #[error("invalid route `{path}`: {reason}")]
    InvalidRoute { path: String, reason: String },

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("engine: {0}")]
    Engine(String),
}

impl Error {
    pub(crate) fn state(operation: &'static str, state: &'static str) -> Self {
        Self::State { operation, state }
    }
}
