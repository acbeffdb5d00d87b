//! Error types for link session operations.
//!
//! Raw failures (`StorageError`, `TokenFetchError`, script and library
//! failures) are wrapped in a [`LinkError`], which [`ClassifiedError`] pairs
//! with a stable [`ErrorKind`]. The cause is always kept.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Shared, clonable handle to an underlying failure.
pub type BoxedCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Keep an `anyhow` error as a shareable cause.
#[must_use]
pub fn into_cause(error: anyhow::Error) -> BoxedCause {
    Arc::from(Box::<dyn std::error::Error + Send + Sync + 'static>::from(error))
}

/// Closed set of error kinds reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Not running where the widget library can exist.
    NonBrowser,
    /// The widget script failed to load.
    ScriptLoad,
    /// The token fetch was rejected or returned an empty token or expiry.
    TokenFetch,
    /// Raised by the caller's own validation.
    Local,
    /// The script loaded but the widget library is absent.
    PlaidUnavailable,
    /// The token response carried data that could not be interpreted.
    MissingTokenData,
}

impl ErrorKind {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NonBrowser => "non_browser",
            Self::ScriptLoad => "script_load",
            Self::TokenFetch => "token_fetch",
            Self::Local => "local",
            Self::PlaidUnavailable => "plaid_unavailable",
            Self::MissingTokenData => "missing_token_data",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of the key-value slot backing the token cache.
///
/// Never surfaced to callers: the cache degrades to a fresh fetch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Reading the key failed.
    #[error("failed to read {key} from storage: {reason}")]
    Read {
        /// Storage key
        key: String,
        /// Backend-specific reason
        reason: String,
    },

    /// Writing the key failed.
    #[error("failed to write {key} to storage: {reason}")]
    Write {
        /// Storage key
        key: String,
        /// Backend-specific reason
        reason: String,
    },

    /// Removing the key failed.
    #[error("failed to remove {key} from storage: {reason}")]
    Remove {
        /// Storage key
        key: String,
        /// Backend-specific reason
        reason: String,
    },
}

/// Token acquisition failure.
#[derive(Debug, Error, Clone)]
pub enum TokenFetchError {
    /// The caller's fetcher failed.
    #[error("{message}")]
    Fetcher {
        /// The fetcher's own message
        message: String,
        /// The fetcher's error
        #[source]
        source: BoxedCause,
    },

    /// The response carried an empty `link_token`.
    #[error("link_token missing from token fetch response.")]
    MissingLinkToken,

    /// The response carried an empty `expiration`.
    #[error("expiration missing from token fetch response.")]
    MissingExpiration,

    /// The response's `expiration` is not an RFC 3339 timestamp.
    #[error("expiration {value:?} in token fetch response is not a valid timestamp.")]
    InvalidExpiration {
        /// The expiration as received
        value: String,
    },
}

impl TokenFetchError {
    /// Wrap a failure reported by the caller's fetcher.
    #[must_use]
    pub fn fetcher(error: anyhow::Error) -> Self {
        Self::Fetcher {
            message: error.to_string(),
            source: into_cause(error),
        }
    }

    /// The kind this failure classifies as.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidExpiration { .. } => ErrorKind::MissingTokenData,
            Self::Fetcher { .. } | Self::MissingLinkToken | Self::MissingExpiration => {
                ErrorKind::TokenFetch
            },
        }
    }
}

/// Underlying cause carried by a [`ClassifiedError`].
#[derive(Debug, Error, Clone)]
pub enum LinkError {
    /// The widget script failed to load.
    #[error("script failed to load: {message}")]
    ScriptLoad {
        /// The loader's message
        message: String,
        /// The loader's error
        #[source]
        source: BoxedCause,
    },

    /// The widget library is absent after the script loaded.
    #[error("widget library is not available after the script loaded.")]
    Unavailable,

    /// There is no browser environment to host the widget library.
    #[error("widget library requires a browser environment.")]
    NonBrowser,

    /// Token acquisition failed.
    #[error(transparent)]
    TokenFetch(#[from] TokenFetchError),

    /// Caller-raised validation failure.
    #[error("{message}")]
    Local {
        /// Caller's message
        message: String,
        /// Caller's error, if any
        #[source]
        source: Option<BoxedCause>,
    },
}

impl LinkError {
    /// The kind this failure classifies as.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ScriptLoad { .. } => ErrorKind::ScriptLoad,
            Self::Unavailable => ErrorKind::PlaidUnavailable,
            Self::NonBrowser => ErrorKind::NonBrowser,
            Self::TokenFetch(error) => error.kind(),
            Self::Local { .. } => ErrorKind::Local,
        }
    }
}

/// Error reported to callers: a kind, a human-readable message and the cause.
///
/// Two classified errors are equal when kind and message match, which is
/// what decides whether the error callback fires again.
#[derive(Debug, Clone)]
pub struct ClassifiedError {
    kind: ErrorKind,
    message: String,
    cause: Arc<LinkError>,
}

impl ClassifiedError {
    /// Classify `cause`.
    #[must_use]
    pub fn new(cause: LinkError) -> Self {
        Self {
            kind: cause.kind(),
            message: cause.to_string(),
            cause: Arc::new(cause),
        }
    }

    /// A `local` error raised by the caller.
    #[must_use]
    pub fn local<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(LinkError::Local {
            message: message.into(),
            source: Some(Arc::new(cause) as BoxedCause),
        })
    }

    /// Error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The wrapped cause.
    #[must_use]
    pub fn cause(&self) -> &LinkError {
        &self.cause
    }
}

impl PartialEq for ClassifiedError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

impl Eq for ClassifiedError {}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ClassifiedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

impl From<LinkError> for ClassifiedError {
    fn from(cause: LinkError) -> Self {
        Self::new(cause)
    }
}

impl From<TokenFetchError> for ClassifiedError {
    fn from(cause: TokenFetchError) -> Self {
        Self::new(LinkError::TokenFetch(cause))
    }
}
