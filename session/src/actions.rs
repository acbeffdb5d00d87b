//! Session actions.
//!
//! Every signal that can change a session's inputs.

use crate::config::SessionConfig;
use crate::error::{BoxedCause, TokenFetchError};
use crate::token::LinkToken;

/// Session action.
#[derive(Debug, Clone)]
pub enum SessionAction {
    /// Start loading the widget script. Only the first `Mount` has an effect.
    Mount,

    /// The widget script loaded.
    ScriptLoaded,

    /// The widget script failed to load.
    ScriptFailed {
        /// Loader's message
        message: String,
        /// Loader's error
        cause: BoxedCause,
    },

    /// Acquire a new token, replacing the current one.
    RefetchToken,

    /// A token acquisition finished.
    TokenAcquired {
        /// Request this result answers
        request: u64,
        /// The token, or why there is none
        result: Result<LinkToken, TokenFetchError>,
    },

    /// The refresh deadline armed in `generation` fired.
    RefreshDue {
        /// Generation the deadline was armed in
        generation: u64,
    },

    /// Replace the configuration.
    Reconfigure(Box<SessionConfig>),

    /// Tear everything down. No later action has an effect.
    Dispose,
}

impl SessionAction {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mount => "mount",
            Self::ScriptLoaded => "script_loaded",
            Self::ScriptFailed { .. } => "script_failed",
            Self::RefetchToken => "refetch_token",
            Self::TokenAcquired { .. } => "token_acquired",
            Self::RefreshDue { .. } => "refresh_due",
            Self::Reconfigure(_) => "reconfigure",
            Self::Dispose => "dispose",
        }
    }
}
