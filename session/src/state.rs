//! Session state.
//!
//! [`SessionState`] holds the inputs the session derives from (script,
//! library, token, configuration) and the resources it owns (the live
//! widget and its refresh deadline). [`SessionPhase`] is derived from it
//! and never stored.

use crate::classifier::classify;
use crate::config::SessionConfig;
use crate::error::{BoxedCause, ClassifiedError, ErrorKind, TokenFetchError};
use crate::handler::LinkHandler;
use crate::providers::{EmbeddedHandle, WidgetHandle};
use crate::refresh::ScheduledRefresh;
use crate::token::LinkToken;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Widget script load status.
#[derive(Debug, Clone, Default)]
pub enum ScriptStatus {
    /// Not requested yet.
    #[default]
    Idle,
    /// Download in flight.
    Loading,
    /// Loaded without error.
    Loaded,
    /// Failed; never retried.
    Failed {
        /// The loader's message
        message: String,
        /// The loader's error
        cause: BoxedCause,
    },
}

/// Outcome of the most recent widget library lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LibraryStatus {
    /// Not looked up yet.
    #[default]
    Unchecked,
    /// Found.
    Present,
    /// Script loaded but the library is missing.
    Absent,
    /// No browser environment.
    NonBrowser,
}

/// Token acquisition status.
#[derive(Debug, Clone, Default)]
pub enum TokenStatus {
    /// Not requested yet.
    #[default]
    Idle,
    /// Acquisition in flight.
    Loading,
    /// Acquired.
    Ready(LinkToken),
    /// Acquisition failed.
    Failed(TokenFetchError),
}

impl TokenStatus {
    /// Whether acquisition has finished, successfully or not.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Failed(_))
    }
}

/// The widget instance a session owns.
#[derive(Clone)]
pub enum WidgetInstance {
    /// Modal widget.
    Modal(Arc<dyn WidgetHandle>),
    /// Embedded widget.
    Embedded(Arc<dyn EmbeddedHandle>),
}

/// The live widget, its liveness flag and the generation it belongs to.
#[derive(Clone)]
pub struct LiveWidget {
    /// The widget.
    pub instance: WidgetInstance,
    /// Cleared on teardown; guards callbacks and handlers.
    pub alive: Arc<AtomicBool>,
    /// Generation the widget was created in.
    pub generation: u64,
}

impl LiveWidget {
    /// Caller-facing handler for this widget.
    ///
    /// Embedded widgets have no caller-facing operations.
    #[must_use]
    pub fn handler(&self) -> LinkHandler {
        match &self.instance {
            WidgetInstance::Modal(handle) => {
                LinkHandler::ready(Arc::clone(handle), Arc::clone(&self.alive))
            },
            WidgetInstance::Embedded(_) => LinkHandler::NotReady,
        }
    }

    /// Whether the widget has not been torn down.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for LiveWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.instance {
            WidgetInstance::Modal(_) => "modal",
            WidgetInstance::Embedded(_) => "embedded",
        };
        f.debug_struct("LiveWidget")
            .field("kind", &kind)
            .field("alive", &self.is_alive())
            .field("generation", &self.generation)
            .finish()
    }
}

/// Everything the session reducer works on.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Current configuration.
    pub config: SessionConfig,

    /// Script load status.
    pub script: ScriptStatus,

    /// Library lookup status.
    pub library: LibraryStatus,

    /// Token status.
    pub token: TokenStatus,

    /// Live widget, at most one.
    pub widget: Option<LiveWidget>,

    /// Armed refresh deadline, at most one.
    pub refresh: Option<ScheduledRefresh>,

    /// Last error reported to `on_error`.
    pub reported_error: Option<ClassifiedError>,

    /// Bumped on every teardown; refresh deadlines carry the generation
    /// they were armed in.
    pub generation: u64,

    /// Bumped on every token request; results carry the request they
    /// answer.
    pub request: u64,

    /// Set once the session is disposed.
    pub disposed: bool,
}

impl SessionState {
    /// Initial state for `config`.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            script: ScriptStatus::Idle,
            library: LibraryStatus::Unchecked,
            token: TokenStatus::Idle,
            widget: None,
            refresh: None,
            reported_error: None,
            generation: 0,
            request: 0,
            disposed: false,
        }
    }

    /// The current classified error, if any.
    #[must_use]
    pub fn error(&self) -> Option<ClassifiedError> {
        if self.disposed {
            return None;
        }
        classify(&self.script, self.library, &self.token)
    }

    /// Derive the session phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.disposed {
            return SessionPhase::Disposed;
        }

        if let Some(error) = self.error() {
            return match error.kind() {
                ErrorKind::ScriptLoad => SessionPhase::ScriptError(error),
                ErrorKind::PlaidUnavailable | ErrorKind::NonBrowser => {
                    SessionPhase::WidgetUnavailable(error)
                },
                ErrorKind::TokenFetch | ErrorKind::MissingTokenData | ErrorKind::Local => {
                    SessionPhase::TokenError(error)
                },
            };
        }

        if matches!(self.script, ScriptStatus::Idle | ScriptStatus::Loading) {
            return SessionPhase::ScriptLoading;
        }

        match &self.widget {
            Some(widget) if matches!(self.token, TokenStatus::Ready(_)) => {
                SessionPhase::Ready(widget.handler())
            },
            _ => SessionPhase::TokenLoading,
        }
    }

    /// Whether the session has a live widget.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.phase().is_ready()
    }

    /// Caller-facing handler.
    #[must_use]
    pub fn handler(&self) -> LinkHandler {
        match self.phase() {
            SessionPhase::Ready(handler) => handler,
            _ => LinkHandler::NotReady,
        }
    }
}

/// Derived session phase.
#[derive(Debug, Clone)]
pub enum SessionPhase {
    /// Waiting for the widget script.
    ScriptLoading,
    /// The widget script failed to load.
    ScriptError(ClassifiedError),
    /// Waiting for a token.
    TokenLoading,
    /// Token acquisition failed.
    TokenError(ClassifiedError),
    /// The script loaded but the widget library is unusable.
    WidgetUnavailable(ClassifiedError),
    /// A widget is live.
    Ready(LinkHandler),
    /// The session was disposed.
    Disposed,
}

impl SessionPhase {
    /// Whether a widget is live.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The phase's error, if it is an error phase.
    #[must_use]
    pub const fn error(&self) -> Option<&ClassifiedError> {
        match self {
            Self::ScriptError(error) | Self::TokenError(error) | Self::WidgetUnavailable(error) => {
                Some(error)
            },
            Self::ScriptLoading | Self::TokenLoading | Self::Ready(_) | Self::Disposed => None,
        }
    }

    /// Whether the phase is an error phase.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error().is_some()
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ScriptLoading => "script_loading",
            Self::ScriptError(_) => "script_error",
            Self::TokenLoading => "token_loading",
            Self::TokenError(_) => "token_error",
            Self::WidgetUnavailable(_) => "widget_unavailable",
            Self::Ready(_) => "ready",
            Self::Disposed => "disposed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockTokenFetcher;
    use std::sync::Arc;

    fn state() -> SessionState {
        let fetcher = Arc::new(MockTokenFetcher::failing("unused"));
        SessionState::new(SessionConfig::builder(fetcher).build())
    }

    #[test]
    fn test_initial_phase_is_script_loading() {
        let state = state();
        assert!(matches!(state.phase(), SessionPhase::ScriptLoading));
        assert!(state.error().is_none());
        assert!(!state.handler().is_ready());
    }

    #[test]
    fn test_loaded_script_without_widget_is_token_loading() {
        let mut state = state();
        state.script = ScriptStatus::Loaded;
        state.token = TokenStatus::Loading;
        assert_eq!(state.phase().name(), "token_loading");
    }

    #[test]
    fn test_token_error_phase() {
        let mut state = state();
        state.script = ScriptStatus::Loaded;
        state.library = LibraryStatus::Present;
        state.token = TokenStatus::Failed(TokenFetchError::MissingExpiration);

        let phase = state.phase();
        assert_eq!(phase.name(), "token_error");
        assert_eq!(phase.error().map(ClassifiedError::kind), Some(ErrorKind::TokenFetch));
    }

    #[test]
    fn test_disposed_hides_errors() {
        let mut state = state();
        state.script = ScriptStatus::Loaded;
        state.library = LibraryStatus::Absent;
        state.token = TokenStatus::Failed(TokenFetchError::MissingLinkToken);
        state.disposed = true;

        assert!(matches!(state.phase(), SessionPhase::Disposed));
        assert!(state.error().is_none());
    }
}
