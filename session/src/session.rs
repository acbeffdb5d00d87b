//! Caller-facing session handle.
//!
//! [`LinkSession`] owns the store the session reducer runs in. Every
//! method that changes the session sends one action; the reads derive
//! their answer from the current state.

use crate::actions::SessionAction;
use crate::config::SessionConfig;
use crate::environment::SessionEnvironment;
use crate::error::ClassifiedError;
use crate::handler::LinkHandler;
use crate::reducer::SessionReducer;
use crate::state::{SessionPhase, SessionState};
use link_session_runtime::{Store, StoreError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;

/// Store a session runs in.
pub type SessionStore = Store<SessionState, SessionAction, SessionEnvironment, SessionReducer>;

/// Errors returned by [`LinkSession`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// The store rejected the action (for example after disposal).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The session did not reach the awaited phase in time.
    #[error("session did not reach the expected phase within {0:?}")]
    Timeout(Duration),
}

/// Snapshot of what callers consume.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    /// A widget is live.
    pub ready: bool,
    /// Current classified error, if any.
    pub error: Option<ClassifiedError>,
    /// The live widget's handler, or the no-op handler.
    pub handler: LinkHandler,
}

/// A running link session.
///
/// Cloning shares the session.
#[derive(Clone)]
pub struct LinkSession {
    store: SessionStore,
}

impl LinkSession {
    /// Start a session: begin loading the widget script.
    ///
    /// The token is requested once the script has loaded.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the store rejects the mount.
    pub async fn start(
        config: SessionConfig,
        environment: SessionEnvironment,
    ) -> Result<Self, SessionError> {
        let store = Store::new(SessionState::new(config), SessionReducer::new(), environment);
        store.send(SessionAction::Mount).await?;
        tracing::info!("Link session started");
        Ok(Self { store })
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Current status.
    pub async fn status(&self) -> SessionStatus {
        self.store
            .state(|state| SessionStatus {
                ready: state.is_ready(),
                error: state.error(),
                handler: state.handler(),
            })
            .await
    }

    /// Whether a widget is live.
    pub async fn ready(&self) -> bool {
        self.store.state(SessionState::is_ready).await
    }

    /// Current classified error, if any.
    pub async fn error(&self) -> Option<ClassifiedError> {
        self.store.state(SessionState::error).await
    }

    /// Handler for the live widget; the no-op handler until ready.
    pub async fn handler(&self) -> LinkHandler {
        self.store.state(SessionState::handler).await
    }

    /// Current derived phase.
    pub async fn phase(&self) -> SessionPhase {
        self.store.state(SessionState::phase).await
    }

    /// Tear the widget down and acquire a new token.
    ///
    /// Has no effect until the script has loaded.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the session was disposed.
    pub async fn refetch_link_token(&self) -> Result<(), SessionError> {
        self.store.send(SessionAction::RefetchToken).await?;
        Ok(())
    }

    /// Replace the configuration, rebuilding the widget.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the session was disposed.
    pub async fn reconfigure(&self, config: SessionConfig) -> Result<(), SessionError> {
        self.store.send(SessionAction::Reconfigure(Box::new(config))).await?;
        Ok(())
    }

    /// Destroy the widget, cancel everything pending and stop the session.
    ///
    /// Disposing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the store rejects the disposal.
    pub async fn dispose(&self) -> Result<(), SessionError> {
        if self.store.is_closed() {
            return Ok(());
        }
        self.store.send(SessionAction::Dispose).await?;
        self.store.close();
        Ok(())
    }

    /// Wait until the phase satisfies `predicate`, returning that phase.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Timeout`] if `timeout` elapses first.
    pub async fn wait_for<F>(
        &self,
        predicate: F,
        timeout: Duration,
    ) -> Result<SessionPhase, SessionError>
    where
        F: Fn(&SessionPhase) -> bool,
    {
        // Subscribe before the first check so no transition is missed.
        let mut actions = self.store.subscribe_actions();

        let phase = self.phase().await;
        if predicate(&phase) {
            return Ok(phase);
        }

        tokio::time::timeout(timeout, async {
            loop {
                match actions.recv().await {
                    Ok(_) => {},
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Phase observer lagged");
                    },
                    Err(RecvError::Closed) => {
                        return Err(SessionError::Store(StoreError::ChannelClosed));
                    },
                }

                let phase = self.phase().await;
                if predicate(&phase) {
                    return Ok(phase);
                }
            }
        })
        .await
        .map_err(|_| SessionError::Timeout(timeout))?
    }
}

impl std::fmt::Debug for LinkSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSession")
            .field("closed", &self.store.is_closed())
            .finish_non_exhaustive()
    }
}
