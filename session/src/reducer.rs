//! Session reducer.
//!
//! Every [`SessionAction`] is reduced in one serialized step that ends with
//! the state's resources matching its inputs: at most one live widget, at
//! most one armed refresh deadline. Whenever the widget is rebuilt the old
//! one is torn down (forced exit, then destroy, then its deadline cancelled)
//! before the new one is created.
//!
//! Async work (script download, token acquisition) is returned as
//! cancellable effects. Their results carry the request counter or
//! generation they were issued under, so a result that arrives after a
//! newer request or after disposal is dropped.

use crate::actions::SessionAction;
use crate::cache::TokenCache;
use crate::config::WidgetMode;
use crate::constants::effect_ids::{REFRESH_TIMER, SCRIPT_LOAD, TOKEN_REQUEST};
use crate::environment::SessionEnvironment;
use crate::error::{BoxedCause, TokenFetchError, into_cause};
use crate::metadata::ExitOptions;
use crate::providers::{LibraryLookup, WidgetConfig};
use crate::refresh::RefreshScheduler;
use crate::state::{
    LibraryStatus, LiveWidget, ScriptStatus, SessionState, TokenStatus, WidgetInstance,
};
use crate::token::LinkToken;
use link_session_core::effect::Effect;
use link_session_core::reducer::Reducer;
use link_session_core::{SmallVec, async_effect, cancellable};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

type Effects = SmallVec<[Effect<SessionAction>; 4]>;

/// Reducer driving a link session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionReducer;

impl SessionReducer {
    /// Create a new session reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn mount(state: &mut SessionState, env: &SessionEnvironment, effects: &mut Effects) {
        if state.disposed || !matches!(state.script, ScriptStatus::Idle) {
            tracing::debug!("Ignoring repeated mount");
            return;
        }

        state.script = ScriptStatus::Loading;
        tracing::debug!(url = %env.script_url, "Loading widget script");

        let scripts = Arc::clone(&env.scripts);
        let url = env.script_url.clone();
        effects.push(cancellable! {
            id: SCRIPT_LOAD,
            effect: async_effect! {
                match scripts.load(&url).await {
                    Ok(()) => Some(SessionAction::ScriptLoaded),
                    Err(error) => Some(SessionAction::ScriptFailed {
                        message: error.to_string(),
                        cause: into_cause(error),
                    }),
                }
            }
        });
    }

    fn script_loaded(state: &mut SessionState, env: &SessionEnvironment, effects: &mut Effects) {
        if !matches!(state.script, ScriptStatus::Loading) {
            return;
        }

        state.script = ScriptStatus::Loaded;
        tracing::debug!("Widget script loaded");
        effects.push(Self::acquire(state, env));
    }

    fn script_failed(state: &mut SessionState, message: String, cause: BoxedCause) {
        if !matches!(state.script, ScriptStatus::Loading) {
            return;
        }

        tracing::warn!(%message, "Widget script failed to load");
        state.script = ScriptStatus::Failed { message, cause };
    }

    fn refetch(state: &mut SessionState, env: &SessionEnvironment, effects: &mut Effects) {
        if state.disposed || !matches!(state.script, ScriptStatus::Loaded) {
            tracing::debug!("Ignoring token refetch before the script has loaded");
            return;
        }

        Self::teardown(state, effects);
        effects.push(Self::acquire(state, env));
    }

    fn token_acquired(
        state: &mut SessionState,
        env: &SessionEnvironment,
        request: u64,
        result: Result<LinkToken, TokenFetchError>,
        effects: &mut Effects,
    ) {
        if state.disposed || request != state.request {
            tracing::debug!(request, current = state.request, "Discarding stale token result");
            return;
        }

        state.token = match result {
            Ok(token) => {
                tracing::debug!(request, expires_at = %token.expires_at, "Link token acquired");
                TokenStatus::Ready(token)
            },
            Err(error) => {
                tracing::warn!(request, %error, "Link token acquisition failed");
                TokenStatus::Failed(error)
            },
        };

        Self::rebuild(state, env, effects);
    }

    fn refresh_due(
        state: &mut SessionState,
        env: &SessionEnvironment,
        generation: u64,
        effects: &mut Effects,
    ) {
        if state.disposed || generation != state.generation {
            tracing::debug!(
                generation,
                current = state.generation,
                "Ignoring superseded refresh deadline"
            );
            return;
        }

        tracing::info!("Refreshing link token ahead of expiry");
        // The deadline has fired; nothing is left to cancel.
        state.refresh = None;
        Self::refetch(state, env, effects);
    }

    fn reconfigure(
        state: &mut SessionState,
        env: &SessionEnvironment,
        config: crate::config::SessionConfig,
        effects: &mut Effects,
    ) {
        if state.disposed {
            return;
        }

        state.config = config;
        tracing::debug!("Session reconfigured");

        if !matches!(state.script, ScriptStatus::Loaded) {
            return;
        }

        if matches!(state.token, TokenStatus::Ready(_)) {
            Self::rebuild(state, env, effects);
        } else {
            Self::teardown(state, effects);
            effects.push(Self::acquire(state, env));
        }
    }

    fn dispose(state: &mut SessionState, effects: &mut Effects) {
        if state.disposed {
            return;
        }

        Self::teardown(state, effects);
        effects.push(Effect::Cancel(REFRESH_TIMER));
        effects.push(Effect::Cancel(TOKEN_REQUEST));
        effects.push(Effect::Cancel(SCRIPT_LOAD));

        state.disposed = true;
        state.request += 1;
        tracing::info!("Session disposed");
    }

    /// Start a token acquisition, superseding any in flight.
    fn acquire(state: &mut SessionState, env: &SessionEnvironment) -> Effect<SessionAction> {
        state.request += 1;
        state.token = TokenStatus::Loading;

        let request = state.request;
        let cache = TokenCache::new(Arc::clone(&env.clock));
        let fetcher = Arc::clone(&state.config.fetcher);
        let enabled = state.config.cache;
        let options = state.config.cache_options.clone();

        tracing::debug!(request, cache = enabled, "Acquiring link token");

        cancellable! {
            id: TOKEN_REQUEST,
            effect: async_effect! {
                let result = cache.acquire(fetcher.as_ref(), enabled, &options).await;
                Some(SessionAction::TokenAcquired { request, result })
            }
        }
    }

    fn rebuild(state: &mut SessionState, env: &SessionEnvironment, effects: &mut Effects) {
        Self::teardown(state, effects);
        Self::setup(state, env, effects);
    }

    /// Release the live widget and its deadline.
    fn teardown(state: &mut SessionState, effects: &mut Effects) {
        if let Some(widget) = state.widget.take() {
            widget.alive.store(false, Ordering::Release);
            match &widget.instance {
                WidgetInstance::Modal(handle) => {
                    handle.exit(ExitOptions::forced());
                    handle.destroy();
                },
                WidgetInstance::Embedded(handle) => handle.destroy(),
            }
            tracing::debug!(generation = widget.generation, "Widget torn down");
        }

        if let Some(refresh) = state.refresh.take() {
            effects.push(refresh.cancel());
        }

        state.generation += 1;
    }

    /// Create the widget and arm its refresh deadline, if the inputs allow.
    fn setup(state: &mut SessionState, env: &SessionEnvironment, effects: &mut Effects) {
        if !matches!(state.script, ScriptStatus::Loaded) || !state.token.is_settled() {
            return;
        }

        let lookup = env.library.lookup();
        state.library = match &lookup {
            LibraryLookup::Present(_) => LibraryStatus::Present,
            LibraryLookup::Absent => LibraryStatus::Absent,
            LibraryLookup::NonBrowser => LibraryStatus::NonBrowser,
        };

        let (LibraryLookup::Present(factory), TokenStatus::Ready(token)) = (lookup, &state.token)
        else {
            return;
        };

        let alive = Arc::new(AtomicBool::new(true));
        let config = WidgetConfig {
            token: token.token.clone(),
            received_redirect_uri: state.config.received_redirect_uri.clone(),
            callbacks: state.config.callbacks.guarded(&alive),
        };
        let instance = match &state.config.mode {
            WidgetMode::Modal => WidgetInstance::Modal(factory.create(config)),
            WidgetMode::Embedded { target } => {
                WidgetInstance::Embedded(factory.create_embedded(config, target))
            },
        };

        let scheduler = RefreshScheduler::new(state.config.cache_options.buffer);
        let (refresh, effect) = scheduler.schedule(
            env.clock.now(),
            token,
            SessionAction::RefreshDue {
                generation: state.generation,
            },
        );

        tracing::debug!(generation = state.generation, due_at = %refresh.due_at, "Widget created");

        state.widget = Some(LiveWidget {
            instance,
            alive,
            generation: state.generation,
        });
        state.refresh = Some(refresh);
        effects.push(effect);
    }

    /// Invoke `on_error` when the derived error changed to a new value.
    fn report_error(state: &mut SessionState) {
        let current = state.error();
        if current == state.reported_error {
            return;
        }

        if let Some(error) = &current {
            tracing::warn!(kind = %error.kind(), message = error.message(), "Session error");
            state.config.report_error(error);
        }
        state.reported_error = current;
    }
}

impl Reducer for SessionReducer {
    type State = SessionState;
    type Action = SessionAction;
    type Environment = SessionEnvironment;

    fn reduce(
        &self,
        state: &mut SessionState,
        action: SessionAction,
        env: &SessionEnvironment,
    ) -> Effects {
        tracing::trace!(action = action.name(), "Reducing session action");

        let mut effects = Effects::new();
        match action {
            SessionAction::Mount => Self::mount(state, env, &mut effects),
            SessionAction::ScriptLoaded => Self::script_loaded(state, env, &mut effects),
            SessionAction::ScriptFailed { message, cause } => {
                Self::script_failed(state, message, cause);
            },
            SessionAction::RefetchToken => Self::refetch(state, env, &mut effects),
            SessionAction::TokenAcquired { request, result } => {
                Self::token_acquired(state, env, request, result, &mut effects);
            },
            SessionAction::RefreshDue { generation } => {
                Self::refresh_due(state, env, generation, &mut effects);
            },
            SessionAction::Reconfigure(config) => {
                Self::reconfigure(state, env, *config, &mut effects);
            },
            SessionAction::Dispose => Self::dispose(state, &mut effects),
        }

        Self::report_error(state);
        effects
    }
}
