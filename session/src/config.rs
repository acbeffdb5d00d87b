//! Session configuration.
//!
//! A [`SessionConfig`] is treated as a value: handing a session a new one
//! (even with only a new callback) rebuilds the widget.

use crate::cache::CacheOptions;
use crate::error::ClassifiedError;
use crate::metadata::{EventMetadata, ExitMetadata, LinkExitError, SuccessMetadata};
use crate::providers::{EmbedTarget, TokenFetcher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Called with the public token and metadata when the user links an account.
pub type SuccessCallback = Arc<dyn Fn(&str, &SuccessMetadata) + Send + Sync>;

/// Called when the user leaves the flow without linking.
pub type ExitCallback = Arc<dyn Fn(Option<&LinkExitError>, &ExitMetadata) + Send + Sync>;

/// Called with an event name and metadata at points in the flow.
pub type EventCallback = Arc<dyn Fn(&str, &EventMetadata) + Send + Sync>;

/// Called when the widget has finished loading.
pub type LoadCallback = Arc<dyn Fn() + Send + Sync>;

/// Called when the session's classified error changes.
pub type ErrorCallback = Arc<dyn Fn(&ClassifiedError) + Send + Sync>;

/// Widget callbacks forwarded to the factory.
#[derive(Clone, Default)]
pub struct Callbacks {
    /// User linked an account.
    pub on_success: Option<SuccessCallback>,
    /// User left the flow.
    pub on_exit: Option<ExitCallback>,
    /// Flow event.
    pub on_event: Option<EventCallback>,
    /// Widget loaded.
    pub on_load: Option<LoadCallback>,
}

impl Callbacks {
    /// Invoke `on_success`, if set.
    pub fn success(&self, public_token: &str, metadata: &SuccessMetadata) {
        if let Some(callback) = &self.on_success {
            callback(public_token, metadata);
        }
    }

    /// Invoke `on_exit`, if set.
    pub fn exit(&self, error: Option<&LinkExitError>, metadata: &ExitMetadata) {
        if let Some(callback) = &self.on_exit {
            callback(error, metadata);
        }
    }

    /// Invoke `on_event`, if set.
    pub fn event(&self, name: &str, metadata: &EventMetadata) {
        if let Some(callback) = &self.on_event {
            callback(name, metadata);
        }
    }

    /// Invoke `on_load`, if set.
    pub fn load(&self) {
        if let Some(callback) = &self.on_load {
            callback();
        }
    }

    /// Copy of these callbacks that does nothing once `alive` is cleared.
    #[must_use]
    pub fn guarded(&self, alive: &Arc<AtomicBool>) -> Self {
        Self {
            on_success: self.on_success.clone().map(|callback| {
                let alive = Arc::clone(alive);
                Arc::new(move |token: &str, metadata: &SuccessMetadata| {
                    if alive.load(Ordering::Acquire) {
                        callback(token, metadata);
                    } else {
                        tracing::debug!("Dropped on_success from a torn-down widget");
                    }
                }) as SuccessCallback
            }),
            on_exit: self.on_exit.clone().map(|callback| {
                let alive = Arc::clone(alive);
                Arc::new(move |error: Option<&LinkExitError>, metadata: &ExitMetadata| {
                    if alive.load(Ordering::Acquire) {
                        callback(error, metadata);
                    } else {
                        tracing::debug!("Dropped on_exit from a torn-down widget");
                    }
                }) as ExitCallback
            }),
            on_event: self.on_event.clone().map(|callback| {
                let alive = Arc::clone(alive);
                Arc::new(move |name: &str, metadata: &EventMetadata| {
                    if alive.load(Ordering::Acquire) {
                        callback(name, metadata);
                    }
                }) as EventCallback
            }),
            on_load: self.on_load.clone().map(|callback| {
                let alive = Arc::clone(alive);
                Arc::new(move || {
                    if alive.load(Ordering::Acquire) {
                        callback();
                    }
                }) as LoadCallback
            }),
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_exit", &self.on_exit.is_some())
            .field("on_event", &self.on_event.is_some())
            .field("on_load", &self.on_load.is_some())
            .finish()
    }
}

/// How the widget is presented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WidgetMode {
    /// Opened on demand as a modal.
    #[default]
    Modal,
    /// Mounted inline into a container.
    Embedded {
        /// The container
        target: EmbedTarget,
    },
}

/// Caller-supplied session configuration.
#[derive(Clone)]
pub struct SessionConfig {
    /// Token fetch.
    pub fetcher: Arc<dyn TokenFetcher>,

    /// Widget callbacks.
    pub callbacks: Callbacks,

    /// Error callback.
    pub on_error: Option<ErrorCallback>,

    /// Whether tokens are cached between acquisitions.
    ///
    /// Default: `true`
    pub cache: bool,

    /// Cache storage, key and staleness buffer.
    pub cache_options: CacheOptions,

    /// Redirect URI when resuming after an OAuth redirect.
    pub received_redirect_uri: Option<String>,

    /// Modal or embedded.
    pub mode: WidgetMode,
}

impl SessionConfig {
    /// Start building a configuration around `fetcher`.
    #[must_use]
    pub fn builder(fetcher: Arc<dyn TokenFetcher>) -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: Self {
                fetcher,
                callbacks: Callbacks::default(),
                on_error: None,
                cache: true,
                cache_options: CacheOptions::default(),
                received_redirect_uri: None,
                mode: WidgetMode::Modal,
            },
        }
    }

    /// Report `error` to `on_error`, if set.
    pub fn report_error(&self, error: &ClassifiedError) {
        if let Some(callback) = &self.on_error {
            callback(error);
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("callbacks", &self.callbacks)
            .field("on_error", &self.on_error.is_some())
            .field("cache", &self.cache)
            .field("cache_options", &self.cache_options)
            .field("received_redirect_uri", &self.received_redirect_uri)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Set `on_success`.
    #[must_use]
    pub fn on_success(
        mut self,
        callback: impl Fn(&str, &SuccessMetadata) + Send + Sync + 'static,
    ) -> Self {
        self.config.callbacks.on_success = Some(Arc::new(callback));
        self
    }

    /// Set `on_exit`.
    #[must_use]
    pub fn on_exit(
        mut self,
        callback: impl Fn(Option<&LinkExitError>, &ExitMetadata) + Send + Sync + 'static,
    ) -> Self {
        self.config.callbacks.on_exit = Some(Arc::new(callback));
        self
    }

    /// Set `on_event`.
    #[must_use]
    pub fn on_event(
        mut self,
        callback: impl Fn(&str, &EventMetadata) + Send + Sync + 'static,
    ) -> Self {
        self.config.callbacks.on_event = Some(Arc::new(callback));
        self
    }

    /// Set `on_load`.
    #[must_use]
    pub fn on_load(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.config.callbacks.on_load = Some(Arc::new(callback));
        self
    }

    /// Set `on_error`.
    #[must_use]
    pub fn on_error(mut self, callback: impl Fn(&ClassifiedError) + Send + Sync + 'static) -> Self {
        self.config.on_error = Some(Arc::new(callback));
        self
    }

    /// Enable or disable token caching.
    #[must_use]
    pub const fn cache(mut self, enabled: bool) -> Self {
        self.config.cache = enabled;
        self
    }

    /// Set cache options.
    #[must_use]
    pub fn cache_options(mut self, options: CacheOptions) -> Self {
        self.config.cache_options = options;
        self
    }

    /// Resume after an OAuth redirect to `uri`.
    #[must_use]
    pub fn received_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.received_redirect_uri = Some(uri.into());
        self
    }

    /// Mount the widget inline into `target`.
    #[must_use]
    pub fn embedded(mut self, target: EmbedTarget) -> Self {
        self.config.mode = WidgetMode::Embedded { target };
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> SessionConfig {
        self.config
    }
}
