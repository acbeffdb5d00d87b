//! Session environment.
//!
//! External dependencies injected into the session reducer.

use crate::constants::DEFAULT_SCRIPT_URL;
use crate::providers::{ScriptLoader, WidgetLibrary};
use link_session_core::environment::{Clock, SystemClock};
use std::sync::Arc;

/// Session environment.
#[derive(Clone)]
pub struct SessionEnvironment {
    /// Clock used for token expiry.
    pub clock: Arc<dyn Clock>,

    /// Widget library lookup.
    pub library: Arc<dyn WidgetLibrary>,

    /// Script loader.
    pub scripts: Arc<dyn ScriptLoader>,

    /// Widget script location.
    ///
    /// Default: [`DEFAULT_SCRIPT_URL`]
    pub script_url: String,
}

impl SessionEnvironment {
    /// Environment on the system clock.
    #[must_use]
    pub fn new(library: Arc<dyn WidgetLibrary>, scripts: Arc<dyn ScriptLoader>) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            library,
            scripts,
            script_url: DEFAULT_SCRIPT_URL.to_string(),
        }
    }

    /// Use `clock` for token expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Load the widget script from `url`.
    #[must_use]
    pub fn with_script_url(mut self, url: impl Into<String>) -> Self {
        self.script_url = url.into();
        self
    }
}

impl std::fmt::Debug for SessionEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEnvironment")
            .field("script_url", &self.script_url)
            .finish_non_exhaustive()
    }
}
