//! Caller-facing widget handler.
//!
//! Callers always get a [`LinkHandler`]. Before the session is ready (and
//! after the widget it was taken from is torn down) every operation is a
//! no-op that logs a warning.

use crate::constants::NOT_READY_WARNING;
use crate::metadata::{ExitOptions, SubmissionData};
use crate::providers::WidgetHandle;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Handle to the session's widget, or a no-op placeholder.
#[derive(Clone, Default)]
pub enum LinkHandler {
    /// No usable widget.
    #[default]
    NotReady,
    /// The live widget.
    Ready {
        /// The widget
        handle: Arc<dyn WidgetHandle>,
        /// Cleared when the widget is torn down
        alive: Arc<AtomicBool>,
    },
}

impl LinkHandler {
    /// Handler for a live widget.
    #[must_use]
    pub fn ready(handle: Arc<dyn WidgetHandle>, alive: Arc<AtomicBool>) -> Self {
        Self::Ready { handle, alive }
    }

    /// The widget, if it is still live.
    fn live(&self) -> Option<&Arc<dyn WidgetHandle>> {
        match self {
            Self::Ready { handle, alive } if alive.load(Ordering::Acquire) => Some(handle),
            Self::Ready { .. } | Self::NotReady => None,
        }
    }

    /// Whether operations reach a live widget.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.live().is_some()
    }

    /// Show the widget.
    pub fn open(&self) {
        match self.live() {
            Some(handle) => handle.open(),
            None => tracing::warn!(operation = "open", "{NOT_READY_WARNING}"),
        }
    }

    /// Submit data the widget asked for.
    pub fn submit(&self, data: &SubmissionData) {
        match self.live() {
            Some(handle) => handle.submit(data),
            None => tracing::warn!(operation = "submit", "{NOT_READY_WARNING}"),
        }
    }

    /// Close the widget.
    pub fn exit(&self, options: ExitOptions) {
        match self.live() {
            Some(handle) => handle.exit(options),
            None => tracing::warn!(operation = "exit", "{NOT_READY_WARNING}"),
        }
    }
}

impl std::fmt::Debug for LinkHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotReady => f.write_str("LinkHandler::NotReady"),
            Self::Ready { alive, .. } => f
                .debug_struct("LinkHandler::Ready")
                .field("alive", &alive.load(Ordering::Acquire))
                .finish_non_exhaustive(),
        }
    }
}
