//! # Link Session
//!
//! Session lifecycle manager for an embeddable account-linking widget.
//!
//! The widget needs a short-lived link token. This crate keeps one live
//! widget instance per session and rebuilds it whenever its inputs change:
//!
//! - **Token cache**: expiry-aware read-through caching of the caller's
//!   token fetcher against a key-value slot
//! - **Refresh scheduling**: a cancellable deadline armed ahead of expiry
//! - **Session reducer**: combines script readiness, the token and the
//!   caller's configuration into one derived [`SessionPhase`], tearing the
//!   old widget down before a new one is created
//! - **Error classification**: every failure maps onto a closed [`ErrorKind`]
//!
//! ## Architecture
//!
//! ```text
//! SessionAction → SessionReducer → (SessionState, Effects) → Effect Execution → More Actions
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use link_session::*;
//!
//! let config = SessionConfig::builder(token_fetcher_fn(|| async {
//!     Ok(LinkTokenResponse::new("link-sandbox-123", "2025-01-01T04:00:00Z"))
//! }))
//! .on_success(|public_token, metadata| exchange(public_token, metadata))
//! .build();
//!
//! let session = LinkSession::start(config, environment).await?;
//! let phase = session.wait_for(SessionPhase::is_ready, Duration::from_secs(10)).await?;
//!
//! session.handler().await.open();
//! ```

pub mod actions;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod environment;
pub mod error;
pub mod handler;
pub mod metadata;
pub mod providers;
pub mod reducer;
pub mod refresh;
pub mod session;
pub mod state;
pub mod storage;
pub mod token;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use actions::SessionAction;
pub use cache::{CacheOptions, TokenCache};
pub use classifier::classify;
pub use config::{Callbacks, SessionConfig, SessionConfigBuilder, WidgetMode};
pub use environment::SessionEnvironment;
pub use error::{ClassifiedError, ErrorKind, LinkError, StorageError, TokenFetchError};
pub use handler::LinkHandler;
pub use metadata::{ExitOptions, SubmissionData};
pub use providers::{
    EmbedTarget, EmbeddedHandle, LibraryLookup, ScriptLoader, TokenFetcher, WidgetConfig,
    WidgetFactory, WidgetHandle, WidgetLibrary, token_fetcher_fn,
};
pub use reducer::SessionReducer;
pub use refresh::{RefreshScheduler, ScheduledRefresh};
pub use session::{LinkSession, SessionError, SessionStatus};
pub use state::{LibraryStatus, ScriptStatus, SessionPhase, SessionState, TokenStatus};
pub use storage::{KeyValueStore, MemoryStorage};
pub use token::{LinkToken, LinkTokenResponse};
