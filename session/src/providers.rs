//! Provider traits for the session's external collaborators.
//!
//! - [`TokenFetcher`]: the caller's async call to its token-minting endpoint
//! - [`ScriptLoader`]: downloads the widget library script
//! - [`WidgetLibrary`]: looks up the library once the script has run
//! - [`WidgetFactory`], [`WidgetHandle`], [`EmbeddedHandle`]: the library itself
//!
//! All of them are held as trait objects in [`crate::SessionEnvironment`] or
//! [`crate::SessionConfig`], so async methods return boxed futures.

use crate::config::Callbacks;
use crate::metadata::{ExitOptions, SubmissionData};
use crate::token::LinkTokenResponse;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// Caller-supplied token fetch.
///
/// Failures are reported as `anyhow::Error`; the error's message becomes
/// the `token_fetch` message shown to the caller.
pub trait TokenFetcher: Send + Sync {
    /// Request a fresh link token.
    fn fetch_token(&self) -> BoxFuture<'_, anyhow::Result<LinkTokenResponse>>;
}

/// [`TokenFetcher`] backed by an async closure.
pub struct FnTokenFetcher<F>(F);

impl<F, Fut> TokenFetcher for FnTokenFetcher<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<LinkTokenResponse>> + Send + 'static,
{
    fn fetch_token(&self) -> BoxFuture<'_, anyhow::Result<LinkTokenResponse>> {
        Box::pin((self.0)())
    }
}

/// Wrap an async closure as a shared [`TokenFetcher`].
///
/// ```rust,ignore
/// let fetcher = token_fetcher_fn(|| async {
///     let body = client.post(url).send().await?.json().await?;
///     Ok(body)
/// });
/// ```
pub fn token_fetcher_fn<F, Fut>(fetch: F) -> Arc<dyn TokenFetcher>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<LinkTokenResponse>> + Send + 'static,
{
    Arc::new(FnTokenFetcher(fetch))
}

/// Loads the widget library script.
///
/// Each session calls [`ScriptLoader::load`] at most once and never retries.
pub trait ScriptLoader: Send + Sync {
    /// Download and run the script at `url`.
    fn load<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Result of looking up the widget library.
#[derive(Clone)]
pub enum LibraryLookup {
    /// The library is installed.
    Present(Arc<dyn WidgetFactory>),
    /// The script ran but the library is missing.
    Absent,
    /// There is no browser environment to install it into.
    NonBrowser,
}

impl std::fmt::Debug for LibraryLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Present(_) => f.write_str("Present(<factory>)"),
            Self::Absent => f.write_str("Absent"),
            Self::NonBrowser => f.write_str("NonBrowser"),
        }
    }
}

/// Lookup of the globally installed widget library.
pub trait WidgetLibrary: Send + Sync {
    /// Find the library.
    fn lookup(&self) -> LibraryLookup;
}

/// Container the embedded widget is mounted into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmbedTarget(String);

impl EmbedTarget {
    /// Target the element with this id.
    #[must_use]
    pub fn new(element_id: impl Into<String>) -> Self {
        Self(element_id.into())
    }

    /// The element id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Everything the factory needs to create a widget.
#[derive(Clone)]
pub struct WidgetConfig {
    /// The link token.
    pub token: String,

    /// Redirect URI when resuming after an OAuth redirect.
    pub received_redirect_uri: Option<String>,

    /// Widget callbacks, silenced once this widget is torn down.
    pub callbacks: Callbacks,
}

impl std::fmt::Debug for WidgetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetConfig")
            .field("token", &self.token)
            .field("received_redirect_uri", &self.received_redirect_uri)
            .finish_non_exhaustive()
    }
}

/// Creates widget instances.
pub trait WidgetFactory: Send + Sync {
    /// Create a modal widget.
    fn create(&self, config: WidgetConfig) -> Arc<dyn WidgetHandle>;

    /// Create a widget embedded into `target`.
    fn create_embedded(
        &self,
        config: WidgetConfig,
        target: &EmbedTarget,
    ) -> Arc<dyn EmbeddedHandle>;
}

/// A live modal widget.
pub trait WidgetHandle: Send + Sync {
    /// Show the widget.
    fn open(&self);

    /// Submit data the widget asked for.
    fn submit(&self, data: &SubmissionData);

    /// Close the widget.
    fn exit(&self, options: ExitOptions);

    /// Release the widget and everything it created.
    fn destroy(&self);
}

/// A live embedded widget.
pub trait EmbeddedHandle: Send + Sync {
    /// Release the widget and everything it created.
    fn destroy(&self);
}
