use super::lock;
use crate::providers::{ScriptLoader, TokenFetcher};
use crate::token::LinkTokenResponse;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Outcome = Result<LinkTokenResponse, String>;

#[derive(Debug)]
struct FetcherState {
    queued: VecDeque<Outcome>,
    fallback: Outcome,
}

/// Token fetcher returning canned responses.
///
/// Queued outcomes are returned first, in order; afterwards every call
/// returns the fallback.
#[derive(Debug, Clone)]
pub struct MockTokenFetcher {
    state: Arc<Mutex<FetcherState>>,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl MockTokenFetcher {
    fn with_fallback(fallback: Outcome) -> Self {
        Self {
            state: Arc::new(Mutex::new(FetcherState {
                queued: VecDeque::new(),
                fallback,
            })),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    /// Always return `response`.
    #[must_use]
    pub fn returning(response: LinkTokenResponse) -> Self {
        Self::with_fallback(Ok(response))
    }

    /// Always fail with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_fallback(Err(message.into()))
    }

    /// Resolve every call after `delay` (tokio time).
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Return `response` from the next unanswered call.
    pub fn push_response(&self, response: LinkTokenResponse) {
        lock(&self.state).queued.push_back(Ok(response));
    }

    /// Fail the next unanswered call with `message`.
    pub fn push_failure(&self, message: impl Into<String>) {
        lock(&self.state).queued.push_back(Err(message.into()));
    }

    /// Number of times the fetcher was invoked.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TokenFetcher for MockTokenFetcher {
    fn fetch_token(&self) -> BoxFuture<'_, anyhow::Result<LinkTokenResponse>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = {
            let mut state = lock(&self.state);
            state.queued.pop_front().unwrap_or_else(|| state.fallback.clone())
        };
        let delay = self.delay;

        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            outcome.map_err(|message| anyhow::anyhow!(message))
        })
    }
}

/// Script loader that succeeds or fails after an optional delay.
#[derive(Debug, Clone)]
pub struct MockScriptLoader {
    failure: Option<String>,
    delay: Option<Duration>,
    loads: Arc<Mutex<Vec<String>>>,
}

impl MockScriptLoader {
    /// Loader that always succeeds.
    #[must_use]
    pub fn succeeding() -> Self {
        Self {
            failure: None,
            delay: None,
            loads: Arc::default(),
        }
    }

    /// Loader that always fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::succeeding()
        }
    }

    /// Finish every load after `delay` (tokio time).
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// URLs requested so far.
    #[must_use]
    pub fn loads(&self) -> Vec<String> {
        lock(&self.loads).clone()
    }
}

impl ScriptLoader for MockScriptLoader {
    fn load<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        lock(&self.loads).push(url.to_string());

        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.failure {
                Some(message) => Err(anyhow::anyhow!(message.clone())),
                None => Ok(()),
            }
        })
    }
}
