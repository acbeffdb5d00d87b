//! Expiry-aware read-through token cache.
//!
//! [`TokenCache::acquire`] wraps the caller's [`TokenFetcher`] with a single
//! cached entry in a [`KeyValueStore`]. Storage failures never fail an
//! acquisition: a failed read is a miss and a failed write is skipped.
//!
//! The read, expiry check, removal and write are not transactional. Two
//! sessions sharing a key may both refetch; the last write wins.

use crate::constants::{DEFAULT_BUFFER, DEFAULT_STORAGE_KEY};
use crate::error::TokenFetchError;
use crate::providers::TokenFetcher;
use crate::storage::{KeyValueStore, MemoryStorage};
use crate::token::{LinkToken, LinkTokenResponse};
use link_session_core::environment::Clock;
use std::sync::Arc;
use std::time::Duration;

/// Where and how long tokens are cached.
#[derive(Clone)]
pub struct CacheOptions {
    /// Key of the cache slot.
    ///
    /// Default: `"link_session_token"`
    pub storage_key: String,

    /// A cached token within this margin of expiry is stale.
    ///
    /// Default: 30 seconds
    pub buffer: Duration,

    /// Backing storage.
    ///
    /// Default: the process-wide [`MemoryStorage`]
    pub storage: Arc<dyn KeyValueStore>,
}

impl CacheOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage key.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Set the staleness buffer.
    #[must_use]
    pub const fn with_buffer(mut self, buffer: Duration) -> Self {
        self.buffer = buffer;
        self
    }

    /// Set the backing storage.
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = storage;
        self
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            buffer: DEFAULT_BUFFER,
            storage: Arc::new(MemoryStorage::shared()),
        }
    }
}

impl std::fmt::Debug for CacheOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheOptions")
            .field("storage_key", &self.storage_key)
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

/// Read-through cache in front of a [`TokenFetcher`].
#[derive(Clone)]
pub struct TokenCache {
    clock: Arc<dyn Clock>,
}

impl TokenCache {
    /// Create a cache that judges expiry by `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Obtain a usable token.
    ///
    /// With caching disabled every call fetches and nothing is written.
    /// Otherwise a cached token that is not within `options.buffer` of expiry
    /// is returned without fetching; a missing, unreadable or malformed entry
    /// leads to a fetch; a stale entry is removed before the fetch. Every
    /// successful fetch is written back.
    ///
    /// # Errors
    ///
    /// Returns [`TokenFetchError`] if the fetcher fails or its response is
    /// missing the token or expiry.
    pub async fn acquire(
        &self,
        fetcher: &dyn TokenFetcher,
        cache_enabled: bool,
        options: &CacheOptions,
    ) -> Result<LinkToken, TokenFetchError> {
        if !cache_enabled {
            metrics::counter!("link_session.token_cache", "outcome" => "bypass").increment(1);
            tracing::debug!("Token cache disabled, fetching");
            return fetch_validated(fetcher).await.map(|(token, _)| token);
        }

        let key = options.storage_key.as_str();
        let storage = options.storage.as_ref();

        let raw = match storage.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                metrics::counter!("link_session.token_cache", "outcome" => "miss").increment(1);
                tracing::debug!(key, "No cached token");
                return fetch_and_cache(fetcher, storage, key).await;
            },
            Err(error) => {
                metrics::counter!("link_session.token_cache", "outcome" => "miss").increment(1);
                tracing::warn!(key, %error, "Token cache read failed, fetching");
                return fetch_and_cache(fetcher, storage, key).await;
            },
        };

        let cached = match serde_json::from_str::<LinkTokenResponse>(&raw) {
            Ok(cached) => cached,
            Err(error) => {
                metrics::counter!("link_session.token_cache", "outcome" => "miss").increment(1);
                tracing::warn!(key, %error, "Cached token is malformed, fetching");
                return fetch_and_cache(fetcher, storage, key).await;
            },
        };

        let now = self.clock.now();
        match LinkToken::try_from(cached) {
            Ok(token) if !token.is_expired(now, options.buffer) => {
                metrics::counter!("link_session.token_cache", "outcome" => "hit").increment(1);
                tracing::debug!(key, expires_at = %token.expires_at, "Using cached token");
                Ok(token)
            },
            _ => {
                metrics::counter!("link_session.token_cache", "outcome" => "stale").increment(1);
                tracing::debug!(key, "Cached token is stale, removing");
                if let Err(error) = storage.remove_item(key) {
                    tracing::warn!(key, %error, "Failed to remove stale token");
                }
                fetch_and_cache(fetcher, storage, key).await
            },
        }
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache").finish_non_exhaustive()
    }
}

async fn fetch_validated(
    fetcher: &dyn TokenFetcher,
) -> Result<(LinkToken, LinkTokenResponse), TokenFetchError> {
    let response = fetcher
        .fetch_token()
        .await
        .map_err(TokenFetchError::fetcher)?;
    let token = LinkToken::try_from(response.clone())?;
    Ok((token, response))
}

async fn fetch_and_cache(
    fetcher: &dyn TokenFetcher,
    storage: &dyn KeyValueStore,
    key: &str,
) -> Result<LinkToken, TokenFetchError> {
    let (token, response) = fetch_validated(fetcher).await?;

    match serde_json::to_string(&response) {
        Ok(serialized) => {
            if let Err(error) = storage.set_item(key, &serialized) {
                tracing::warn!(key, %error, "Failed to cache token");
            }
        },
        Err(error) => tracing::warn!(key, %error, "Failed to serialize token"),
    }

    Ok(token)
}
