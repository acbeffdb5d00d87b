//! Link tokens.
//!
//! [`LinkTokenResponse`] is what a token fetcher returns and what the cache
//! stores; [`LinkToken`] is the validated form the session works with.

use crate::error::TokenFetchError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Body returned by the token-minting endpoint.
///
/// Missing fields deserialize as empty strings so that a structurally
/// incomplete cache entry is rejected by validation rather than by parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTokenResponse {
    /// The link token.
    #[serde(default)]
    pub link_token: String,

    /// Expiry as an RFC 3339 timestamp.
    #[serde(default)]
    pub expiration: String,

    /// Request id, for support tickets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl LinkTokenResponse {
    /// Create a response without a request id.
    #[must_use]
    pub fn new(link_token: impl Into<String>, expiration: impl Into<String>) -> Self {
        Self {
            link_token: link_token.into(),
            expiration: expiration.into(),
            request_id: None,
        }
    }

    /// Create a response for a token expiring at `expires_at`.
    #[must_use]
    pub fn expiring_at(link_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self::new(
            link_token,
            expires_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
    }

    /// Set the request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// A validated link token.
///
/// The token is non-empty and the expiry parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkToken {
    /// The link token.
    pub token: String,

    /// When the token stops being accepted.
    pub expires_at: DateTime<Utc>,

    /// Request id of the fetch that minted it.
    pub request_id: Option<String>,
}

impl LinkToken {
    /// Time left before expiry, or `None` once expired.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        (self.expires_at - now).to_std().ok()
    }

    /// Whether the token is within `buffer` of its expiry (or past it).
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.remaining(now).is_none_or(|remaining| remaining <= buffer)
    }
}

impl TryFrom<LinkTokenResponse> for LinkToken {
    type Error = TokenFetchError;

    fn try_from(response: LinkTokenResponse) -> Result<Self, Self::Error> {
        if response.link_token.is_empty() {
            return Err(TokenFetchError::MissingLinkToken);
        }
        if response.expiration.is_empty() {
            return Err(TokenFetchError::MissingExpiration);
        }

        let expires_at = DateTime::parse_from_rfc3339(&response.expiration)
            .map_err(|_| TokenFetchError::InvalidExpiration {
                value: response.expiration.clone(),
            })?
            .with_timezone(&Utc);

        Ok(Self {
            token: response.link_token,
            expires_at,
            request_id: response.request_id,
        })
    }
}

impl From<&LinkToken> for LinkTokenResponse {
    fn from(token: &LinkToken) -> Self {
        Self {
            link_token: token.token.clone(),
            expiration: token.expires_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            request_id: token.request_id.clone(),
        }
    }
}
