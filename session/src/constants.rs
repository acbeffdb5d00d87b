//! Session constants.
//!
//! Default configuration values and the ids of the cancellable effects the
//! session reducer owns.

use std::time::Duration;

/// Stable CDN location of the widget library script.
pub const DEFAULT_SCRIPT_URL: &str = "https://cdn.plaid.com/link/v2/stable/link-initialize.js";

/// Storage key the token cache uses unless configured otherwise.
pub const DEFAULT_STORAGE_KEY: &str = "link_session_token";

/// Margin before expiry at which a token is treated as stale.
pub const DEFAULT_BUFFER: Duration = Duration::from_secs(30);

/// Logged when a widget operation is invoked before the session is ready.
pub const NOT_READY_WARNING: &str = "link session is not ready yet; widget operation is a no-op";

/// Ids of the cancellable effects armed by the session reducer.
pub mod effect_ids {
    use link_session_core::effect::EffectId;

    /// The one-shot token refresh deadline.
    pub const REFRESH_TIMER: EffectId = EffectId::from_static("link_session.refresh_timer");

    /// The in-flight token acquisition.
    pub const TOKEN_REQUEST: EffectId = EffectId::from_static("link_session.token_request");

    /// The widget script download.
    pub const SCRIPT_LOAD: EffectId = EffectId::from_static("link_session.script_load");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_ids_are_distinct() {
        assert_ne!(effect_ids::REFRESH_TIMER, effect_ids::TOKEN_REQUEST);
        assert_ne!(effect_ids::TOKEN_REQUEST, effect_ids::SCRIPT_LOAD);
    }
}
