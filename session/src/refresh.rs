//! Proactive token refresh.
//!
//! The scheduler arms one cancellable deadline per live widget, `buffer`
//! ahead of the token's expiry. The session reducer cancels it on every
//! teardown; arming a new one under the same id supersedes the old.

use crate::constants::{DEFAULT_BUFFER, effect_ids::REFRESH_TIMER};
use crate::token::LinkToken;
use chrono::{DateTime, Utc};
use link_session_core::effect::{Effect, EffectId};
use std::time::Duration;

/// Handle to an armed refresh deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRefresh {
    /// Id the deadline is armed under.
    pub id: EffectId,
    /// Delay the deadline was armed with.
    pub delay: Duration,
    /// Wall-clock time the deadline is expected to fire.
    pub due_at: DateTime<Utc>,
}

impl ScheduledRefresh {
    /// Effect cancelling this deadline.
    #[must_use]
    pub fn cancel<A>(&self) -> Effect<A> {
        Effect::Cancel(self.id.clone())
    }
}

/// Computes and arms refresh deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshScheduler {
    buffer: Duration,
}

impl RefreshScheduler {
    /// Refresh `buffer` ahead of expiry.
    #[must_use]
    pub const fn new(buffer: Duration) -> Self {
        Self { buffer }
    }

    /// Delay from `now` until a token expiring at `expires_at` should be refreshed.
    ///
    /// `expires_at - now - buffer`, or zero when the token is already inside
    /// its buffer or expired. A zero delay fires on the timer's next tick.
    #[must_use]
    pub fn delay_until_refresh(
        &self,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Duration {
        (expires_at - now)
            .to_std()
            .ok()
            .and_then(|remaining| remaining.checked_sub(self.buffer))
            .unwrap_or(Duration::ZERO)
    }

    /// Arm a deadline that dispatches `action` when `token` is due for refresh.
    ///
    /// Returns the handle and the cancellable effect to hand to the runtime.
    #[must_use]
    pub fn schedule<A>(
        &self,
        now: DateTime<Utc>,
        token: &LinkToken,
        action: A,
    ) -> (ScheduledRefresh, Effect<A>) {
        let delay = self.delay_until_refresh(now, token.expires_at);
        let due_at = chrono::TimeDelta::from_std(delay).map_or(token.expires_at, |d| now + d);

        tracing::debug!(?delay, %due_at, "Scheduling token refresh");

        let refresh = ScheduledRefresh {
            id: REFRESH_TIMER,
            delay,
            due_at,
        };
        let effect = link_session_core::cancellable! {
            id: REFRESH_TIMER,
            effect: link_session_core::delay! {
                duration: delay,
                action: action
            }
        };

        (refresh, effect)
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use link_session_testing::{effects::pending_delays, test_time};

    fn token(expires_in: TimeDelta) -> LinkToken {
        LinkToken {
            token: "tok".to_string(),
            expires_at: test_time() + expires_in,
            request_id: None,
        }
    }

    #[test]
    fn test_delay_subtracts_buffer() {
        let scheduler = RefreshScheduler::default();
        let delay = scheduler.delay_until_refresh(test_time(), test_time() + TimeDelta::hours(4));
        assert_eq!(delay, Duration::from_secs(4 * 3600 - 30));
    }

    #[test]
    fn test_delay_inside_buffer_is_immediate() {
        let scheduler = RefreshScheduler::new(Duration::from_secs(30));
        let now = test_time();

        assert_eq!(
            scheduler.delay_until_refresh(now, now + TimeDelta::seconds(10)),
            Duration::ZERO
        );
        assert_eq!(
            scheduler.delay_until_refresh(now, now + TimeDelta::seconds(30)),
            Duration::ZERO
        );
        assert_eq!(
            scheduler.delay_until_refresh(now, now - TimeDelta::hours(1)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_expired_token_is_due_now() {
        let now = test_time();
        let (refresh, effect) =
            RefreshScheduler::default().schedule(now, &token(TimeDelta::hours(-1)), "refresh");

        assert_eq!(refresh.delay, Duration::ZERO);
        assert_eq!(refresh.due_at, now);
        assert_eq!(pending_delays(&[effect]), vec![(Duration::ZERO, "refresh")]);
    }

    #[test]
    fn test_schedule_arms_cancellable_delay() {
        let scheduler = RefreshScheduler::new(Duration::from_secs(60));
        let (refresh, effect) =
            scheduler.schedule(test_time(), &token(TimeDelta::minutes(30)), "refresh");

        assert_eq!(refresh.id, REFRESH_TIMER);
        assert_eq!(refresh.delay, Duration::from_secs(29 * 60));
        assert_eq!(refresh.due_at, test_time() + TimeDelta::minutes(29));
        assert!(effect.arms(&REFRESH_TIMER));

        let effects = [effect];
        assert_eq!(
            pending_delays(&effects),
            vec![(Duration::from_secs(29 * 60), "refresh")]
        );
    }

    #[test]
    fn test_cancel_targets_same_id() {
        let (refresh, _) =
            RefreshScheduler::default().schedule(test_time(), &token(TimeDelta::hours(1)), ());
        let cancel: Effect<()> = refresh.cancel();
        assert!(cancel.cancels(&REFRESH_TIMER));
    }
}
