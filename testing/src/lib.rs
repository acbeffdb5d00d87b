//! # Link Session Testing
//!
//! Testing utilities and helpers for the link session lifecycle manager.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - A Given-When-Then harness for reducers ([`ReducerTest`])
//! - Assertion helpers for returned effects
//! - Drivers that run effect descriptions without a Store
//!
//! ## Example
//!
//! ```ignore
//! use link_session_testing::{ReducerTest, assertions, test_clock};
//!
//! ReducerTest::new(SessionReducer)
//!     .with_env(test_environment())
//!     .given_state(SessionState::new(config))
//!     .when_action(SessionAction::Mount)
//!     .then_effects(|effects| assertions::assert_arms(effects, &SCRIPT_LOAD))
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use link_session_core::environment::Clock;

pub mod reducer_test;

pub use reducer_test::{ReducerTest, assertions, effects};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use link_session_testing::mocks::FixedClock;
    /// use link_session_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to
    ///
    /// Clones share the same instant, so a test can hold one handle while
    /// the code under test holds another.
    ///
    /// ```
    /// use link_session_testing::mocks::ManualClock;
    /// use link_session_core::environment::Clock;
    /// use chrono::{TimeDelta, Utc};
    ///
    /// let clock = ManualClock::new(Utc::now());
    /// let start = clock.now();
    /// clock.advance(TimeDelta::seconds(90));
    /// assert_eq!(clock.now() - start, TimeDelta::seconds(90));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock stopped at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward by `delta`
        pub fn advance(&self, delta: chrono::TimeDelta) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += delta;
        }

        /// Jump the clock to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// The instant every test clock starts at (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_time())
    }

    /// Create a manual clock starting at 2025-01-01 00:00:00 UTC
    #[must_use]
    pub fn manual_clock() -> ManualClock {
        ManualClock::new(test_time())
    }
}

/// Install a `tracing` subscriber for test output
///
/// Honors `RUST_LOG`; defaults to `debug`. Safe to call from every test.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, manual_clock, test_clock, test_time};
