//! # Link Session Core
//!
//! Core traits and types for the link session lifecycle manager.
//!
//! The session is modelled as a reducer: every external signal (script load
//! completion, token acquisition completion, configuration change, refresh
//! deadline) is an action, and the reducer recomputes the derived session
//! state in a single serialized step.
//!
//! ## Core Concepts
//!
//! - **State**: Inputs the derivation runs over, plus the resources it owns
//! - **Action**: Every signal that can change those inputs
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies via traits
//!
//! ## Example
//!
//! ```ignore
//! use link_session_core::*;
//!
//! impl Reducer for SessionReducer {
//!     type State = SessionState;
//!     type Action = SessionAction;
//!     type Environment = SessionEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut SessionState,
//!         action: SessionAction,
//!         env: &SessionEnvironment,
//!     ) -> SmallVec<[Effect<SessionAction>; 4]> {
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

mod effect_macros;

/// Reducer module - The core trait for state transitions
///
/// Reducers are functions: `(State, Action, Environment) → (State, Effects)`
///
/// They run synchronously and one at a time, which is what lets a reducer
/// perform an ordered teardown-then-setup without any locking of its own.
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for SessionReducer {
    ///     type State = SessionState;
    ///     type Action = SessionAction;
    ///     type Environment = SessionEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut SessionState,
    ///         action: SessionAction,
    ///         env: &SessionEnvironment,
    ///     ) -> SmallVec<[Effect<SessionAction>; 4]> {
    ///         match action {
    ///             SessionAction::Mount => smallvec![Effect::None],
    ///             _ => smallvec![Effect::None],
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to current state
        /// - `action`: The action to process
        /// - `env`: Reference to injected dependencies
        ///
        /// # Returns
        ///
        /// Effects to be executed by the runtime, in order
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution) and are composable and cancellable.
pub mod effect {
    use std::borrow::Cow;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Identifier for a cancellable effect
    ///
    /// At most one effect per id is in flight in a runtime: arming a new
    /// effect under an id that is still pending cancels the old one first.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct EffectId(Cow<'static, str>);

    impl EffectId {
        /// Create an id from a static string (usable in `const` items)
        #[must_use]
        pub const fn from_static(id: &'static str) -> Self {
            Self(Cow::Borrowed(id))
        }

        /// Create an id from an owned or borrowed string
        #[must_use]
        pub fn new(id: impl Into<String>) -> Self {
            Self(Cow::Owned(id.into()))
        }

        /// The id as a string slice
        #[must_use]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl std::fmt::Display for EffectId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime in the order returned.
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Run effects sequentially
        Sequential(Vec<Effect<Action>>),

        /// Delayed action (for timeouts, refresh deadlines)
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),

        /// Run `effect` under `id` so a later [`Effect::Cancel`] can abort it
        ///
        /// Only `Delay` and `Future` effects hold a task that can be aborted;
        /// any other inner effect is executed as if it were not wrapped.
        Cancellable {
            /// Cancellation handle
            id: EffectId,
            /// The effect to run
            effect: Box<Effect<Action>>,
        },

        /// Abort the in-flight effect registered under this id, if any
        Cancel(EffectId),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Cancellable { id, effect } => f
                    .debug_struct("Effect::Cancellable")
                    .field("id", id)
                    .field("effect", effect)
                    .finish(),
                Effect::Cancel(id) => f.debug_tuple("Effect::Cancel").field(id).finish(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Wrap this effect so it can be cancelled by `id`
        #[must_use]
        pub fn cancellable(self, id: EffectId) -> Effect<Action> {
            Effect::Cancellable {
                id,
                effect: Box::new(self),
            }
        }

        /// Whether this effect (or one nested in it) cancels `id`
        #[must_use]
        pub fn cancels(&self, id: &EffectId) -> bool {
            match self {
                Effect::Cancel(cancelled) => cancelled == id,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    effects.iter().any(|e| e.cancels(id))
                },
                Effect::Cancellable { effect, .. } => effect.cancels(id),
                _ => false,
            }
        }

        /// Whether this effect (or one nested in it) registers work under `id`
        #[must_use]
        pub fn arms(&self, id: &EffectId) -> bool {
            match self {
                Effect::Cancellable { id: armed, .. } => armed == id,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    effects.iter().any(|e| e.arms(id))
                },
                _ => false,
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
