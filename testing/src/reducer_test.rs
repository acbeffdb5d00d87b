//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use link_session_core::{effect::Effect, reducer::Reducer};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// # Example
///
/// ```ignore
/// use link_session_testing::ReducerTest;
///
/// ReducerTest::new(SessionReducer)
///     .with_env(test_environment())
///     .given_state(state)
///     .given_actions([SessionAction::Mount, SessionAction::ScriptLoaded])
///     .when_action(SessionAction::Dispose)
///     .then_state(|state| {
///         assert!(state.disposed);
///     })
///     .then_effects(|effects| {
///         assertions::assert_cancels(effects, &REFRESH_TIMER);
///     })
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    history: Vec<A>,
    action: Option<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            history: Vec::new(),
            action: None,
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Actions reduced before the one under test (Given)
    ///
    /// Their effects are discarded.
    #[must_use]
    pub fn given_actions(mut self, actions: impl IntoIterator<Item = A>) -> Self {
        self.history.extend(actions);
        self
    }

    /// Set the action to test (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.action = Some(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the resulting effects (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        let action = self.action.expect("Action must be set with when_action()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        for earlier in self.history {
            let _ = self.reducer.reduce(&mut state, earlier, &env);
        }

        // Execute reducer
        let effects = self.reducer.reduce(&mut state, action, &env);

        // Run state assertions
        for assertion in self.state_assertions {
            assertion(&state);
        }

        // Run effect assertions
        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use link_session_core::effect::{Effect, EffectId};

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if effects is not empty.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(|e| matches!(e, Effect::None)),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that effects cancel `id`
    ///
    /// # Panics
    ///
    /// Panics if no effect cancels `id`.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_cancels<A: std::fmt::Debug>(effects: &[Effect<A>], id: &EffectId) {
        assert!(
            effects.iter().any(|e| e.cancels(id)),
            "Expected an effect cancelling {id}, found {effects:?}"
        );
    }

    /// Assert that effects arm a cancellable task under `id`
    ///
    /// # Panics
    ///
    /// Panics if no effect arms `id`.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_arms<A: std::fmt::Debug>(effects: &[Effect<A>], id: &EffectId) {
        assert!(
            effects.iter().any(|e| e.arms(id)),
            "Expected an effect arming {id}, found {effects:?}"
        );
    }

    /// Assert that no effect arms a cancellable task under `id`
    ///
    /// # Panics
    ///
    /// Panics if some effect arms `id`.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_does_not_arm<A: std::fmt::Debug>(effects: &[Effect<A>], id: &EffectId) {
        assert!(
            !effects.iter().any(|e| e.arms(id)),
            "Expected no effect arming {id}, found {effects:?}"
        );
    }
}

/// Drive effect descriptions without a Store
///
/// Lets a reducer test resolve the futures a reducer returned and feed the
/// resulting actions back in by hand.
pub mod effects {
    use link_session_core::effect::Effect;
    use std::time::Duration;

    /// Await every `Future` effect (looking through composition) and collect
    /// the actions they produce, in order
    ///
    /// Delays are not waited on; see [`pending_delays`].
    pub async fn run_futures<A, I>(effects: I) -> Vec<A>
    where
        I: IntoIterator<Item = Effect<A>>,
    {
        let mut queue: Vec<Effect<A>> = effects.into_iter().collect();
        queue.reverse();

        let mut actions = Vec::new();
        while let Some(effect) = queue.pop() {
            match effect {
                Effect::Future(fut) => {
                    if let Some(action) = fut.await {
                        actions.push(action);
                    }
                },
                Effect::Parallel(nested) | Effect::Sequential(nested) => {
                    queue.extend(nested.into_iter().rev());
                },
                Effect::Cancellable { effect, .. } => queue.push(*effect),
                Effect::None | Effect::Delay { .. } | Effect::Cancel(_) => {},
            }
        }
        actions
    }

    /// Every `Delay` effect (looking through composition) with its action
    pub fn pending_delays<A: Clone>(effects: &[Effect<A>]) -> Vec<(Duration, A)> {
        let mut delays = Vec::new();
        for effect in effects {
            collect_delays(effect, &mut delays);
        }
        delays
    }

    fn collect_delays<A: Clone>(effect: &Effect<A>, out: &mut Vec<(Duration, A)>) {
        match effect {
            Effect::Delay { duration, action } => out.push((*duration, (**action).clone())),
            Effect::Parallel(nested) | Effect::Sequential(nested) => {
                for effect in nested {
                    collect_delays(effect, out);
                }
            },
            Effect::Cancellable { effect, .. } => collect_delays(effect, out),
            Effect::None | Effect::Future(_) | Effect::Cancel(_) => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use link_session_core::effect::{Effect, EffectId};
    use link_session_core::reducer::Reducer;
    use std::time::Duration;

    const TICK: EffectId = EffectId::from_static("tick");

    #[derive(Clone, Debug, PartialEq)]
    struct TestState {
        count: i32,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum TestAction {
        Increment,
        Decrement,
        Schedule,
    }

    struct TestReducer;

    struct TestEnv;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = TestEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> smallvec::SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                TestAction::Increment => {
                    state.count += 1;
                    smallvec::smallvec![Effect::None]
                },
                TestAction::Decrement => {
                    state.count -= 1;
                    smallvec::smallvec![Effect::None]
                },
                TestAction::Schedule => smallvec::smallvec![
                    Effect::Cancel(TICK),
                    Effect::Parallel(vec![
                        Effect::Future(Box::pin(async { Some(TestAction::Increment) })),
                        Effect::Delay {
                            duration: Duration::from_secs(3),
                            action: Box::new(TestAction::Decrement),
                        }
                        .cancellable(TICK),
                    ]),
                ],
            }
        }
    }

    #[test]
    fn test_reducer_test_increment() {
        ReducerTest::new(TestReducer)
            .with_env(TestEnv)
            .given_state(TestState { count: 0 })
            .when_action(TestAction::Increment)
            .then_state(|state| {
                assert_eq!(state.count, 1);
            })
            .then_effects(|effects| {
                assertions::assert_no_effects(effects);
            })
            .run();
    }

    #[test]
    fn test_given_actions_are_applied_first() {
        ReducerTest::new(TestReducer)
            .with_env(TestEnv)
            .given_state(TestState { count: 5 })
            .given_actions([TestAction::Decrement, TestAction::Decrement])
            .when_action(TestAction::Decrement)
            .then_state(|state| {
                assert_eq!(state.count, 2);
            })
            .run();
    }

    #[test]
    fn test_cancel_and_arm_assertions() {
        ReducerTest::new(TestReducer)
            .with_env(TestEnv)
            .given_state(TestState { count: 0 })
            .when_action(TestAction::Schedule)
            .then_effects(|effects| {
                assertions::assert_cancels(effects, &TICK);
                assertions::assert_arms(effects, &TICK);
                assertions::assert_does_not_arm(effects, &EffectId::from_static("other"));
            })
            .run();
    }

    #[test]
    fn test_effect_drivers_look_through_composition() {
        let mut state = TestState { count: 0 };
        let effects = TestReducer.reduce(&mut state, TestAction::Schedule, &TestEnv);

        assert_eq!(
            effects::pending_delays(&effects),
            vec![(Duration::from_secs(3), TestAction::Decrement)]
        );

        let actions = tokio_test::block_on(effects::run_futures(effects));
        assert_eq!(actions, vec![TestAction::Increment]);
    }

    #[test]
    fn test_assertions_effects_count() {
        assertions::assert_effects_count(&[Effect::<TestAction>::None], 1);
        assertions::assert_effects_count::<TestAction>(&[], 0);
    }
}
