//! Given-When-Then harness for reducers.
//!
//! Drives a reducer with one or more actions and hands the final state and
//! the effects of the last action to assertions.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use storefront_core::{effect::Effect, reducer::Reducer};

type StateAssertion<S> = Box<dyn FnOnce(&S)>;
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent reducer test builder
///
/// # Example
///
/// ```ignore
/// use storefront_testing::ReducerTest;
///
/// ReducerTest::new(CheckoutReducer)
///     .with_env(test_environment())
///     .given_state(CheckoutState::default())
///     .when_action(CheckoutAction::StartCheckout { .. })
///     .then_state(|state| assert_eq!(state.sessions.len(), 1))
///     .then_effects(|effects| assertions::assert_has_future_effect(effects))
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
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
            actions: Vec::new(),
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

    /// Queue an action (When). Actions run in the order they were queued.
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Add an assertion about the final state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the effects of the last action (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the reducer and every assertion
    ///
    /// # Panics
    ///
    /// Panics if state, environment or at least one action is missing, or
    /// if any assertion fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");
        let env = self
            .environment
            .expect("Environment must be set with with_env()");
        assert!(!self.actions.is_empty(), "At least one action must be set with when_action()");

        let mut effects = Vec::new();
        for action in self.actions {
            effects = self.reducer.reduce(&mut state, action, &env).into_vec();
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use storefront_core::effect::Effect;

    /// Assert that there are no effects (an empty list or a lone `Effect::None`)
    ///
    /// # Panics
    ///
    /// Panics if any real effect is present.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(Effect::is_none),
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

    /// Assert that effects contain at least one Future effect
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(|e| matches!(e, Effect::Future(_))),
            "Expected at least one Future effect, but none found"
        );
    }

    /// Assert that effects schedule at least one delayed action
    ///
    /// # Panics
    ///
    /// Panics if no Delay effect is found at any nesting level.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_delay_effect<A>(effects: &[Effect<A>]) {
        fn contains_delay<A>(effect: &Effect<A>) -> bool {
            match effect {
                Effect::Delay { .. } => true,
                Effect::Parallel(inner) | Effect::Sequential(inner) => {
                    inner.iter().any(contains_delay)
                },
                Effect::None | Effect::Future(_) => false,
            }
        }
        assert!(
            effects.iter().any(contains_delay),
            "Expected at least one Delay effect, but none found"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::{smallvec, SmallVec};
    use std::time::Duration;

    #[derive(Clone, Debug)]
    struct Stock {
        available: u32,
    }

    #[derive(Clone, Debug)]
    enum StockAction {
        Take,
        Return,
        ExpireLater,
    }

    struct StockReducer;

    impl Reducer for StockReducer {
        type State = Stock;
        type Action = StockAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Stock,
            action: StockAction,
            _env: &(),
        ) -> SmallVec<[Effect<StockAction>; 4]> {
            match action {
                StockAction::Take => {
                    state.available = state.available.saturating_sub(1);
                    smallvec![Effect::None]
                },
                StockAction::Return => {
                    state.available += 1;
                    smallvec![Effect::None]
                },
                StockAction::ExpireLater => smallvec![Effect::Delay {
                    duration: Duration::from_secs(1),
                    action: Box::new(StockAction::Return),
                }],
            }
        }
    }

    #[test]
    fn actions_apply_in_order() {
        ReducerTest::new(StockReducer)
            .with_env(())
            .given_state(Stock { available: 1 })
            .when_action(StockAction::Take)
            .when_action(StockAction::Take)
            .when_action(StockAction::Return)
            .then_state(|state| assert_eq!(state.available, 1))
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .run();
    }

    #[test]
    fn delay_is_detected() {
        ReducerTest::new(StockReducer)
            .with_env(())
            .given_state(Stock { available: 0 })
            .when_action(StockAction::ExpireLater)
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_delay_effect(effects);
            })
            .run();
    }
}
