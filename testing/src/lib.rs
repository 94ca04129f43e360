//! # Storefront Testing
//!
//! Testing utilities for the storefront reducers and services.
//!
//! - [`mocks`]: deterministic clocks
//! - [`ReducerTest`]: Given-When-Then harness for reducers
//! - [`effects`]: drive effect descriptions without a running store
//! - [`helpers`]: test-only tracing setup

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};
use storefront_core::environment::Clock;

/// Given-When-Then harness for reducers
pub mod reducer_test;

pub use reducer_test::{assertions, ReducerTest};

/// Mock implementations of environment traits
pub mod mocks {
    use super::{Arc, Clock, DateTime, Duration, Mutex, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time.
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock at the given time
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

    /// Clock that only moves when a test advances it.
    ///
    /// Clones share the same time, so a test can hand one copy to the
    /// environment and advance the other.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a manual clock starting at `start`
        #[must_use]
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(start)),
            }
        }

        /// Move the clock forward
        #[allow(clippy::unwrap_used)] // Poisoning only follows a panicking test
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap();
            *time += by;
        }
    }

    impl Clock for ManualClock {
        #[allow(clippy::unwrap_used)]
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap()
        }
    }

    /// The instant every test clock starts at: 2025-01-01T00:00:00Z
    #[must_use]
    #[allow(clippy::expect_used)] // Hardcoded timestamp is known valid
    pub fn epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }

    /// Create a test clock with a fixed time
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(epoch())
    }
}

/// Drive effect descriptions without a running store.
pub mod effects {
    use futures::future::BoxFuture;
    use storefront_core::effect::Effect;

    /// Resolve every `Future` and `Delay` in `effects`, returning the
    /// actions they produce in order. Delays are not slept.
    pub async fn collect_actions<A, I>(effects: I) -> Vec<A>
    where
        A: Send + 'static,
        I: IntoIterator<Item = Effect<A>>,
    {
        let mut actions = Vec::new();
        for effect in effects {
            resolve(effect, &mut actions).await;
        }
        actions
    }

    fn resolve<A: Send + 'static>(effect: Effect<A>, out: &mut Vec<A>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            match effect {
                Effect::None => {},
                Effect::Future(fut) => {
                    if let Some(action) = fut.await {
                        out.push(action);
                    }
                },
                Effect::Delay { action, .. } => out.push(*action),
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    for effect in effects {
                        resolve(effect, out).await;
                    }
                },
            }
        })
    }
}

/// Test helpers
pub mod helpers {
    /// Install a compact tracing subscriber for a test run.
    ///
    /// Honors `RUST_LOG`; calling it more than once is harmless.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

pub use mocks::{epoch, test_clock, FixedClock, ManualClock};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use storefront_core::effect::Effect;

    #[test]
    fn fixed_clock_never_moves() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now(), epoch());
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(epoch());
        let observer = clock.clone();
        clock.advance(Duration::hours(2));
        assert_eq!(observer.now(), epoch() + Duration::hours(2));
    }

    #[tokio::test]
    async fn collect_actions_flattens_nested_effects() {
        let effects = vec![
            Effect::None,
            Effect::chain(vec![Effect::emit(1_u8), Effect::emit(2)]),
            Effect::Delay {
                duration: std::time::Duration::from_secs(60),
                action: Box::new(3),
            },
        ];
        assert_eq!(effects::collect_actions(effects).await, vec![1, 2, 3]);
    }
}
