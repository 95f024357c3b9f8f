//! # EventHub Testing
//!
//! Testing utilities and helpers for the EventHub client.
//!
//! This crate provides:
//! - Deterministic clocks
//! - A Given-When-Then harness for reducers ([`ReducerTest`])
//! - Effect helpers that resolve effect descriptions into the actions they produce
//!
//! ## Example
//!
//! ```ignore
//! use eventhub_testing::{helpers::resolve_effects, test_clock};
//!
//! #[tokio::test]
//! async fn loads_events() {
//!     let env = test_environment();
//!     let mut state = AppState::default();
//!
//!     let effects = app_reducer().reduce(&mut state, CatalogAction::LoadEvents.into(), &env);
//!     let actions = resolve_effects(effects).await;
//!
//!     assert!(matches!(actions[0], AppAction::Catalog(CatalogAction::EventsLoaded { .. })));
//! }
//! ```

use chrono::{DateTime, Utc};
use eventhub_core::environment::Clock;


/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use eventhub_testing::mocks::FixedClock;
    /// use eventhub_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
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

    /// Clock that only moves when a test advances it
    ///
    /// Used where behavior depends on an event passing its date
    /// (the book button flips to "Event Ended").
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Start the clock at `time`
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Effect helpers
///
/// Reducer tests usually stop at "which effects came back". These helpers go
/// one step further and drive the effects to see which actions they feed back,
/// without a Store.
pub mod helpers {
    use eventhub_core::effect::Effect;
    use futures::future::{BoxFuture, FutureExt};

    /// Resolve effects into the actions they would dispatch
    ///
    /// Delays fire immediately. `Cancel` produces nothing. Parallel effects are
    /// resolved in declaration order so results are deterministic.
    pub async fn resolve_effects<A, I>(effects: I) -> Vec<A>
    where
        A: Send + 'static,
        I: IntoIterator<Item = Effect<A>>,
    {
        let mut actions = Vec::new();
        for effect in effects {
            actions.extend(resolve(effect).await);
        }
        actions
    }

    fn resolve<A: Send + 'static>(effect: Effect<A>) -> BoxFuture<'static, Vec<A>> {
        async move {
            match effect {
                Effect::None | Effect::Cancel(_) => Vec::new(),
                Effect::Future(fut) => fut.await.into_iter().collect(),
                Effect::Delay { action, .. } => vec![*action],
                Effect::Cancellable { effect, .. } => resolve(*effect).await,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    let mut actions = Vec::new();
                    for effect in effects {
                        actions.extend(resolve(effect).await);
                    }
                    actions
                },
            }
        }
        .boxed()
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use eventhub_core::effect::{Effect, EffectId};
    use std::time::Duration;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn manual_clock_advances() {
        let start = test_clock().now();
        let clock = ManualClock::new(start);
        clock.advance(chrono::Duration::hours(2));
        assert_eq!(clock.now() - start, chrono::Duration::hours(2));
    }

    #[tokio::test]
    async fn resolve_effects_walks_nested_effects() {
        let effects = vec![
            Effect::Parallel(vec![Effect::send(1), Effect::None]),
            Effect::Delay {
                duration: Duration::from_secs(60),
                action: Box::new(2),
            }
            .cancellable(EffectId::new("poll")),
            Effect::Cancel(EffectId::new("poll")),
            Effect::Sequential(vec![Effect::send(3), Effect::Future(Box::pin(async { None }))]),
        ];

        assert_eq!(helpers::resolve_effects(effects).await, vec![1, 2, 3]);
    }
}
