//! Reducer composition utilities
//!
//! A client is split into feature reducers (session, catalog, checkout,
//! bookings, ...) that all operate on the same application state and action
//! type. [`combine_reducers`] runs them in order and concatenates their
//! effects, so each feature only matches the actions it owns.
//!
//! # Example
//!
//! ```
//! use eventhub_core::composition::combine_reducers;
//! use eventhub_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! #[derive(Clone, Default)]
//! struct AppState {
//!     counter: i32,
//!     logged: bool,
//! }
//!
//! #[derive(Clone)]
//! enum AppAction {
//!     Increment,
//!     Log,
//! }
//!
//! struct CounterReducer;
//! struct LoggingReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = AppState;
//!     type Action = AppAction;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &mut AppState, action: AppAction, _env: &()) -> SmallVec<[Effect<AppAction>; 4]> {
//!         if matches!(action, AppAction::Increment) {
//!             state.counter += 1;
//!         }
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! impl Reducer for LoggingReducer {
//!     type State = AppState;
//!     type Action = AppAction;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &mut AppState, action: AppAction, _env: &()) -> SmallVec<[Effect<AppAction>; 4]> {
//!         if matches!(action, AppAction::Log) {
//!             state.logged = true;
//!         }
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! let combined = combine_reducers(vec![Box::new(CounterReducer), Box::new(LoggingReducer)]);
//!
//! let mut state = AppState::default();
//! let _ = combined.reduce(&mut state, AppAction::Increment, &());
//! assert_eq!(state.counter, 1);
//! ```

use crate::effect::Effect;
use crate::reducer::Reducer;
use smallvec::SmallVec;
use std::sync::Arc;

/// Boxed reducer that can be shared across the store's effect tasks
pub type BoxedReducer<S, A, E> =
    Box<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>;

/// Combines multiple reducers that operate on the same state and action types.
///
/// Each reducer is run in sequence, and all effects are collected and concatenated.
/// Effects that are `Effect::None` are dropped from the combined result.
#[must_use]
pub fn combine_reducers<S, A, E>(reducers: Vec<BoxedReducer<S, A, E>>) -> CombinedReducer<S, A, E>
where
    A: Clone,
{
    CombinedReducer {
        reducers: reducers.into(),
    }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`]. Cloning is cheap (the reducers are shared).
pub struct CombinedReducer<S, A, E> {
    reducers: Arc<[BoxedReducer<S, A, E>]>,
}

impl<S, A, E> CombinedReducer<S, A, E> {
    /// Number of reducers in this combination
    #[must_use]
    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    /// True if no reducers were combined
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }
}

impl<S, A, E> Clone for CombinedReducer<S, A, E> {
    fn clone(&self) -> Self {
        Self {
            reducers: Arc::clone(&self.reducers),
        }
    }
}

impl<S, A, E> Reducer for CombinedReducer<S, A, E>
where
    A: Clone,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let mut all_effects = SmallVec::new();

        for reducer in self.reducers.iter() {
            let effects = reducer.reduce(state, action.clone(), env);
            all_effects.extend(effects.into_iter().filter(|effect| !effect.is_none()));
        }

        all_effects
    }
}
