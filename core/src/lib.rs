//! # EventHub Core
//!
//! Core traits and types for the EventHub client.
//!
//! The client is a presentation layer over a remote REST API. Every piece of
//! behavior is expressed as a reducer over typed state, and all I/O is
//! described as effects that the runtime executes.
//!
//! ## Core Concepts
//!
//! - **State**: Typed client state for a feature (never authoritative)
//! - **Action**: Everything that can happen (user intents, API responses, timer ticks)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies via traits
//!
//! ## Example
//!
//! ```
//! use eventhub_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! #[derive(Clone, Debug, Default)]
//! struct CartState {
//!     quantity: u32,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum CartAction {
//!     Add,
//!     Clear,
//! }
//!
//! struct CartReducer;
//!
//! impl Reducer for CartReducer {
//!     type State = CartState;
//!     type Action = CartAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CartState,
//!         action: CartAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<CartAction>; 4]> {
//!         match action {
//!             CartAction::Add => state.quantity += 1,
//!             CartAction::Clear => state.quantity = 0,
//!         }
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! let mut state = CartState::default();
//! let _ = CartReducer.reduce(&mut state, CartAction::Add, &());
//! assert_eq!(state.quantity, 1);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use smallvec::{smallvec, SmallVec};

/// Reducer composition utilities
pub mod composition;

/// Declarative macros for effect construction
pub mod effect_macros;

/// Reducer module - The core trait for client logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for client logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action against current state
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
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
    use std::fmt;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Identifier for a cancellable effect
    ///
    /// Starting a new effect under an id that is already running cancels the
    /// old one first, so at most one effect per id is alive.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct EffectId(Cow<'static, str>);

    impl EffectId {
        /// Create an id from a static name
        #[must_use]
        pub const fn new(name: &'static str) -> Self {
            Self(Cow::Borrowed(name))
        }

        /// Create an id from a runtime string
        #[must_use]
        pub fn owned(name: impl Into<String>) -> Self {
            Self(Cow::Owned(name.into()))
        }

        /// The id as a string slice
        #[must_use]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl fmt::Display for EffectId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime.
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Run effects sequentially
        Sequential(Vec<Effect<Action>>),

        /// Delayed action (timers, polling)
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

        /// Run an effect that can later be cancelled by id
        Cancellable {
            /// Cancellation key
            id: EffectId,
            /// The wrapped effect
            effect: Box<Effect<Action>>,
        },

        /// Cancel the in-flight effect registered under this id, if any
        Cancel(EffectId),
    }

    impl<Action> fmt::Debug for Effect<Action>
    where
        Action: fmt::Debug,
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
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
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Make this effect cancellable under `id`
        #[must_use]
        pub fn cancellable(self, id: EffectId) -> Effect<Action> {
            Effect::Cancellable {
                id,
                effect: Box::new(self),
            }
        }

        /// Dispatch `action` immediately as an effect
        #[must_use]
        pub fn send(action: Action) -> Effect<Action>
        where
            Action: Send + 'static,
        {
            Effect::Future(Box::pin(async move { Some(action) }))
        }

        /// True if this effect does nothing
        #[must_use]
        pub fn is_none(&self) -> bool {
            match self {
                Effect::None => true,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    effects.iter().all(Effect::is_none)
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

#[cfg(test)]
mod tests {
    use super::effect::{Effect, EffectId};

    #[derive(Clone, Debug, PartialEq)]
    enum Ping {
        Pong,
    }

    #[test]
    fn none_is_none_even_when_nested() {
        let effect: Effect<Ping> = Effect::Parallel(vec![
            Effect::None,
            Effect::Sequential(vec![Effect::None]),
        ]);
        assert!(effect.is_none());
        assert!(!Effect::send(Ping::Pong).is_none());
    }

    #[test]
    fn cancellable_wraps_effect() {
        let effect = Effect::send(Ping::Pong).cancellable(EffectId::new("poll"));
        match effect {
            Effect::Cancellable { id, effect } => {
                assert_eq!(id.as_str(), "poll");
                assert!(matches!(*effect, Effect::Future(_)));
            },
            other => unreachable!("unexpected effect {other:?}"),
        }
    }

    #[test]
    fn effect_ids_compare_by_name() {
        assert_eq!(EffectId::new("poll"), EffectId::owned("poll"));
        assert_eq!(EffectId::new("poll").to_string(), "poll");
    }

    #[tokio::test]
    async fn send_effect_yields_action() {
        let Effect::Future(fut) = Effect::send(Ping::Pong) else {
            unreachable!("send always builds a future");
        };
        assert_eq!(fut.await, Some(Ping::Pong));
    }
}
