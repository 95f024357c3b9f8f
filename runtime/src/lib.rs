//! # EventHub Runtime
//!
//! Runtime implementation for the EventHub client.
//!
//! This crate provides the Store runtime that coordinates reducer execution
//! and effect handling.
//!
//! ## Core Components
//!
//! - **Store**: The runtime that manages state and executes effects
//! - **Effect Executor**: Executes effect descriptions and feeds actions back to reducers
//! - **Cancellation**: Keyed effects (timers, polls) that can be stopped by id
//!
//! ## Example
//!
//! ```ignore
//! use eventhub_runtime::Store;
//!
//! let store = Store::new(AppState::default(), app_reducer(), environment);
//!
//! // Send an action
//! store.send(AppAction::Navigate { target: "/events".into() }).await?;
//!
//! // Read state
//! let count = store.state(|s| s.catalog.events.len()).await;
//! ```

use eventhub_core::{
    effect::{Effect, EffectId},
    reducer::Reducer,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, RwLock};

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// Returned when `send()` is called after shutdown was initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for a matching action
        ///
        /// Returned by `send_and_wait_for` when the timeout expires before
        /// a matching action is observed.
        #[error("Timeout waiting for action")]
        Timeout,

        /// Action broadcast channel closed
        #[error("Action broadcast channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] to allow waiting for the effects of one
/// action to complete. An effect counts as complete once any action it
/// produced has been reduced.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(CatalogAction::LoadEvents.into()).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// // The events response has been applied to state
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new<A>(cancel: Option<CancelToken>) -> (Self, EffectTracking<A>) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: tx,
            cancel,
            _action: std::marker::PhantomData,
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    #[must_use]
    pub fn completed() -> Self {
        let (tx, rx) = watch::channel(());
        let _ = tx.send(());

        Self {
            effects: Arc::new(AtomicUsize::new(0)),
            completion: rx,
        }
    }

    /// Number of effects still running for this action
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                // Every tracker dropped, so nothing can still be running
                break;
            }
        }
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires before all effects complete.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Receiving side of a cancellation signal for one keyed effect
#[derive(Clone)]
struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
    fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                // Sender dropped without cancelling: this effect can no longer be cancelled
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Internal: Effect tracking context passed through effect execution
struct EffectTracking<A> {
    counter: Arc<AtomicUsize>,
    notifier: watch::Sender<()>,
    cancel: Option<CancelToken>,
    _action: std::marker::PhantomData<fn() -> A>,
}

impl<A> EffectTracking<A> {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.notifier.send(());
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn with_cancel(&self, cancel: CancelToken) -> Self {
        Self {
            counter: Arc::clone(&self.counter),
            notifier: self.notifier.clone(),
            cancel: Some(cancel),
            _action: std::marker::PhantomData,
        }
    }

    /// Run `fut` unless (or until) this tracking context is cancelled
    async fn guard<T>(&self, fut: impl std::future::Future<Output = Option<T>>) -> Option<T> {
        match self.cancel.clone() {
            Some(mut token) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        tracing::debug!("Effect cancelled before completion");
                        metrics::counter!("store.effects.cancelled").increment(1);
                        None
                    }
                    output = fut => output,
                }
            },
            None => fut.await,
        }
    }
}

impl<A> Clone for EffectTracking<A> {
    fn clone(&self) -> Self {
        Self {
            counter: Arc::clone(&self.counter),
            notifier: self.notifier.clone(),
            cancel: self.cancel.clone(),
            _action: std::marker::PhantomData,
        }
    }
}

/// Internal: RAII guard that decrements effect counter on drop
///
/// Ensures the effect counter is always decremented, even if the effect panics.
struct DecrementGuard<A>(EffectTracking<A>);

impl<A> Drop for DecrementGuard<A> {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Registry of live cancellable effects, keyed by [`EffectId`]
#[derive(Default)]
struct Cancellations {
    live: Mutex<HashMap<EffectId, watch::Sender<bool>>>,
}

impl Cancellations {
    /// Register `id`, cancelling any effect already registered under it
    fn register(&self, id: EffectId) -> CancelToken {
        let (tx, rx) = watch::channel(false);
        let previous = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), tx);
        if let Some(previous) = previous {
            tracing::trace!(effect_id = %id, "Replacing running cancellable effect");
            let _ = previous.send(true);
        }
        CancelToken(rx)
    }

    fn cancel(&self, id: &EffectId) -> bool {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        removed.is_some_and(|tx| tx.send(true).is_ok())
    }

    fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        drained
            .into_iter()
            .filter(|(_, tx)| tx.send(true).is_ok())
            .count()
    }
}

/// Store module - The runtime for reducers
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, Cancellations, DecrementGuard,
        Duration, Effect, EffectHandle, EffectTracking, Ordering, Reducer, RwLock, StoreError,
    };
    use tokio::sync::{broadcast, watch};

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (client logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop and cancellation)
    ///
    /// Every action is broadcast to subscribers after the reducer has applied
    /// it, so a renderer can redraw from [`Store::state`] on each message.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        cancellations: Arc<Cancellations>,
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        ///
        /// The action broadcast buffers 64 actions; use
        /// [`Store::with_broadcast_capacity`] for chattier renderers.
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_broadcast_capacity(initial_state, reducer, environment, 64)
        }

        /// Create a new Store with custom action broadcast capacity
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: E,
            capacity: usize,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(capacity.max(1));

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                cancellations: Arc::new(Cancellations::default()),
                action_broadcast,
            }
        }

        /// Initiate graceful shutdown of the store
        ///
        /// Rejects new actions, cancels every keyed effect (timers, polls),
        /// then waits for the remaining effects to finish.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
        /// pending effects complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            metrics::counter!("store.shutdown.initiated").increment(1);

            self.shutdown.store(true, Ordering::Release);
            let cancelled = self.cancellations.cancel_all();
            tracing::debug!(cancelled, "Cancelled keyed effects");

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(20);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(pending_effects = pending, "Shutdown timed out");
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Broadcasts the action to subscribers
        /// 4. Starts the returned effects (they may feed more actions back)
        ///
        /// `send()` returns after starting effect execution, not completion.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError>
        where
            R: Clone,
            E: Clone,
        {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.commands.total").increment(1);

            let (handle, tracking) = EffectHandle::new::<A>(None);

            let effects = {
                let mut state = self.state.write().await;
                let effects = self
                    .reducer
                    .reduce(&mut *state, action.clone(), &self.environment);
                tracing::trace!("Reducer completed, returned {} effects", effects.len());
                effects
            };

            let _ = self.action_broadcast.send(action);

            for effect in effects {
                self.execute_effect(effect, tracking.clone());
            }

            Ok(handle)
        }

        /// Send an action and wait for a matching action
        ///
        /// Subscribes before sending, so no follow-up action can be missed.
        /// The sent action itself is also observed, which lets a predicate
        /// match it when the reducer resolves the request synchronously.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`]: Timeout expired before a matching action was observed
        /// - [`StoreError::ChannelClosed`]: Action broadcast channel closed
        /// - [`StoreError::ShutdownInProgress`]: Store is shutting down
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            R: Clone,
            E: Clone,
            F: Fn(&A) -> bool,
        {
            let mut rx = self.action_broadcast.subscribe();

            self.send(action).await?;

            tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(action) if predicate(&action) => return Ok(action),
                        Ok(_) => {},
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Action observer lagged");
                        },
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(StoreError::ChannelClosed);
                        },
                    }
                }
            })
            .await
            .map_err(|_| StoreError::Timeout)?
        }

        /// Subscribe to every action processed by this store
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let unread = store.state(|s| s.notifications.unread_count()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Environment shared with every reducer call
        pub const fn environment(&self) -> &E {
            &self.environment
        }

        fn spawn_tracked<F>(&self, tracking: &EffectTracking<A>, work: F)
        where
            F: std::future::Future<Output = ()> + Send + 'static,
        {
            tracking.increment();
            self.pending_effects.fetch_add(1, Ordering::SeqCst);
            let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));
            let guard = DecrementGuard(tracking.clone());

            tokio::spawn(async move {
                let _guard = guard;
                let _pending_guard = pending_guard;
                work.await;
            });
        }

        /// Execute an effect with tracking
        ///
        /// Effect failures never halt the store. A panicking effect task is
        /// isolated by tokio and the [`DecrementGuard`] still releases its slot.
        #[allow(clippy::needless_pass_by_value)] // tracking is cloned into tasks
        #[allow(clippy::too_many_lines)]
        fn execute_effect(&self, effect: Effect<A>, tracking: EffectTracking<A>)
        where
            R: Clone,
            E: Clone,
        {
            if tracking.is_cancelled() {
                return;
            }

            match effect {
                Effect::None => {
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Future(fut) => {
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    let store = self.clone();
                    let inner = tracking.clone();

                    self.spawn_tracked(&tracking, async move {
                        if let Some(action) = inner.guard(fut).await {
                            tracing::trace!("Effect::Future produced an action");
                            let _ = store.send(action).await;
                        }
                    });
                },
                Effect::Delay { duration, action } => {
                    metrics::counter!("store.effects.executed", "type" => "delay").increment(1);
                    let store = self.clone();
                    let inner = tracking.clone();

                    self.spawn_tracked(&tracking, async move {
                        let fired = inner
                            .guard(async move {
                                tokio::time::sleep(duration).await;
                                Some(*action)
                            })
                            .await;
                        if let Some(action) = fired {
                            tracing::trace!(?duration, "Effect::Delay elapsed");
                            let _ = store.send(action).await;
                        }
                    });
                },
                Effect::Parallel(effects) => {
                    metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);
                    for effect in effects {
                        self.execute_effect(effect, tracking.clone());
                    }
                },
                Effect::Sequential(effects) => {
                    metrics::counter!("store.effects.executed", "type" => "sequential")
                        .increment(1);
                    let store = self.clone();
                    let inner = tracking.clone();

                    self.spawn_tracked(&tracking, async move {
                        for effect in effects {
                            if inner.is_cancelled() {
                                break;
                            }
                            let (sub_tx, mut sub_rx) = watch::channel(());
                            let sub_tracking = EffectTracking {
                                counter: Arc::new(AtomicUsize::new(0)),
                                notifier: sub_tx,
                                cancel: inner.cancel.clone(),
                                _action: std::marker::PhantomData,
                            };

                            store.execute_effect(effect, sub_tracking.clone());

                            while sub_tracking.counter.load(Ordering::SeqCst) > 0 {
                                if sub_rx.changed().await.is_err() {
                                    break;
                                }
                            }
                        }
                    });
                },
                Effect::Cancellable { id, effect } => {
                    metrics::counter!("store.effects.executed", "type" => "cancellable")
                        .increment(1);
                    tracing::trace!(effect_id = %id, "Registering cancellable effect");
                    let token = self.cancellations.register(id);
                    self.execute_effect(*effect, tracking.with_cancel(token));
                },
                Effect::Cancel(id) => {
                    metrics::counter!("store.effects.executed", "type" => "cancel").increment(1);
                    let cancelled = self.cancellations.cancel(&id);
                    tracing::debug!(effect_id = %id, cancelled, "Cancel requested");
                },
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                cancellations: Arc::clone(&self.cancellations),
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;
