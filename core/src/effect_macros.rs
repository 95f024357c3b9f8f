//! Declarative macros for ergonomic effect construction
//!
//! Feature reducers build most of their effects from an async block that
//! calls the backend and maps the result to a follow-up action. These macros
//! remove the `Box::pin` noise from that pattern.

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use eventhub_core::async_effect;
///
/// let api = Arc::clone(&env.api);
/// async_effect! {
///     match api.list_events(&query).await {
///         Ok(events) => Some(CatalogAction::EventsLoaded { events }),
///         Err(error) => Some(CatalogAction::LoadFailed { message: error.to_string() }),
///     }
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Delay` for scheduling delayed actions
///
/// # Example
///
/// ```rust,ignore
/// use eventhub_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     duration: Duration::from_secs(5),
///     action: BookingsAction::PollTick
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}
