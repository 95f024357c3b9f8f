//! My bookings, cancellation, and the post-payment highlight poll.
//!
//! After a successful gateway return the booking may not be in the list yet.
//! The poll refetches the list every `poll_interval` until the expected
//! booking shows up, `poll_max_attempts` ticks have passed, or the user
//! leaves the bookings views. Every tick runs under the [`POLL`] effect id,
//! so `StopPolling` cancels whichever step is in flight.

use crate::app::{call, AppAction, AppEnvironment, AppState, Effects};
use crate::error::ApiError;
use crate::features::checkout::CheckoutAction;
use crate::features::session::SessionAction;
use crate::gateway::GatewayReturn;
use crate::listing::{self, BookingFilter, BookingSort};
use crate::notice::{notify, report, NoticeLevel};
use crate::types::{Booking, BookingId, BookingStatus, TransactionId};
use eventhub_core::effect::{Effect, EffectId};
use eventhub_core::{delay, reducer::Reducer, smallvec, SmallVec};
use std::sync::Arc;

/// Effect id of the highlight poll
pub const POLL: EffectId = EffectId::new("bookings-highlight-poll");

/// Reason sent when the user gives none
pub const DEFAULT_CANCEL_REASON: &str = "Cancelled by user";

/// Booking the poll is waiting for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HighlightTarget {
    /// Known booking id (the gateway passed `bookingId`)
    Booking(BookingId),
    /// Only the transaction is known
    Transaction(TransactionId),
}

impl HighlightTarget {
    /// Whether `booking` is the one being waited for
    #[must_use]
    pub fn matches(&self, booking: &Booking) -> bool {
        match self {
            Self::Booking(id) => booking.id == *id,
            Self::Transaction(tran) => booking.payment_reference.as_ref() == Some(tran),
        }
    }
}

/// Highlight poll progress
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Highlight {
    /// Booking waited for
    pub target: Option<HighlightTarget>,
    /// Booking found and highlighted
    pub highlighted: Option<BookingId>,
    /// Fetches made so far
    pub attempts: u32,
    /// Poll running
    pub polling: bool,
}

/// Bookings slice
#[derive(Clone, Debug, Default)]
pub struct BookingsState {
    /// My bookings, last fetched
    pub bookings: Vec<Booking>,
    /// Open booking
    pub current: Option<Booking>,
    /// Request in flight
    pub loading: bool,
    /// Client-side filter
    pub filter: BookingFilter,
    /// Client-side sort
    pub sort: BookingSort,
    /// Post-payment highlight
    pub highlight: Highlight,
    /// Booking whose cancellation is in flight
    pub cancelling: Option<BookingId>,
}

impl BookingsState {
    /// Bookings after the client-side filter and sort
    #[must_use]
    pub fn visible(&self) -> Vec<&Booking> {
        listing::visible_bookings(&self.bookings, &self.filter, self.sort)
    }

    /// Whether `id` is the highlighted booking
    #[must_use]
    pub fn is_highlighted(&self, id: &BookingId) -> bool {
        self.highlight.highlighted.as_ref() == Some(id)
    }

    fn find(&self, id: &BookingId) -> Option<&Booking> {
        self.bookings
            .iter()
            .chain(self.current.as_ref())
            .find(|b| b.id == *id)
    }
}

/// Bookings actions
#[derive(Clone, Debug)]
pub enum BookingsAction {
    /// Fetch my bookings
    Load,
    /// My bookings fetched
    Loaded {
        /// Bookings
        bookings: Vec<Booking>,
    },
    /// Fetch one booking
    LoadOne {
        /// Booking
        id: BookingId,
    },
    /// One booking fetched
    OneLoaded {
        /// Booking
        booking: Booking,
    },
    /// Cancel a booking
    Cancel {
        /// Booking
        id: BookingId,
        /// Why; blank uses the default reason
        reason: String,
    },
    /// Backend cancelled the booking
    Cancelled {
        /// Updated booking
        booking: Booking,
    },
    /// Change the client-side filter
    SetFilter {
        /// New filter
        filter: BookingFilter,
    },
    /// Change the client-side sort
    SetSort {
        /// New sort
        sort: BookingSort,
    },
    /// Wait for a booking to show up and highlight it
    StartHighlight {
        /// Booking to wait for
        target: HighlightTarget,
    },
    /// Poll step: refetch the list
    PollTick,
    /// Poll step: list refetched
    PollResult {
        /// Bookings
        bookings: Vec<Booking>,
    },
    /// Poll step failed
    PollFailed {
        /// Backend error
        error: ApiError,
    },
    /// Stop the poll
    StopPolling,
    /// A bookings request failed
    Failed {
        /// Backend error
        error: ApiError,
    },
}

/// Owns [`BookingsState`]
#[derive(Clone, Copy, Debug, Default)]
pub struct BookingsReducer;

impl Reducer for BookingsReducer {
    type State = AppState;
    type Action = AppAction;
    type Environment = AppEnvironment;

    #[allow(clippy::too_many_lines)]
    fn reduce(&self, state: &mut AppState, action: AppAction, env: &AppEnvironment) -> Effects {
        let action = match action {
            AppAction::Bookings(action) => action,
            AppAction::Checkout(CheckoutAction::GatewayReturned {
                ret: GatewayReturn::Success(success),
            }) => {
                if state.checkout.confirmed.contains_key(&success.transaction_id) {
                    tracing::debug!(transaction = %success.transaction_id, "Repeated return, poll not restarted");
                    return SmallVec::new();
                }
                let target = match success.booking_id {
                    Some(id) => HighlightTarget::Booking(id),
                    None => HighlightTarget::Transaction(success.transaction_id),
                };
                return start_highlight(&mut state.bookings, target);
            },
            AppAction::Checkout(
                CheckoutAction::BookingCreated { booking } | CheckoutAction::Reconciled { booking, .. },
            ) => {
                let bookings = &mut state.bookings;
                upsert(&mut bookings.bookings, booking);
                return check_highlight(bookings);
            },
            AppAction::Session(SessionAction::Logout | SessionAction::Expired) => {
                let was_polling = state.bookings.highlight.polling;
                state.bookings = BookingsState::default();
                return if was_polling {
                    smallvec![Effect::Cancel(POLL)]
                } else {
                    SmallVec::new()
                };
            },
            _ => return SmallVec::new(),
        };

        let bookings = &mut state.bookings;
        match action {
            BookingsAction::Load => {
                bookings.loading = true;
                let api = Arc::clone(&env.api);
                smallvec![call(
                    async move { api.my_bookings().await },
                    |bookings| BookingsAction::Loaded { bookings }.into(),
                    |error| BookingsAction::Failed { error }.into(),
                )]
            },

            BookingsAction::Loaded { bookings: fetched } => {
                bookings.loading = false;
                bookings.bookings = fetched;
                check_highlight(bookings)
            },

            BookingsAction::LoadOne { id } => {
                bookings.loading = true;
                let api = Arc::clone(&env.api);
                smallvec![call(
                    async move { api.get_booking(&id).await },
                    |booking| BookingsAction::OneLoaded { booking }.into(),
                    |error| BookingsAction::Failed { error }.into(),
                )]
            },

            BookingsAction::OneLoaded { booking } => {
                bookings.loading = false;
                bookings.current = Some(booking);
                SmallVec::new()
            },

            BookingsAction::Cancel { id, reason } => {
                let Some(booking) = bookings.find(&id) else {
                    return smallvec![notify(NoticeLevel::Error, "Booking not found")];
                };
                if !matches!(
                    booking.booking_status,
                    BookingStatus::Pending | BookingStatus::Confirmed
                ) {
                    return smallvec![notify(
                        NoticeLevel::Error,
                        "Only pending or confirmed bookings can be cancelled"
                    )];
                }
                if booking.event_date().is_some_and(|date| date <= env.now()) {
                    return smallvec![notify(
                        NoticeLevel::Error,
                        "This event has already started and can no longer be cancelled"
                    )];
                }
                if bookings.cancelling.is_some() {
                    return SmallVec::new();
                }

                let reason = match reason.trim() {
                    "" => DEFAULT_CANCEL_REASON.to_string(),
                    given => given.to_string(),
                };
                bookings.cancelling = Some(id.clone());
                let api = Arc::clone(&env.api);
                smallvec![call(
                    async move { api.cancel_booking(&id, &reason).await },
                    |booking| BookingsAction::Cancelled { booking }.into(),
                    |error| BookingsAction::Failed { error }.into(),
                )]
            },

            BookingsAction::Cancelled { booking } => {
                tracing::info!(booking = %booking.id, "Booking cancelled");
                bookings.cancelling = None;
                if let Some(current) = bookings.current.as_mut().filter(|c| c.id == booking.id) {
                    *current = booking.clone();
                }
                upsert(&mut bookings.bookings, booking);
                smallvec![notify(NoticeLevel::Success, "Booking cancelled")]
            },

            BookingsAction::SetFilter { filter } => {
                bookings.filter = filter;
                SmallVec::new()
            },

            BookingsAction::SetSort { sort } => {
                bookings.sort = sort;
                SmallVec::new()
            },

            BookingsAction::StartHighlight { target } => start_highlight(bookings, target),

            BookingsAction::PollTick => {
                if !bookings.highlight.polling {
                    return SmallVec::new();
                }
                bookings.highlight.attempts += 1;
                tracing::debug!(attempt = bookings.highlight.attempts, "Polling bookings");
                let api = Arc::clone(&env.api);
                smallvec![call(
                    async move { api.my_bookings().await },
                    |bookings| BookingsAction::PollResult { bookings }.into(),
                    |error| BookingsAction::PollFailed { error }.into(),
                )
                .cancellable(POLL)]
            },

            BookingsAction::PollResult { bookings: fetched } => {
                bookings.bookings = fetched;
                if !bookings.highlight.polling {
                    return SmallVec::new();
                }
                let mut effects = check_highlight(bookings);
                if !bookings.highlight.polling {
                    return effects;
                }
                if bookings.highlight.attempts >= env.config.poll_max_attempts {
                    tracing::info!(attempts = bookings.highlight.attempts, "Booking did not show up, giving up");
                    bookings.highlight.polling = false;
                    effects.push(notify(
                        NoticeLevel::Info,
                        "Your booking is still being processed. Check back in a few minutes.",
                    ));
                    return effects;
                }
                effects.push(
                    delay! {
                        duration: env.config.poll_interval,
                        action: BookingsAction::PollTick.into()
                    }
                    .cancellable(POLL),
                );
                effects
            },

            BookingsAction::PollFailed { error } => {
                bookings.highlight.polling = false;
                smallvec![report(&error)]
            },

            BookingsAction::StopPolling => {
                if !bookings.highlight.polling {
                    return SmallVec::new();
                }
                tracing::debug!("Bookings poll stopped");
                bookings.highlight.polling = false;
                smallvec![Effect::Cancel(POLL)]
            },

            BookingsAction::Failed { error } => {
                bookings.loading = false;
                bookings.cancelling = None;
                smallvec![report(&error)]
            },
        }
    }
}

fn start_highlight(bookings: &mut BookingsState, target: HighlightTarget) -> Effects {
    tracing::debug!(?target, "Waiting for booking to highlight");
    bookings.highlight = Highlight {
        target: Some(target),
        highlighted: None,
        attempts: 0,
        polling: true,
    };
    let mut effects = check_highlight(bookings);
    if bookings.highlight.polling {
        effects.push(Effect::send(BookingsAction::PollTick.into()).cancellable(POLL));
    }
    effects
}

/// Highlight the target if it is in the list, stopping the poll
fn check_highlight(bookings: &mut BookingsState) -> Effects {
    let Some(target) = &bookings.highlight.target else {
        return SmallVec::new();
    };
    let Some(found) = bookings.bookings.iter().find(|b| target.matches(b)) else {
        return SmallVec::new();
    };
    let id = found.id.clone();
    if bookings.is_highlighted(&id) {
        return SmallVec::new();
    }

    tracing::info!(booking = %id, attempts = bookings.highlight.attempts, "Booking highlighted");
    bookings.highlight.highlighted = Some(id);
    if bookings.highlight.polling {
        bookings.highlight.polling = false;
        return smallvec![Effect::Cancel(POLL)];
    }
    SmallVec::new()
}

fn upsert(bookings: &mut Vec<Booking>, booking: Booking) {
    match bookings.iter_mut().find(|b| b.id == booking.id) {
        Some(existing) => *existing = booking,
        None => bookings.insert(0, booking),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::{self, test_environment};
    use crate::gateway::SuccessReturn;
    use chrono::Duration;
    use eventhub_testing::{assertions, helpers::resolve_effects, ReducerTest};

    fn with_bookings(bookings: Vec<Booking>) -> AppState {
        AppState {
            bookings: BookingsState {
                bookings,
                ..BookingsState::default()
            },
            ..AppState::default()
        }
    }

    #[test]
    fn highlight_of_a_listed_booking_needs_no_poll() {
        let (env, _, _) = test_environment();
        ReducerTest::new(BookingsReducer)
            .with_env(env)
            .given_state(with_bookings(vec![mocks::booking("b1", "e1", "u1")]))
            .when_action(
                BookingsAction::StartHighlight {
                    target: HighlightTarget::Booking(BookingId::new("b1")),
                }
                .into(),
            )
            .then_state(|state| {
                assert!(state.bookings.is_highlighted(&BookingId::new("b1")));
                assert!(!state.bookings.highlight.polling);
            })
            .then_effects(|effects| assertions::assert_cancels(effects, &POLL))
            .run();
    }

    #[test]
    fn success_return_starts_the_poll() {
        let (env, _, _) = test_environment();
        ReducerTest::new(BookingsReducer)
            .with_env(env)
            .given_state(AppState::default())
            .when_action(
                CheckoutAction::GatewayReturned {
                    ret: GatewayReturn::Success(SuccessReturn {
                        transaction_id: TransactionId::new("tran-1"),
                        status: "VALID".to_string(),
                        amount: None,
                        event_id: None,
                        package_id: None,
                        booking_id: Some(BookingId::new("b7")),
                    }),
                }
                .into(),
            )
            .then_state(|state| {
                assert!(state.bookings.highlight.polling);
                assert_eq!(
                    state.bookings.highlight.target,
                    Some(HighlightTarget::Booking(BookingId::new("b7")))
                );
            })
            .then_effects(|effects| assertions::assert_has_cancellable(effects, &POLL))
            .run();
    }

    #[test]
    fn repeated_return_for_a_confirmed_transaction_does_not_poll() {
        let (env, _, _) = test_environment();
        let mut state = AppState::default();
        state
            .checkout
            .confirmed
            .insert(TransactionId::new("tran-1"), BookingId::new("b7"));
        ReducerTest::new(BookingsReducer)
            .with_env(env)
            .given_state(state)
            .when_action(
                CheckoutAction::GatewayReturned {
                    ret: GatewayReturn::Success(SuccessReturn {
                        transaction_id: TransactionId::new("tran-1"),
                        status: "VALID".to_string(),
                        amount: None,
                        event_id: None,
                        package_id: None,
                        booking_id: Some(BookingId::new("b7")),
                    }),
                }
                .into(),
            )
            .then_state(|state| {
                assert!(!state.bookings.highlight.polling);
                assert_eq!(state.bookings.highlight.target, None);
            })
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .run();
    }

    #[tokio::test]
    async fn poll_finds_the_booking_on_the_next_tick() {
        let (env, backend, _) = test_environment();
        backend.insert_booking(mocks::booking("b1", "e1", "u1"));
        let mut state = AppState::default();
        state.bookings.highlight = Highlight {
            target: Some(HighlightTarget::Booking(BookingId::new("b1"))),
            polling: true,
            ..Highlight::default()
        };

        let effects = BookingsReducer.reduce(&mut state, BookingsAction::PollTick.into(), &env);
        assertions::assert_has_cancellable(&effects, &POLL);
        for action in resolve_effects(effects).await {
            let effects = BookingsReducer.reduce(&mut state, action, &env);
            assertions::assert_cancels(&effects, &POLL);
        }

        assert!(state.bookings.is_highlighted(&BookingId::new("b1")));
        assert_eq!(state.bookings.highlight.attempts, 1);
    }

    #[test]
    fn poll_reschedules_until_the_limit() {
        let (env, _, _) = test_environment();
        let max = env.config.poll_max_attempts;
        let interval = env.config.poll_interval;
        let mut state = AppState::default();
        state.bookings.highlight = Highlight {
            target: Some(HighlightTarget::Booking(BookingId::new("b1"))),
            polling: true,
            attempts: 1,
            ..Highlight::default()
        };

        let effects = BookingsReducer.reduce(
            &mut state,
            BookingsAction::PollResult { bookings: Vec::new() }.into(),
            &env,
        );
        assert!(matches!(
            &effects[..],
            [Effect::Cancellable { id, effect }]
                if *id == POLL && matches!(**effect, Effect::Delay { duration, .. } if duration == interval)
        ));

        state.bookings.highlight.attempts = max;
        let _ = BookingsReducer.reduce(
            &mut state,
            BookingsAction::PollResult { bookings: Vec::new() }.into(),
            &env,
        );
        assert!(!state.bookings.highlight.polling);
        assert!(state.bookings.highlight.highlighted.is_none());
    }

    #[test]
    fn transaction_target_matches_the_payment_reference() {
        let mut booking = mocks::booking("b1", "e1", "u1");
        booking.payment_reference = Some(TransactionId::new("tran-1"));
        assert!(HighlightTarget::Transaction(TransactionId::new("tran-1")).matches(&booking));
        assert!(!HighlightTarget::Transaction(TransactionId::new("tran-2")).matches(&booking));
    }

    #[test]
    fn stop_polling_cancels_once() {
        let (env, _, _) = test_environment();
        let mut state = AppState::default();
        state.bookings.highlight.polling = true;

        let effects = BookingsReducer.reduce(&mut state, BookingsAction::StopPolling.into(), &env);
        assertions::assert_cancels(&effects, &POLL);
        let effects = BookingsReducer.reduce(&mut state, BookingsAction::StopPolling.into(), &env);
        assert!(effects.is_empty());
    }

    #[tokio::test]
    async fn cancel_sends_the_reason() {
        let (env, backend, _) = test_environment();
        backend.insert_booking(mocks::booking("b1", "e1", "u1"));
        let mut state = with_bookings(vec![mocks::booking("b1", "e1", "u1")]);

        let effects = BookingsReducer.reduce(
            &mut state,
            BookingsAction::Cancel {
                id: BookingId::new("b1"),
                reason: "  ".to_string(),
            }
            .into(),
            &env,
        );
        assert_eq!(state.bookings.cancelling, Some(BookingId::new("b1")));
        for action in resolve_effects(effects).await {
            let _ = BookingsReducer.reduce(&mut state, action, &env);
        }

        let booking = &state.bookings.bookings[0];
        assert_eq!(booking.booking_status, BookingStatus::Cancelled);
        assert_eq!(booking.cancellation_reason.as_deref(), Some(DEFAULT_CANCEL_REASON));
        assert!(state.bookings.cancelling.is_none());
    }

    #[test]
    fn started_events_cannot_be_cancelled() {
        let (env, _, _) = test_environment();
        let mut booking = mocks::booking("b1", "e1", "u1");
        if let crate::types::Ref::Embedded(event) = &mut booking.event {
            event.date = Some(env.now() - Duration::hours(1));
        }

        ReducerTest::new(BookingsReducer)
            .with_env(env)
            .given_state(with_bookings(vec![booking]))
            .when_action(
                BookingsAction::Cancel {
                    id: BookingId::new("b1"),
                    reason: "plans changed".to_string(),
                }
                .into(),
            )
            .then_state(|state| assert!(state.bookings.cancelling.is_none()))
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[test]
    fn cancelled_bookings_cannot_be_cancelled_again() {
        let (env, _, _) = test_environment();
        let mut booking = mocks::booking("b1", "e1", "u1");
        booking.booking_status = BookingStatus::Cancelled;

        ReducerTest::new(BookingsReducer)
            .with_env(env)
            .given_state(with_bookings(vec![booking]))
            .when_action(
                BookingsAction::Cancel {
                    id: BookingId::new("b1"),
                    reason: String::new(),
                }
                .into(),
            )
            .then_state(|state| assert!(state.bookings.cancelling.is_none()))
            .run();
    }
}
