//! Ticket purchase and the payment gateway round trip.
//!
//! A paid checkout leaves the app: the backend opens a gateway session, the
//! shell hands off to the hosted page, and the gateway later sends the user
//! back to a `/payment/*` route. That return is handled as a resumable flow
//! keyed by the transaction id. Reconciling a transaction is idempotent: once
//! a transaction is confirmed, returning to its success route again does not
//! refetch anything.
//!
//! Free events skip the gateway and create the booking directly.

use crate::api::{BookingRequest, PaymentIntent};
use crate::app::{call, fire, AppAction, AppEnvironment, AppState, Effects};
use crate::error::ApiError;
use crate::features::navigation::NavigationAction;
use crate::features::session::SessionAction;
use crate::gateway::{FailureReason, GatewayRedirect, GatewayReturn, SuccessReturn};
use crate::notice::{notify, report, NoticeLevel};
use crate::pricing::{self, PriceBreakdown};
use crate::routes::Route;
use crate::types::{Booking, BookingId, Event, EventId, EventStatus, Money, Package, PackageId, TransactionId};
use eventhub_core::effect::{Effect, EffectId};
use eventhub_core::{reducer::Reducer, smallvec, SmallVec};
use std::collections::HashMap;
use std::sync::Arc;

/// Payment method recorded for bookings that skip the gateway
pub const FREE_PAYMENT_METHOD: &str = "free";

/// Key of the reconcile effect for one transaction
#[must_use]
pub fn reconcile_id(transaction: &TransactionId) -> EffectId {
    EffectId::owned(format!("checkout-reconcile-{transaction}"))
}

/// Where the checkout flow is
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CheckoutPhase {
    /// Nothing open
    #[default]
    Idle,
    /// Event and packages loading
    Loading,
    /// Choosing a package and quantity
    Selecting,
    /// Payment intent or free booking in flight
    Submitting,
    /// Handed off to the gateway
    AwaitingGateway {
        /// Gateway session
        transaction_id: TransactionId,
    },
    /// Back from the gateway, confirming with the backend
    Reconciling {
        /// Transaction being confirmed
        transaction_id: TransactionId,
    },
    /// Booking recorded
    Confirmed {
        /// The booking
        booking: Booking,
    },
    /// Something went wrong; `Retry` goes back to selection
    Failed {
        /// Shown to the user
        message: String,
    },
    /// The user cancelled at the gateway
    Cancelled,
}

/// Checkout slice
#[derive(Clone, Debug)]
pub struct CheckoutState {
    /// Event being bought
    pub event_id: Option<EventId>,
    /// Loaded event
    pub event: Option<Event>,
    /// Its packages
    pub packages: Vec<Package>,
    /// Chosen package
    pub selected_package: Option<PackageId>,
    /// Tickets
    pub quantity: u32,
    /// Flow position
    pub phase: CheckoutPhase,
    /// Transactions already confirmed, with their booking
    pub confirmed: HashMap<TransactionId, BookingId>,
}

impl Default for CheckoutState {
    fn default() -> Self {
        Self {
            event_id: None,
            event: None,
            packages: Vec::new(),
            selected_package: None,
            quantity: 1,
            phase: CheckoutPhase::Idle,
            confirmed: HashMap::new(),
        }
    }
}

impl CheckoutState {
    /// The chosen package
    #[must_use]
    pub fn selected(&self) -> Option<&Package> {
        let id = self.selected_package.as_ref()?;
        self.packages.iter().find(|p| p.id == *id)
    }

    /// Price of one ticket: the package price, or the event price without packages
    #[must_use]
    pub fn unit_price(&self) -> Option<Money> {
        match self.selected() {
            Some(package) => Some(package.price),
            None => self.event.as_ref().map(|e| e.price),
        }
    }

    /// Tickets left for the current selection
    #[must_use]
    pub fn available(&self) -> u32 {
        let slots = self.event.as_ref().map_or(0, |e| e.available_slots);
        match self.selected() {
            Some(package) => slots.min(package.available_bookings),
            None => slots,
        }
    }

    /// Largest quantity the user may pick
    #[must_use]
    pub fn max_quantity(&self, per_order_limit: u32) -> u32 {
        per_order_limit.min(self.available()).max(1)
    }

    /// Price of the current selection
    #[must_use]
    pub fn quote(&self, fee_bps: u32) -> Option<PriceBreakdown> {
        pricing::quote(self.unit_price()?, self.quantity, fee_bps)
    }
}

/// Checkout actions
#[derive(Clone, Debug)]
pub enum CheckoutAction {
    /// Start buying tickets for an event
    Open {
        /// Event
        event_id: EventId,
    },
    /// Event and packages fetched
    Loaded {
        /// Event
        event: Event,
        /// Packages
        packages: Vec<Package>,
    },
    /// Event could not be loaded
    LoadFailed {
        /// Backend error
        error: ApiError,
    },
    /// Choose a package
    SelectPackage {
        /// Package
        package_id: PackageId,
    },
    /// Choose how many tickets
    SetQuantity {
        /// Requested quantity, clamped to what is allowed
        quantity: u32,
    },
    /// Pay, or book directly when free
    Submit,
    /// Gateway session opened
    PaymentInitiated {
        /// Where to send the user
        redirect: GatewayRedirect,
    },
    /// Free booking recorded
    BookingCreated {
        /// The booking
        booking: Booking,
    },
    /// Payment intent or free booking refused
    SubmitFailed {
        /// Backend error
        error: ApiError,
    },
    /// The gateway sent the user back
    GatewayReturned {
        /// Parsed return route
        ret: GatewayReturn,
    },
    /// Backend confirmed the booking for a transaction
    Reconciled {
        /// Transaction
        transaction_id: TransactionId,
        /// Recorded booking
        booking: Booking,
    },
    /// The transaction could not be matched to a booking
    ReconcileFailed {
        /// Transaction
        transaction_id: TransactionId,
        /// Shown to the user
        message: String,
    },
    /// Clear the error and choose again
    Retry,
    /// Leave checkout
    Reset,
}

/// Owns [`CheckoutState`]
#[derive(Clone, Copy, Debug, Default)]
pub struct CheckoutReducer;

impl Reducer for CheckoutReducer {
    type State = AppState;
    type Action = AppAction;
    type Environment = AppEnvironment;

    fn reduce(&self, state: &mut AppState, action: AppAction, env: &AppEnvironment) -> Effects {
        let action = match action {
            AppAction::Checkout(action) => action,
            AppAction::Session(SessionAction::Logout | SessionAction::Expired) => {
                return reset(&mut state.checkout);
            },
            _ => return SmallVec::new(),
        };

        match action {
            CheckoutAction::Open { event_id } => {
                let checkout = &mut state.checkout;
                let mut effects = reset(checkout);
                checkout.event_id = Some(event_id.clone());
                checkout.phase = CheckoutPhase::Loading;

                let api = Arc::clone(&env.api);
                effects.push(call(
                    async move {
                        futures::try_join!(api.get_event(&event_id), api.list_packages(&event_id))
                    },
                    |(event, packages)| CheckoutAction::Loaded { event, packages }.into(),
                    |error| CheckoutAction::LoadFailed { error }.into(),
                ));
                effects
            },

            CheckoutAction::Loaded { event, packages } => {
                let checkout = &mut state.checkout;
                if checkout.event_id.as_ref() != Some(&event.id) {
                    return SmallVec::new();
                }
                checkout.selected_package = packages
                    .iter()
                    .find(|p| p.is_bookable())
                    .map(|p| p.id.clone());
                checkout.event = Some(event);
                checkout.packages = packages;
                checkout.quantity = 1;
                checkout.phase = CheckoutPhase::Selecting;
                SmallVec::new()
            },

            CheckoutAction::LoadFailed { error } => {
                state.checkout.phase = CheckoutPhase::Failed {
                    message: error.to_string(),
                };
                smallvec![report(&error)]
            },

            CheckoutAction::SelectPackage { package_id } => {
                let checkout = &mut state.checkout;
                let Some(package) = checkout.packages.iter().find(|p| p.id == package_id) else {
                    return smallvec![notify(NoticeLevel::Error, "That package is not available")];
                };
                if !package.is_bookable() {
                    return smallvec![notify(
                        NoticeLevel::Error,
                        format!("{} is sold out", package.name)
                    )];
                }
                checkout.selected_package = Some(package_id);
                checkout.quantity = checkout
                    .quantity
                    .min(checkout.max_quantity(env.config.max_tickets_per_order));
                SmallVec::new()
            },

            CheckoutAction::SetQuantity { quantity } => {
                let checkout = &mut state.checkout;
                let max = checkout.max_quantity(env.config.max_tickets_per_order);
                checkout.quantity = quantity.clamp(1, max);
                SmallVec::new()
            },

            CheckoutAction::Submit => submit(state, env),

            CheckoutAction::PaymentInitiated { redirect } => {
                tracing::info!(
                    transaction = %redirect.transaction_id,
                    method = ?redirect.method,
                    "Handing off to the payment gateway"
                );
                state.checkout.phase = CheckoutPhase::AwaitingGateway {
                    transaction_id: redirect.transaction_id.clone(),
                };
                let navigator = Arc::clone(&env.navigator);
                smallvec![fire(move || navigator.redirect_external(&redirect))]
            },

            CheckoutAction::BookingCreated { booking } => {
                tracing::info!(booking = %booking.id, "Free booking created");
                let route = Route::BookingSuccess(booking.id.clone());
                state.checkout.phase = CheckoutPhase::Confirmed { booking };
                smallvec![
                    notify(NoticeLevel::Success, "Booking confirmed!"),
                    Effect::send(NavigationAction::Navigate { route }.into()),
                ]
            },

            CheckoutAction::SubmitFailed { error } => {
                state.checkout.phase = CheckoutPhase::Failed {
                    message: error.to_string(),
                };
                smallvec![report(&error)]
            },

            CheckoutAction::GatewayReturned { ret } => gateway_returned(state, ret, env),

            CheckoutAction::Reconciled {
                transaction_id,
                booking,
            } => {
                let checkout = &mut state.checkout;
                tracing::info!(transaction = %transaction_id, booking = %booking.id, "Payment reconciled");
                checkout
                    .confirmed
                    .insert(transaction_id.clone(), booking.id.clone());
                let current = matches!(
                    &checkout.phase,
                    CheckoutPhase::Reconciling { transaction_id: t } if *t == transaction_id
                );
                if !current {
                    return SmallVec::new();
                }
                checkout.phase = CheckoutPhase::Confirmed { booking };
                smallvec![notify(
                    NoticeLevel::Success,
                    "Payment successful! Your booking is confirmed."
                )]
            },

            CheckoutAction::ReconcileFailed {
                transaction_id,
                message,
            } => {
                tracing::error!(transaction = %transaction_id, %message, "Payment could not be reconciled");
                state.checkout.phase = CheckoutPhase::Failed {
                    message: message.clone(),
                };
                smallvec![notify(NoticeLevel::Error, message)]
            },

            CheckoutAction::Retry => {
                let checkout = &mut state.checkout;
                if !matches!(
                    checkout.phase,
                    CheckoutPhase::Failed { .. } | CheckoutPhase::Cancelled
                ) {
                    return SmallVec::new();
                }
                checkout.phase = if checkout.event.is_some() {
                    CheckoutPhase::Selecting
                } else {
                    CheckoutPhase::Idle
                };
                match (&checkout.phase, checkout.event_id.clone()) {
                    (CheckoutPhase::Idle, Some(event_id)) => {
                        smallvec![Effect::send(CheckoutAction::Open { event_id }.into())]
                    },
                    _ => SmallVec::new(),
                }
            },

            CheckoutAction::Reset => reset(&mut state.checkout),
        }
    }
}

/// Clear the flow, keeping the record of confirmed transactions
fn reset(checkout: &mut CheckoutState) -> Effects {
    let mut effects = Effects::new();
    if let CheckoutPhase::Reconciling { transaction_id } = &checkout.phase {
        effects.push(Effect::Cancel(reconcile_id(transaction_id)));
    }
    let confirmed = std::mem::take(&mut checkout.confirmed);
    *checkout = CheckoutState {
        confirmed,
        ..CheckoutState::default()
    };
    effects
}

fn submit(state: &mut AppState, env: &AppEnvironment) -> Effects {
    let checkout = &mut state.checkout;
    if checkout.phase != CheckoutPhase::Selecting {
        tracing::debug!(phase = ?checkout.phase, "Ignoring submit outside selection");
        return SmallVec::new();
    }
    let Some(event) = checkout.event.as_ref() else {
        return SmallVec::new();
    };

    if state.session.user.is_none() {
        tracing::debug!(event = %event.id, "Checkout needs a signed-in user");
        let route = Route::Checkout(event.id.clone()).login_then();
        return smallvec![Effect::send(NavigationAction::Navigate { route }.into())];
    }

    if event.status == EventStatus::Cancelled {
        return smallvec![notify(NoticeLevel::Error, "This event has been cancelled")];
    }
    if event.has_ended(env.now()) {
        return smallvec![notify(NoticeLevel::Error, "This event has already ended")];
    }
    if checkout.available() < checkout.quantity {
        return smallvec![notify(NoticeLevel::Error, "Not enough tickets left")];
    }
    let Some(price) = checkout.quote(env.config.processing_fee_bps) else {
        return smallvec![notify(NoticeLevel::Error, "Order total is too large")];
    };

    let event_id = event.id.clone();
    let package_id = checkout.selected_package.clone();
    let quantity = checkout.quantity;
    checkout.phase = CheckoutPhase::Submitting;
    let api = Arc::clone(&env.api);

    if price.is_free() {
        let request = BookingRequest {
            event_id,
            package_id,
            quantity,
            total_amount: Money::ZERO,
            payment_method: FREE_PAYMENT_METHOD.to_string(),
        };
        return smallvec![call(
            async move { api.create_booking(&request).await },
            |booking| CheckoutAction::BookingCreated { booking }.into(),
            |error| CheckoutAction::SubmitFailed { error }.into(),
        )];
    }

    let intent = PaymentIntent {
        event_id,
        package_id,
        quantity,
        amount: price.total,
        currency: env.config.currency.clone(),
    };
    tracing::info!(event = %intent.event_id, quantity, amount = %intent.amount, "Initiating payment");
    smallvec![call(
        async move { api.initiate_payment(&intent).await },
        |redirect| CheckoutAction::PaymentInitiated { redirect }.into(),
        |error| CheckoutAction::SubmitFailed { error }.into(),
    )]
}

fn gateway_returned(state: &mut AppState, ret: GatewayReturn, env: &AppEnvironment) -> Effects {
    let checkout = &mut state.checkout;

    match ret {
        GatewayReturn::Success(success) => {
            let transaction_id = success.transaction_id.clone();
            if checkout.confirmed.contains_key(&transaction_id) {
                tracing::debug!(transaction = %transaction_id, "Transaction already confirmed");
                return SmallVec::new();
            }
            if matches!(
                &checkout.phase,
                CheckoutPhase::Reconciling { transaction_id: t } if *t == transaction_id
            ) {
                return SmallVec::new();
            }

            if checkout.event_id.is_none() {
                checkout.event_id.clone_from(&success.event_id);
            }
            checkout.phase = CheckoutPhase::Reconciling {
                transaction_id: transaction_id.clone(),
            };
            tracing::info!(transaction = %transaction_id, booking = ?success.booking_id, "Reconciling payment");

            let api = Arc::clone(&env.api);
            let id = reconcile_id(&transaction_id);
            let on_ok = transaction_id.clone();
            let on_err = transaction_id;
            smallvec![call(
                reconcile(api, success),
                move |outcome| match outcome {
                    Reconciliation::Booked(booking) => CheckoutAction::Reconciled {
                        transaction_id: on_ok,
                        booking,
                    }
                    .into(),
                    Reconciliation::Unpaid(status) => {
                        tracing::warn!(transaction = %on_ok, %status, "Gateway reports the payment as unpaid");
                        CheckoutAction::ReconcileFailed {
                            transaction_id: on_ok,
                            message: FailureReason::ValidationFailed.message().to_string(),
                        }
                        .into()
                    },
                    Reconciliation::Missing => CheckoutAction::ReconcileFailed {
                        message: format!(
                            "Your payment ({on_ok}) was received but no booking was recorded. \
                             Please contact support with this transaction id."
                        ),
                        transaction_id: on_ok,
                    }
                    .into(),
                },
                move |error| CheckoutAction::ReconcileFailed {
                    message: format!(
                        "Could not confirm payment {on_err}: {error}. If you were charged, contact support."
                    ),
                    transaction_id: on_err,
                }
                .into(),
            )
            .cancellable(id)]
        },

        GatewayReturn::Failed {
            transaction_id,
            reason,
        } => {
            tracing::warn!(transaction = ?transaction_id, reason = ?reason.as_param(), "Payment failed at the gateway");
            let message = reason.message();
            checkout.phase = CheckoutPhase::Failed {
                message: message.to_string(),
            };
            smallvec![notify(NoticeLevel::Error, message)]
        },

        GatewayReturn::Cancelled { transaction_id } => {
            tracing::info!(transaction = ?transaction_id, "Payment cancelled at the gateway");
            checkout.phase = CheckoutPhase::Cancelled;
            smallvec![notify(NoticeLevel::Info, FailureReason::Cancelled.message())]
        },
    }
}

enum Reconciliation {
    Booked(Booking),
    Unpaid(String),
    Missing,
}

/// Find the booking behind a successful gateway return
///
/// Uses the booking id the gateway passed along, and falls back to the
/// payment status when there is none or it cannot be fetched.
async fn reconcile(
    api: Arc<dyn crate::api::BackendApi>,
    success: SuccessReturn,
) -> Result<Reconciliation, ApiError> {
    if let Some(id) = &success.booking_id {
        match api.get_booking(id).await {
            Ok(booking) => return Ok(Reconciliation::Booked(booking)),
            Err(error @ ApiError::Unauthorized(_)) => return Err(error),
            Err(error) => {
                tracing::warn!(booking = %id, %error, "Returned booking not found, checking payment status");
            },
        }
    }

    let status = api.payment_status(&success.transaction_id).await?;
    if !status.is_paid() {
        return Ok(Reconciliation::Unpaid(status.status));
    }
    Ok(status
        .booking
        .map_or(Reconciliation::Missing, Reconciliation::Booked))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::api::BearerToken;
    use crate::features::session::SessionState;
    use crate::mocks::{self, test_environment};
    use crate::notice::NoticeAction;
    use crate::types::Role;
    use eventhub_testing::{assertions, helpers::resolve_effects, ReducerTest};

    fn selecting(price: i64) -> AppState {
        let event = mocks::event("e1", price);
        let package = mocks::package("p1", "e1", price);
        AppState {
            checkout: CheckoutState {
                event_id: Some(event.id.clone()),
                selected_package: Some(package.id.clone()),
                event: Some(event),
                packages: vec![package],
                quantity: 1,
                phase: CheckoutPhase::Selecting,
                ..CheckoutState::default()
            },
            ..AppState::default()
        }
    }

    fn signed_in(mut state: AppState) -> AppState {
        state.session = SessionState {
            user: Some(mocks::user("u1", Role::User)),
            token: Some(BearerToken::new("token-u1")),
            ..SessionState::default()
        };
        state
    }

    fn success(transaction: &str, booking: Option<&str>) -> GatewayReturn {
        GatewayReturn::Success(SuccessReturn {
            transaction_id: TransactionId::new(transaction),
            status: "VALID".to_string(),
            amount: None,
            event_id: Some(EventId::new("e1")),
            package_id: None,
            booking_id: booking.map(BookingId::new),
        })
    }

    #[tokio::test]
    async fn open_preselects_first_bookable_package() {
        let (env, backend, _) = test_environment();
        backend.insert_event(mocks::event("e1", 100));
        let mut sold_out = mocks::package("p1", "e1", 50);
        sold_out.available_bookings = 0;
        backend.insert_package(sold_out);
        backend.insert_package(mocks::package("p2", "e1", 100));
        let mut state = AppState::default();

        let effects = CheckoutReducer.reduce(
            &mut state,
            CheckoutAction::Open { event_id: EventId::new("e1") }.into(),
            &env,
        );
        assert_eq!(state.checkout.phase, CheckoutPhase::Loading);
        for action in resolve_effects(effects).await {
            let _ = CheckoutReducer.reduce(&mut state, action, &env);
        }

        assert_eq!(state.checkout.phase, CheckoutPhase::Selecting);
        assert_eq!(state.checkout.selected_package, Some(PackageId::new("p2")));
    }

    #[test]
    fn quantity_is_clamped_to_order_limit_and_inventory() {
        let (env, _, _) = test_environment();
        let mut state = selecting(100);
        state.checkout.packages[0].available_bookings = 4;

        ReducerTest::new(CheckoutReducer)
            .with_env(env.clone())
            .given_state(state.clone())
            .when_action(CheckoutAction::SetQuantity { quantity: 50 }.into())
            .then_state(|state| assert_eq!(state.checkout.quantity, 4))
            .run();

        ReducerTest::new(CheckoutReducer)
            .with_env(env)
            .given_state(state)
            .when_action(CheckoutAction::SetQuantity { quantity: 0 }.into())
            .then_state(|state| assert_eq!(state.checkout.quantity, 1))
            .run();
    }

    #[test]
    fn sold_out_package_cannot_be_selected() {
        let (env, _, _) = test_environment();
        let mut state = selecting(100);
        let mut sold_out = mocks::package("p2", "e1", 100);
        sold_out.available_bookings = 0;
        state.checkout.packages.push(sold_out);

        ReducerTest::new(CheckoutReducer)
            .with_env(env)
            .given_state(state)
            .when_action(CheckoutAction::SelectPackage { package_id: PackageId::new("p2") }.into())
            .then_state(|state| {
                assert_eq!(state.checkout.selected_package, Some(PackageId::new("p1")));
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[tokio::test]
    async fn guest_submit_redirects_to_login_without_paying() {
        let (env, backend, _) = test_environment();
        let mut state = selecting(100);

        let effects = CheckoutReducer.reduce(&mut state, CheckoutAction::Submit.into(), &env);
        let actions = resolve_effects(effects).await;

        assert!(matches!(
            &actions[..],
            [AppAction::Navigation(NavigationAction::Navigate { route: Route::Login { redirect: Some(r) } })]
                if r == "/checkout/e1"
        ));
        assert_eq!(state.checkout.phase, CheckoutPhase::Selecting);
        assert_eq!(backend.count("initiate_payment"), 0);
    }

    #[tokio::test]
    async fn paid_submit_sends_the_quoted_total() {
        let (env, backend, _) = test_environment();
        let mut state = signed_in(selecting(100));
        state.checkout.quantity = 3;

        let effects = CheckoutReducer.reduce(&mut state, CheckoutAction::Submit.into(), &env);
        assert_eq!(state.checkout.phase, CheckoutPhase::Submitting);
        let actions = resolve_effects(effects).await;

        let intent = backend.intents().pop().unwrap();
        assert_eq!(intent.amount, Money::from_cents(30_750));
        assert_eq!(intent.quantity, 3);
        assert_eq!(intent.currency, "BDT");
        assert!(matches!(
            &actions[..],
            [AppAction::Checkout(CheckoutAction::PaymentInitiated { .. })]
        ));
    }

    #[tokio::test]
    async fn free_submit_books_directly() {
        let (env, backend, _) = test_environment();
        let mut state = signed_in(selecting(0));

        let effects = CheckoutReducer.reduce(&mut state, CheckoutAction::Submit.into(), &env);
        let actions = resolve_effects(effects).await;

        assert_eq!(backend.count("initiate_payment"), 0);
        assert_eq!(backend.count("create_booking"), 1);
        let [created] = <[AppAction; 1]>::try_from(actions).unwrap();
        let effects = CheckoutReducer.reduce(&mut state, created, &env);
        assert!(matches!(state.checkout.phase, CheckoutPhase::Confirmed { .. }));
        assert!(resolve_effects(effects).await.iter().any(|a| matches!(
            a,
            AppAction::Navigation(NavigationAction::Navigate { route: Route::BookingSuccess(_) })
        )));
    }

    #[tokio::test]
    async fn payment_initiated_hands_off_to_the_gateway() {
        let (env, _, navigator) = test_environment();
        let mut state = signed_in(selecting(100));
        let redirect = GatewayRedirect {
            transaction_id: TransactionId::new("tran-1"),
            gateway_url: "https://sandbox.gateway.test/pay".to_string(),
            method: crate::gateway::RedirectMethod::Redirect,
            fields: Default::default(),
        };

        let effects = CheckoutReducer.reduce(
            &mut state,
            CheckoutAction::PaymentInitiated { redirect: redirect.clone() }.into(),
            &env,
        );
        let _ = resolve_effects(effects).await;

        assert_eq!(
            state.checkout.phase,
            CheckoutPhase::AwaitingGateway {
                transaction_id: TransactionId::new("tran-1")
            }
        );
        assert_eq!(navigator.redirects(), vec![redirect]);
    }

    #[tokio::test]
    async fn success_return_reconciles_through_the_booking() {
        let (env, backend, _) = test_environment();
        backend.insert_booking(mocks::booking("b1", "e1", "u1"));
        let mut state = signed_in(AppState::default());

        let effects = CheckoutReducer.reduce(
            &mut state,
            CheckoutAction::GatewayReturned { ret: success("tran-1", Some("b1")) }.into(),
            &env,
        );
        assertions::assert_has_cancellable(&effects, &reconcile_id(&TransactionId::new("tran-1")));
        for action in resolve_effects(effects).await {
            let _ = CheckoutReducer.reduce(&mut state, action, &env);
        }

        assert!(matches!(&state.checkout.phase, CheckoutPhase::Confirmed { booking } if booking.id.as_str() == "b1"));
        assert_eq!(backend.count("payment_status"), 0);
    }

    #[tokio::test]
    async fn second_return_for_a_confirmed_transaction_does_nothing() {
        let (env, backend, _) = test_environment();
        let mut state = signed_in(AppState::default());
        state
            .checkout
            .confirmed
            .insert(TransactionId::new("tran-1"), BookingId::new("b1"));

        let effects = CheckoutReducer.reduce(
            &mut state,
            CheckoutAction::GatewayReturned { ret: success("tran-1", Some("b1")) }.into(),
            &env,
        );
        assertions::assert_no_effects(&effects);
        assert!(resolve_effects(effects).await.is_empty());
        assert_eq!(backend.count("get_booking"), 0);
    }

    #[tokio::test]
    async fn charged_without_booking_names_the_transaction() {
        let (env, backend, _) = test_environment();
        backend.set_payment_status("tran-9", "VALID", None);
        let mut state = signed_in(AppState::default());

        let effects = CheckoutReducer.reduce(
            &mut state,
            CheckoutAction::GatewayReturned { ret: success("tran-9", None) }.into(),
            &env,
        );
        for action in resolve_effects(effects).await {
            let effects = CheckoutReducer.reduce(&mut state, action, &env);
            let _ = resolve_effects(effects).await;
        }

        let CheckoutPhase::Failed { message } = &state.checkout.phase else {
            panic!("expected failure, got {:?}", state.checkout.phase);
        };
        assert!(message.contains("tran-9"));
        assert!(message.contains("contact support"));
    }

    #[tokio::test]
    async fn failed_return_maps_the_reason() {
        let (env, _, _) = test_environment();
        let mut state = signed_in(selecting(100));

        let effects = CheckoutReducer.reduce(
            &mut state,
            CheckoutAction::GatewayReturned {
                ret: GatewayReturn::Failed {
                    transaction_id: Some(TransactionId::new("tran-1")),
                    reason: FailureReason::InsufficientFunds,
                },
            }
            .into(),
            &env,
        );
        let actions = resolve_effects(effects).await;
        assert!(matches!(
            &actions[..],
            [AppAction::Notice(NoticeAction::Push { message, .. })]
                if message == "Your payment was declined due to insufficient funds."
        ));

        let _ = CheckoutReducer.reduce(&mut state, CheckoutAction::Retry.into(), &env);
        assert_eq!(state.checkout.phase, CheckoutPhase::Selecting);
    }

    #[test]
    fn reset_cancels_reconciliation_but_remembers_confirmations() {
        let (env, _, _) = test_environment();
        let mut state = AppState::default();
        state.checkout.phase = CheckoutPhase::Reconciling {
            transaction_id: TransactionId::new("tran-2"),
        };
        state
            .checkout
            .confirmed
            .insert(TransactionId::new("tran-1"), BookingId::new("b1"));

        ReducerTest::new(CheckoutReducer)
            .with_env(env)
            .given_state(state)
            .when_action(CheckoutAction::Reset.into())
            .then_state(|state| {
                assert_eq!(state.checkout.phase, CheckoutPhase::Idle);
                assert_eq!(state.checkout.confirmed.len(), 1);
            })
            .then_effects(|effects| {
                assertions::assert_cancels(effects, &reconcile_id(&TransactionId::new("tran-2")));
            })
            .run();
    }

    #[test]
    fn quote_uses_the_selected_package() {
        let mut state = selecting(100);
        state.checkout.quantity = 3;
        let price = state.checkout.quote(250).unwrap();
        assert_eq!(price.total.to_string(), "307.50");

        state.checkout.selected_package = None;
        state.checkout.event.as_mut().unwrap().price = Money::from_major(10);
        assert_eq!(state.checkout.quote(0).unwrap().total, Money::from_major(30));
    }
}
