//! Routing, guards, and per-route data loads.

use crate::api::EventQuery;
use crate::app::{fire, AppAction, AppEnvironment, AppState, Effects};
use crate::features::admin::AdminAction;
use crate::features::bookings::{BookingsAction, HighlightTarget};
use crate::features::catalog::CatalogAction;
use crate::features::checkout::CheckoutAction;
use crate::features::notifications::NotificationsAction;
use crate::features::organizer::OrganizerAction;
use crate::features::session::SessionAction;
use crate::gateway::GatewayRedirect;
use crate::notice::{notify, NoticeLevel};
use crate::routes::{guard, Access, GuardOutcome, Route};
use eventhub_core::{effect::Effect, reducer::Reducer, SmallVec};
use std::sync::Arc;

/// The shell the client runs in
///
/// A browser shell pushes history entries; the demo binary logs; tests record.
pub trait Navigator: Send + Sync {
    /// Show `route`
    fn navigate(&self, route: &Route);

    /// Leave the app for the hosted payment page
    fn redirect_external(&self, redirect: &GatewayRedirect);
}

/// Current route
#[derive(Clone, Debug)]
pub struct NavigationState {
    /// Route on screen
    pub current: Route,
    /// Guarded route requested while a stored session was still being checked
    pub pending: Option<Route>,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            current: Route::Home,
            pending: None,
        }
    }
}

/// Navigation actions
#[derive(Clone, Debug)]
pub enum NavigationAction {
    /// Open a raw path (address bar, link, gateway return)
    Open {
        /// Client path with query
        path: String,
    },
    /// Go to a parsed route
    Navigate {
        /// Target
        route: Route,
    },
}

/// Owns [`NavigationState`]
#[derive(Clone, Copy, Debug, Default)]
pub struct NavigationReducer;

impl Reducer for NavigationReducer {
    type State = AppState;
    type Action = AppAction;
    type Environment = AppEnvironment;

    fn reduce(&self, state: &mut AppState, action: AppAction, env: &AppEnvironment) -> Effects {
        match action {
            AppAction::Navigation(NavigationAction::Open { path }) => match Route::parse(&path) {
                Ok(route) => go(state, route, env),
                Err(error) => {
                    tracing::warn!(%path, %error, "Unusable path");
                    let mut effects = go(state, Route::NotFound(path), env);
                    effects.push(notify(NoticeLevel::Error, error.to_string()));
                    effects
                },
            },

            AppAction::Navigation(NavigationAction::Navigate { route }) => go(state, route, env),

            AppAction::Session(SessionAction::LoggedIn { .. }) => {
                let target = match &state.navigation.current {
                    Route::Login {
                        redirect: Some(path),
                    } => Route::parse(path).unwrap_or(Route::Home),
                    Route::Login { redirect: None } | Route::Register => Route::Home,
                    _ => return SmallVec::new(),
                };
                go(state, target, env)
            },

            AppAction::Session(SessionAction::Logout) => go(state, Route::Home, env),

            AppAction::Session(SessionAction::Expired) => {
                let current = state.navigation.current.clone();
                match current.access() {
                    Access::Public | Access::GuestOnly => SmallVec::new(),
                    // The session slice is already cleared, so the guard sends us to login
                    _ => go(state, current, env),
                }
            },

            AppAction::Session(
                SessionAction::CurrentUserLoaded { .. } | SessionAction::RestoreFailed { .. },
            ) => match state.navigation.pending.take() {
                Some(route) => go(state, route, env),
                None => SmallVec::new(),
            },

            _ => SmallVec::new(),
        }
    }
}

fn go(state: &mut AppState, requested: Route, env: &AppEnvironment) -> Effects {
    if state.session.restoring && requested.access() != Access::Public {
        tracing::debug!(route = %requested.path(), "Holding route until the session is restored");
        state.navigation.pending = Some(requested);
        return SmallVec::new();
    }

    let route = match guard(&requested, state.session.user.as_ref()) {
        GuardOutcome::Allow => requested,
        GuardOutcome::Redirect(to) => {
            tracing::debug!(from = %requested.path(), to = %to.path(), "Route guard redirect");
            to
        },
    };

    let previous = std::mem::replace(&mut state.navigation.current, route.clone());
    let mut effects = Effects::new();

    let navigator = Arc::clone(&env.navigator);
    let shown = route.clone();
    effects.push(fire(move || navigator.navigate(&shown)));

    if previous.watches_bookings() && !route.watches_bookings() {
        effects.push(Effect::send(BookingsAction::StopPolling.into()));
    }
    effects.extend(entry_loads(&route));
    effects
}

/// Loads a route triggers when it is entered
fn entry_loads(route: &Route) -> Vec<Effect<AppAction>> {
    let actions: Vec<AppAction> = match route {
        Route::Home | Route::Events => vec![
            CatalogAction::LoadEvents {
                query: EventQuery::default(),
            }
            .into(),
            CatalogAction::LoadCategories.into(),
        ],
        Route::EventDetail(id) => vec![CatalogAction::LoadEventDetail { id: id.clone() }.into()],
        Route::Categories | Route::CreateEvent => vec![CatalogAction::LoadCategories.into()],
        Route::CategoryDetail(id) => vec![CatalogAction::LoadCategory { id: id.clone() }.into()],
        Route::Profile => vec![SessionAction::LoadCurrentUser.into()],
        Route::MyBookings { highlight } => {
            let mut actions = vec![BookingsAction::Load.into()];
            if let Some(booking) = highlight {
                actions.push(
                    BookingsAction::StartHighlight {
                        target: HighlightTarget::Booking(booking.clone()),
                    }
                    .into(),
                );
            }
            actions
        },
        Route::BookingDetail(id) | Route::BookingSuccess(id) => {
            vec![BookingsAction::LoadOne { id: id.clone() }.into()]
        },
        Route::EditEvent(id) => vec![
            OrganizerAction::LoadForEdit { id: id.clone() }.into(),
            CatalogAction::LoadCategories.into(),
        ],
        Route::MyEvents => vec![OrganizerAction::LoadMyEvents.into()],
        Route::Checkout(event_id) => vec![CheckoutAction::Open {
            event_id: event_id.clone(),
        }
        .into()],
        Route::PaymentReturn(ret) => vec![CheckoutAction::GatewayReturned { ret: ret.clone() }.into()],
        Route::Notifications => vec![NotificationsAction::Load.into()],
        Route::Admin => vec![
            AdminAction::LoadUsers.into(),
            CatalogAction::LoadEvents {
                query: EventQuery::default(),
            }
            .into(),
        ],
        Route::Login { .. } | Route::Register | Route::NotFound(_) => Vec::new(),
    };
    actions.into_iter().map(Effect::send).collect()
}
