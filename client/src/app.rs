//! Application state, actions, environment, and the combined reducer.
//!
//! Every feature reducer sees every [`AppAction`]. A feature owns one slice of
//! [`AppState`] and its own action enum, and may react to other features'
//! actions (bookings listen for gateway returns, navigation listens for
//! sign-in) without those features knowing about it.

use crate::api::{BackendApi, BearerToken};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::features::admin::{AdminAction, AdminReducer, AdminState};
use crate::features::bookings::{BookingsAction, BookingsReducer, BookingsState};
use crate::features::catalog::{CatalogAction, CatalogReducer, CatalogState};
use crate::features::checkout::{CheckoutAction, CheckoutReducer, CheckoutState};
use crate::features::navigation::{NavigationAction, NavigationReducer, NavigationState, Navigator};
use crate::features::notifications::{
    NotificationsAction, NotificationsReducer, NotificationsState,
};
use crate::features::organizer::{OrganizerAction, OrganizerReducer, OrganizerState};
use crate::features::reviews::{ReviewsAction, ReviewsReducer, ReviewsState};
use crate::features::session::{SessionAction, SessionReducer, SessionState};
use crate::notice::{NoticeAction, NoticeReducer, NoticeState};
use chrono::{DateTime, Utc};
use eventhub_core::composition::{combine_reducers, BoxedReducer, CombinedReducer};
use eventhub_core::async_effect;
use eventhub_core::effect::Effect;
use eventhub_core::environment::Clock;
use eventhub_core::SmallVec;
use eventhub_runtime::{Store, StoreError};
use std::future::Future;
use std::sync::Arc;

/// Effects returned by every client reducer
pub type Effects = SmallVec<[Effect<AppAction>; 4]>;

/// Whole client state
#[derive(Clone, Debug, Default)]
pub struct AppState {
    /// Current route
    pub navigation: NavigationState,
    /// Signed-in user
    pub session: SessionState,
    /// Events, categories, event detail
    pub catalog: CatalogState,
    /// Checkout flow
    pub checkout: CheckoutState,
    /// My bookings
    pub bookings: BookingsState,
    /// Reviews of the open event
    pub reviews: ReviewsState,
    /// Notifications
    pub notifications: NotificationsState,
    /// Organizer dashboard
    pub organizer: OrganizerState,
    /// Admin dashboard
    pub admin: AdminState,
    /// Toasts
    pub notices: NoticeState,
}

/// Everything that can happen in the client
#[derive(Clone, Debug)]
pub enum AppAction {
    /// Routing
    Navigation(NavigationAction),
    /// Sign-in and profile
    Session(SessionAction),
    /// Browsing events
    Catalog(CatalogAction),
    /// Buying tickets
    Checkout(CheckoutAction),
    /// My bookings
    Bookings(BookingsAction),
    /// Reviews
    Reviews(ReviewsAction),
    /// Notifications
    Notifications(NotificationsAction),
    /// Organizer dashboard
    Organizer(OrganizerAction),
    /// Admin dashboard
    Admin(AdminAction),
    /// Toasts
    Notice(NoticeAction),
}

macro_rules! from_feature {
    ($($variant:ident($action:ty)),* $(,)?) => {
        $(
            impl From<$action> for AppAction {
                fn from(action: $action) -> Self {
                    Self::$variant(action)
                }
            }
        )*
    };
}

from_feature!(
    Navigation(NavigationAction),
    Session(SessionAction),
    Catalog(CatalogAction),
    Checkout(CheckoutAction),
    Bookings(BookingsAction),
    Reviews(ReviewsAction),
    Notifications(NotificationsAction),
    Organizer(OrganizerAction),
    Admin(AdminAction),
    Notice(NoticeAction),
);

/// Injected dependencies
#[derive(Clone)]
pub struct AppEnvironment {
    /// Backend REST API
    pub api: Arc<dyn BackendApi>,
    /// Shell that shows routes and performs gateway handoffs
    pub navigator: Arc<dyn Navigator>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Settings
    pub config: Arc<ClientConfig>,
}

impl AppEnvironment {
    /// Bundle the dependencies
    #[must_use]
    pub fn new(
        api: Arc<dyn BackendApi>,
        navigator: Arc<dyn Navigator>,
        clock: Arc<dyn Clock>,
        config: ClientConfig,
    ) -> Self {
        Self {
            api,
            navigator,
            clock,
            config: Arc::new(config),
        }
    }

    /// Current time from the injected clock
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Run a backend call and map its result to an action
pub(crate) fn call<T, Fut, F, G>(request: Fut, ok: F, err: G) -> Effect<AppAction>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    F: FnOnce(T) -> AppAction + Send + 'static,
    G: FnOnce(ApiError) -> AppAction + Send + 'static,
{
    async_effect! {
        Some(match request.await {
            Ok(value) => ok(value),
            Err(error) => err(error),
        })
    }
}

/// Run a side effect in the shell that produces no action
pub(crate) fn fire<F>(work: F) -> Effect<AppAction>
where
    F: FnOnce() + Send + 'static,
{
    async_effect! {
        work();
        None
    }
}

/// The client reducer: every feature combined
pub type AppReducer = CombinedReducer<AppState, AppAction, AppEnvironment>;

/// Store running the client
pub type AppStore = Store<AppState, AppAction, AppEnvironment, AppReducer>;

/// Combine the feature reducers
///
/// Session runs first so that other features see the signed-in user for the
/// same action.
#[must_use]
pub fn app_reducer() -> AppReducer {
    let features: Vec<BoxedReducer<AppState, AppAction, AppEnvironment>> = vec![
        Box::new(SessionReducer),
        Box::new(NavigationReducer),
        Box::new(CatalogReducer),
        Box::new(CheckoutReducer),
        Box::new(BookingsReducer),
        Box::new(ReviewsReducer),
        Box::new(NotificationsReducer),
        Box::new(OrganizerReducer),
        Box::new(AdminReducer),
        Box::new(NoticeReducer),
    ];
    combine_reducers(features)
}

/// Build the store and restore a stored session, if configured
///
/// # Errors
///
/// Returns [`StoreError`] if the restore action cannot be dispatched.
pub async fn start(environment: AppEnvironment) -> Result<AppStore, StoreError> {
    let token = environment.config.auth_token.clone();
    let store = Store::new(AppState::default(), app_reducer(), environment);

    if let Some(token) = token {
        tracing::info!("Restoring stored session");
        store
            .send(
                SessionAction::Restore {
                    token: BearerToken::new(token),
                }
                .into(),
            )
            .await?;
    }
    Ok(store)
}
