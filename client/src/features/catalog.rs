//! Browsing: event list, categories, event detail.

use crate::api::EventQuery;
use crate::app::{call, AppAction, AppEnvironment, AppState, Effects};
use crate::error::ApiError;
use crate::features::admin::AdminAction;
use crate::features::organizer::OrganizerAction;
use crate::listing::{self, EventFilter, EventSort};
use crate::notice::report;
use crate::types::{Category, CategoryId, Event, EventId, Package};
use chrono::{DateTime, Utc};
use eventhub_core::{reducer::Reducer, smallvec, SmallVec};
use std::sync::Arc;

/// An event with its ticket tiers
#[derive(Clone, Debug, PartialEq)]
pub struct EventDetail {
    /// Event
    pub event: Event,
    /// Packages, in backend order
    pub packages: Vec<Package>,
}

/// Catalog slice
#[derive(Clone, Debug, Default)]
pub struct CatalogState {
    /// Last fetched event list
    pub events: Vec<Event>,
    /// Server-side filters of that list
    pub query: EventQuery,
    /// Client-side filter
    pub filter: EventFilter,
    /// Client-side sort
    pub sort: EventSort,
    /// All categories
    pub categories: Vec<Category>,
    /// Open category
    pub category: Option<Category>,
    /// Events of the open category
    pub category_events: Vec<Event>,
    /// Event being opened
    pub requested_event: Option<EventId>,
    /// Open event
    pub detail: Option<EventDetail>,
    /// Event list request in flight
    pub loading_events: bool,
    /// Detail or category request in flight
    pub loading_detail: bool,
}

impl CatalogState {
    /// Events after the client-side filter and sort
    #[must_use]
    pub fn visible_events(&self, now: DateTime<Utc>) -> Vec<&Event> {
        listing::visible_events(&self.events, &self.filter, self.sort, now)
    }

    /// Look up an event in the list or the open detail
    #[must_use]
    pub fn event(&self, id: &EventId) -> Option<&Event> {
        self.detail
            .as_ref()
            .map(|d| &d.event)
            .filter(|e| e.id == *id)
            .or_else(|| self.events.iter().find(|e| e.id == *id))
    }
}

/// Catalog actions
#[derive(Clone, Debug)]
pub enum CatalogAction {
    /// Fetch events
    LoadEvents {
        /// Server-side filters
        query: EventQuery,
    },
    /// Events fetched
    EventsLoaded {
        /// Events
        events: Vec<Event>,
    },
    /// Fetch categories
    LoadCategories,
    /// Categories fetched
    CategoriesLoaded {
        /// Categories
        categories: Vec<Category>,
    },
    /// Open a category
    LoadCategory {
        /// Category
        id: CategoryId,
    },
    /// Category and its events fetched
    CategoryLoaded {
        /// Category
        category: Category,
        /// Its events
        events: Vec<Event>,
    },
    /// Open an event
    LoadEventDetail {
        /// Event
        id: EventId,
    },
    /// Event and packages fetched
    EventDetailLoaded {
        /// Event
        event: Event,
        /// Packages
        packages: Vec<Package>,
    },
    /// Change the client-side filter
    SetFilter {
        /// New filter
        filter: EventFilter,
    },
    /// Change the client-side sort
    SetSort {
        /// New sort
        sort: EventSort,
    },
    /// A catalog request failed
    Failed {
        /// Backend error
        error: ApiError,
    },
}

/// Owns [`CatalogState`]
#[derive(Clone, Copy, Debug, Default)]
pub struct CatalogReducer;

impl Reducer for CatalogReducer {
    type State = AppState;
    type Action = AppAction;
    type Environment = AppEnvironment;

    fn reduce(&self, state: &mut AppState, action: AppAction, env: &AppEnvironment) -> Effects {
        let catalog = &mut state.catalog;

        let action = match action {
            AppAction::Catalog(action) => action,
            AppAction::Organizer(OrganizerAction::EventSaved { event })
            | AppAction::Admin(AdminAction::EventStatusChanged { event }) => {
                if let Some(detail) = catalog.detail.as_mut().filter(|d| d.event.id == event.id) {
                    detail.event = event.clone();
                }
                upsert_event(&mut catalog.events, event);
                return SmallVec::new();
            },
            AppAction::Organizer(OrganizerAction::EventDeleted { id }) => {
                catalog.events.retain(|e| e.id != id);
                catalog.category_events.retain(|e| e.id != id);
                if catalog.detail.as_ref().is_some_and(|d| d.event.id == id) {
                    catalog.detail = None;
                }
                return SmallVec::new();
            },
            _ => return SmallVec::new(),
        };

        match action {
            CatalogAction::LoadEvents { query } => {
                catalog.loading_events = true;
                catalog.query = query.clone();
                let api = Arc::clone(&env.api);
                smallvec![call(
                    async move { api.list_events(&query).await },
                    |events| CatalogAction::EventsLoaded { events }.into(),
                    |error| CatalogAction::Failed { error }.into(),
                )]
            },

            CatalogAction::EventsLoaded { events } => {
                tracing::debug!(count = events.len(), "Events loaded");
                catalog.loading_events = false;
                catalog.events = events;
                SmallVec::new()
            },

            CatalogAction::LoadCategories => {
                let api = Arc::clone(&env.api);
                smallvec![call(
                    async move { api.list_categories().await },
                    |categories| CatalogAction::CategoriesLoaded { categories }.into(),
                    |error| CatalogAction::Failed { error }.into(),
                )]
            },

            CatalogAction::CategoriesLoaded { categories } => {
                catalog.categories = categories;
                SmallVec::new()
            },

            CatalogAction::LoadCategory { id } => {
                catalog.loading_detail = true;
                catalog.category = None;
                catalog.category_events.clear();
                let api = Arc::clone(&env.api);
                smallvec![call(
                    async move {
                        let query = EventQuery {
                            category: Some(id.clone()),
                            ..EventQuery::default()
                        };
                        futures::try_join!(api.get_category(&id), api.list_events(&query))
                    },
                    |(category, events)| CatalogAction::CategoryLoaded { category, events }.into(),
                    |error| CatalogAction::Failed { error }.into(),
                )]
            },

            CatalogAction::CategoryLoaded { category, events } => {
                catalog.loading_detail = false;
                catalog.category = Some(category);
                catalog.category_events = events;
                SmallVec::new()
            },

            CatalogAction::LoadEventDetail { id } => {
                catalog.loading_detail = true;
                catalog.requested_event = Some(id.clone());
                let api = Arc::clone(&env.api);
                smallvec![call(
                    async move { futures::try_join!(api.get_event(&id), api.list_packages(&id)) },
                    |(event, packages)| CatalogAction::EventDetailLoaded { event, packages }.into(),
                    |error| CatalogAction::Failed { error }.into(),
                )]
            },

            CatalogAction::EventDetailLoaded { event, packages } => {
                if catalog.requested_event.as_ref() != Some(&event.id) {
                    tracing::debug!(event = %event.id, "Dropping detail of an event no longer open");
                    return SmallVec::new();
                }
                catalog.loading_detail = false;
                catalog.detail = Some(EventDetail { event, packages });
                SmallVec::new()
            },

            CatalogAction::SetFilter { filter } => {
                catalog.filter = filter;
                SmallVec::new()
            },

            CatalogAction::SetSort { sort } => {
                catalog.sort = sort;
                SmallVec::new()
            },

            CatalogAction::Failed { error } => {
                catalog.loading_events = false;
                catalog.loading_detail = false;
                smallvec![report(&error)]
            },
        }
    }
}

/// Replace the event with the same id, or append it
pub(crate) fn upsert_event(events: &mut Vec<Event>, event: Event) {
    match events.iter_mut().find(|e| e.id == event.id) {
        Some(existing) => *existing = event,
        None => events.push(event),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::listing::{EventSortKey, SortDirection};
    use crate::mocks::{self, test_environment};
    use crate::types::Money;
    use eventhub_core::environment::Clock;
    use eventhub_testing::{assertions, helpers::resolve_effects, test_clock, ReducerTest};

    #[tokio::test]
    async fn detail_loads_event_and_packages_together() {
        let (env, backend, _) = test_environment();
        backend.insert_event(mocks::event("e1", 100));
        backend.insert_package(mocks::package("p1", "e1", 100));
        backend.insert_package(mocks::package("p2", "e1", 250));
        let mut state = AppState::default();

        let effects = CatalogReducer.reduce(
            &mut state,
            CatalogAction::LoadEventDetail { id: EventId::new("e1") }.into(),
            &env,
        );
        for action in resolve_effects(effects).await {
            let _ = CatalogReducer.reduce(&mut state, action, &env);
        }

        let detail = state.catalog.detail.as_ref().unwrap();
        assert_eq!(detail.event.id, EventId::new("e1"));
        assert_eq!(detail.packages.len(), 2);
        assert!(!state.catalog.loading_detail);
    }

    #[test]
    fn stale_detail_is_dropped() {
        let (env, _, _) = test_environment();
        ReducerTest::new(CatalogReducer)
            .with_env(env)
            .given_state(AppState::default())
            .when_action(CatalogAction::LoadEventDetail { id: EventId::new("e2") }.into())
            .when_action(
                CatalogAction::EventDetailLoaded {
                    event: mocks::event("e1", 10),
                    packages: Vec::new(),
                }
                .into(),
            )
            .then_state(|state| {
                assert!(state.catalog.detail.is_none());
                assert!(state.catalog.loading_detail);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[tokio::test]
    async fn missing_event_is_reported() {
        let (env, _, _) = test_environment();
        let mut state = AppState::default();

        let effects = CatalogReducer.reduce(
            &mut state,
            CatalogAction::LoadEventDetail { id: EventId::new("nope") }.into(),
            &env,
        );
        let actions = resolve_effects(effects).await;
        assert!(matches!(
            &actions[..],
            [AppAction::Catalog(CatalogAction::Failed { error: ApiError::Api { status: 404, .. } })]
        ));
    }

    #[test]
    fn visible_events_apply_filter_and_sort() {
        let mut catalog = CatalogState {
            events: vec![
                mocks::event("cheap", 10),
                mocks::event("free", 0),
                mocks::event("pricey", 500),
            ],
            ..CatalogState::default()
        };
        catalog.filter.min_price = Some(Money::from_major(5));
        catalog.sort = EventSort {
            key: EventSortKey::Price,
            direction: SortDirection::Descending,
        };

        let now = test_clock().now();
        let ids: Vec<&str> = catalog.visible_events(now).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["pricey", "cheap"]);
    }

    #[test]
    fn saved_event_replaces_the_listed_copy() {
        let (env, _, _) = test_environment();
        let mut renamed = mocks::event("e1", 10);
        renamed.title = "Renamed".to_string();

        ReducerTest::new(CatalogReducer)
            .with_env(env)
            .given_state(AppState {
                catalog: CatalogState {
                    events: vec![mocks::event("e1", 10), mocks::event("e2", 10)],
                    ..CatalogState::default()
                },
                ..AppState::default()
            })
            .when_action(OrganizerAction::EventSaved { event: renamed }.into())
            .then_state(|state| {
                assert_eq!(state.catalog.events.len(), 2);
                assert_eq!(state.catalog.events[0].title, "Renamed");
            })
            .run();
    }
}
