//! Organizer dashboard: own events and their packages.

use crate::api::{EventDraft, PackageDraft};
use crate::app::{call, AppAction, AppEnvironment, AppState, Effects};
use crate::error::{ApiError, DraftError};
use crate::features::catalog::{upsert_event, EventDetail};
use crate::features::navigation::NavigationAction;
use crate::features::session::SessionAction;
use crate::notice::{notify, report, NoticeLevel};
use crate::routes::Route;
use crate::types::{Event, EventId, Package, PackageId, User};
use eventhub_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use std::sync::Arc;

/// Organizer slice
#[derive(Clone, Debug, Default)]
pub struct OrganizerState {
    /// Events the signed-in organizer owns
    pub my_events: Vec<Event>,
    /// Event open in the editor, with its packages
    pub editing: Option<EventDetail>,
    /// Fetch in flight
    pub loading: bool,
    /// Save or delete in flight
    pub saving: bool,
}

/// Check an event draft before sending it
///
/// # Errors
///
/// Returns [`DraftError`] for a blank title, an end before the start, or a
/// capacity of zero.
pub fn validate_event_draft(draft: &EventDraft) -> Result<(), DraftError> {
    if draft.title.trim().is_empty() {
        return Err(DraftError::EmptyTitle);
    }
    if draft.end_date.is_some_and(|end| end < draft.date) {
        return Err(DraftError::EndBeforeStart);
    }
    if draft.max_attendees == 0 {
        return Err(DraftError::ZeroCapacity);
    }
    Ok(())
}

/// Check a package draft before sending it
///
/// # Errors
///
/// Returns [`DraftError`] for a blank name or no inventory.
pub fn validate_package_draft(draft: &PackageDraft) -> Result<(), DraftError> {
    if draft.name.trim().is_empty() {
        return Err(DraftError::EmptyPackageName);
    }
    if draft.max_bookings == 0 {
        return Err(DraftError::ZeroInventory);
    }
    Ok(())
}

/// Whether `user` may change `event`
#[must_use]
pub fn may_manage(user: &User, event: &Event) -> bool {
    user.role.is_admin() || (user.role.can_organize() && event.organizer_id() == Some(&user.id))
}

/// Organizer actions
#[derive(Clone, Debug)]
pub enum OrganizerAction {
    /// Fetch my events
    LoadMyEvents,
    /// My events fetched
    MyEventsLoaded {
        /// Events
        events: Vec<Event>,
    },
    /// Open an event in the editor
    LoadForEdit {
        /// Event
        id: EventId,
    },
    /// Event and packages fetched for editing
    EditLoaded {
        /// Event
        event: Event,
        /// Packages
        packages: Vec<Package>,
    },
    /// Create an event
    CreateEvent {
        /// Draft
        draft: EventDraft,
    },
    /// Update an event
    UpdateEvent {
        /// Event
        id: EventId,
        /// Draft
        draft: EventDraft,
    },
    /// Event created or updated
    EventSaved {
        /// Saved event
        event: Event,
    },
    /// Delete an event
    DeleteEvent {
        /// Event
        id: EventId,
    },
    /// Event deleted
    EventDeleted {
        /// Event
        id: EventId,
    },
    /// Add a package to an event
    CreatePackage {
        /// Draft
        draft: PackageDraft,
    },
    /// Update a package
    UpdatePackage {
        /// Package
        id: PackageId,
        /// Draft
        draft: PackageDraft,
    },
    /// Package created or updated
    PackageSaved {
        /// Saved package
        package: Package,
    },
    /// Delete a package
    DeletePackage {
        /// Package
        id: PackageId,
    },
    /// Package deleted
    PackageDeleted {
        /// Package
        id: PackageId,
    },
    /// An organizer request failed
    Failed {
        /// Backend error
        error: ApiError,
    },
}

/// Owns [`OrganizerState`]
#[derive(Clone, Copy, Debug, Default)]
pub struct OrganizerReducer;

impl Reducer for OrganizerReducer {
    type State = AppState;
    type Action = AppAction;
    type Environment = AppEnvironment;

    #[allow(clippy::too_many_lines)]
    fn reduce(&self, state: &mut AppState, action: AppAction, env: &AppEnvironment) -> Effects {
        let action = match action {
            AppAction::Organizer(action) => action,
            AppAction::Session(SessionAction::Logout | SessionAction::Expired) => {
                state.organizer = OrganizerState::default();
                return SmallVec::new();
            },
            _ => return SmallVec::new(),
        };

        let Some(user) = state.session.user.clone() else {
            return SmallVec::new();
        };
        if !user.role.can_organize() {
            tracing::warn!(user = %user.id, "Organizer action from a non-organizer");
            return SmallVec::new();
        }

        let api = Arc::clone(&env.api);
        match action {
            OrganizerAction::LoadMyEvents => {
                state.organizer.loading = true;
                smallvec![call(
                    async move { api.my_events().await },
                    |events| OrganizerAction::MyEventsLoaded { events }.into(),
                    |error| OrganizerAction::Failed { error }.into(),
                )]
            },

            OrganizerAction::MyEventsLoaded { events } => {
                state.organizer.loading = false;
                state.organizer.my_events = events;
                SmallVec::new()
            },

            OrganizerAction::LoadForEdit { id } => {
                state.organizer.loading = true;
                state.organizer.editing = None;
                smallvec![call(
                    async move { futures::try_join!(api.get_event(&id), api.list_packages(&id)) },
                    |(event, packages)| OrganizerAction::EditLoaded { event, packages }.into(),
                    |error| OrganizerAction::Failed { error }.into(),
                )]
            },

            OrganizerAction::EditLoaded { event, packages } => {
                state.organizer.loading = false;
                if !may_manage(&user, &event) {
                    return smallvec![
                        notify(NoticeLevel::Error, DraftError::NotOwner.to_string()),
                        Effect::send(NavigationAction::Navigate { route: Route::MyEvents }.into()),
                    ];
                }
                state.organizer.editing = Some(EventDetail { event, packages });
                SmallVec::new()
            },

            OrganizerAction::CreateEvent { draft } => {
                if let Err(error) = validate_event_draft(&draft) {
                    return smallvec![notify(NoticeLevel::Error, error.to_string())];
                }
                state.organizer.saving = true;
                smallvec![call(
                    async move { api.create_event(&draft).await },
                    |event| OrganizerAction::EventSaved { event }.into(),
                    |error| OrganizerAction::Failed { error }.into(),
                )]
            },

            OrganizerAction::UpdateEvent { id, draft } => {
                if let Err(error) = validate_event_draft(&draft).and(check_owner(state, &user, &id)) {
                    return smallvec![notify(NoticeLevel::Error, error.to_string())];
                }
                state.organizer.saving = true;
                smallvec![call(
                    async move { api.update_event(&id, &draft).await },
                    |event| OrganizerAction::EventSaved { event }.into(),
                    |error| OrganizerAction::Failed { error }.into(),
                )]
            },

            OrganizerAction::EventSaved { event } => {
                tracing::info!(event = %event.id, "Event saved");
                let organizer = &mut state.organizer;
                organizer.saving = false;
                if let Some(editing) = organizer.editing.as_mut().filter(|e| e.event.id == event.id) {
                    editing.event = event.clone();
                }
                let route = Route::EventDetail(event.id.clone());
                upsert_event(&mut organizer.my_events, event);
                smallvec![
                    notify(NoticeLevel::Success, "Event saved"),
                    Effect::send(NavigationAction::Navigate { route }.into()),
                ]
            },

            OrganizerAction::DeleteEvent { id } => {
                if let Err(error) = check_owner(state, &user, &id) {
                    return smallvec![notify(NoticeLevel::Error, error.to_string())];
                }
                state.organizer.saving = true;
                smallvec![call(
                    async move {
                        api.delete_event(&id).await?;
                        Ok(id)
                    },
                    |id| OrganizerAction::EventDeleted { id }.into(),
                    |error| OrganizerAction::Failed { error }.into(),
                )]
            },

            OrganizerAction::EventDeleted { id } => {
                tracing::info!(event = %id, "Event deleted");
                let organizer = &mut state.organizer;
                organizer.saving = false;
                organizer.my_events.retain(|e| e.id != id);
                if organizer.editing.as_ref().is_some_and(|e| e.event.id == id) {
                    organizer.editing = None;
                }
                let mut effects: Effects = smallvec![notify(NoticeLevel::Success, "Event deleted")];
                if matches!(
                    &state.navigation.current,
                    Route::EventDetail(open) | Route::EditEvent(open) if *open == id
                ) {
                    effects.push(Effect::send(
                        NavigationAction::Navigate { route: Route::MyEvents }.into(),
                    ));
                }
                effects
            },

            OrganizerAction::CreatePackage { draft } => {
                if let Err(error) = validate_package_draft(&draft).and(check_owner(state, &user, &draft.event)) {
                    return smallvec![notify(NoticeLevel::Error, error.to_string())];
                }
                state.organizer.saving = true;
                smallvec![call(
                    async move { api.create_package(&draft).await },
                    |package| OrganizerAction::PackageSaved { package }.into(),
                    |error| OrganizerAction::Failed { error }.into(),
                )]
            },

            OrganizerAction::UpdatePackage { id, draft } => {
                if let Err(error) = validate_package_draft(&draft).and(check_owner(state, &user, &draft.event)) {
                    return smallvec![notify(NoticeLevel::Error, error.to_string())];
                }
                state.organizer.saving = true;
                smallvec![call(
                    async move { api.update_package(&id, &draft).await },
                    |package| OrganizerAction::PackageSaved { package }.into(),
                    |error| OrganizerAction::Failed { error }.into(),
                )]
            },

            OrganizerAction::PackageSaved { package } => {
                state.organizer.saving = false;
                if let Some(editing) = state
                    .organizer
                    .editing
                    .as_mut()
                    .filter(|e| e.event.id == package.event)
                {
                    match editing.packages.iter_mut().find(|p| p.id == package.id) {
                        Some(existing) => *existing = package,
                        None => editing.packages.push(package),
                    }
                }
                smallvec![notify(NoticeLevel::Success, "Package saved")]
            },

            OrganizerAction::DeletePackage { id } => {
                let event = state
                    .organizer
                    .editing
                    .as_ref()
                    .filter(|e| e.packages.iter().any(|p| p.id == id))
                    .map(|e| &e.event);
                if event.is_some_and(|event| !may_manage(&user, event)) {
                    return smallvec![notify(NoticeLevel::Error, DraftError::NotOwner.to_string())];
                }
                state.organizer.saving = true;
                smallvec![call(
                    async move {
                        api.delete_package(&id).await?;
                        Ok(id)
                    },
                    |id| OrganizerAction::PackageDeleted { id }.into(),
                    |error| OrganizerAction::Failed { error }.into(),
                )]
            },

            OrganizerAction::PackageDeleted { id } => {
                state.organizer.saving = false;
                if let Some(editing) = state.organizer.editing.as_mut() {
                    editing.packages.retain(|p| p.id != id);
                }
                smallvec![notify(NoticeLevel::Success, "Package deleted")]
            },

            OrganizerAction::Failed { error } => {
                state.organizer.loading = false;
                state.organizer.saving = false;
                smallvec![report(&error)]
            },
        }
    }
}

/// Refuse changes to a known event the user does not own
///
/// Events the client has not loaded are left for the backend to check.
fn check_owner(state: &AppState, user: &User, id: &EventId) -> Result<(), DraftError> {
    let known = state
        .organizer
        .editing
        .as_ref()
        .map(|e| &e.event)
        .filter(|e| e.id == *id)
        .or_else(|| state.organizer.my_events.iter().find(|e| e.id == *id))
        .or_else(|| state.catalog.event(id));
    match known {
        Some(event) if !may_manage(user, event) => Err(DraftError::NotOwner),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::BearerToken;
    use crate::features::session::SessionState;
    use crate::mocks::{self, test_environment};
    use crate::types::{Money, Role};
    use chrono::Duration;
    use eventhub_testing::{assertions, helpers::resolve_effects, ReducerTest};

    fn as_user(id: &str, role: Role) -> AppState {
        AppState {
            session: SessionState {
                user: Some(mocks::user(id, role)),
                token: Some(BearerToken::new(format!("token-{id}"))),
                ..SessionState::default()
            },
            ..AppState::default()
        }
    }

    fn draft() -> EventDraft {
        EventDraft::from_event(&mocks::event("e1", 100))
    }

    #[test]
    fn event_draft_rules() {
        let mut blank = draft();
        blank.title = "  ".to_string();
        assert_eq!(validate_event_draft(&blank), Err(DraftError::EmptyTitle));

        let mut backwards = draft();
        backwards.end_date = Some(backwards.date - Duration::hours(2));
        assert_eq!(validate_event_draft(&backwards), Err(DraftError::EndBeforeStart));

        let mut empty = draft();
        empty.max_attendees = 0;
        assert_eq!(validate_event_draft(&empty), Err(DraftError::ZeroCapacity));

        assert_eq!(validate_event_draft(&draft()), Ok(()));
    }

    #[test]
    fn package_draft_rules() {
        let mut package = PackageDraft {
            event: EventId::new("e1"),
            name: "VIP".to_string(),
            description: String::new(),
            price: Money::from_major(500),
            features: vec!["Front row".to_string()],
            max_bookings: 10,
            is_active: true,
        };
        assert_eq!(validate_package_draft(&package), Ok(()));
        package.max_bookings = 0;
        assert_eq!(validate_package_draft(&package), Err(DraftError::ZeroInventory));
        package.name.clear();
        assert_eq!(validate_package_draft(&package), Err(DraftError::EmptyPackageName));
    }

    #[test]
    fn ownership() {
        let event = mocks::event("e1", 100);
        let owner_id = event.organizer_id().unwrap().clone();
        assert!(may_manage(&mocks::user(owner_id.as_str(), Role::Organizer), &event));
        assert!(!may_manage(&mocks::user("someone", Role::Organizer), &event));
        assert!(may_manage(&mocks::user("root", Role::Admin), &event));
        assert!(!may_manage(&User { id: owner_id, ..mocks::user("x", Role::User) }, &event));
    }

    #[test]
    fn invalid_draft_is_not_sent() {
        let (env, _, _) = test_environment();
        let mut blank = draft();
        blank.title.clear();

        ReducerTest::new(OrganizerReducer)
            .with_env(env)
            .given_state(as_user("org1", Role::Organizer))
            .when_action(OrganizerAction::CreateEvent { draft: blank }.into())
            .then_state(|state| assert!(!state.organizer.saving))
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[tokio::test]
    async fn created_event_opens_its_page() {
        let (env, backend, _) = test_environment();
        let mut state = as_user("org1", Role::Organizer);

        let effects = OrganizerReducer.reduce(
            &mut state,
            OrganizerAction::CreateEvent { draft: draft() }.into(),
            &env,
        );
        let [saved] = <[AppAction; 1]>::try_from(resolve_effects(effects).await).unwrap();
        let effects = OrganizerReducer.reduce(&mut state, saved, &env);
        let actions = resolve_effects(effects).await;

        assert_eq!(backend.count("create_event"), 1);
        assert_eq!(state.organizer.my_events.len(), 1);
        assert!(actions.iter().any(|a| matches!(
            a,
            AppAction::Navigation(NavigationAction::Navigate { route: Route::EventDetail(_) })
        )));
    }

    #[test]
    fn someone_elses_event_cannot_be_deleted() {
        let (env, _, _) = test_environment();
        let mut state = as_user("org2", Role::Organizer);
        state.organizer.my_events = vec![mocks::event("e1", 100)];

        ReducerTest::new(OrganizerReducer)
            .with_env(env)
            .given_state(state)
            .when_action(OrganizerAction::DeleteEvent { id: EventId::new("e1") }.into())
            .then_state(|state| assert!(!state.organizer.saving))
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[test]
    fn attendees_cannot_use_the_dashboard() {
        let (env, _, _) = test_environment();
        ReducerTest::new(OrganizerReducer)
            .with_env(env)
            .given_state(as_user("u1", Role::User))
            .when_action(OrganizerAction::LoadMyEvents.into())
            .then_effects(assertions::assert_no_effects)
            .run();
    }
}
