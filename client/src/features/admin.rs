//! Admin dashboard: users and event status.

use crate::app::{call, AppAction, AppEnvironment, AppState, Effects};
use crate::error::ApiError;
use crate::features::session::SessionAction;
use crate::notice::{notify, report, NoticeLevel};
use crate::types::{Event, EventId, EventStatus, Role, User, UserId};
use eventhub_core::{reducer::Reducer, smallvec, SmallVec};
use std::sync::Arc;

/// Admin slice
#[derive(Clone, Debug, Default)]
pub struct AdminState {
    /// All accounts
    pub users: Vec<User>,
    /// Fetch in flight
    pub loading: bool,
}

/// Admin actions
#[derive(Clone, Debug)]
pub enum AdminAction {
    /// Fetch all users
    LoadUsers,
    /// Users fetched
    UsersLoaded {
        /// Users
        users: Vec<User>,
    },
    /// Change a user's role
    ChangeRole {
        /// User
        id: UserId,
        /// New role
        role: Role,
    },
    /// Role changed
    RoleChanged {
        /// Updated user
        user: User,
    },
    /// Delete a user
    DeleteUser {
        /// User
        id: UserId,
    },
    /// User deleted
    UserDeleted {
        /// User
        id: UserId,
    },
    /// Set an event's status
    SetEventStatus {
        /// Event
        id: EventId,
        /// New status
        status: EventStatus,
    },
    /// Event status changed
    EventStatusChanged {
        /// Updated event
        event: Event,
    },
    /// An admin request failed
    Failed {
        /// Backend error
        error: ApiError,
    },
}

/// Owns [`AdminState`]
#[derive(Clone, Copy, Debug, Default)]
pub struct AdminReducer;

impl Reducer for AdminReducer {
    type State = AppState;
    type Action = AppAction;
    type Environment = AppEnvironment;

    fn reduce(&self, state: &mut AppState, action: AppAction, env: &AppEnvironment) -> Effects {
        let action = match action {
            AppAction::Admin(action) => action,
            AppAction::Session(SessionAction::Logout | SessionAction::Expired) => {
                state.admin = AdminState::default();
                return SmallVec::new();
            },
            _ => return SmallVec::new(),
        };

        let Some(me) = state.session.user.as_ref().filter(|u| u.role.is_admin()) else {
            tracing::warn!("Admin action without an admin session");
            return SmallVec::new();
        };
        let me = me.id.clone();
        let admin = &mut state.admin;
        let api = Arc::clone(&env.api);

        match action {
            AdminAction::LoadUsers => {
                admin.loading = true;
                smallvec![call(
                    async move { api.list_users().await },
                    |users| AdminAction::UsersLoaded { users }.into(),
                    |error| AdminAction::Failed { error }.into(),
                )]
            },

            AdminAction::UsersLoaded { users } => {
                admin.loading = false;
                admin.users = users;
                SmallVec::new()
            },

            AdminAction::ChangeRole { id, role } => {
                if id == me {
                    return smallvec![notify(NoticeLevel::Error, "You cannot change your own role")];
                }
                smallvec![call(
                    async move { api.change_role(&id, role).await },
                    |user| AdminAction::RoleChanged { user }.into(),
                    |error| AdminAction::Failed { error }.into(),
                )]
            },

            AdminAction::RoleChanged { user } => {
                tracing::info!(user = %user.id, role = ?user.role, "Role changed");
                let message = format!("{} is now {:?}", user.name, user.role).to_lowercase();
                match admin.users.iter_mut().find(|u| u.id == user.id) {
                    Some(existing) => *existing = user,
                    None => admin.users.push(user),
                }
                smallvec![notify(NoticeLevel::Success, message)]
            },

            AdminAction::DeleteUser { id } => {
                if id == me {
                    return smallvec![notify(NoticeLevel::Error, "You cannot delete your own account")];
                }
                smallvec![call(
                    async move {
                        api.delete_user(&id).await?;
                        Ok(id)
                    },
                    |id| AdminAction::UserDeleted { id }.into(),
                    |error| AdminAction::Failed { error }.into(),
                )]
            },

            AdminAction::UserDeleted { id } => {
                admin.users.retain(|u| u.id != id);
                smallvec![notify(NoticeLevel::Success, "User deleted")]
            },

            AdminAction::SetEventStatus { id, status } => smallvec![call(
                async move { api.set_event_status(&id, status).await },
                |event| AdminAction::EventStatusChanged { event }.into(),
                |error| AdminAction::Failed { error }.into(),
            )],

            AdminAction::EventStatusChanged { event } => smallvec![notify(
                NoticeLevel::Success,
                format!("{} is now {}", event.title, event.status.as_str())
            )],

            AdminAction::Failed { error } => {
                admin.loading = false;
                smallvec![report(&error)]
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::BearerToken;
    use crate::features::session::SessionState;
    use crate::mocks::{self, test_environment};
    use eventhub_testing::{assertions, helpers::resolve_effects, ReducerTest};

    fn as_admin() -> AppState {
        AppState {
            session: SessionState {
                user: Some(mocks::user("root", Role::Admin)),
                token: Some(BearerToken::new("token-root")),
                ..SessionState::default()
            },
            ..AppState::default()
        }
    }

    #[test]
    fn admins_cannot_delete_themselves() {
        let (env, _, _) = test_environment();
        ReducerTest::new(AdminReducer)
            .with_env(env)
            .given_state(as_admin())
            .when_action(AdminAction::DeleteUser { id: UserId::new("root") }.into())
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[test]
    fn non_admins_are_ignored() {
        let (env, _, _) = test_environment();
        let mut state = as_admin();
        state.session.user = Some(mocks::user("u1", Role::Organizer));

        ReducerTest::new(AdminReducer)
            .with_env(env)
            .given_state(state)
            .when_action(AdminAction::LoadUsers.into())
            .then_state(|state| assert!(!state.admin.loading))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[tokio::test]
    async fn promote_to_organizer() {
        let (env, backend, _) = test_environment();
        backend.add_account(mocks::user("u1", Role::User), "secret");
        let mut state = as_admin();
        state.admin.users = vec![mocks::user("u1", Role::User)];

        let effects = AdminReducer.reduce(
            &mut state,
            AdminAction::ChangeRole {
                id: UserId::new("u1"),
                role: Role::Organizer,
            }
            .into(),
            &env,
        );
        for action in resolve_effects(effects).await {
            let _ = AdminReducer.reduce(&mut state, action, &env);
        }

        assert_eq!(state.admin.users[0].role, Role::Organizer);
    }

    #[tokio::test]
    async fn cancelling_an_event_reaches_the_catalog() {
        let (env, backend, _) = test_environment();
        backend.insert_event(mocks::event("e1", 100));
        let mut state = as_admin();
        state.catalog.events = vec![mocks::event("e1", 100)];
        let reducer = crate::app::app_reducer();

        let effects = reducer.reduce(
            &mut state,
            AdminAction::SetEventStatus {
                id: EventId::new("e1"),
                status: EventStatus::Cancelled,
            }
            .into(),
            &env,
        );
        for action in resolve_effects(effects).await {
            let _ = reducer.reduce(&mut state, action, &env);
        }

        assert_eq!(state.catalog.events[0].status, EventStatus::Cancelled);
    }
}
