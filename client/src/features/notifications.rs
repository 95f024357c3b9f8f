//! In-app notifications.

use crate::app::{call, AppAction, AppEnvironment, AppState, Effects};
use crate::error::ApiError;
use crate::features::session::SessionAction;
use crate::notice::report;
use crate::types::{Notification, NotificationId};
use eventhub_core::{reducer::Reducer, smallvec, SmallVec};
use std::sync::Arc;

/// Notifications slice
#[derive(Clone, Debug, Default)]
pub struct NotificationsState {
    /// Newest first, as the backend sends them
    pub items: Vec<Notification>,
    /// Fetch in flight
    pub loading: bool,
}

impl NotificationsState {
    /// Unread notifications
    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }
}

/// Notifications actions
#[derive(Clone, Debug)]
pub enum NotificationsAction {
    /// Fetch notifications
    Load,
    /// Notifications fetched
    Loaded {
        /// Notifications
        items: Vec<Notification>,
    },
    /// Mark one read
    MarkRead {
        /// Notification
        id: NotificationId,
    },
    /// Marked read
    Marked {
        /// Updated notification
        notification: Notification,
    },
    /// Mark all read
    MarkAllRead,
    /// All marked read
    AllMarked,
    /// Delete one
    Delete {
        /// Notification
        id: NotificationId,
    },
    /// Deleted
    Deleted {
        /// Notification
        id: NotificationId,
    },
    /// A notifications request failed
    Failed {
        /// Backend error
        error: ApiError,
    },
}

/// Owns [`NotificationsState`]
#[derive(Clone, Copy, Debug, Default)]
pub struct NotificationsReducer;

impl Reducer for NotificationsReducer {
    type State = AppState;
    type Action = AppAction;
    type Environment = AppEnvironment;

    fn reduce(&self, state: &mut AppState, action: AppAction, env: &AppEnvironment) -> Effects {
        let action = match action {
            AppAction::Notifications(action) => action,
            // The badge needs a count as soon as someone is signed in
            AppAction::Session(
                SessionAction::LoggedIn { .. } | SessionAction::CurrentUserLoaded { .. },
            ) => NotificationsAction::Load,
            AppAction::Session(SessionAction::Logout | SessionAction::Expired) => {
                state.notifications = NotificationsState::default();
                return SmallVec::new();
            },
            _ => return SmallVec::new(),
        };

        let notifications = &mut state.notifications;
        let api = Arc::clone(&env.api);
        match action {
            NotificationsAction::Load => {
                notifications.loading = true;
                smallvec![call(
                    async move { api.notifications().await },
                    |items| NotificationsAction::Loaded { items }.into(),
                    |error| NotificationsAction::Failed { error }.into(),
                )]
            },

            NotificationsAction::Loaded { items } => {
                notifications.loading = false;
                notifications.items = items;
                SmallVec::new()
            },

            NotificationsAction::MarkRead { id } => {
                if notifications.items.iter().any(|n| n.id == id && n.read) {
                    return SmallVec::new();
                }
                smallvec![call(
                    async move { api.mark_notification_read(&id).await },
                    |notification| NotificationsAction::Marked { notification }.into(),
                    |error| NotificationsAction::Failed { error }.into(),
                )]
            },

            NotificationsAction::Marked { notification } => {
                if let Some(existing) = notifications
                    .items
                    .iter_mut()
                    .find(|n| n.id == notification.id)
                {
                    *existing = notification;
                }
                SmallVec::new()
            },

            NotificationsAction::MarkAllRead => {
                if notifications.unread_count() == 0 {
                    return SmallVec::new();
                }
                smallvec![call(
                    async move { api.mark_all_notifications_read().await },
                    |()| NotificationsAction::AllMarked.into(),
                    |error| NotificationsAction::Failed { error }.into(),
                )]
            },

            NotificationsAction::AllMarked => {
                for notification in &mut notifications.items {
                    notification.read = true;
                }
                SmallVec::new()
            },

            NotificationsAction::Delete { id } => smallvec![call(
                async move {
                    api.delete_notification(&id).await?;
                    Ok(id)
                },
                |id| NotificationsAction::Deleted { id }.into(),
                |error| NotificationsAction::Failed { error }.into(),
            )],

            NotificationsAction::Deleted { id } => {
                notifications.items.retain(|n| n.id != id);
                SmallVec::new()
            },

            NotificationsAction::Failed { error } => {
                notifications.loading = false;
                smallvec![report(&error)]
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{self, test_environment};
    use eventhub_testing::{assertions, helpers::resolve_effects, ReducerTest};

    fn with_items(items: Vec<Notification>) -> AppState {
        AppState {
            notifications: NotificationsState {
                items,
                loading: false,
            },
            ..AppState::default()
        }
    }

    #[tokio::test]
    async fn mark_all_read_clears_the_badge() {
        let (env, backend, _) = test_environment();
        backend.insert_notification(mocks::notification("n1", false));
        backend.insert_notification(mocks::notification("n2", true));
        let mut state = with_items(vec![
            mocks::notification("n1", false),
            mocks::notification("n2", true),
        ]);
        assert_eq!(state.notifications.unread_count(), 1);

        let effects =
            NotificationsReducer.reduce(&mut state, NotificationsAction::MarkAllRead.into(), &env);
        for action in resolve_effects(effects).await {
            let _ = NotificationsReducer.reduce(&mut state, action, &env);
        }

        assert_eq!(state.notifications.unread_count(), 0);
        assert_eq!(backend.count("mark_all_notifications_read"), 1);
    }

    #[test]
    fn nothing_unread_makes_no_call() {
        let (env, _, _) = test_environment();
        ReducerTest::new(NotificationsReducer)
            .with_env(env)
            .given_state(with_items(vec![mocks::notification("n1", true)]))
            .when_action(NotificationsAction::MarkAllRead.into())
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[tokio::test]
    async fn mark_one_read() {
        let (env, backend, _) = test_environment();
        backend.insert_notification(mocks::notification("n1", false));
        let mut state = with_items(vec![mocks::notification("n1", false)]);

        let effects = NotificationsReducer.reduce(
            &mut state,
            NotificationsAction::MarkRead { id: NotificationId::new("n1") }.into(),
            &env,
        );
        for action in resolve_effects(effects).await {
            let _ = NotificationsReducer.reduce(&mut state, action, &env);
        }
        assert!(state.notifications.items[0].read);
    }

    #[test]
    fn logout_clears_notifications() {
        let (env, _, _) = test_environment();
        ReducerTest::new(NotificationsReducer)
            .with_env(env)
            .given_state(with_items(vec![mocks::notification("n1", false)]))
            .when_action(SessionAction::Logout.into())
            .then_state(|state| assert!(state.notifications.items.is_empty()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[tokio::test]
    async fn delete_removes_the_item() {
        let (env, backend, _) = test_environment();
        backend.insert_notification(mocks::notification("n1", false));
        let mut state = with_items(vec![mocks::notification("n1", false)]);

        let effects = NotificationsReducer.reduce(
            &mut state,
            NotificationsAction::Delete { id: NotificationId::new("n1") }.into(),
            &env,
        );
        for action in resolve_effects(effects).await {
            let _ = NotificationsReducer.reduce(&mut state, action, &env);
        }
        assert!(state.notifications.items.is_empty());
    }
}
