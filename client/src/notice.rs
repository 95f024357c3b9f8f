//! Transient user notices (toasts).

use crate::app::{AppAction, AppEnvironment, AppState, Effects};
use crate::error::ApiError;
use crate::features::session::SessionAction;
use eventhub_core::{effect::Effect, reducer::Reducer, SmallVec};
use std::collections::VecDeque;
use uuid::Uuid;

/// Notice severity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Something worked
    Success,
    /// Neutral information
    Info,
    /// Something failed
    Error,
}

/// One notice on screen
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// Id used to dismiss it
    pub id: Uuid,
    /// Severity
    pub level: NoticeLevel,
    /// Text shown to the user
    pub message: String,
}

/// Notices currently shown, oldest first
#[derive(Clone, Debug, Default)]
pub struct NoticeState {
    /// Queue, capped at `max_notices`
    pub notices: VecDeque<Notice>,
}

impl NoticeState {
    /// Most recent notice
    #[must_use]
    pub fn latest(&self) -> Option<&Notice> {
        self.notices.back()
    }

    /// Messages of every notice at `level`
    #[must_use]
    pub fn messages(&self, level: NoticeLevel) -> Vec<&str> {
        self.notices
            .iter()
            .filter(|n| n.level == level)
            .map(|n| n.message.as_str())
            .collect()
    }
}

/// Notice actions
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NoticeAction {
    /// Show a notice
    Push {
        /// Severity
        level: NoticeLevel,
        /// Text
        message: String,
    },
    /// Remove one notice
    Dismiss {
        /// Notice id
        id: Uuid,
    },
    /// Remove all notices
    Clear,
}

/// Show a notice
pub fn notify(level: NoticeLevel, message: impl Into<String>) -> Effect<AppAction> {
    Effect::send(AppAction::Notice(NoticeAction::Push {
        level,
        message: message.into(),
    }))
}

/// Surface a backend error
///
/// `Unauthorized` ends the session instead of showing the raw error.
pub fn report(error: &ApiError) -> Effect<AppAction> {
    if error.is_unauthorized() {
        tracing::warn!("Backend rejected the session token");
        return Effect::send(AppAction::Session(SessionAction::Expired));
    }
    tracing::warn!(%error, "Backend request failed");
    notify(NoticeLevel::Error, error.to_string())
}

/// Owns [`NoticeState`]
#[derive(Clone, Copy, Debug, Default)]
pub struct NoticeReducer;

impl Reducer for NoticeReducer {
    type State = AppState;
    type Action = AppAction;
    type Environment = AppEnvironment;

    fn reduce(&self, state: &mut AppState, action: AppAction, env: &AppEnvironment) -> Effects {
        let AppAction::Notice(action) = action else {
            return SmallVec::new();
        };
        let notices = &mut state.notices.notices;

        match action {
            NoticeAction::Push { level, message } => {
                notices.push_back(Notice {
                    id: Uuid::new_v4(),
                    level,
                    message,
                });
                while notices.len() > env.config.max_notices {
                    notices.pop_front();
                }
            },
            NoticeAction::Dismiss { id } => notices.retain(|n| n.id != id),
            NoticeAction::Clear => notices.clear(),
        }
        SmallVec::new()
    }
}
