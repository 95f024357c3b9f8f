//! Sign-in, sign-up, session restore, and profile.
//!
//! The bearer token is handed to the backend inside the login effect, before
//! `LoggedIn` is dispatched, so the first request made in reaction to
//! `LoggedIn` is already authenticated.

use crate::api::{AuthSession, BearerToken, Credentials, ProfileUpdate, Registration};
use crate::app::{call, fire, AppAction, AppEnvironment, AppState, Effects};
use crate::error::ApiError;
use crate::notice::{notify, report, NoticeLevel};
use crate::types::User;
use eventhub_core::{reducer::Reducer, smallvec, SmallVec};
use std::sync::Arc;

/// Signed-in user
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    /// Current account
    pub user: Option<User>,
    /// Bearer token of the session
    pub token: Option<BearerToken>,
    /// Login, register or profile update in flight
    pub loading: bool,
    /// A stored token is being checked against the backend
    pub restoring: bool,
    /// Last sign-in error, shown next to the form
    pub error: Option<String>,
}

impl SessionState {
    /// Someone is signed in
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Session actions
#[derive(Clone, Debug)]
pub enum SessionAction {
    /// Sign in
    Login {
        /// Email and password
        credentials: Credentials,
    },
    /// Create an account and sign in
    Register {
        /// Sign-up form
        registration: Registration,
    },
    /// Backend accepted the credentials
    LoggedIn {
        /// Token and account
        session: AuthSession,
    },
    /// Login or register failed
    AuthFailed {
        /// Backend error
        error: ApiError,
    },
    /// Resume a session from a stored token
    Restore {
        /// Stored token
        token: BearerToken,
    },
    /// Refresh the signed-in account
    LoadCurrentUser,
    /// Account loaded for the current token
    CurrentUserLoaded {
        /// Account
        user: User,
    },
    /// The stored token was not accepted
    RestoreFailed {
        /// Backend error
        error: ApiError,
    },
    /// Change profile fields
    UpdateProfile {
        /// Changed fields
        update: ProfileUpdate,
    },
    /// Profile saved
    ProfileUpdated {
        /// Saved account
        user: User,
    },
    /// Profile load or save failed
    ProfileFailed {
        /// Backend error
        error: ApiError,
    },
    /// Sign out
    Logout,
    /// The backend rejected the token
    Expired,
}

/// Owns [`SessionState`]
#[derive(Clone, Copy, Debug, Default)]
pub struct SessionReducer;

impl Reducer for SessionReducer {
    type State = AppState;
    type Action = AppAction;
    type Environment = AppEnvironment;

    fn reduce(&self, state: &mut AppState, action: AppAction, env: &AppEnvironment) -> Effects {
        let AppAction::Session(action) = action else {
            return SmallVec::new();
        };
        let session = &mut state.session;

        match action {
            SessionAction::Login { credentials } => {
                session.loading = true;
                session.error = None;
                let api = Arc::clone(&env.api);
                smallvec![call(
                    async move {
                        let signed_in = api.login(&credentials).await?;
                        api.set_token(Some(signed_in.token.clone()));
                        Ok(signed_in)
                    },
                    |session| SessionAction::LoggedIn { session }.into(),
                    |error| SessionAction::AuthFailed { error }.into(),
                )]
            },

            SessionAction::Register { registration } => {
                session.loading = true;
                session.error = None;
                let api = Arc::clone(&env.api);
                smallvec![call(
                    async move {
                        let signed_in = api.register(&registration).await?;
                        api.set_token(Some(signed_in.token.clone()));
                        Ok(signed_in)
                    },
                    |session| SessionAction::LoggedIn { session }.into(),
                    |error| SessionAction::AuthFailed { error }.into(),
                )]
            },

            SessionAction::LoggedIn { session: signed_in } => {
                tracing::info!(user = %signed_in.user.id, role = ?signed_in.user.role, "Signed in");
                let greeting = format!("Welcome, {}!", signed_in.user.name);
                session.user = Some(signed_in.user);
                session.token = Some(signed_in.token);
                session.loading = false;
                session.restoring = false;
                smallvec![notify(NoticeLevel::Success, greeting)]
            },

            SessionAction::AuthFailed { error } => {
                session.loading = false;
                // 401 on the login endpoint means refused credentials, not an expired session
                let message = match error.unauthorized_reason() {
                    Some(reason) => reason.to_string(),
                    None if error.is_unauthorized() => "Invalid email or password".to_string(),
                    None => error.to_string(),
                };
                tracing::warn!(%error, "Sign-in failed");
                session.error = Some(message.clone());
                smallvec![notify(NoticeLevel::Error, message)]
            },

            SessionAction::Restore { token } => {
                session.restoring = true;
                session.token = Some(token.clone());
                let api = Arc::clone(&env.api);
                smallvec![call(
                    async move {
                        api.set_token(Some(token));
                        api.current_user().await
                    },
                    |user| SessionAction::CurrentUserLoaded { user }.into(),
                    |error| SessionAction::RestoreFailed { error }.into(),
                )]
            },

            SessionAction::LoadCurrentUser => {
                if session.token.is_none() {
                    return SmallVec::new();
                }
                let api = Arc::clone(&env.api);
                smallvec![call(
                    async move { api.current_user().await },
                    |user| SessionAction::CurrentUserLoaded { user }.into(),
                    |error| SessionAction::ProfileFailed { error }.into(),
                )]
            },

            SessionAction::CurrentUserLoaded { user } => {
                session.user = Some(user);
                session.restoring = false;
                SmallVec::new()
            },

            SessionAction::RestoreFailed { error } => {
                tracing::warn!(%error, "Stored session could not be restored");
                session.restoring = false;
                session.user = None;
                session.token = None;
                let api = Arc::clone(&env.api);
                smallvec![fire(move || api.set_token(None))]
            },

            SessionAction::UpdateProfile { update } => {
                if session.user.is_none() {
                    return SmallVec::new();
                }
                session.loading = true;
                let api = Arc::clone(&env.api);
                smallvec![call(
                    async move { api.update_profile(&update).await },
                    |user| SessionAction::ProfileUpdated { user }.into(),
                    |error| SessionAction::ProfileFailed { error }.into(),
                )]
            },

            SessionAction::ProfileUpdated { user } => {
                session.loading = false;
                session.user = Some(user);
                smallvec![notify(NoticeLevel::Success, "Profile updated")]
            },

            SessionAction::ProfileFailed { error } => {
                session.loading = false;
                smallvec![report(&error)]
            },

            SessionAction::Logout => {
                tracing::info!("Signed out");
                clear(session);
                let api = Arc::clone(&env.api);
                smallvec![
                    fire(move || api.set_token(None)),
                    notify(NoticeLevel::Info, "You have been signed out"),
                ]
            },

            SessionAction::Expired => {
                // Several requests can fail with 401 at once; only the first one counts
                if session.user.is_none() && session.token.is_none() {
                    return SmallVec::new();
                }
                tracing::warn!("Session expired");
                clear(session);
                let api = Arc::clone(&env.api);
                smallvec![
                    fire(move || api.set_token(None)),
                    notify(NoticeLevel::Error, ApiError::Unauthorized(None).to_string()),
                ]
            },
        }
    }
}

fn clear(session: &mut SessionState) {
    session.user = None;
    session.token = None;
    session.loading = false;
    session.restoring = false;
    session.error = None;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::{self, test_environment};
    use crate::notice::NoticeAction;
    use crate::types::Role;
    use eventhub_testing::{assertions, helpers::resolve_effects, ReducerTest};

    fn credentials(password: &str) -> Credentials {
        Credentials {
            email: "u1@example.com".to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn login_sets_token_before_reporting_success() {
        let (env, backend, _) = test_environment();
        backend.add_account(mocks::user("u1", Role::User), "secret");
        let mut state = AppState::default();

        let effects = SessionReducer.reduce(
            &mut state,
            SessionAction::Login {
                credentials: credentials("secret"),
            }
            .into(),
            &env,
        );
        assert!(state.session.loading);

        let actions = resolve_effects(effects).await;
        assert!(matches!(
            &actions[..],
            [AppAction::Session(SessionAction::LoggedIn { session })] if session.user.id.as_str() == "u1"
        ));
        assert_eq!(backend.token().unwrap().expose(), "token-u1");
    }

    #[tokio::test]
    async fn bad_password_reads_as_invalid_credentials() {
        let (env, backend, _) = test_environment();
        backend.add_account(mocks::user("u1", Role::User), "secret");
        let mut state = AppState::default();

        let effects = SessionReducer.reduce(
            &mut state,
            SessionAction::Login {
                credentials: credentials("wrong"),
            }
            .into(),
            &env,
        );
        let actions = resolve_effects(effects).await;
        let [failed] = <[AppAction; 1]>::try_from(actions).unwrap();

        let effects = SessionReducer.reduce(&mut state, failed, &env);
        assert!(!state.session.loading);
        assert_eq!(state.session.error.as_deref(), Some("Invalid email or password"));
        assert!(matches!(
            &resolve_effects(effects).await[..],
            [AppAction::Notice(NoticeAction::Push { level: NoticeLevel::Error, .. })]
        ));
    }

    #[test]
    fn refused_sign_in_shows_the_backend_reason() {
        let (env, _, _) = test_environment();
        let mut state = AppState::default();
        state.session.loading = true;

        let error = ApiError::Unauthorized(Some("Please verify your email first".to_string()));
        SessionReducer.reduce(&mut state, SessionAction::AuthFailed { error }.into(), &env);
        assert!(!state.session.loading);
        assert_eq!(state.session.error.as_deref(), Some("Please verify your email first"));
    }

    #[tokio::test]
    async fn restore_loads_the_token_owner() {
        let (env, backend, _) = test_environment();
        backend.add_account(mocks::user("u1", Role::Organizer), "secret");
        let mut state = AppState::default();

        let effects = SessionReducer.reduce(
            &mut state,
            SessionAction::Restore {
                token: BearerToken::new("token-u1"),
            }
            .into(),
            &env,
        );
        assert!(state.session.restoring);

        for action in resolve_effects(effects).await {
            let _ = SessionReducer.reduce(&mut state, action, &env);
        }
        assert!(!state.session.restoring);
        assert_eq!(state.session.user.as_ref().unwrap().role, Role::Organizer);
    }

    #[tokio::test]
    async fn restore_with_unknown_token_signs_out() {
        let (env, backend, _) = test_environment();
        let mut state = AppState::default();

        let effects = SessionReducer.reduce(
            &mut state,
            SessionAction::Restore {
                token: BearerToken::new("stale"),
            }
            .into(),
            &env,
        );
        for action in resolve_effects(effects).await {
            let effects = SessionReducer.reduce(&mut state, action, &env);
            let _ = resolve_effects(effects).await;
        }
        assert!(state.session.token.is_none());
        assert!(!state.session.restoring);
        assert!(backend.token().is_none());
    }

    #[test]
    fn expired_twice_only_reports_once() {
        let (env, _, _) = test_environment();
        let state = AppState {
            session: SessionState {
                user: Some(mocks::user("u1", Role::User)),
                token: Some(BearerToken::new("token-u1")),
                ..SessionState::default()
            },
            ..AppState::default()
        };

        ReducerTest::new(SessionReducer)
            .with_env(env)
            .given_state(state)
            .when_action(SessionAction::Expired.into())
            .when_action(SessionAction::Expired.into())
            .then_state(|state| assert!(!state.session.is_authenticated()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn profile_update_needs_a_user() {
        let (env, _, _) = test_environment();
        ReducerTest::new(SessionReducer)
            .with_env(env)
            .given_state(AppState::default())
            .when_action(
                SessionAction::UpdateProfile {
                    update: ProfileUpdate::default(),
                }
                .into(),
            )
            .then_state(|state| assert!(!state.session.loading))
            .then_effects(assertions::assert_no_effects)
            .run();
    }
}
