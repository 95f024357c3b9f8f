//! Reviews of the open event.

use crate::api::ReviewRequest;
use crate::app::{call, AppAction, AppEnvironment, AppState, Effects};
use crate::error::{ApiError, ReviewError};
use crate::features::catalog::CatalogAction;
use crate::features::navigation::NavigationAction;
use crate::features::session::SessionAction;
use crate::listing::{self, RatingFilter, RatingSummary, ReviewSort};
use crate::notice::{notify, report, NoticeLevel};
use crate::routes::Route;
use crate::types::{EventId, Review, ReviewId, User};
use eventhub_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use std::sync::Arc;

/// Reviews slice
#[derive(Clone, Debug, Default)]
pub struct ReviewsState {
    /// Event whose reviews are shown
    pub event_id: Option<EventId>,
    /// Reviews and replies, last fetched
    pub reviews: Vec<Review>,
    /// Fetch in flight
    pub loading: bool,
    /// Rating bucket
    pub filter: RatingFilter,
    /// Order
    pub sort: ReviewSort,
    /// Review or reply being posted
    pub submitting: bool,
}

impl ReviewsState {
    /// Top-level reviews after filter and sort
    #[must_use]
    pub fn visible(&self) -> Vec<&Review> {
        listing::visible_reviews(&self.reviews, self.filter, self.sort)
    }

    /// Replies to `parent`, oldest first
    #[must_use]
    pub fn replies(&self, parent: &ReviewId) -> Vec<&Review> {
        listing::replies_to(&self.reviews, parent)
    }

    /// Average and histogram
    #[must_use]
    pub fn summary(&self) -> RatingSummary {
        listing::rating_summary(&self.reviews)
    }
}

/// Check a new top-level review before sending it
///
/// # Errors
///
/// Returns [`ReviewError`] for a rating outside 1..=5, a blank comment, or
/// a second top-level review by the same user.
pub fn validate_review(
    existing: &[Review],
    author: &User,
    rating: u8,
    comment: &str,
) -> Result<(), ReviewError> {
    if !(1..=5).contains(&rating) {
        return Err(ReviewError::RatingOutOfRange(rating));
    }
    if comment.trim().is_empty() {
        return Err(ReviewError::EmptyComment);
    }
    if existing
        .iter()
        .any(|r| !r.is_reply && *r.author() == author.id)
    {
        return Err(ReviewError::AlreadyReviewed);
    }
    Ok(())
}

/// Reviews actions
#[derive(Clone, Debug)]
pub enum ReviewsAction {
    /// Fetch reviews of an event
    Load {
        /// Event
        event_id: EventId,
    },
    /// Reviews fetched
    Loaded {
        /// Event they belong to
        event_id: EventId,
        /// Reviews and replies
        reviews: Vec<Review>,
    },
    /// Post a review of the open event
    Submit {
        /// Stars, 1..=5
        rating: u8,
        /// Text
        comment: String,
    },
    /// Reply to a review
    Reply {
        /// Review replied to
        parent: ReviewId,
        /// Text
        comment: String,
    },
    /// Review or reply saved
    Submitted {
        /// Saved review
        review: Review,
    },
    /// Like, or unlike if already liked
    ToggleLike {
        /// Review
        id: ReviewId,
    },
    /// Like toggled
    Liked {
        /// Updated review
        review: Review,
    },
    /// Delete a review
    Delete {
        /// Review
        id: ReviewId,
    },
    /// Review deleted
    Deleted {
        /// Review
        id: ReviewId,
    },
    /// Change the rating bucket
    SetFilter {
        /// Bucket
        filter: RatingFilter,
    },
    /// Change the order
    SetSort {
        /// Order
        sort: ReviewSort,
    },
    /// A review request failed
    Failed {
        /// Backend error
        error: ApiError,
    },
}

/// Owns [`ReviewsState`]
#[derive(Clone, Copy, Debug, Default)]
pub struct ReviewsReducer;

impl Reducer for ReviewsReducer {
    type State = AppState;
    type Action = AppAction;
    type Environment = AppEnvironment;

    #[allow(clippy::too_many_lines)]
    fn reduce(&self, state: &mut AppState, action: AppAction, env: &AppEnvironment) -> Effects {
        let action = match action {
            AppAction::Reviews(action) => action,
            AppAction::Catalog(CatalogAction::LoadEventDetail { id }) => {
                ReviewsAction::Load { event_id: id }
            },
            AppAction::Session(SessionAction::Logout | SessionAction::Expired) => {
                state.reviews.submitting = false;
                return SmallVec::new();
            },
            _ => return SmallVec::new(),
        };

        let user = state.session.user.as_ref();
        let reviews = &mut state.reviews;
        match action {
            ReviewsAction::Load { event_id } => {
                if reviews.event_id.as_ref() != Some(&event_id) {
                    reviews.reviews.clear();
                }
                reviews.event_id = Some(event_id.clone());
                reviews.loading = true;
                let api = Arc::clone(&env.api);
                let loaded = event_id.clone();
                smallvec![call(
                    async move { api.event_reviews(&event_id).await },
                    move |reviews| ReviewsAction::Loaded {
                        event_id: loaded,
                        reviews,
                    }
                    .into(),
                    |error| ReviewsAction::Failed { error }.into(),
                )]
            },

            ReviewsAction::Loaded {
                event_id,
                reviews: fetched,
            } => {
                if reviews.event_id.as_ref() != Some(&event_id) {
                    return SmallVec::new();
                }
                reviews.loading = false;
                reviews.reviews = fetched;
                SmallVec::new()
            },

            ReviewsAction::Submit { rating, comment } => {
                let Some(event_id) = reviews.event_id.clone() else {
                    return SmallVec::new();
                };
                let Some(user) = user else {
                    return sign_in_first(event_id);
                };
                if reviews.submitting {
                    return SmallVec::new();
                }
                if let Err(error) = validate_review(&reviews.reviews, user, rating, &comment) {
                    return smallvec![notify(NoticeLevel::Error, error.to_string())];
                }
                reviews.submitting = true;
                post(
                    env,
                    ReviewRequest {
                        event_id,
                        rating,
                        comment: comment.trim().to_string(),
                        parent_review: None,
                    },
                )
            },

            ReviewsAction::Reply { parent, comment } => {
                let Some(event_id) = reviews.event_id.clone() else {
                    return SmallVec::new();
                };
                if user.is_none() {
                    return sign_in_first(event_id);
                }
                if comment.trim().is_empty() {
                    return smallvec![notify(NoticeLevel::Error, ReviewError::EmptyComment.to_string())];
                }
                if reviews.submitting {
                    return SmallVec::new();
                }
                reviews.submitting = true;
                post(
                    env,
                    ReviewRequest {
                        event_id,
                        rating: 0,
                        comment: comment.trim().to_string(),
                        parent_review: Some(parent),
                    },
                )
            },

            ReviewsAction::Submitted { review } => {
                reviews.submitting = false;
                let message = if review.is_reply {
                    "Reply posted"
                } else {
                    "Thanks for your review!"
                };
                reviews.reviews.push(review);
                smallvec![notify(NoticeLevel::Success, message)]
            },

            ReviewsAction::ToggleLike { id } => {
                let Some(event_id) = reviews.event_id.clone() else {
                    return SmallVec::new();
                };
                if user.is_none() {
                    return sign_in_first(event_id);
                }
                let api = Arc::clone(&env.api);
                smallvec![call(
                    async move { api.like_review(&id).await },
                    |review| ReviewsAction::Liked { review }.into(),
                    |error| ReviewsAction::Failed { error }.into(),
                )]
            },

            ReviewsAction::Liked { review } => {
                if let Some(existing) = reviews.reviews.iter_mut().find(|r| r.id == review.id) {
                    *existing = review;
                }
                SmallVec::new()
            },

            ReviewsAction::Delete { id } => {
                let Some(user) = user else {
                    return SmallVec::new();
                };
                let Some(review) = reviews.reviews.iter().find(|r| r.id == id) else {
                    return SmallVec::new();
                };
                if *review.author() != user.id && !user.role.is_admin() {
                    return smallvec![notify(NoticeLevel::Error, ReviewError::NotAuthor.to_string())];
                }
                let api = Arc::clone(&env.api);
                smallvec![call(
                    async move {
                        api.delete_review(&id).await?;
                        Ok(id)
                    },
                    |id| ReviewsAction::Deleted { id }.into(),
                    |error| ReviewsAction::Failed { error }.into(),
                )]
            },

            ReviewsAction::Deleted { id } => {
                reviews
                    .reviews
                    .retain(|r| r.id != id && r.parent_review.as_ref() != Some(&id));
                smallvec![notify(NoticeLevel::Success, "Review deleted")]
            },

            ReviewsAction::SetFilter { filter } => {
                reviews.filter = filter;
                SmallVec::new()
            },

            ReviewsAction::SetSort { sort } => {
                reviews.sort = sort;
                SmallVec::new()
            },

            ReviewsAction::Failed { error } => {
                reviews.loading = false;
                reviews.submitting = false;
                smallvec![report(&error)]
            },
        }
    }
}

fn post(env: &AppEnvironment, request: ReviewRequest) -> Effects {
    let api = Arc::clone(&env.api);
    smallvec![call(
        async move { api.create_review(&request).await },
        |review| ReviewsAction::Submitted { review }.into(),
        |error| ReviewsAction::Failed { error }.into(),
    )]
}

fn sign_in_first(event_id: EventId) -> Effects {
    let route = Route::EventDetail(event_id).login_then();
    smallvec![Effect::send(NavigationAction::Navigate { route }.into())]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::BearerToken;
    use crate::features::session::SessionState;
    use crate::mocks::{self, test_environment};
    use crate::types::Role;
    use eventhub_testing::{assertions, helpers::resolve_effects, ReducerTest};

    fn open_event(user: Option<User>, reviews: Vec<Review>) -> AppState {
        AppState {
            session: SessionState {
                token: user.as_ref().map(|u| BearerToken::new(format!("token-{}", u.id))),
                user,
                ..SessionState::default()
            },
            reviews: ReviewsState {
                event_id: Some(EventId::new("e1")),
                reviews,
                ..ReviewsState::default()
            },
            ..AppState::default()
        }
    }

    fn submit(rating: u8, comment: &str) -> AppAction {
        ReviewsAction::Submit {
            rating,
            comment: comment.to_string(),
        }
        .into()
    }

    #[test]
    fn validation_rules() {
        let ada = mocks::user("u1", Role::User);
        let existing = vec![mocks::review("r1", "e1", "u1", 4)];

        assert_eq!(
            validate_review(&[], &ada, 0, "ok"),
            Err(ReviewError::RatingOutOfRange(0))
        );
        assert_eq!(
            validate_review(&[], &ada, 6, "ok"),
            Err(ReviewError::RatingOutOfRange(6))
        );
        assert_eq!(validate_review(&[], &ada, 5, "   "), Err(ReviewError::EmptyComment));
        assert_eq!(
            validate_review(&existing, &ada, 5, "again"),
            Err(ReviewError::AlreadyReviewed)
        );
        assert_eq!(validate_review(&existing, &mocks::user("u2", Role::User), 5, "great"), Ok(()));
    }

    #[tokio::test]
    async fn out_of_range_rating_makes_no_call() {
        let (env, backend, _) = test_environment();
        let mut state = open_event(Some(mocks::user("u1", Role::User)), Vec::new());

        let effects = ReviewsReducer.reduce(&mut state, submit(9, "hmm"), &env);
        let _ = resolve_effects(effects).await;

        assert!(!state.reviews.submitting);
        assert_eq!(backend.count("create_review"), 0);
    }

    #[tokio::test]
    async fn submitted_review_is_appended() {
        let (env, backend, _) = test_environment();
        let user = mocks::user("u1", Role::User);
        backend.add_account(user.clone(), "secret");
        backend.sign_in_as("u1");
        let mut state = open_event(Some(user), Vec::new());

        let effects = ReviewsReducer.reduce(&mut state, submit(5, " Loved it "), &env);
        assert!(state.reviews.submitting);
        for action in resolve_effects(effects).await {
            let _ = ReviewsReducer.reduce(&mut state, action, &env);
        }

        assert!(!state.reviews.submitting);
        assert_eq!(state.reviews.reviews.len(), 1);
        assert_eq!(state.reviews.reviews[0].comment, "Loved it");
        assert_eq!(state.reviews.summary().count, 1);
    }

    #[test]
    fn guests_are_sent_to_login() {
        let (env, _, _) = test_environment();
        ReducerTest::new(ReviewsReducer)
            .with_env(env)
            .given_state(open_event(None, Vec::new()))
            .when_action(submit(5, "great"))
            .then_state(|state| assert!(!state.reviews.submitting))
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn only_authors_and_admins_delete() {
        let (env, _, _) = test_environment();
        let theirs = mocks::review("r1", "e1", "u2", 3);

        ReducerTest::new(ReviewsReducer)
            .with_env(env.clone())
            .given_state(open_event(Some(mocks::user("u1", Role::User)), vec![theirs.clone()]))
            .when_action(ReviewsAction::Delete { id: ReviewId::new("r1") }.into())
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();

        let mut state = open_event(Some(mocks::user("admin", Role::Admin)), vec![theirs]);
        let effects = ReviewsReducer.reduce(
            &mut state,
            ReviewsAction::Delete { id: ReviewId::new("r1") }.into(),
            &env,
        );
        assertions::assert_has_future_effect(&effects);
    }

    #[test]
    fn deleting_a_review_drops_its_replies() {
        let (env, _, _) = test_environment();
        let mut reply = mocks::review("r2", "e1", "u2", 0);
        reply.is_reply = true;
        reply.parent_review = Some(ReviewId::new("r1"));

        ReducerTest::new(ReviewsReducer)
            .with_env(env)
            .given_state(open_event(
                None,
                vec![mocks::review("r1", "e1", "u1", 4), reply, mocks::review("r3", "e1", "u3", 2)],
            ))
            .when_action(ReviewsAction::Deleted { id: ReviewId::new("r1") }.into())
            .then_state(|state| {
                let ids: Vec<&str> = state.reviews.reviews.iter().map(|r| r.id.as_str()).collect();
                assert_eq!(ids, vec!["r3"]);
            })
            .run();
    }

    #[test]
    fn opening_an_event_loads_its_reviews() {
        let (env, _, _) = test_environment();
        ReducerTest::new(ReviewsReducer)
            .with_env(env)
            .given_state(AppState::default())
            .when_action(CatalogAction::LoadEventDetail { id: EventId::new("e9") }.into())
            .then_state(|state| {
                assert_eq!(state.reviews.event_id, Some(EventId::new("e9")));
                assert!(state.reviews.loading);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }
}
