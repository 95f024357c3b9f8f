//! Client-side routes and their access guards.

use crate::error::RouteError;
use crate::gateway::{self, GatewayReturn};
use crate::types::{BookingId, CategoryId, EventId, Role, User};
use reqwest::Url;

const ORIGIN: &str = "http://eventhub.local";

/// A client-side screen
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// `/`
    Home,
    /// `/events`
    Events,
    /// `/events/{id}`
    EventDetail(EventId),
    /// `/categories`
    Categories,
    /// `/categories/{id}`
    CategoryDetail(CategoryId),
    /// `/login?redirect=..`
    Login {
        /// Path to return to after signing in
        redirect: Option<String>,
    },
    /// `/register`
    Register,
    /// `/profile`
    Profile,
    /// `/my-bookings?highlight=..`
    MyBookings {
        /// Booking to highlight once it shows up
        highlight: Option<BookingId>,
    },
    /// `/bookings/{id}`
    BookingDetail(BookingId),
    /// `/create-event`
    CreateEvent,
    /// `/edit-event/{id}`
    EditEvent(EventId),
    /// `/my-events`
    MyEvents,
    /// `/checkout/{event_id}`
    Checkout(EventId),
    /// `/payment/success`, `/payment/failed`, `/payment/cancelled`
    PaymentReturn(GatewayReturn),
    /// `/booking-success/{id}`
    BookingSuccess(BookingId),
    /// `/notifications`
    Notifications,
    /// `/admin`
    Admin,
    /// Anything else
    NotFound(String),
}

/// Who may open a route
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Everyone
    Public,
    /// Signed-in users
    Authenticated,
    /// Organizers and admins
    Organizer,
    /// Admins
    Admin,
    /// Visitors who are not signed in
    GuestOnly,
}

/// Result of checking a route against the current user
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Show the route
    Allow,
    /// Go here instead
    Redirect(Route),
}

impl Route {
    /// Parse a client path such as `/events/42` or `/payment/success?tran_id=..`
    ///
    /// Unknown paths become [`Route::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::Malformed`] if the path cannot be parsed, or
    /// [`RouteError::MissingParam`] if a gateway success return has no
    /// transaction id.
    pub fn parse(path: &str) -> Result<Self, RouteError> {
        let trimmed = path.trim();
        let absolute = if trimmed.starts_with('/') {
            format!("{ORIGIN}{trimmed}")
        } else {
            format!("{ORIGIN}/{trimmed}")
        };
        let url = Url::parse(&absolute).map_err(|_| RouteError::Malformed(path.to_string()))?;

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let route = match segments.as_slice() {
            [] => Self::Home,
            ["events"] => Self::Events,
            ["events", id] => Self::EventDetail(EventId::from(*id)),
            ["categories"] => Self::Categories,
            ["categories", id] => Self::CategoryDetail(CategoryId::from(*id)),
            ["login"] => Self::Login {
                redirect: gateway::param(&pairs, &["redirect"])
                    .filter(|r| r.starts_with('/') && !r.starts_with("//"))
                    .map(str::to_string),
            },
            ["register"] => Self::Register,
            ["profile"] => Self::Profile,
            ["my-bookings"] => Self::MyBookings {
                highlight: gateway::param(&pairs, &["highlight"]).map(BookingId::from),
            },
            ["bookings", id] => Self::BookingDetail(BookingId::from(*id)),
            ["create-event"] => Self::CreateEvent,
            ["edit-event", id] => Self::EditEvent(EventId::from(*id)),
            ["my-events"] => Self::MyEvents,
            ["checkout", id] => Self::Checkout(EventId::from(*id)),
            ["payment", "success"] => Self::PaymentReturn(gateway::parse_success(&pairs).ok_or(
                RouteError::MissingParam {
                    route: "/payment/success",
                    param: "tran_id",
                },
            )?),
            ["payment", "failed"] => Self::PaymentReturn(gateway::parse_failed(&pairs)),
            ["payment", "cancelled"] => Self::PaymentReturn(gateway::parse_cancelled(&pairs)),
            ["booking-success", id] => Self::BookingSuccess(BookingId::from(*id)),
            ["notifications"] => Self::Notifications,
            ["admin"] => Self::Admin,
            _ => Self::NotFound(url.path().to_string()),
        };

        Ok(route)
    }

    /// Canonical path, including query parameters
    #[must_use]
    pub fn path(&self) -> String {
        let (path, pairs): (String, Vec<(&str, String)>) = match self {
            Self::Home => ("/".into(), Vec::new()),
            Self::Events => ("/events".into(), Vec::new()),
            Self::EventDetail(id) => (format!("/events/{id}"), Vec::new()),
            Self::Categories => ("/categories".into(), Vec::new()),
            Self::CategoryDetail(id) => (format!("/categories/{id}"), Vec::new()),
            Self::Login { redirect } => (
                "/login".into(),
                redirect.iter().map(|r| ("redirect", r.clone())).collect(),
            ),
            Self::Register => ("/register".into(), Vec::new()),
            Self::Profile => ("/profile".into(), Vec::new()),
            Self::MyBookings { highlight } => (
                "/my-bookings".into(),
                highlight.iter().map(|b| ("highlight", b.to_string())).collect(),
            ),
            Self::BookingDetail(id) => (format!("/bookings/{id}"), Vec::new()),
            Self::CreateEvent => ("/create-event".into(), Vec::new()),
            Self::EditEvent(id) => (format!("/edit-event/{id}"), Vec::new()),
            Self::MyEvents => ("/my-events".into(), Vec::new()),
            Self::Checkout(id) => (format!("/checkout/{id}"), Vec::new()),
            Self::PaymentReturn(ret) => {
                let path = match ret {
                    GatewayReturn::Success(_) => "/payment/success",
                    GatewayReturn::Failed { .. } => "/payment/failed",
                    GatewayReturn::Cancelled { .. } => "/payment/cancelled",
                };
                (path.into(), gateway::to_pairs(ret))
            },
            Self::BookingSuccess(id) => (format!("/booking-success/{id}"), Vec::new()),
            Self::Notifications => ("/notifications".into(), Vec::new()),
            Self::Admin => ("/admin".into(), Vec::new()),
            Self::NotFound(path) => (path.clone(), Vec::new()),
        };

        if pairs.is_empty() {
            return path;
        }
        match Url::parse(&format!("{ORIGIN}{path}")) {
            Ok(mut url) => {
                url.query_pairs_mut().extend_pairs(pairs);
                match url.query() {
                    Some(query) => format!("{}?{query}", url.path()),
                    None => url.path().to_string(),
                }
            },
            Err(_) => path,
        }
    }

    /// Who may open this route
    #[must_use]
    pub const fn access(&self) -> Access {
        match self {
            Self::Profile
            | Self::MyBookings { .. }
            | Self::BookingDetail(_)
            | Self::Checkout(_)
            | Self::PaymentReturn(_)
            | Self::BookingSuccess(_)
            | Self::Notifications => Access::Authenticated,
            Self::CreateEvent | Self::EditEvent(_) | Self::MyEvents => Access::Organizer,
            Self::Admin => Access::Admin,
            Self::Login { .. } | Self::Register => Access::GuestOnly,
            Self::Home
            | Self::Events
            | Self::EventDetail(_)
            | Self::Categories
            | Self::CategoryDetail(_)
            | Self::NotFound(_) => Access::Public,
        }
    }

    /// Login route that returns here afterwards
    #[must_use]
    pub fn login_then(&self) -> Self {
        Self::Login {
            redirect: Some(self.path()),
        }
    }

    /// Routes that show the post-payment bookings poll
    #[must_use]
    pub const fn watches_bookings(&self) -> bool {
        matches!(
            self,
            Self::MyBookings { .. } | Self::PaymentReturn(_) | Self::BookingSuccess(_)
        )
    }
}

/// Decide whether `user` may open `route`
#[must_use]
pub fn guard(route: &Route, user: Option<&User>) -> GuardOutcome {
    let role = user.map(|u| u.role);
    match (route.access(), role) {
        (Access::Public, _)
        | (Access::GuestOnly, None)
        | (Access::Authenticated, Some(_))
        | (Access::Organizer, Some(Role::Organizer | Role::Admin))
        | (Access::Admin, Some(Role::Admin)) => GuardOutcome::Allow,
        (Access::GuestOnly, Some(_)) | (Access::Organizer | Access::Admin, Some(_)) => {
            GuardOutcome::Redirect(Route::Home)
        },
        (Access::Authenticated | Access::Organizer | Access::Admin, None) => {
            GuardOutcome::Redirect(route.login_then())
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{TransactionId, UserId};

    fn user(role: Role) -> User {
        User {
            id: UserId::new("u1"),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            role,
            avatar: None,
            phone: None,
            bio: None,
        }
    }

    #[test]
    fn parses_every_static_route() {
        let cases = [
            ("/", Route::Home),
            ("/events", Route::Events),
            ("/events/e1", Route::EventDetail(EventId::new("e1"))),
            ("/categories/c1/", Route::CategoryDetail(CategoryId::new("c1"))),
            ("/register", Route::Register),
            ("/profile", Route::Profile),
            ("/my-bookings", Route::MyBookings { highlight: None }),
            ("/bookings/b1", Route::BookingDetail(BookingId::new("b1"))),
            ("/create-event", Route::CreateEvent),
            ("/edit-event/e1", Route::EditEvent(EventId::new("e1"))),
            ("/my-events", Route::MyEvents),
            ("checkout/e1", Route::Checkout(EventId::new("e1"))),
            ("/booking-success/b1", Route::BookingSuccess(BookingId::new("b1"))),
            ("/notifications", Route::Notifications),
            ("/admin", Route::Admin),
            ("/nope/nope", Route::NotFound("/nope/nope".to_string())),
        ];
        for (path, route) in cases {
            assert_eq!(Route::parse(path).unwrap(), route, "{path}");
        }
    }

    #[test]
    fn login_redirect_round_trips() {
        let login = Route::Checkout(EventId::new("e1")).login_then();
        let path = login.path();
        assert_eq!(path, "/login?redirect=%2Fcheckout%2Fe1");
        assert_eq!(Route::parse(&path).unwrap(), login);
    }

    #[test]
    fn login_ignores_offsite_redirects() {
        for target in ["https://evil.example.com", "//evil.example.com"] {
            assert_eq!(
                Route::parse(&format!("/login?redirect={target}")).unwrap(),
                Route::Login { redirect: None }
            );
        }
    }

    #[test]
    fn payment_routes_parse_gateway_params() {
        let route = Route::parse("/payment/failed?tran_id=TXN-1&reason=card_declined").unwrap();
        let Route::PaymentReturn(GatewayReturn::Failed { transaction_id, reason }) = route else {
            unreachable!("expected failed payment return");
        };
        assert_eq!(transaction_id, Some(TransactionId::new("TXN-1")));
        assert_eq!(reason, crate::gateway::FailureReason::CardDeclined);

        assert!(matches!(
            Route::parse("/payment/success?status=VALID"),
            Err(RouteError::MissingParam { .. })
        ));
    }

    #[test]
    fn guards_send_visitors_to_login_with_redirect() {
        let outcome = guard(&Route::MyBookings { highlight: None }, None);
        assert_eq!(
            outcome,
            GuardOutcome::Redirect(Route::Login {
                redirect: Some("/my-bookings".to_string())
            })
        );
    }

    #[test]
    fn guards_send_underprivileged_users_home() {
        let attendee = user(Role::User);
        assert_eq!(
            guard(&Route::CreateEvent, Some(&attendee)),
            GuardOutcome::Redirect(Route::Home)
        );
        assert_eq!(guard(&Route::Admin, Some(&user(Role::Organizer))), GuardOutcome::Redirect(Route::Home));
        assert_eq!(guard(&Route::MyEvents, Some(&user(Role::Organizer))), GuardOutcome::Allow);
        assert_eq!(guard(&Route::Admin, Some(&user(Role::Admin))), GuardOutcome::Allow);
    }

    #[test]
    fn guest_only_routes_bounce_signed_in_users() {
        assert_eq!(
            guard(&Route::Login { redirect: None }, Some(&user(Role::User))),
            GuardOutcome::Redirect(Route::Home)
        );
        assert_eq!(guard(&Route::Register, None), GuardOutcome::Allow);
    }
}
