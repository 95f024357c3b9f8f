//! Error types for the EventHub client

use thiserror::Error;

/// Errors returned by the backend boundary
///
/// `Api` displays the backend's own message so it can be shown to the user
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// The bearer token is missing, invalid, or expired, or the credentials
    /// were refused; carries the backend's message when it sent one
    #[error("Your session has expired. Please sign in again.")]
    Unauthorized(Option<String>),

    /// The backend rejected the request
    #[error("{message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message from the response body, or the status reason
        message: String,
    },

    /// The response body did not have the expected shape
    #[error("Unexpected response from {operation}: {detail}")]
    Schema {
        /// Backend operation that produced the body
        operation: &'static str,
        /// Deserializer message
        detail: String,
    },
}

impl ApiError {
    /// True when the session must be dropped
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Message the backend attached to a 401, if any
    #[must_use]
    pub fn unauthorized_reason(&self) -> Option<&str> {
        match self {
            Self::Unauthorized(reason) => reason.as_deref(),
            _ => None,
        }
    }

    /// Shorthand for a 404 with a message
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Api {
            status: 404,
            message: message.into(),
        }
    }
}

/// Invalid configuration value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable was set but could not be used
    #[error("Invalid value {value:?} for {var}: {reason}")]
    Invalid {
        /// Environment variable name
        var: &'static str,
        /// Raw value
        value: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Client-side path could not be turned into a route
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// Not a parseable path
    #[error("Malformed path {0:?}")]
    Malformed(String),

    /// A route that needs a query parameter did not get it
    #[error("Route {route} requires query parameter {param}")]
    MissingParam {
        /// Route path
        route: &'static str,
        /// Parameter name
        param: &'static str,
    },
}

/// An event or package draft that must not be sent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    /// Title is blank
    #[error("Event title is required")]
    EmptyTitle,

    /// End date precedes the start date
    #[error("Event cannot end before it starts")]
    EndBeforeStart,

    /// Capacity of zero
    #[error("Capacity must be greater than zero")]
    ZeroCapacity,

    /// Package name is blank
    #[error("Package name is required")]
    EmptyPackageName,

    /// Package with no tickets to sell
    #[error("Package must offer at least one booking")]
    ZeroInventory,

    /// The current user neither owns the event nor is an admin
    #[error("Only the event organizer or an admin can change this event")]
    NotOwner,
}

/// A review request that must not be sent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    /// Rating outside 1..=5
    #[error("Rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(u8),

    /// Blank comment
    #[error("Please write a comment")]
    EmptyComment,

    /// The user already left a top-level review for this event
    #[error("You have already reviewed this event")]
    AlreadyReviewed,

    /// Deleting someone else's review without admin rights
    #[error("You can only delete your own reviews")]
    NotAuthor,
}
