//! Backend REST API boundary.
//!
//! [`BackendApi`] is the only way the client reaches the backend. Reducers
//! hold it as `Arc<dyn BackendApi>` in the environment; production uses
//! [`http::HttpBackend`], tests use [`crate::mocks::InMemoryBackend`].

pub mod http;

use crate::error::ApiError;
use crate::gateway::GatewayRedirect;
use crate::types::{
    Booking, BookingId, Category, CategoryId, Event, EventId, EventStatus, Money, Notification,
    NotificationId, Package, PackageId, Review, ReviewId, Role, TransactionId, User, UserId,
    wire_names,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Login form
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    /// Account email
    pub email: String,
    /// Plain password, sent over TLS only
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Sign-up form
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    /// Display name
    pub name: String,
    /// Account email
    pub email: String,
    /// Plain password
    pub password: String,
    /// `User` or `Organizer`; the backend refuses `Admin`
    pub role: Role,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// Bearer token issued by the backend
///
/// `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a raw token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token for the `Authorization` header
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Token and account returned by login and register
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AuthSession {
    /// Bearer token
    pub token: BearerToken,
    /// Signed-in account
    pub user: User,
}

/// Profile changes; unset fields are left alone
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Phone number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Short bio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Avatar URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Server-side filters for `GET /events`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Only this category
    pub category: Option<CategoryId>,
    /// Full-text search
    pub search: Option<String>,
    /// Only this status
    pub status: Option<EventStatus>,
}

impl EventQuery {
    /// Query string pairs, skipping unset filters
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(category) = &self.category {
            pairs.push(("category", category.to_string()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        pairs
    }
}

/// Event create/update body
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Start date
    pub date: DateTime<Utc>,
    /// Start time of day
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// End date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    /// End time of day
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    /// Venue
    pub venue: String,
    /// Street address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// City
    pub city: String,
    /// Country
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Base price
    pub price: Money,
    /// Capacity
    pub max_attendees: u32,
    /// Category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
    /// Tags
    pub tags: Vec<String>,
    /// Cover image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl EventDraft {
    /// Draft pre-filled from an existing event, for editing
    #[must_use]
    pub fn from_event(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            description: event.description.clone(),
            date: event.date,
            time: event.time.clone(),
            end_date: event.end_date,
            end_time: event.end_time.clone(),
            venue: event.venue.clone(),
            address: event.address.clone(),
            city: event.city.clone(),
            country: event.country.clone(),
            price: event.price,
            max_attendees: event.max_attendees,
            category: event.category_id().cloned(),
            tags: event.tags.clone(),
            image: event.image.clone(),
        }
    }
}

/// Package create/update body
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDraft {
    /// Owning event
    #[serde(rename = "eventId")]
    pub event: EventId,
    /// Name
    pub name: String,
    /// Description
    pub description: String,
    /// Price per ticket
    pub price: Money,
    /// What the tier includes
    pub features: Vec<String>,
    /// Inventory
    pub max_bookings: u32,
    /// Offered for sale
    pub is_active: bool,
}

/// Direct booking body, used for free events
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    /// Event to book
    pub event_id: EventId,
    /// Ticket tier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_id: Option<PackageId>,
    /// Tickets
    pub quantity: u32,
    /// Expected total (zero for free events)
    pub total_amount: Money,
    /// `"free"` for direct bookings
    pub payment_method: String,
}

/// Review or reply body
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    /// Reviewed event
    pub event_id: EventId,
    /// Stars; replies send 0
    pub rating: u8,
    /// Text
    pub comment: String,
    /// Set for replies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_review: Option<ReviewId>,
}

/// Payment intent sent to `POST /payments/initiate`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    /// Event
    pub event_id: EventId,
    /// Ticket tier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_id: Option<PackageId>,
    /// Tickets
    pub quantity: u32,
    /// Total including the processing fee
    pub amount: Money,
    /// ISO currency code
    pub currency: String,
}

/// Answer of `GET /payments/status/{transaction_id}`
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(remote = "Self")]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusReport {
    /// Transaction
    #[serde(alias = "tranId")]
    pub transaction_id: TransactionId,
    /// Gateway status (`VALID`, `FAILED`, `PENDING`, ...)
    pub status: String,
    /// Amount the gateway charged
    #[serde(default)]
    pub amount: Option<Money>,
    /// Booking recorded for this transaction, if any
    #[serde(default)]
    pub booking: Option<Booking>,
}

wire_names!(@de PaymentStatusReport { "transactionId" => ["tranId"] });

impl PaymentStatusReport {
    /// The gateway accepted the payment
    #[must_use]
    pub fn is_paid(&self) -> bool {
        crate::gateway::is_valid_status(&self.status)
    }
}

#[derive(Serialize)]
pub(crate) struct RoleChange {
    pub role: Role,
}

#[derive(Serialize)]
pub(crate) struct StatusChange {
    pub status: EventStatus,
}

#[derive(Serialize)]
pub(crate) struct Cancellation<'a> {
    pub reason: &'a str,
}

/// Everything the client asks of the backend
///
/// One method per REST operation. Implementations attach the bearer token
/// set through [`BackendApi::set_token`] to every request.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Replace (or clear) the bearer token used for later requests
    fn set_token(&self, token: Option<BearerToken>);

    /// `POST /auth/login`
    async fn login(&self, credentials: &Credentials) -> Result<AuthSession, ApiError>;
    /// `POST /auth/register`
    async fn register(&self, registration: &Registration) -> Result<AuthSession, ApiError>;
    /// `GET /auth/me`
    async fn current_user(&self) -> Result<User, ApiError>;
    /// `PUT /users/profile`
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError>;
    /// `GET /users`
    async fn list_users(&self) -> Result<Vec<User>, ApiError>;
    /// `PUT /users/{id}/role`
    async fn change_role(&self, user: &UserId, role: Role) -> Result<User, ApiError>;
    /// `DELETE /users/{id}`
    async fn delete_user(&self, user: &UserId) -> Result<(), ApiError>;

    /// `GET /events`
    async fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>, ApiError>;
    /// `GET /events/{id}`
    async fn get_event(&self, id: &EventId) -> Result<Event, ApiError>;
    /// `GET /events/organizer/my-events`
    async fn my_events(&self) -> Result<Vec<Event>, ApiError>;
    /// `POST /events`
    async fn create_event(&self, draft: &EventDraft) -> Result<Event, ApiError>;
    /// `PUT /events/{id}`
    async fn update_event(&self, id: &EventId, draft: &EventDraft) -> Result<Event, ApiError>;
    /// `DELETE /events/{id}`
    async fn delete_event(&self, id: &EventId) -> Result<(), ApiError>;
    /// `PATCH /events/{id}/status`
    async fn set_event_status(&self, id: &EventId, status: EventStatus)
    -> Result<Event, ApiError>;

    /// `GET /packages/event/{event_id}`
    async fn list_packages(&self, event: &EventId) -> Result<Vec<Package>, ApiError>;
    /// `POST /packages`
    async fn create_package(&self, draft: &PackageDraft) -> Result<Package, ApiError>;
    /// `PUT /packages/{id}`
    async fn update_package(&self, id: &PackageId, draft: &PackageDraft)
    -> Result<Package, ApiError>;
    /// `DELETE /packages/{id}`
    async fn delete_package(&self, id: &PackageId) -> Result<(), ApiError>;

    /// `GET /categories`
    async fn list_categories(&self) -> Result<Vec<Category>, ApiError>;
    /// `GET /categories/{id}`
    async fn get_category(&self, id: &CategoryId) -> Result<Category, ApiError>;

    /// `GET /bookings/my-bookings`
    async fn my_bookings(&self) -> Result<Vec<Booking>, ApiError>;
    /// `GET /bookings/{id}`
    async fn get_booking(&self, id: &BookingId) -> Result<Booking, ApiError>;
    /// `POST /bookings`
    async fn create_booking(&self, request: &BookingRequest) -> Result<Booking, ApiError>;
    /// `PUT /bookings/{id}/cancel`
    async fn cancel_booking(&self, id: &BookingId, reason: &str) -> Result<Booking, ApiError>;

    /// `GET /reviews/event/{event_id}`
    async fn event_reviews(&self, event: &EventId) -> Result<Vec<Review>, ApiError>;
    /// `POST /reviews`
    async fn create_review(&self, request: &ReviewRequest) -> Result<Review, ApiError>;
    /// `POST /reviews/{id}/like` (toggles)
    async fn like_review(&self, id: &ReviewId) -> Result<Review, ApiError>;
    /// `DELETE /reviews/{id}`
    async fn delete_review(&self, id: &ReviewId) -> Result<(), ApiError>;

    /// `GET /notifications`
    async fn notifications(&self) -> Result<Vec<Notification>, ApiError>;
    /// `PUT /notifications/{id}/read`
    async fn mark_notification_read(&self, id: &NotificationId)
    -> Result<Notification, ApiError>;
    /// `PUT /notifications/read-all`
    async fn mark_all_notifications_read(&self) -> Result<(), ApiError>;
    /// `DELETE /notifications/{id}`
    async fn delete_notification(&self, id: &NotificationId) -> Result<(), ApiError>;

    /// `POST /payments/initiate`
    async fn initiate_payment(&self, intent: &PaymentIntent) -> Result<GatewayRedirect, ApiError>;
    /// `GET /payments/status/{transaction_id}`
    async fn payment_status(
        &self,
        transaction: &TransactionId,
    ) -> Result<PaymentStatusReport, ApiError>;
}
