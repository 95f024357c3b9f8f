//! [`BackendApi`] over HTTP with `reqwest`.

use super::{
    AuthSession, BackendApi, BearerToken, BookingRequest, Cancellation, Credentials, EventDraft,
    EventQuery, PackageDraft, PaymentIntent, PaymentStatusReport, ProfileUpdate, Registration,
    ReviewRequest, RoleChange, StatusChange,
};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::gateway::GatewayRedirect;
use crate::types::{
    Booking, BookingId, Category, CategoryId, Event, EventId, EventStatus, Notification,
    NotificationId, Package, PackageId, Review, ReviewId, Role, TransactionId, User, UserId,
};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{PoisonError, RwLock};

/// Backend client over the REST API
///
/// Every request carries the bearer token last passed to
/// [`BackendApi::set_token`]. Responses may be wrapped in
/// `{ "success": .., "data": .. }` or be the bare payload; both are accepted.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: RwLock<Option<BearerToken>>,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpBackend {
    /// Build a client for `config.api_url`
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] if the TLS backend cannot be initialized.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("eventhub-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: RwLock::new(config.auth_token.clone().map(BearerToken::new)),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{path}", self.base_url));
        let token = self.token.read().unwrap_or_else(PoisonError::into_inner);
        match token.as_ref() {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder,
        }
    }

    async fn execute(&self, operation: &'static str, request: RequestBuilder) -> Result<Value, ApiError> {
        let result = match request.build() {
            Ok(request) => {
                tracing::debug!(
                    operation,
                    method = %request.method(),
                    path = request.url().path(),
                    "Backend request"
                );
                match self.client.execute(request).await {
                    Ok(response) => read(operation, response).await,
                    Err(error) => Err(ApiError::Network(error.to_string())),
                }
            },
            Err(error) => Err(ApiError::Network(error.to_string())),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(ApiError::Network(_)) => "network",
            Err(ApiError::Unauthorized(_)) => "unauthorized",
            Err(ApiError::Api { .. }) => "rejected",
            Err(ApiError::Schema { .. }) => "schema",
        };
        metrics::counter!("api.requests.total", "operation" => operation, "outcome" => outcome)
            .increment(1);
        if let Err(error) = &result {
            tracing::warn!(operation, %error, "Backend request failed");
        }
        result
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let body = self.execute(operation, request).await?;
        decode(operation, body)
    }

    async fn get<T: DeserializeOwned>(&self, operation: &'static str, path: &str) -> Result<T, ApiError> {
        self.fetch(operation, self.request(Method::GET, path)).await
    }

    async fn send_json<B, T>(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.fetch(operation, self.request(method, path).json(body)).await
    }

    async fn delete(&self, operation: &'static str, path: &str) -> Result<(), ApiError> {
        self.execute(operation, self.request(Method::DELETE, path))
            .await
            .map(|_| ())
    }
}

async fn read(operation: &'static str, response: Response) -> Result<Value, ApiError> {
    let status = response.status();
    tracing::debug!(operation, status = status.as_u16(), "Backend response");

    let text = response
        .text()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized(error_message(&text)));
    }
    if !status.is_success() {
        return Err(ApiError::Api {
            status: status.as_u16(),
            message: error_message(&text)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string()),
        });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    let body: Value = serde_json::from_str(&text).map_err(|e| ApiError::Schema {
        operation,
        detail: e.to_string(),
    })?;
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(ApiError::Api {
            status: status.as_u16(),
            message: error_message(&text).unwrap_or_else(|| "Request failed".to_string()),
        });
    }
    Ok(body)
}

/// `message` or `error` from an error body, if it has one
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(ToString::to_string)
}

/// Strip the `{ success, data }` envelope when present
fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or(Value::Null),
        other => other,
    }
}

fn decode<T: DeserializeOwned>(operation: &'static str, body: Value) -> Result<T, ApiError> {
    serde_json::from_value(unwrap_envelope(body)).map_err(|e| ApiError::Schema {
        operation,
        detail: e.to_string(),
    })
}

/// `/auth/me` and profile updates answer either the user or `{ "user": .. }`
#[derive(Deserialize)]
#[serde(untagged)]
enum UserBody {
    Wrapped { user: User },
    Bare(User),
}

impl From<UserBody> for User {
    fn from(body: UserBody) -> Self {
        match body {
            UserBody::Wrapped { user } | UserBody::Bare(user) => user,
        }
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    fn set_token(&self, token: Option<BearerToken>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthSession, ApiError> {
        self.send_json("login", Method::POST, "/auth/login", credentials).await
    }

    async fn register(&self, registration: &Registration) -> Result<AuthSession, ApiError> {
        self.send_json("register", Method::POST, "/auth/register", registration)
            .await
    }

    async fn current_user(&self) -> Result<User, ApiError> {
        self.get::<UserBody>("current_user", "/auth/me").await.map(User::from)
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        self.send_json::<_, UserBody>("update_profile", Method::PUT, "/users/profile", update)
            .await
            .map(User::from)
    }

    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.get("list_users", "/users").await
    }

    async fn change_role(&self, user: &UserId, role: Role) -> Result<User, ApiError> {
        self.send_json(
            "change_role",
            Method::PUT,
            &format!("/users/{user}/role"),
            &RoleChange { role },
        )
        .await
    }

    async fn delete_user(&self, user: &UserId) -> Result<(), ApiError> {
        self.delete("delete_user", &format!("/users/{user}")).await
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>, ApiError> {
        let request = self.request(Method::GET, "/events").query(&query.to_pairs());
        self.fetch("list_events", request).await
    }

    async fn get_event(&self, id: &EventId) -> Result<Event, ApiError> {
        self.get("get_event", &format!("/events/{id}")).await
    }

    async fn my_events(&self) -> Result<Vec<Event>, ApiError> {
        self.get("my_events", "/events/organizer/my-events").await
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<Event, ApiError> {
        self.send_json("create_event", Method::POST, "/events", draft).await
    }

    async fn update_event(&self, id: &EventId, draft: &EventDraft) -> Result<Event, ApiError> {
        self.send_json("update_event", Method::PUT, &format!("/events/{id}"), draft)
            .await
    }

    async fn delete_event(&self, id: &EventId) -> Result<(), ApiError> {
        self.delete("delete_event", &format!("/events/{id}")).await
    }

    async fn set_event_status(
        &self,
        id: &EventId,
        status: EventStatus,
    ) -> Result<Event, ApiError> {
        self.send_json(
            "set_event_status",
            Method::PATCH,
            &format!("/events/{id}/status"),
            &StatusChange { status },
        )
        .await
    }

    async fn list_packages(&self, event: &EventId) -> Result<Vec<Package>, ApiError> {
        self.get("list_packages", &format!("/packages/event/{event}")).await
    }

    async fn create_package(&self, draft: &PackageDraft) -> Result<Package, ApiError> {
        self.send_json("create_package", Method::POST, "/packages", draft).await
    }

    async fn update_package(
        &self,
        id: &PackageId,
        draft: &PackageDraft,
    ) -> Result<Package, ApiError> {
        self.send_json("update_package", Method::PUT, &format!("/packages/{id}"), draft)
            .await
    }

    async fn delete_package(&self, id: &PackageId) -> Result<(), ApiError> {
        self.delete("delete_package", &format!("/packages/{id}")).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.get("list_categories", "/categories").await
    }

    async fn get_category(&self, id: &CategoryId) -> Result<Category, ApiError> {
        self.get("get_category", &format!("/categories/{id}")).await
    }

    async fn my_bookings(&self) -> Result<Vec<Booking>, ApiError> {
        self.get("my_bookings", "/bookings/my-bookings").await
    }

    async fn get_booking(&self, id: &BookingId) -> Result<Booking, ApiError> {
        self.get("get_booking", &format!("/bookings/{id}")).await
    }

    async fn create_booking(&self, request: &BookingRequest) -> Result<Booking, ApiError> {
        self.send_json("create_booking", Method::POST, "/bookings", request)
            .await
    }

    async fn cancel_booking(&self, id: &BookingId, reason: &str) -> Result<Booking, ApiError> {
        self.send_json(
            "cancel_booking",
            Method::PUT,
            &format!("/bookings/{id}/cancel"),
            &Cancellation { reason },
        )
        .await
    }

    async fn event_reviews(&self, event: &EventId) -> Result<Vec<Review>, ApiError> {
        self.get("event_reviews", &format!("/reviews/event/{event}")).await
    }

    async fn create_review(&self, request: &ReviewRequest) -> Result<Review, ApiError> {
        self.send_json("create_review", Method::POST, "/reviews", request).await
    }

    async fn like_review(&self, id: &ReviewId) -> Result<Review, ApiError> {
        self.fetch(
            "like_review",
            self.request(Method::POST, &format!("/reviews/{id}/like")),
        )
        .await
    }

    async fn delete_review(&self, id: &ReviewId) -> Result<(), ApiError> {
        self.delete("delete_review", &format!("/reviews/{id}")).await
    }

    async fn notifications(&self) -> Result<Vec<Notification>, ApiError> {
        self.get("notifications", "/notifications").await
    }

    async fn mark_notification_read(
        &self,
        id: &NotificationId,
    ) -> Result<Notification, ApiError> {
        self.fetch(
            "mark_notification_read",
            self.request(Method::PUT, &format!("/notifications/{id}/read")),
        )
        .await
    }

    async fn mark_all_notifications_read(&self) -> Result<(), ApiError> {
        self.execute(
            "mark_all_notifications_read",
            self.request(Method::PUT, "/notifications/read-all"),
        )
        .await
        .map(|_| ())
    }

    async fn delete_notification(&self, id: &NotificationId) -> Result<(), ApiError> {
        self.delete("delete_notification", &format!("/notifications/{id}"))
            .await
    }

    async fn initiate_payment(&self, intent: &PaymentIntent) -> Result<GatewayRedirect, ApiError> {
        self.send_json("initiate_payment", Method::POST, "/payments/initiate", intent)
            .await
    }

    async fn payment_status(
        &self,
        transaction: &TransactionId,
    ) -> Result<PaymentStatusReport, ApiError> {
        self.get("payment_status", &format!("/payments/status/{transaction}"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_is_optional() {
        let wrapped = json!({ "success": true, "data": [1, 2] });
        let bare = json!([1, 2]);
        assert_eq!(unwrap_envelope(wrapped), bare);
        assert_eq!(unwrap_envelope(bare.clone()), bare);
    }

    #[test]
    fn login_body_without_envelope_decodes() {
        let body = json!({
            "success": true,
            "token": "abc",
            "user": { "_id": "u1", "name": "Ada", "email": "a@b.c", "role": "organizer" }
        });
        let session: Result<AuthSession, _> = decode("login", body);
        assert!(matches!(session, Ok(s) if s.token.expose() == "abc" && s.user.role == Role::Organizer));
    }

    #[test]
    fn error_message_prefers_backend_text() {
        assert_eq!(
            error_message(r#"{"success":false,"message":"Event is sold out"}"#).as_deref(),
            Some("Event is sold out")
        );
        assert_eq!(error_message(r#"{"error":"  "}"#), None);
        assert_eq!(error_message("<html>"), None);
    }
}
