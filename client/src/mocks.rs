//! In-memory backend, recording navigator, and fixtures for tests.
//!
//! [`InMemoryBackend`] answers every [`BackendApi`] call from maps held
//! behind a mutex and counts calls per operation, so tests can assert that a
//! request was (or was not) made. Tokens have the form `token-{user id}`.

use crate::api::{
    AuthSession, BackendApi, BearerToken, BookingRequest, Credentials, EventDraft, EventQuery,
    PackageDraft, PaymentIntent, PaymentStatusReport, ProfileUpdate, Registration, ReviewRequest,
};
use crate::app::AppEnvironment;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::features::navigation::Navigator;
use crate::gateway::{GatewayRedirect, RedirectMethod};
use crate::routes::Route;
use crate::types::{
    Booking, BookingId, BookingStatus, Category, CategoryId, Event, EventId, EventStatus,
    EventSummary, Money, Notification, NotificationId, Package, PackageId, PaymentStatus, Ref,
    Review, ReviewId, Role, TransactionId, User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use eventhub_core::environment::Clock;
use eventhub_testing::test_clock;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

fn now() -> DateTime<Utc> {
    test_clock().now()
}

/// Account with the given id and role
#[must_use]
pub fn user(id: &str, role: Role) -> User {
    User {
        id: UserId::new(id),
        name: format!("User {id}"),
        email: format!("{id}@example.com"),
        role,
        avatar: None,
        phone: None,
        bio: None,
    }
}

/// Upcoming event a week after the test clock, organized by `org1`
#[must_use]
pub fn event(id: &str, price_major: i64) -> Event {
    Event {
        id: EventId::new(id),
        title: format!("Event {id}"),
        description: "An evening out".to_string(),
        date: now() + Duration::days(7),
        time: Some("18:30".to_string()),
        end_date: None,
        end_time: None,
        venue: "Town Hall".to_string(),
        address: None,
        city: "Dhaka".to_string(),
        country: Some("Bangladesh".to_string()),
        price: Money::from_major(price_major),
        max_attendees: 100,
        available_slots: 100,
        status: EventStatus::Upcoming,
        organizer: Some(Ref::Id(UserId::new("org1"))),
        category: Some(Ref::Id(CategoryId::new("music"))),
        tags: Vec::new(),
        attendees: Vec::new(),
        image: None,
        average_rating: 0.0,
        review_count: 0,
        created_at: Some(now()),
    }
}

/// Active package with 100 tickets left
#[must_use]
pub fn package(id: &str, event_id: &str, price_major: i64) -> Package {
    Package {
        id: PackageId::new(id),
        event: EventId::new(event_id),
        name: format!("Package {id}"),
        description: String::new(),
        price: Money::from_major(price_major),
        features: Vec::new(),
        max_bookings: 100,
        available_bookings: 100,
        is_active: true,
    }
}

/// Confirmed, paid booking for an event a week after the test clock
#[must_use]
pub fn booking(id: &str, event_id: &str, user_id: &str) -> Booking {
    Booking {
        id: BookingId::new(id),
        user: Ref::Id(UserId::new(user_id)),
        event: Ref::Embedded(EventSummary {
            id: EventId::new(event_id),
            title: format!("Event {event_id}"),
            date: Some(now() + Duration::days(7)),
            time: Some("18:30".to_string()),
            venue: "Town Hall".to_string(),
            image: None,
        }),
        package: None,
        quantity: 1,
        total_amount: Money::from_major(100),
        booking_status: BookingStatus::Confirmed,
        payment_status: PaymentStatus::Paid,
        payment_method: Some("sslcommerz".to_string()),
        payment_reference: None,
        appointment_time: None,
        cancellation_reason: None,
        booking_date: now(),
    }
}

/// Review (rating 0 for replies)
#[must_use]
pub fn review(id: &str, event_id: &str, user_id: &str, rating: u8) -> Review {
    Review {
        id: ReviewId::new(id),
        event: Ref::Id(EventId::new(event_id)),
        user: Ref::Id(UserId::new(user_id)),
        rating,
        comment: format!("Review {id}"),
        likes: Vec::new(),
        is_reply: false,
        parent_review: None,
        created_at: now(),
    }
}

/// Booking notification
#[must_use]
pub fn notification(id: &str, read: bool) -> Notification {
    Notification {
        id: NotificationId::new(id),
        title: "Booking confirmed".to_string(),
        message: format!("Notification {id}"),
        kind: "booking".to_string(),
        read,
        link: None,
        created_at: now(),
    }
}

#[derive(Default)]
struct Data {
    accounts: BTreeMap<UserId, (User, String)>,
    token: Option<BearerToken>,
    events: BTreeMap<EventId, Event>,
    packages: BTreeMap<PackageId, Package>,
    categories: BTreeMap<CategoryId, Category>,
    bookings: BTreeMap<BookingId, Booking>,
    delayed: Vec<(usize, Booking)>,
    reviews: Vec<Review>,
    notifications: Vec<Notification>,
    payments: HashMap<TransactionId, PaymentStatusReport>,
    intents: Vec<PaymentIntent>,
    failures: HashMap<&'static str, ApiError>,
    calls: HashMap<&'static str, usize>,
}

impl Data {
    fn current(&self) -> Result<User, ApiError> {
        let token = self.token.as_ref().ok_or(ApiError::Unauthorized(None))?;
        let id = token
            .expose()
            .strip_prefix("token-")
            .ok_or(ApiError::Unauthorized(None))?;
        self.accounts
            .get(&UserId::new(id))
            .map(|(user, _)| user.clone())
            .ok_or(ApiError::Unauthorized(None))
    }
}

/// Backend that keeps everything in memory
#[derive(Default)]
pub struct InMemoryBackend {
    data: Mutex<Data>,
}

impl InMemoryBackend {
    /// Empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Data> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a call and return the lock, or the failure injected for it
    fn enter(&self, operation: &'static str) -> Result<MutexGuard<'_, Data>, ApiError> {
        let mut data = self.lock();
        *data.calls.entry(operation).or_default() += 1;
        match data.failures.remove(operation) {
            Some(error) => Err(error),
            None => Ok(data),
        }
    }

    /// Register an account that can sign in with `password`
    pub fn add_account(&self, user: User, password: &str) {
        self.lock()
            .accounts
            .insert(user.id.clone(), (user, password.to_string()));
    }

    /// Act as if `id` had signed in
    pub fn sign_in_as(&self, id: &str) {
        self.lock().token = Some(BearerToken::new(format!("token-{id}")));
    }

    /// Token set by the client, if any
    #[must_use]
    pub fn token(&self) -> Option<BearerToken> {
        self.lock().token.clone()
    }

    /// Store an event
    pub fn insert_event(&self, event: Event) {
        self.lock().events.insert(event.id.clone(), event);
    }

    /// Store a package
    pub fn insert_package(&self, package: Package) {
        self.lock().packages.insert(package.id.clone(), package);
    }

    /// Store a category
    pub fn insert_category(&self, category: Category) {
        self.lock().categories.insert(category.id.clone(), category);
    }

    /// Store a booking
    pub fn insert_booking(&self, booking: Booking) {
        self.lock().bookings.insert(booking.id.clone(), booking);
    }

    /// Store a booking that only shows up after `calls` more bookings fetches
    pub fn insert_booking_after(&self, booking: Booking, calls: usize) {
        let mut data = self.lock();
        let seen = data.calls.get("my_bookings").copied().unwrap_or_default();
        data.delayed.push((seen + calls, booking));
    }

    /// Store a notification
    pub fn insert_notification(&self, notification: Notification) {
        self.lock().notifications.push(notification);
    }

    /// Gateway status for a transaction, with the booking recorded for it
    pub fn set_payment_status(&self, transaction: &str, status: &str, booking: Option<Booking>) {
        let transaction_id = TransactionId::new(transaction);
        self.lock().payments.insert(
            transaction_id.clone(),
            PaymentStatusReport {
                transaction_id,
                status: status.to_string(),
                amount: None,
                booking,
            },
        );
    }

    /// Fail the next call to `operation`
    pub fn fail(&self, operation: &'static str, error: ApiError) {
        self.lock().failures.insert(operation, error);
    }

    /// Calls made to `operation` so far
    #[must_use]
    pub fn count(&self, operation: &str) -> usize {
        self.lock().calls.get(operation).copied().unwrap_or_default()
    }

    /// Payment intents received, oldest first
    #[must_use]
    pub fn intents(&self) -> Vec<PaymentIntent> {
        self.lock().intents.clone()
    }
}

fn fresh_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

fn missing(what: &str, id: &impl std::fmt::Display) -> ApiError {
    ApiError::not_found(format!("{what} {id} not found"))
}

#[async_trait]
impl BackendApi for InMemoryBackend {
    fn set_token(&self, token: Option<BearerToken>) {
        self.lock().token = token;
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthSession, ApiError> {
        let data = self.enter("login")?;
        data.accounts
            .values()
            .find(|(user, password)| {
                user.email == credentials.email && *password == credentials.password
            })
            .map(|(user, _)| AuthSession {
                token: BearerToken::new(format!("token-{}", user.id)),
                user: user.clone(),
            })
            .ok_or(ApiError::Unauthorized(None))
    }

    async fn register(&self, registration: &Registration) -> Result<AuthSession, ApiError> {
        let mut data = self.enter("register")?;
        if data.accounts.values().any(|(u, _)| u.email == registration.email) {
            return Err(ApiError::Api {
                status: 409,
                message: "Email already registered".to_string(),
            });
        }
        let user = User {
            id: UserId::new(fresh_id("u")),
            name: registration.name.clone(),
            email: registration.email.clone(),
            role: registration.role,
            avatar: None,
            phone: None,
            bio: None,
        };
        data.accounts
            .insert(user.id.clone(), (user.clone(), registration.password.clone()));
        Ok(AuthSession {
            token: BearerToken::new(format!("token-{}", user.id)),
            user,
        })
    }

    async fn current_user(&self) -> Result<User, ApiError> {
        self.enter("current_user")?.current()
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        let mut data = self.enter("update_profile")?;
        let me = data.current()?;
        let (user, _) = data
            .accounts
            .get_mut(&me.id)
            .ok_or(ApiError::Unauthorized(None))?;
        if let Some(name) = &update.name {
            user.name.clone_from(name);
        }
        if update.phone.is_some() {
            user.phone.clone_from(&update.phone);
        }
        if update.bio.is_some() {
            user.bio.clone_from(&update.bio);
        }
        if update.avatar.is_some() {
            user.avatar.clone_from(&update.avatar);
        }
        Ok(user.clone())
    }

    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        let data = self.enter("list_users")?;
        Ok(data.accounts.values().map(|(u, _)| u.clone()).collect())
    }

    async fn change_role(&self, id: &UserId, role: Role) -> Result<User, ApiError> {
        let mut data = self.enter("change_role")?;
        let (user, _) = data.accounts.get_mut(id).ok_or_else(|| missing("User", id))?;
        user.role = role;
        Ok(user.clone())
    }

    async fn delete_user(&self, id: &UserId) -> Result<(), ApiError> {
        let mut data = self.enter("delete_user")?;
        data.accounts
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| missing("User", id))
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>, ApiError> {
        let data = self.enter("list_events")?;
        let search = query.search.as_deref().map(str::to_lowercase);
        Ok(data
            .events
            .values()
            .filter(|e| query.category.as_ref().is_none_or(|c| e.category_id() == Some(c)))
            .filter(|e| query.status.is_none_or(|s| e.status == s))
            .filter(|e| {
                search
                    .as_deref()
                    .is_none_or(|s| e.title.to_lowercase().contains(s.trim()))
            })
            .cloned()
            .collect())
    }

    async fn get_event(&self, id: &EventId) -> Result<Event, ApiError> {
        let data = self.enter("get_event")?;
        data.events.get(id).cloned().ok_or_else(|| missing("Event", id))
    }

    async fn my_events(&self) -> Result<Vec<Event>, ApiError> {
        let data = self.enter("my_events")?;
        let me = data.current()?;
        Ok(data
            .events
            .values()
            .filter(|e| e.organizer_id() == Some(&me.id))
            .cloned()
            .collect())
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<Event, ApiError> {
        let mut data = self.enter("create_event")?;
        let organizer = data.current().ok().map(|u| Ref::Id(u.id));
        let event = Event {
            id: EventId::new(fresh_id("e")),
            title: draft.title.clone(),
            description: draft.description.clone(),
            date: draft.date,
            time: draft.time.clone(),
            end_date: draft.end_date,
            end_time: draft.end_time.clone(),
            venue: draft.venue.clone(),
            address: draft.address.clone(),
            city: draft.city.clone(),
            country: draft.country.clone(),
            price: draft.price,
            max_attendees: draft.max_attendees,
            available_slots: draft.max_attendees,
            status: EventStatus::Upcoming,
            organizer,
            category: draft.category.clone().map(Ref::Id),
            tags: draft.tags.clone(),
            attendees: Vec::new(),
            image: draft.image.clone(),
            average_rating: 0.0,
            review_count: 0,
            created_at: Some(now()),
        };
        data.events.insert(event.id.clone(), event.clone());
        Ok(event)
    }

    async fn update_event(&self, id: &EventId, draft: &EventDraft) -> Result<Event, ApiError> {
        let mut data = self.enter("update_event")?;
        let event = data.events.get_mut(id).ok_or_else(|| missing("Event", id))?;
        event.title.clone_from(&draft.title);
        event.description.clone_from(&draft.description);
        event.date = draft.date;
        event.end_date = draft.end_date;
        event.venue.clone_from(&draft.venue);
        event.city.clone_from(&draft.city);
        event.price = draft.price;
        event.max_attendees = draft.max_attendees;
        event.category = draft.category.clone().map(Ref::Id);
        event.tags.clone_from(&draft.tags);
        Ok(event.clone())
    }

    async fn delete_event(&self, id: &EventId) -> Result<(), ApiError> {
        let mut data = self.enter("delete_event")?;
        data.packages.retain(|_, p| p.event != *id);
        data.events
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| missing("Event", id))
    }

    async fn set_event_status(&self, id: &EventId, status: EventStatus) -> Result<Event, ApiError> {
        let mut data = self.enter("set_event_status")?;
        let event = data.events.get_mut(id).ok_or_else(|| missing("Event", id))?;
        event.status = status;
        Ok(event.clone())
    }

    async fn list_packages(&self, event: &EventId) -> Result<Vec<Package>, ApiError> {
        let data = self.enter("list_packages")?;
        Ok(data
            .packages
            .values()
            .filter(|p| p.event == *event)
            .cloned()
            .collect())
    }

    async fn create_package(&self, draft: &PackageDraft) -> Result<Package, ApiError> {
        let mut data = self.enter("create_package")?;
        let package = Package {
            id: PackageId::new(fresh_id("p")),
            event: draft.event.clone(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            price: draft.price,
            features: draft.features.clone(),
            max_bookings: draft.max_bookings,
            available_bookings: draft.max_bookings,
            is_active: draft.is_active,
        };
        data.packages.insert(package.id.clone(), package.clone());
        Ok(package)
    }

    async fn update_package(&self, id: &PackageId, draft: &PackageDraft) -> Result<Package, ApiError> {
        let mut data = self.enter("update_package")?;
        let package = data.packages.get_mut(id).ok_or_else(|| missing("Package", id))?;
        package.name.clone_from(&draft.name);
        package.description.clone_from(&draft.description);
        package.price = draft.price;
        package.features.clone_from(&draft.features);
        package.max_bookings = draft.max_bookings;
        package.is_active = draft.is_active;
        Ok(package.clone())
    }

    async fn delete_package(&self, id: &PackageId) -> Result<(), ApiError> {
        let mut data = self.enter("delete_package")?;
        data.packages
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| missing("Package", id))
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        let data = self.enter("list_categories")?;
        Ok(data.categories.values().cloned().collect())
    }

    async fn get_category(&self, id: &CategoryId) -> Result<Category, ApiError> {
        let data = self.enter("get_category")?;
        data.categories
            .get(id)
            .cloned()
            .ok_or_else(|| missing("Category", id))
    }

    async fn my_bookings(&self) -> Result<Vec<Booking>, ApiError> {
        let mut data = self.enter("my_bookings")?;
        let seen = data.calls.get("my_bookings").copied().unwrap_or_default();
        let (due, later): (Vec<_>, Vec<_>) =
            std::mem::take(&mut data.delayed).into_iter().partition(|(at, _)| *at <= seen);
        data.delayed = later;
        for (_, booking) in due {
            data.bookings.insert(booking.id.clone(), booking);
        }
        Ok(data.bookings.values().cloned().collect())
    }

    async fn get_booking(&self, id: &BookingId) -> Result<Booking, ApiError> {
        let data = self.enter("get_booking")?;
        data.bookings.get(id).cloned().ok_or_else(|| missing("Booking", id))
    }

    async fn create_booking(&self, request: &BookingRequest) -> Result<Booking, ApiError> {
        let mut data = self.enter("create_booking")?;
        let owner = data
            .current()
            .map_or_else(|_| UserId::new("guest"), |u| u.id);
        let event = data
            .events
            .get(&request.event_id)
            .map_or_else(|| Ref::Id(request.event_id.clone()), |e| Ref::Embedded(EventSummary::from(e)));
        let booking = Booking {
            id: BookingId::new(fresh_id("b")),
            user: Ref::Id(owner),
            event,
            package: request.package_id.clone().map(Ref::Id),
            quantity: request.quantity,
            total_amount: request.total_amount,
            booking_status: BookingStatus::Confirmed,
            payment_status: PaymentStatus::Paid,
            payment_method: Some(request.payment_method.clone()),
            payment_reference: None,
            appointment_time: None,
            cancellation_reason: None,
            booking_date: now(),
        };
        data.bookings.insert(booking.id.clone(), booking.clone());
        Ok(booking)
    }

    async fn cancel_booking(&self, id: &BookingId, reason: &str) -> Result<Booking, ApiError> {
        let mut data = self.enter("cancel_booking")?;
        let booking = data.bookings.get_mut(id).ok_or_else(|| missing("Booking", id))?;
        booking.booking_status = BookingStatus::Cancelled;
        booking.cancellation_reason = Some(reason.to_string());
        Ok(booking.clone())
    }

    async fn event_reviews(&self, event: &EventId) -> Result<Vec<Review>, ApiError> {
        let data = self.enter("event_reviews")?;
        Ok(data
            .reviews
            .iter()
            .filter(|r| r.event.id() == event)
            .cloned()
            .collect())
    }

    async fn create_review(&self, request: &ReviewRequest) -> Result<Review, ApiError> {
        let mut data = self.enter("create_review")?;
        let author = data.current()?;
        let review = Review {
            id: ReviewId::new(fresh_id("r")),
            event: Ref::Id(request.event_id.clone()),
            user: Ref::Id(author.id),
            rating: request.rating,
            comment: request.comment.trim().to_string(),
            likes: Vec::new(),
            is_reply: request.parent_review.is_some(),
            parent_review: request.parent_review.clone(),
            created_at: now(),
        };
        data.reviews.push(review.clone());
        Ok(review)
    }

    async fn like_review(&self, id: &ReviewId) -> Result<Review, ApiError> {
        let mut data = self.enter("like_review")?;
        let me = data.current()?.id;
        let review = data
            .reviews
            .iter_mut()
            .find(|r| r.id == *id)
            .ok_or_else(|| missing("Review", id))?;
        if review.likes.contains(&me) {
            review.likes.retain(|u| *u != me);
        } else {
            review.likes.push(me);
        }
        Ok(review.clone())
    }

    async fn delete_review(&self, id: &ReviewId) -> Result<(), ApiError> {
        let mut data = self.enter("delete_review")?;
        data.reviews
            .retain(|r| r.id != *id && r.parent_review.as_ref() != Some(id));
        Ok(())
    }

    async fn notifications(&self) -> Result<Vec<Notification>, ApiError> {
        Ok(self.enter("notifications")?.notifications.clone())
    }

    async fn mark_notification_read(&self, id: &NotificationId) -> Result<Notification, ApiError> {
        let mut data = self.enter("mark_notification_read")?;
        let notification = data
            .notifications
            .iter_mut()
            .find(|n| n.id == *id)
            .ok_or_else(|| missing("Notification", id))?;
        notification.read = true;
        Ok(notification.clone())
    }

    async fn mark_all_notifications_read(&self) -> Result<(), ApiError> {
        let mut data = self.enter("mark_all_notifications_read")?;
        for notification in &mut data.notifications {
            notification.read = true;
        }
        Ok(())
    }

    async fn delete_notification(&self, id: &NotificationId) -> Result<(), ApiError> {
        let mut data = self.enter("delete_notification")?;
        data.notifications.retain(|n| n.id != *id);
        Ok(())
    }

    async fn initiate_payment(&self, intent: &PaymentIntent) -> Result<GatewayRedirect, ApiError> {
        let mut data = self.enter("initiate_payment")?;
        data.intents.push(intent.clone());
        let transaction_id = TransactionId::new(fresh_id("tran"));
        data.payments.insert(
            transaction_id.clone(),
            PaymentStatusReport {
                transaction_id: transaction_id.clone(),
                status: "PENDING".to_string(),
                amount: Some(intent.amount),
                booking: None,
            },
        );
        Ok(GatewayRedirect {
            gateway_url: format!("https://sandbox.gateway.test/pay/{transaction_id}"),
            transaction_id,
            method: RedirectMethod::Redirect,
            fields: BTreeMap::new(),
        })
    }

    async fn payment_status(
        &self,
        transaction: &TransactionId,
    ) -> Result<PaymentStatusReport, ApiError> {
        let data = self.enter("payment_status")?;
        data.payments
            .get(transaction)
            .cloned()
            .ok_or_else(|| missing("Transaction", transaction))
    }
}

/// Navigator that remembers every route shown and every gateway handoff
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
    redirects: Mutex<Vec<GatewayRedirect>>,
}

impl RecordingNavigator {
    /// Routes shown, oldest first
    #[must_use]
    pub fn routes(&self) -> Vec<Route> {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Gateway handoffs, oldest first
    #[must_use]
    pub fn redirects(&self) -> Vec<GatewayRedirect> {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &Route) {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route.clone());
    }

    fn redirect_external(&self, redirect: &GatewayRedirect) {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(redirect.clone());
    }
}

/// Environment over a fresh [`InMemoryBackend`], a [`RecordingNavigator`],
/// the fixed test clock, and default settings
#[must_use]
pub fn test_environment() -> (AppEnvironment, Arc<InMemoryBackend>, Arc<RecordingNavigator>) {
    test_environment_with(ClientConfig::default())
}

/// Same as [`test_environment`] with custom settings
#[must_use]
pub fn test_environment_with(
    config: ClientConfig,
) -> (AppEnvironment, Arc<InMemoryBackend>, Arc<RecordingNavigator>) {
    let backend = Arc::new(InMemoryBackend::new());
    let navigator = Arc::new(RecordingNavigator::default());
    let env = AppEnvironment::new(
        Arc::clone(&backend) as Arc<dyn BackendApi>,
        Arc::clone(&navigator) as Arc<dyn Navigator>,
        Arc::new(test_clock()),
        config,
    );
    (env, backend, navigator)
}
