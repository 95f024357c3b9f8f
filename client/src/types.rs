//! Domain types mirrored from the backend.
//!
//! Every entity here is a transient copy of server state. Field names follow
//! the backend's camelCase JSON, ids arrive as `_id`, and references to other
//! entities arrive either as a bare id or as an embedded object ([`Ref`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Drop the extra spellings of fields a body sends under several names
///
/// serde rejects a field that arrives as both its name and an alias (`_id`
/// next to a virtual `id`). The canonical name wins, else the first alias.
pub(crate) fn prefer_canonical(mut value: Value, names: &[(&str, &[&str])]) -> Value {
    if let Value::Object(map) = &mut value {
        for (canonical, aliases) in names {
            let mut kept = map.contains_key(*canonical);
            for alias in *aliases {
                if kept {
                    map.remove(*alias);
                } else {
                    kept = map.contains_key(*alias);
                }
            }
        }
    }
    value
}

/// Serde impls for a `#[serde(remote = "Self")]` type whose fields have
/// aliases, tolerating bodies that send more than one spelling
///
/// `@de` emits only `Deserialize`.
macro_rules! wire_names {
    (@de $ty:ident { $($canonical:literal => [$($alias:literal),+ $(,)?]),+ $(,)? }) => {
        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = $crate::types::prefer_canonical(
                    <serde_json::Value as serde::Deserialize>::deserialize(deserializer)?,
                    &[$(($canonical, &[$($alias),+][..])),+],
                );
                $ty::deserialize(value).map_err(serde::de::Error::custom)
            }
        }
    };
    ($ty:ident { $($names:tt)* }) => {
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                $ty::serialize(self, serializer)
            }
        }
        wire_names!(@de $ty { $($names)* });
    };
}
pub(crate) use wire_names;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a backend id
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The id as a string slice
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

id_type!(
    /// Event identifier
    EventId
);
id_type!(
    /// Ticket package identifier
    PackageId
);
id_type!(
    /// Booking identifier
    BookingId
);
id_type!(
    /// Review identifier
    ReviewId
);
id_type!(
    /// Notification identifier
    NotificationId
);
id_type!(
    /// Category identifier
    CategoryId
);
id_type!(
    /// User identifier
    UserId
);
id_type!(
    /// Payment gateway transaction identifier, issued by the backend
    TransactionId
);

/// Money amount in minor units (cents, paisa)
///
/// The backend exchanges amounts as decimal major units (`307.5`). They are
/// converted to integer minor units at the boundary so arithmetic is exact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Create from minor units
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Create from whole major units
    #[must_use]
    pub const fn from_major(units: i64) -> Self {
        Self(units * 100)
    }

    /// Parse a decimal major-unit string such as `"307.50"`
    #[must_use]
    pub fn parse_major(raw: &str) -> Option<Self> {
        raw.trim().parse::<f64>().ok().and_then(Self::from_major_f64)
    }

    #[allow(clippy::cast_possible_truncation)] // range checked
    fn from_major_f64(value: f64) -> Option<Self> {
        let cents = (value * 100.0).round();
        (cents.is_finite() && cents >= 0.0 && cents < 9.0e15).then(|| Self(cents as i64))
    }

    /// Minor units
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// True for a zero amount
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked multiplication by a quantity
    #[must_use]
    pub fn checked_mul(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(i64::from(quantity)).map(Self)
    }

    /// Fraction of this amount in basis points, rounded half up
    #[must_use]
    pub fn basis_points(self, bps: u32) -> Option<Self> {
        self.0
            .checked_mul(i64::from(bps))
            .and_then(|scaled| scaled.checked_add(5_000))
            .map(|scaled| Self(scaled / 10_000))
    }

    #[allow(clippy::cast_precision_loss)] // amounts stay far below 2^52
    fn as_major_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_major_f64())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        let value = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => n,
            Raw::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("invalid amount {s:?}")))?,
        };
        Self::from_major_f64(value)
            .ok_or_else(|| serde::de::Error::custom(format!("amount out of range: {value}")))
    }
}

/// Implemented by embedded entities that carry their own id
pub trait HasId<I> {
    /// The embedded entity's id
    fn id(&self) -> &I;
}

/// Reference to another entity: a bare id or the embedded object
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ref<I, T> {
    /// Bare id string
    Id(I),
    /// Populated object
    Embedded(T),
}

impl<I, T: HasId<I>> Ref<I, T> {
    /// Id of the referenced entity, whichever form arrived
    pub fn id(&self) -> &I {
        match self {
            Self::Id(id) => id,
            Self::Embedded(entity) => entity.id(),
        }
    }

    /// The embedded object, if the backend populated it
    pub const fn embedded(&self) -> Option<&T> {
        match self {
            Self::Id(_) => None,
            Self::Embedded(entity) => Some(entity),
        }
    }
}

/// User role
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Attendee
    #[default]
    User,
    /// May create and manage own events
    Organizer,
    /// Full access
    Admin,
}

impl Role {
    /// Organizers and admins may manage events
    #[must_use]
    pub const fn can_organize(self) -> bool {
        matches!(self, Self::Organizer | Self::Admin)
    }

    /// Admin only
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Account
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Id
    #[serde(rename = "_id", alias = "id")]
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
    /// Role
    #[serde(default)]
    pub role: Role,
    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Short bio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

wire_names!(User { "_id" => ["id"] });

/// User as embedded in other entities
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct UserSummary {
    /// Id
    #[serde(rename = "_id", alias = "id")]
    pub id: UserId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

wire_names!(UserSummary { "_id" => ["id"] });

impl HasId<UserId> for UserSummary {
    fn id(&self) -> &UserId {
        &self.id
    }
}

/// Event lifecycle status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Not started
    #[default]
    Upcoming,
    /// In progress
    Ongoing,
    /// Finished
    Completed,
    /// Called off
    Cancelled,
}

impl EventStatus {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Event category
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Id
    #[serde(rename = "_id", alias = "id")]
    pub id: CategoryId,
    /// Name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Icon name or emoji
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Display color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Number of events in the category
    #[serde(default)]
    pub event_count: u32,
}

wire_names!(Category { "_id" => ["id"] });

/// Category as embedded in an event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct CategorySummary {
    /// Id
    #[serde(rename = "_id", alias = "id")]
    pub id: CategoryId,
    /// Name
    #[serde(default)]
    pub name: String,
    /// Icon name or emoji
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Display color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

wire_names!(CategorySummary { "_id" => ["id"] });

impl HasId<CategoryId> for CategorySummary {
    fn id(&self) -> &CategoryId {
        &self.id
    }
}

/// Bookable event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Id
    #[serde(rename = "_id", alias = "id")]
    pub id: EventId,
    /// Title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Start date
    pub date: DateTime<Utc>,
    /// Start time of day, as entered by the organizer (`"18:30"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// End date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    /// End time of day
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    /// Venue name
    #[serde(default)]
    pub venue: String,
    /// Street address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// City
    #[serde(default)]
    pub city: String,
    /// Country
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Base ticket price
    #[serde(default)]
    pub price: Money,
    /// Capacity
    #[serde(default)]
    pub max_attendees: u32,
    /// Seats left
    #[serde(default)]
    pub available_slots: u32,
    /// Lifecycle status
    #[serde(default)]
    pub status: EventStatus,
    /// Organizer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<Ref<UserId, UserSummary>>,
    /// Category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Ref<CategoryId, CategorySummary>>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Registered attendees
    #[serde(default)]
    pub attendees: Vec<Ref<UserId, UserSummary>>,
    /// Cover image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Mean review rating
    #[serde(default)]
    pub average_rating: f64,
    /// Number of reviews
    #[serde(default)]
    pub review_count: u32,
    /// Creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

wire_names!(Event { "_id" => ["id"] });

impl Event {
    /// Price of zero
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.price.is_zero()
    }

    /// No seats left
    #[must_use]
    pub const fn is_sold_out(&self) -> bool {
        self.available_slots == 0
    }

    /// Number of registered attendees
    #[must_use]
    pub fn attendee_count(&self) -> usize {
        self.attendees.len()
    }

    /// When the event is over: its end date, or the end of its start day
    #[must_use]
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.end_date.unwrap_or_else(|| {
            self.date
                .date_naive()
                .succ_opt()
                .and_then(|day| day.and_hms_opt(0, 0, 0))
                .map_or(self.date, |midnight| midnight.and_utc())
        })
    }

    /// True once the event is completed or its end has passed
    #[must_use]
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Completed || self.ends_at() <= now
    }

    /// Organizer id, if known
    #[must_use]
    pub fn organizer_id(&self) -> Option<&UserId> {
        self.organizer.as_ref().map(Ref::id)
    }

    /// Category id, if known
    #[must_use]
    pub fn category_id(&self) -> Option<&CategoryId> {
        self.category.as_ref().map(Ref::id)
    }
}

/// Event as embedded in bookings and reviews
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    /// Id
    #[serde(rename = "_id", alias = "id")]
    pub id: EventId,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Start date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    /// Start time of day
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Venue name
    #[serde(default)]
    pub venue: String,
    /// Cover image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

wire_names!(EventSummary { "_id" => ["id"] });

impl HasId<EventId> for EventSummary {
    fn id(&self) -> &EventId {
        &self.id
    }
}

impl From<&Event> for EventSummary {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id.clone(),
            title: event.title.clone(),
            date: Some(event.date),
            time: event.time.clone(),
            venue: event.venue.clone(),
            image: event.image.clone(),
        }
    }
}

fn active_by_default() -> bool {
    true
}

/// Priced ticket tier of an event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Id
    #[serde(rename = "_id", alias = "id")]
    pub id: PackageId,
    /// Owning event
    #[serde(alias = "eventId")]
    pub event: EventId,
    /// Name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Price per ticket
    pub price: Money,
    /// What the tier includes
    #[serde(default)]
    pub features: Vec<String>,
    /// Inventory
    #[serde(default)]
    pub max_bookings: u32,
    /// Inventory left
    #[serde(default)]
    pub available_bookings: u32,
    /// Offered for sale
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

wire_names!(Package { "_id" => ["id"], "event" => ["eventId"] });

impl Package {
    /// Active and not sold out
    #[must_use]
    pub const fn is_bookable(&self) -> bool {
        self.is_active && self.available_bookings > 0
    }
}

/// Package as embedded in a booking
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct PackageSummary {
    /// Id
    #[serde(rename = "_id", alias = "id")]
    pub id: PackageId,
    /// Name
    #[serde(default)]
    pub name: String,
    /// Price per ticket
    #[serde(default)]
    pub price: Money,
}

wire_names!(PackageSummary { "_id" => ["id"] });

impl HasId<PackageId> for PackageSummary {
    fn id(&self) -> &PackageId {
        &self.id
    }
}

/// Booking lifecycle status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Awaiting payment or approval
    #[default]
    Pending,
    /// Booked
    Confirmed,
    /// Cancelled by the user, organizer, or backend
    Cancelled,
}

/// Payment status of a booking
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Not paid yet
    #[default]
    Pending,
    /// Paid
    Paid,
    /// Payment failed
    Failed,
    /// Money returned
    Refunded,
}

/// A user's reservation against an event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Id
    #[serde(rename = "_id", alias = "id")]
    pub id: BookingId,
    /// Booking owner
    pub user: Ref<UserId, UserSummary>,
    /// Booked event
    pub event: Ref<EventId, EventSummary>,
    /// Ticket tier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<Ref<PackageId, PackageSummary>>,
    /// Tickets
    pub quantity: u32,
    /// Amount charged
    #[serde(default)]
    pub total_amount: Money,
    /// Lifecycle status
    #[serde(default)]
    pub booking_status: BookingStatus,
    /// Payment status
    #[serde(default)]
    pub payment_status: PaymentStatus,
    /// How it was paid (`"sslcommerz"`, `"free"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    /// Gateway transaction id
    #[serde(
        default,
        alias = "transactionId",
        skip_serializing_if = "Option::is_none"
    )]
    pub payment_reference: Option<TransactionId>,
    /// Appointment slot, for events with timed entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_time: Option<String>,
    /// Why it was cancelled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    /// When it was made
    #[serde(alias = "createdAt")]
    pub booking_date: DateTime<Utc>,
}

wire_names!(Booking {
    "_id" => ["id"],
    "paymentReference" => ["transactionId"],
    "bookingDate" => ["createdAt"],
});

impl Booking {
    /// Title of the booked event, if the backend embedded it
    #[must_use]
    pub fn event_title(&self) -> Option<&str> {
        self.event.embedded().map(|e| e.title.as_str())
    }

    /// Start date of the booked event, if the backend embedded it
    #[must_use]
    pub fn event_date(&self) -> Option<DateTime<Utc>> {
        self.event.embedded().and_then(|e| e.date)
    }
}

/// Review of an event, or a reply to one
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Id
    #[serde(rename = "_id", alias = "id")]
    pub id: ReviewId,
    /// Reviewed event
    pub event: Ref<EventId, EventSummary>,
    /// Author
    pub user: Ref<UserId, UserSummary>,
    /// Stars, 1..=5 (replies carry 0)
    #[serde(default)]
    pub rating: u8,
    /// Text
    pub comment: String,
    /// Users who liked it
    #[serde(default)]
    pub likes: Vec<UserId>,
    /// True for replies
    #[serde(default)]
    pub is_reply: bool,
    /// Review this replies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_review: Option<ReviewId>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

wire_names!(Review { "_id" => ["id"] });

impl Review {
    /// Author id
    #[must_use]
    pub fn author(&self) -> &UserId {
        self.user.id()
    }

    /// Whether `user` liked this review
    #[must_use]
    pub fn is_liked_by(&self, user: &UserId) -> bool {
        self.likes.contains(user)
    }
}

/// In-app notification
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Id
    #[serde(rename = "_id", alias = "id")]
    pub id: NotificationId,
    /// Headline
    pub title: String,
    /// Body
    pub message: String,
    /// Kind (`"booking"`, `"payment"`, `"event"`, ...)
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Read flag
    #[serde(default, alias = "isRead")]
    pub read: bool,
    /// Client route to open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Timestamp
    pub created_at: DateTime<Utc>,
}

wire_names!(Notification { "_id" => ["id"], "read" => ["isRead"] });

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn money_parses_major_units() {
        assert_eq!(Money::parse_major("307.50"), Some(Money::from_cents(30_750)));
        assert_eq!(Money::parse_major("100"), Some(Money::from_major(100)));
        assert_eq!(Money::parse_major("-1"), None);
        assert_eq!(Money::parse_major("abc"), None);
    }

    #[test]
    fn money_basis_points_round_half_up() {
        assert_eq!(Money::from_major(300).basis_points(250), Some(Money::from_cents(750)));
        assert_eq!(Money::from_cents(1).basis_points(5_000), Some(Money::from_cents(1)));
        assert_eq!(Money::from_cents(1).basis_points(4_999), Some(Money::ZERO));
    }

    #[test]
    fn money_displays_two_decimals() {
        assert_eq!(Money::from_cents(30_750).to_string(), "307.50");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
    }

    #[test]
    fn money_accepts_numbers_and_strings() {
        let n: Money = serde_json::from_value(json!(1500.5)).unwrap();
        let s: Money = serde_json::from_value(json!("1500.50")).unwrap();
        assert_eq!(n, Money::from_cents(150_050));
        assert_eq!(n, s);
        assert_eq!(serde_json::to_value(n).unwrap(), json!(1500.5));
    }

    #[test]
    fn event_accepts_bare_and_embedded_refs() {
        let bare: Event = serde_json::from_value(json!({
            "_id": "e1",
            "title": "Rock Night",
            "date": "2025-03-01T18:00:00.000Z",
            "price": 100,
            "availableSlots": 40,
            "organizer": "u1",
            "category": { "_id": "c1", "name": "Music" }
        }))
        .unwrap();

        assert_eq!(bare.organizer_id(), Some(&UserId::new("u1")));
        assert_eq!(bare.category_id(), Some(&CategoryId::new("c1")));
        assert_eq!(bare.status, EventStatus::Upcoming);
        assert_eq!(bare.price, Money::from_major(100));
    }

    #[test]
    fn booking_reads_transaction_alias() {
        let booking: Booking = serde_json::from_value(json!({
            "_id": "b1",
            "user": "u1",
            "event": { "_id": "e1", "title": "Rock Night", "date": "2025-03-01T18:00:00Z" },
            "quantity": 2,
            "totalAmount": 205,
            "bookingStatus": "confirmed",
            "paymentStatus": "paid",
            "transactionId": "TXN-1",
            "createdAt": "2025-01-02T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(booking.payment_reference, Some(TransactionId::new("TXN-1")));
        assert_eq!(booking.event_title(), Some("Rock Night"));
        assert_eq!(booking.booking_status, BookingStatus::Confirmed);
    }

    #[test]
    fn event_without_end_runs_until_its_day_is_over() {
        let mut event: Event = serde_json::from_value(json!({
            "_id": "e1",
            "title": "Talk",
            "date": "2025-03-01T18:00:00Z"
        }))
        .unwrap();
        let midnight = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();
        assert_eq!(event.ends_at(), midnight);
        assert!(!event.has_ended(event.date + chrono::Duration::hours(2)));
        assert!(event.has_ended(midnight));

        event.status = EventStatus::Completed;
        assert!(event.has_ended(event.date - chrono::Duration::days(1)));
    }

    #[test]
    fn both_spellings_of_a_field_are_accepted() {
        let booking: Booking = serde_json::from_value(json!({
            "_id": "b1",
            "id": "b1",
            "user": { "_id": "u1", "id": "u1", "name": "Ada" },
            "event": { "_id": "e1", "id": "e1", "title": "Rock Night" },
            "quantity": 1,
            "paymentReference": "TXN-1",
            "transactionId": "TXN-1",
            "bookingDate": "2025-01-02T10:00:00Z",
            "createdAt": "2025-01-02T09:59:58Z"
        }))
        .unwrap();
        assert_eq!(booking.id, BookingId::new("b1"));
        assert_eq!(booking.event_title(), Some("Rock Night"));
        assert_eq!(booking.payment_reference, Some(TransactionId::new("TXN-1")));
        assert_eq!(
            booking.booking_date,
            Utc.with_ymd_and_hms(2025, 1, 2, 10, 0, 0).unwrap()
        );

        let notification: Notification = serde_json::from_value(json!({
            "_id": "n1",
            "id": "n1",
            "title": "Booked",
            "message": "See you there",
            "read": true,
            "isRead": false,
            "createdAt": "2025-01-02T10:00:00Z"
        }))
        .unwrap();
        assert!(notification.read);
    }

    #[test]
    fn first_alias_wins_without_the_canonical_name() {
        let value = prefer_canonical(
            json!({ "url": "https://pay/a", "redirectUrl": "https://pay/b" }),
            &[("gatewayUrl", &["url", "redirectUrl"][..])],
        );
        assert_eq!(value, json!({ "url": "https://pay/a" }));
    }

    #[test]
    fn serialized_entities_read_back() {
        let booking: Booking = serde_json::from_value(json!({
            "id": "b2",
            "user": "u1",
            "event": "e1",
            "quantity": 3,
            "createdAt": "2025-01-02T10:00:00Z"
        }))
        .unwrap();
        let value = serde_json::to_value(&booking).unwrap();
        assert_eq!(value["_id"], "b2");
        assert_eq!(value["bookingDate"], "2025-01-02T10:00:00Z");
        assert_eq!(serde_json::from_value::<Booking>(value).unwrap(), booking);
    }
}
