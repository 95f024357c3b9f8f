//! Client-side filtering and sorting of fetched lists.
//!
//! Pure functions over slices already in state. All sorts are stable, and a
//! descending sort keeps equal elements in their original order too.

use crate::types::{Booking, BookingStatus, CategoryId, Event, EventStatus, Money, Review};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Sort direction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// Event sort field
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EventSortKey {
    /// Start date
    #[default]
    Date,
    /// Base price
    Price,
    /// Attendee count
    Popularity,
    /// Title, case-insensitive
    Name,
}

/// Event sort
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventSort {
    /// Field
    pub key: EventSortKey,
    /// Direction
    pub direction: SortDirection,
}

/// Event filter; every set criterion must match
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Text searched in title, description, venue, city and tags
    pub search: Option<String>,
    /// Category
    pub category: Option<CategoryId>,
    /// Status
    pub status: Option<EventStatus>,
    /// Lowest base price
    pub min_price: Option<Money>,
    /// Highest base price
    pub max_price: Option<Money>,
    /// Free events only
    pub free_only: bool,
    /// Events that have not ended yet
    pub upcoming_only: bool,
}

fn needle(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

impl EventFilter {
    /// Whether `event` passes this filter at time `now`
    #[must_use]
    pub fn matches(&self, event: &Event, now: DateTime<Utc>) -> bool {
        if let Some(needle) = needle(self.search.as_deref()) {
            let hit = contains(&event.title, &needle)
                || contains(&event.description, &needle)
                || contains(&event.venue, &needle)
                || contains(&event.city, &needle)
                || event.tags.iter().any(|tag| contains(tag, &needle));
            if !hit {
                return false;
            }
        }
        if self
            .category
            .as_ref()
            .is_some_and(|category| event.category_id() != Some(category))
        {
            return false;
        }
        if self.status.is_some_and(|status| event.status != status) {
            return false;
        }
        if self.min_price.is_some_and(|min| event.price < min)
            || self.max_price.is_some_and(|max| event.price > max)
        {
            return false;
        }
        if self.free_only && !event.is_free() {
            return false;
        }
        !(self.upcoming_only
            && (event.has_ended(now) || event.status == EventStatus::Cancelled))
    }
}

fn compare_events(a: &Event, b: &Event, key: EventSortKey) -> Ordering {
    match key {
        EventSortKey::Date => a.date.cmp(&b.date),
        EventSortKey::Price => a.price.cmp(&b.price),
        EventSortKey::Popularity => a.attendee_count().cmp(&b.attendee_count()),
        EventSortKey::Name => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
    }
}

/// Sort events in place
pub fn sort_events(events: &mut [&Event], sort: EventSort) {
    events.sort_by(|a, b| sort.direction.apply(compare_events(a, b, sort.key)));
}

/// Filtered and sorted view over `events`
#[must_use]
pub fn visible_events<'a>(
    events: &'a [Event],
    filter: &EventFilter,
    sort: EventSort,
    now: DateTime<Utc>,
) -> Vec<&'a Event> {
    let mut visible: Vec<&Event> = events.iter().filter(|e| filter.matches(e, now)).collect();
    sort_events(&mut visible, sort);
    visible
}

/// Booking sort field
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BookingSortKey {
    /// When the booking was made
    #[default]
    BookingDate,
    /// When the event starts (unknown dates first)
    EventDate,
    /// Amount charged
    Amount,
}

/// Booking sort
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookingSort {
    /// Field
    pub key: BookingSortKey,
    /// Direction
    pub direction: SortDirection,
}

impl Default for BookingSort {
    fn default() -> Self {
        Self {
            key: BookingSortKey::BookingDate,
            direction: SortDirection::Descending,
        }
    }
}

/// Booking filter
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookingFilter {
    /// Only this status; `None` shows all
    pub status: Option<BookingStatus>,
    /// Text searched in the event title
    pub search: Option<String>,
}

impl BookingFilter {
    /// Whether `booking` passes this filter
    #[must_use]
    pub fn matches(&self, booking: &Booking) -> bool {
        if self
            .status
            .is_some_and(|status| booking.booking_status != status)
        {
            return false;
        }
        needle(self.search.as_deref())
            .is_none_or(|needle| booking.event_title().is_some_and(|t| contains(t, &needle)))
    }
}

/// Filtered and sorted view over `bookings`
#[must_use]
pub fn visible_bookings<'a>(
    bookings: &'a [Booking],
    filter: &BookingFilter,
    sort: BookingSort,
) -> Vec<&'a Booking> {
    let mut visible: Vec<&Booking> = bookings.iter().filter(|b| filter.matches(b)).collect();
    visible.sort_by(|a, b| {
        let ordering = match sort.key {
            BookingSortKey::BookingDate => a.booking_date.cmp(&b.booking_date),
            BookingSortKey::EventDate => a.event_date().cmp(&b.event_date()),
            BookingSortKey::Amount => a.total_amount.cmp(&b.total_amount),
        };
        sort.direction.apply(ordering)
    });
    visible
}

/// Rating bucket for reviews
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RatingFilter {
    /// Every rating
    #[default]
    All,
    /// Exactly this many stars
    Stars(u8),
    /// Four stars and up
    Positive,
    /// Two stars and below
    Critical,
}

impl RatingFilter {
    /// Whether `rating` falls in this bucket
    #[must_use]
    pub const fn matches(self, rating: u8) -> bool {
        match self {
            Self::All => true,
            Self::Stars(stars) => rating == stars,
            Self::Positive => rating >= 4,
            Self::Critical => rating <= 2,
        }
    }
}

/// Review order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReviewSort {
    /// Most recent first
    #[default]
    Newest,
    /// Oldest first
    Oldest,
    /// Most stars first
    Highest,
    /// Fewest stars first
    Lowest,
    /// Most likes first
    MostLiked,
}

/// Top-level reviews in `bucket`, ordered by `sort`
#[must_use]
pub fn visible_reviews(reviews: &[Review], bucket: RatingFilter, sort: ReviewSort) -> Vec<&Review> {
    let mut visible: Vec<&Review> = reviews
        .iter()
        .filter(|r| !r.is_reply && bucket.matches(r.rating))
        .collect();
    visible.sort_by(|a, b| match sort {
        ReviewSort::Newest => b.created_at.cmp(&a.created_at),
        ReviewSort::Oldest => a.created_at.cmp(&b.created_at),
        ReviewSort::Highest => b.rating.cmp(&a.rating),
        ReviewSort::Lowest => a.rating.cmp(&b.rating),
        ReviewSort::MostLiked => b.likes.len().cmp(&a.likes.len()),
    });
    visible
}

/// Replies to `parent`, oldest first
#[must_use]
pub fn replies_to<'a>(reviews: &'a [Review], parent: &crate::types::ReviewId) -> Vec<&'a Review> {
    let mut replies: Vec<&Review> = reviews
        .iter()
        .filter(|r| r.is_reply && r.parent_review.as_ref() == Some(parent))
        .collect();
    replies.sort_by_key(|r| r.created_at);
    replies
}

/// Average and histogram of top-level ratings
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RatingSummary {
    /// Mean stars, 0 when there are no reviews
    pub average: f64,
    /// Number of top-level reviews
    pub count: u32,
    /// Reviews per star count; index 0 is one star
    pub histogram: [u32; 5],
}

/// Summarise top-level ratings
#[must_use]
pub fn rating_summary(reviews: &[Review]) -> RatingSummary {
    let mut summary = RatingSummary::default();
    let mut total = 0u32;
    for review in reviews.iter().filter(|r| !r.is_reply && (1..=5).contains(&r.rating)) {
        summary.histogram[usize::from(review.rating - 1)] += 1;
        summary.count += 1;
        total += u32::from(review.rating);
    }
    if summary.count > 0 {
        summary.average = f64::from(total) / f64::from(summary.count);
    }
    summary
}
