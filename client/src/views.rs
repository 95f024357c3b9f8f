//! Presentation helpers shared by every shell.

use crate::types::{Event, EventStatus, Money};
use chrono::{DateTime, Utc};

/// Label and enabled flag of an event's booking button
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookButtonState {
    /// Text on the button
    pub label: &'static str,
    /// Whether it can be pressed
    pub enabled: bool,
}

impl BookButtonState {
    const fn disabled(label: &'static str) -> Self {
        Self {
            label,
            enabled: false,
        }
    }

    const fn enabled(label: &'static str) -> Self {
        Self {
            label,
            enabled: true,
        }
    }

    /// Button for `event` at `now`
    ///
    /// Cancelled beats ended, ended beats sold out.
    #[must_use]
    pub fn for_event(event: &Event, now: DateTime<Utc>) -> Self {
        if event.status == EventStatus::Cancelled {
            Self::disabled("Cancelled")
        } else if event.has_ended(now) {
            Self::disabled("Event Ended")
        } else if event.is_sold_out() {
            Self::disabled("Sold Out")
        } else if event.is_free() {
            Self::enabled("Register Free")
        } else {
            Self::enabled("Book Now")
        }
    }
}

/// `"Free"` or the amount with its currency (`"BDT 307.50"`)
#[must_use]
pub fn price_label(amount: Money, currency: &str) -> String {
    if amount.is_zero() {
        "Free".to_string()
    } else {
        format!("{currency} {amount}")
    }
}

/// Event date as shown on cards (`"Sat, Mar 1, 2025 · 18:30"`)
#[must_use]
pub fn date_label(event: &Event) -> String {
    let day = event.date.format("%a, %b %-d, %Y");
    match event.time.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(time) => format!("{day} · {time}"),
        None => day.to_string(),
    }
}

/// Seats left as shown on the detail page
#[must_use]
pub fn availability_label(event: &Event) -> String {
    match event.available_slots {
        0 => "Sold out".to_string(),
        1 => "1 seat left".to_string(),
        n => format!("{n} of {} seats left", event.max_attendees),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks;
    use chrono::{Duration, TimeZone};
    use eventhub_core::environment::Clock;
    use eventhub_testing::{test_clock, ManualClock};

    #[test]
    fn sold_out_event_shows_disabled_button() {
        let mut event = mocks::event("e1", 100);
        event.available_slots = 0;
        let button = BookButtonState::for_event(&event, test_clock().now());
        assert_eq!(button.label, "Sold Out");
        assert!(!button.enabled);
    }

    #[test]
    fn button_precedence() {
        let now = test_clock().now();
        let mut event = mocks::event("e1", 0);
        assert_eq!(BookButtonState::for_event(&event, now).label, "Register Free");

        event.price = Money::from_major(100);
        assert_eq!(BookButtonState::for_event(&event, now), BookButtonState::enabled("Book Now"));

        event.available_slots = 0;
        event.status = EventStatus::Completed;
        assert_eq!(BookButtonState::for_event(&event, now).label, "Event Ended");

        event.status = EventStatus::Cancelled;
        assert_eq!(BookButtonState::for_event(&event, now).label, "Cancelled");
    }

    #[test]
    fn button_flips_once_the_event_is_over() {
        let clock = ManualClock::new(test_clock().now());
        let event = mocks::event("e1", 100);
        assert!(BookButtonState::for_event(&event, clock.now()).enabled);

        // Under way, with no end date: bookable until the day is over
        clock.advance(Duration::days(7) + Duration::hours(20));
        assert!(BookButtonState::for_event(&event, clock.now()).enabled);

        clock.advance(Duration::hours(4));
        assert_eq!(
            BookButtonState::for_event(&event, clock.now()),
            BookButtonState::disabled("Event Ended")
        );
    }

    #[test]
    fn price_labels() {
        assert_eq!(price_label(Money::ZERO, "BDT"), "Free");
        assert_eq!(price_label(Money::from_cents(30_750), "BDT"), "BDT 307.50");
    }

    #[test]
    fn date_label_appends_the_time() {
        let mut event = mocks::event("e1", 100);
        event.date = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).single().unwrap_or(event.date);
        assert_eq!(date_label(&event), "Sat, Mar 1, 2025 · 18:30");
        event.time = None;
        assert_eq!(date_label(&event), "Sat, Mar 1, 2025");
    }

    #[test]
    fn availability() {
        let mut event = mocks::event("e1", 100);
        assert_eq!(availability_label(&event), "100 of 100 seats left");
        event.available_slots = 1;
        assert_eq!(availability_label(&event), "1 seat left");
    }
}
