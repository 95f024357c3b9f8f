//! Feature reducers.
//!
//! Each feature owns one slice of [`crate::app::AppState`] and one action
//! enum. All of them run for every action, in the order set by
//! [`crate::app::app_reducer`].

pub mod admin;
pub mod bookings;
pub mod catalog;
pub mod checkout;
pub mod navigation;
pub mod notifications;
pub mod organizer;
pub mod reviews;
pub mod session;
