//! # EventHub Client
//!
//! Headless client for the EventHub ticketing platform.
//!
//! All authoritative data lives behind the backend REST API. This crate keeps
//! the ephemeral client state (current route, signed-in user, loaded events,
//! the checkout in progress, notices), runs it through reducers, and performs
//! I/O as effects: backend calls through [`api::BackendApi`], route changes
//! and gateway handoffs through [`features::navigation::Navigator`].
//!
//! ## Paying for tickets
//!
//! Checkout is a flow resumed across a browser redirect. Submitting a paid
//! order asks the backend for a gateway session, hands the browser to the
//! gateway, and later resumes from `/payment/success`, `/payment/failed` or
//! `/payment/cancelled`, keyed by the transaction id the backend issued.
//! Reconciling a return is idempotent.
//!
//! ## Example
//!
//! ```ignore
//! use eventhub_client::{app, api::http::HttpBackend, config::ClientConfig};
//!
//! let config = ClientConfig::from_env()?;
//! let api = Arc::new(HttpBackend::new(&config)?);
//! let store = app::start(AppEnvironment::new(api, navigator, Arc::new(SystemClock), config)).await?;
//!
//! store.send(NavigationAction::Open { path: "/events".into() }.into()).await?;
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod features;
pub mod gateway;
pub mod listing;
pub mod notice;
pub mod pricing;
pub mod routes;
pub mod types;
pub mod views;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use app::{app_reducer, start, AppAction, AppEnvironment, AppState, AppStore};
pub use error::ApiError;
