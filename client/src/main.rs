//! EventHub client demo.
//!
//! Runs the headless client against a live backend and walks the given
//! client paths, logging every route change and gateway handoff.
//!
//! # Usage
//!
//! ```bash
//! EVENTHUB_API_URL=http://localhost:5000/api \
//!   cargo run --bin eventhub-demo -- /events /categories
//! ```
//!
//! Set `EVENTHUB_AUTH_TOKEN` to start signed in. `RUST_LOG` controls the
//! log level (default `info,eventhub_client=debug`).

use anyhow::Context;
use eventhub_client::api::http::HttpBackend;
use eventhub_client::config::ClientConfig;
use eventhub_client::features::catalog::CatalogAction;
use eventhub_client::features::navigation::{NavigationAction, Navigator};
use eventhub_client::gateway::{GatewayRedirect, RedirectMethod};
use eventhub_client::routes::Route;
use eventhub_client::views::{price_label, BookButtonState};
use eventhub_client::{start, AppAction, AppEnvironment};
use eventhub_core::environment::{Clock, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Shell that only logs
struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn navigate(&self, route: &Route) {
        info!(path = %route.path(), "Navigate");
    }

    fn redirect_external(&self, redirect: &GatewayRedirect) {
        match redirect.method {
            RedirectMethod::Redirect => {
                info!(transaction = %redirect.transaction_id, url = %redirect.gateway_url, "Gateway redirect");
            },
            RedirectMethod::Form => {
                info!(
                    transaction = %redirect.transaction_id,
                    bytes = redirect.autosubmit_form().len(),
                    "Gateway form handoff"
                );
            },
        }
    }
}

const SETTLE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,eventhub_client=debug")),
        )
        .init();

    let config = ClientConfig::from_env().context("invalid configuration")?;
    info!(?config, "Starting EventHub client");

    let currency = config.currency.clone();
    let api = Arc::new(HttpBackend::new(&config).context("cannot build HTTP client")?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let environment = AppEnvironment::new(api, Arc::new(LoggingNavigator), Arc::clone(&clock), config);
    let store = start(environment).await.context("cannot start store")?;

    let mut paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        paths.push("/events".to_string());
    }

    for path in paths {
        let result = store
            .send_and_wait_for(
                NavigationAction::Open { path: path.clone() }.into(),
                |action| {
                    matches!(
                        action,
                        AppAction::Catalog(
                            CatalogAction::EventsLoaded { .. }
                                | CatalogAction::EventDetailLoaded { .. }
                                | CatalogAction::Failed { .. }
                        )
                    )
                },
                SETTLE,
            )
            .await;
        if let Err(error) = result {
            info!(%path, %error, "No catalog data for path");
        }
    }

    let now = clock.now();
    let lines = store
        .state(|state| {
            state
                .catalog
                .visible_events(now)
                .into_iter()
                .map(|event| {
                    let button = BookButtonState::for_event(event, now);
                    format!(
                        "{:<40} {:>14}  [{}]",
                        event.title,
                        price_label(event.price, &currency),
                        button.label
                    )
                })
                .collect::<Vec<_>>()
        })
        .await;
    for line in &lines {
        println!("{line}");
    }

    let notices = store.state(|state| state.notices.notices.len()).await;
    info!(events = lines.len(), notices, "Done");

    store.shutdown(SETTLE).await.context("shutdown timed out")?;
    Ok(())
}
