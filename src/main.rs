// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AgriGuard Fields API Server
//!
//! Accepts field boundary uploads from the assessor dashboard, derives
//! their area, and registers them with the field-management API.

use agriguard_fields::{
    config::Config,
    services::{EosdaRegistry, FieldRegistry, IngestSessions, SimulatedRegistry},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting AgriGuard Fields API");

    let registry: Arc<dyn FieldRegistry> = match config.eosda() {
        Some((url, key)) => {
            tracing::info!(url = %url, "Using EOSDA field registry");
            Arc::new(EosdaRegistry::new(url, key))
        }
        None => {
            tracing::warn!(
                delay_ms = config.registration_delay_ms,
                "EOSDA credentials not set; using simulated field registry"
            );
            Arc::new(SimulatedRegistry::new(Duration::from_millis(
                config.registration_delay_ms,
            )))
        }
    };

    let idle_timeout = Duration::from_secs(config.session_idle_secs);
    let sessions = IngestSessions::with_limits(idle_timeout, config.max_sessions_per_user);

    // Sweep abandoned upload sessions in the background
    {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            let period = idle_timeout.clamp(Duration::from_secs(1), Duration::from_secs(60));
            let mut sweep = tokio::time::interval(period);
            loop {
                sweep.tick().await;
                let evicted = sessions.evict_idle();
                if evicted > 0 {
                    tracing::info!(evicted, remaining = sessions.len(), "Evicted idle upload sessions");
                }
            }
        });
    }

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        registry,
        sessions,
    });

    // Build router
    let app = agriguard_fields::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("agriguard_fields=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
