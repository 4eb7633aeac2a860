// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Castle Scouting API Server
//!
//! Serves the scouting JSON API and runs the notification scheduler in the
//! background.

use castle_scouting::{config::Config, db::MongoDb, services::scheduler, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Castle Scouting API");

    // Connect to MongoDB (retries transient failures)
    let db = MongoDb::connect(&config.mongo_uri, &config.mongo_database).await?;
    db.ensure_indexes().await?;
    tracing::info!(database = %config.mongo_database, "MongoDB ready");

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), db));
    if state.push.is_some() {
        tracing::info!("Web Push enabled");
    } else {
        tracing::warn!("VAPID keys not configured, Web Push disabled");
    }

    // Background notification scheduler, stopped with the server
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(scheduler::run(state.clone(), shutdown_rx));

    // Build router
    let app = castle_scouting::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped, waiting for scheduler");
    shutdown_tx.send(true).ok();
    scheduler_handle.await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
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
                .add_directive("castle_scouting=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
