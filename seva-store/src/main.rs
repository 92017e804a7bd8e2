//! `Seva` document store -- holds the shared assignment document.
//!
//! An axum WebSocket server. Every client can read and watch the document;
//! only clients presenting an admin token can replace it.
//!
//! # Usage
//!
//! ```bash
//! # In-memory store on the default address 0.0.0.0:9100 (read-only)
//! cargo run --bin seva-store
//!
//! # Persisted store with an admin token
//! cargo run --bin seva-store -- --data-file ./assignments.json --admin-token s3cret
//!
//! # Or via environment variables
//! SEVA_STORE_ADDR=127.0.0.1:9100 SEVA_ADMIN_TOKENS=s3cret cargo run --bin seva-store
//! ```

use std::sync::Arc;

use clap::Parser;
use seva_store::auth::TokenAuthority;
use seva_store::config::{StoreCliArgs, StoreConfig};
use seva_store::server::{self, StoreState};
use seva_store::store::SharedDocument;

#[tokio::main]
async fn main() {
    let cli = StoreCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match StoreConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting seva store");

    let document = match &config.data_file {
        Some(path) => match SharedDocument::open(path, config.broadcast_capacity).await {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!(error = %e, "failed to open data file");
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("no data file configured, document lives in memory only");
            SharedDocument::in_memory()
        }
    };

    let authority = TokenAuthority::new(config.admin_tokens.iter().cloned());
    if authority.is_read_only() {
        tracing::warn!("no admin tokens configured, all clients are read-only");
    }

    let state = Arc::new(StoreState::with_config(
        document,
        authority,
        config.max_payload_size,
    ));

    match server::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "seva store listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "store server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start store server");
            std::process::exit(1);
        }
    }
}
