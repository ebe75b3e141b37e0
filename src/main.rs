use std::process::exit;
use std::sync::Arc;

use auxcord_core::{BusError, ConnectionRegistry, EventBus, EventDispatcher, MemoryBus};
use auxcord_queue::{MemoryCache, PgStore, RoomService, StoreError};
use auxcord_server::{PassthroughIdentity, ServerContext};
use chrono::Duration;
use colored::Colorize;
use log::{error, info};
use thiserror::Error;

use crate::config::{Config, ConfigError};

mod config;
mod logging;

#[derive(Debug, Error)]
enum AuxcordError {
    #[error("Could not load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not initialize the store: {0}")]
    Store(#[from] StoreError),

    #[error("Real-time dispatch failed: {0}")]
    Dispatch(#[from] BusError),

    #[error("Server stopped: {0}")]
    Server(#[from] std::io::Error),
}

impl AuxcordError {
    fn hint(&self) -> String {
        match self {
            AuxcordError::Config(_) => {
                "Check the AUXCORD_* environment variables. AUXCORD_DATABASE_URL is the only one without a default.".to_string()
            }
            AuxcordError::Store(_) => {
                "This is a database error. Make sure the Postgres instance is reachable at AUXCORD_DATABASE_URL, then try again.".to_string()
            }
            AuxcordError::Dispatch(_) => {
                "Live delivery is gone, so the process refuses to keep serving stale rooms. Restart it.".to_string()
            }
            AuxcordError::Server(_) => {
                "The HTTP listener failed. Check that the port is free and the process may bind it.".to_string()
            }
        }
    }
}

async fn start() -> Result<(), AuxcordError> {
    let config = Config::from_env()?;

    info!("Connecting to database...");
    let store = Arc::new(PgStore::new(&config.database_url).await?);

    let bus = Arc::new(MemoryBus::new(&config.bus_topic));
    let cache = Arc::new(MemoryCache::new(Duration::hours(config.cache_ttl_hours)));
    let registry = Arc::new(ConnectionRegistry::new());

    let dispatcher = EventDispatcher::new(bus.subscribe(&config.bus_group), registry.clone());
    let service = Arc::new(RoomService::new(store, bus, cache));

    let context = ServerContext {
        service,
        registry,
        identity: Arc::new(PassthroughIdentity),
    };

    info!("Listening on port {}", config.port);

    // The dispatcher and the server live or die together. Whichever stops
    // first takes the process down, since a server without live delivery
    // would silently serve stale rooms.
    tokio::select! {
        result = dispatcher.run() => Ok(result?),
        result = auxcord_server::run_server(context, config.port) => Ok(result?),
    }
}

#[tokio::main]
async fn main() {
    logging::init_logger();

    if let Err(error) = start().await {
        error!(
            "{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.",
            "auxcord failed!".bold().red()
        );
        error!("{}", error);
        error!(
            "{}",
            format!("Hint: {}", error.hint()).bright_black().italic()
        );

        exit(1);
    }
}
