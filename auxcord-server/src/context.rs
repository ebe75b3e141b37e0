use std::sync::Arc;

use auxcord_core::{ConnectionRegistry, MemoryBus};
use auxcord_queue::{MemoryCache, PgStore, RoomService};
use axum::extract::FromRef;

use crate::auth::IdentityProvider;

/// The concrete service wiring a running server uses
pub type AppService = RoomService<PgStore, MemoryBus, MemoryCache>;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub service: Arc<AppService>,
    pub registry: Arc<ConnectionRegistry>,
    pub identity: Arc<dyn IdentityProvider>,
}
