use std::net::{Ipv6Addr, SocketAddr};

use axum::{routing::get, Json};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

mod auth;
mod context;
mod docs;
mod errors;
mod rooms;
mod schemas;
mod serialized;
mod ws;

pub use auth::{Identity, IdentityProvider, PassthroughIdentity};
pub use context::{AppService, ServerContext};

use serialized::Health;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 8080;

pub type Router = axum::Router<ServerContext>;

/// Starts the auxcord server
pub async fn run_server(context: ServerContext, port: u16) -> std::io::Result<()> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/rooms", rooms::router())
        .nest("/ws", ws::router());

    let root_router = Router::new()
        .nest("/api/v1", version_one_router)
        .route("/health", get(health))
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await?;

    axum::serve(listener, root_router.into_make_service()).await
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, body = Health)
    )
)]
async fn health() -> Json<Health> {
    Json(Health::ok())
}
