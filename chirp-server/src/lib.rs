use std::{
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::routing::get;
use chirp_social::Social;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

mod ai;
mod auth;
mod calls;
mod canvas;
mod context;
mod debug;
mod docs;
mod errors;
mod friendships;
mod messages;
mod notifications;
mod schemas;
mod serialized;
mod sse;
mod transcribe;
mod tweets;
mod users;

pub use auth::SESSION_COOKIE;
pub use context::ServerContext;
pub use errors::ServerError;

pub type Router = axum::Router<ServerContext>;

/// Creates the router with every endpoint, nested under /api
pub fn router(context: ServerContext) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_router = Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/friendships", friendships::router())
        .nest("/tweets", tweets::router())
        .nest("/timeline", tweets::timeline_router())
        .nest("/messages", messages::router())
        .nest("/notifications", notifications::router())
        .nest("/transcribe", transcribe::router())
        .nest("/debug", debug::router())
        .nest("/events", sse::router())
        .merge(ai::router())
        .merge(calls::router())
        .merge(canvas::router())
        .route("/api.json", get(docs::docs));

    Router::new()
        .nest("/api", api_router)
        .layer(cors)
        .with_state(context)
}

/// Starts the chirp server, delivering the social system's events to connected clients
pub async fn run_server(social: Arc<Social>, port: u16) -> Result<(), std::io::Error> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let context = ServerContext::new(social.clone());
    context.sse.forward(social.events());

    let listener = TcpListener::bind(&addr).await?;
    log::info!("Listening on {}", addr);

    axum::serve(listener, router(context).into_make_service()).await
}
