// rest/mod.rs — HTTP API server.
//
// Axum HTTP server for the catalog (reachable from LAN clients by default).
//
// Endpoints:
//   POST   /register
//   POST   /login                (urlencoded form)
//   GET    /me
//   PUT    /me
//   GET    /me/profile
//   POST   /books
//   GET    /books                (?skip&limit&author&title)
//   GET    /books/{id}
//   PUT    /books/{id}
//   DELETE /books/{id}
//   GET    /health               (no auth)

pub mod error;
pub mod extract;
pub mod routes;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("catalog API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/health", get(routes::health::health))
        // Accounts
        .route("/register", post(routes::accounts::register))
        .route("/login", post(routes::accounts::login))
        .route(
            "/me",
            get(routes::accounts::me).put(routes::accounts::update_me),
        )
        .route("/me/profile", get(routes::accounts::profile))
        // Books
        .route(
            "/books",
            get(routes::books::list_books).post(routes::books::create_book),
        )
        .route(
            "/books/{id}",
            get(routes::books::get_book)
                .put(routes::books::update_book)
                .delete(routes::books::delete_book),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
