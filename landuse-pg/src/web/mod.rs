//! Service web : carte filtrée, chargement, export CSV

mod error;
mod handlers;

pub use error::WebError;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::pipeline::AppContext;

/// Construit le routeur de l'application
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(handlers::map))
        .route("/map", get(handlers::map))
        .route("/load", post(handlers::load))
        .route("/cache/clear", post(handlers::clear_cache))
        .route("/export.csv", get(handlers::export_csv))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Écoute sur `addr` jusqu'à Ctrl-C
pub async fn serve(ctx: Arc<AppContext>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(
        addr = %listener.local_addr()?,
        table = %ctx.config().qualified_table(),
        "Web server starting"
    );

    axum::serve(listener, build_router(ctx))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
}
