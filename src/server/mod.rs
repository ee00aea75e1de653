//! Dispatch API: admits story requests and reports job status.

pub mod app;
pub mod handlers;

use std::sync::Arc;

use anyhow::Result;
use sea_orm::DatabaseConnection;
use tracing::info;

use crate::queue::JobQueue;

pub use app::{create_app, AppState};

/// Bind and serve the dispatch API until ctrl-c.
pub async fn start_server(
    port: u16,
    db: DatabaseConnection,
    queue: Arc<dyn JobQueue>,
) -> Result<()> {
    let app = create_app(db, queue);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "dispatch API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
