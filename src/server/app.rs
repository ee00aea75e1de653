use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use super::handlers::{generation, health};
use crate::queue::JobQueue;
use crate::store::JobStore;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub store: JobStore,
    pub queue: Arc<dyn JobQueue>,
}

pub fn create_app(db: DatabaseConnection, queue: Arc<dyn JobQueue>) -> Router {
    let state = AppState {
        store: JobStore::new(db.clone()),
        db,
        queue,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/generation/story-script",
            post(generation::create_story_script),
        )
        .route("/generation/jobs/:id", get(generation::get_job_status))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}
