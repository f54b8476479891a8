pub mod assets;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod storage;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use repository::TodoRepository;

#[derive(Clone)]
pub struct AppState {
    pub todos: Arc<TodoRepository>,
    pub base_path: Arc<String>,
}

pub fn create_app(state: AppState) -> Router {
    let base_path = state.base_path.clone();

    let app_routes = Router::new()
        .route("/", get(handlers::web::index))
        .route("/api/health", get(handlers::api::health))
        .route("/api/todos", get(handlers::api::list_todos))
        .route("/api/todos", post(handlers::api::add_todo))
        .route("/api/todos/{id}/toggle", post(handlers::api::toggle_todo))
        .route("/api/todos/{id}", delete(handlers::api::delete_todo))
        .layer(
            tower::ServiceBuilder::new()
                .layer(tower_http::trace::TraceLayer::new_for_http())
                .layer(tower_http::compression::CompressionLayer::new()),
        )
        .with_state(state);

    tracing::info!("base_path: {base_path:?}");

    if base_path.is_empty() {
        app_routes
    } else {
        Router::new().nest(&base_path, app_routes)
    }
}
