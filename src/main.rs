use std::{net::Ipv4Addr, sync::Arc};

use tracing::{error, info, warn};

use todo_blob::config::{Config, TODO_OBJECT_NAME};
use todo_blob::repository::TodoRepository;
use todo_blob::storage::{BlobStore, S3BlobStore};
use todo_blob::{create_app, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };

    let store = S3BlobStore::connect(&config.connection, config.container.clone()).await;

    // Already-existing buckets succeed; anything else is left to surface on first write.
    if let Err(err) = store.create_container().await {
        warn!(container = %config.container, error = %err, "Could not create container");
    }

    let state = AppState {
        todos: Arc::new(TodoRepository::new(Arc::new(store), TODO_OBJECT_NAME)),
        base_path: Arc::new(config.base_path),
    };
    let app = create_app(state);
    let addr = (Ipv4Addr::UNSPECIFIED, config.port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("binding listener");

    info!(container = %config.container, "running on {addr:?}");

    axum::serve(listener, app).await.expect("failed serving");
}
