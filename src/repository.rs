//! The todo list, persisted as one JSON document in the blob store.
//!
//! Every operation reads the whole list, changes it in memory and writes the
//! whole list back. Mutations inside one process are serialised by
//! `write_lock`; writers in other processes still race, and the last write
//! wins. Listing fails open, but a mutation whose read fails is aborted so the
//! stored list is never replaced by one built from nothing.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::Todo;
use crate::storage::{BlobStore, StoreError};

const CONTENT_TYPE_JSON: &str = "application/json";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("stored todo list is not a JSON array of todos: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode todo list: {0}")]
    Encode(#[source] serde_json::Error),
}

pub struct TodoRepository {
    store: Arc<dyn BlobStore>,
    object_name: String,
    write_lock: Mutex<()>,
}

impl TodoRepository {
    pub fn new(store: Arc<dyn BlobStore>, object_name: impl Into<String>) -> Self {
        TodoRepository {
            store,
            object_name: object_name.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Read the list, keeping "absent" apart from "broken".
    ///
    /// `Ok(None)` means the object has never been written.
    pub async fn fetch(&self) -> Result<Option<Vec<Todo>>, RepositoryError> {
        let Some(data) = self.store.get_object(&self.object_name).await? else {
            return Ok(None);
        };

        let todos = serde_json::from_slice(&data).map_err(RepositoryError::Decode)?;
        Ok(Some(todos))
    }

    /// Read the list, treating every failure as an empty list.
    pub async fn load(&self) -> Vec<Todo> {
        match self.fetch().await {
            Ok(Some(todos)) => todos,
            Ok(None) => {
                debug!(object = %self.object_name, "Todo list not stored yet");
                Vec::new()
            }
            Err(err) => {
                warn!(object = %self.object_name, error = %err, "Error loading todos");
                Vec::new()
            }
        }
    }

    /// The list a mutation starts from. Absent means empty; faults propagate.
    async fn current(&self) -> Result<Vec<Todo>, RepositoryError> {
        Ok(self.fetch().await?.unwrap_or_default())
    }

    /// Overwrite the stored list.
    pub async fn save(&self, todos: &[Todo]) -> Result<(), RepositoryError> {
        let data = serde_json::to_vec_pretty(todos).map_err(RepositoryError::Encode)?;
        self.store
            .put_object(&self.object_name, data, CONTENT_TYPE_JSON)
            .await?;
        debug!(count = todos.len(), "Saved todos");
        Ok(())
    }

    pub async fn add(&self, text: &str) -> Result<Todo, RepositoryError> {
        let _guard = self.write_lock.lock().await;

        let mut todos = self.current().await?;
        let todo = Todo::new(text);
        todos.push(todo.clone());
        self.save(&todos).await?;

        info!(id = %todo.id, text = %todo.text, "Created todo");
        Ok(todo)
    }

    /// Flip `done` on the first todo with `id`.
    pub async fn toggle(&self, id: &str) -> Result<Option<Todo>, RepositoryError> {
        let _guard = self.write_lock.lock().await;

        let mut todos = self.current().await?;
        let Some(todo) = todos.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        todo.done = !todo.done;
        let todo = todo.clone();
        self.save(&todos).await?;

        info!(id = %todo.id, done = todo.done, "Toggled todo");
        Ok(Some(todo))
    }

    /// Remove every todo with `id`. Returns false if none matched.
    pub async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let _guard = self.write_lock.lock().await;

        let mut todos = self.current().await?;
        let before = todos.len();
        todos.retain(|t| t.id != id);
        if todos.len() == before {
            return Ok(false);
        }
        self.save(&todos).await?;

        info!(id, removed = before - todos.len(), "Deleted todo");
        Ok(true)
    }
}
