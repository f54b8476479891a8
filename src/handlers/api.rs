use axum::extract::{Path, State};
use axum::{http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::info;

use crate::error::AppError;
use crate::middleware::LenientJson;
use crate::models::CreateTodo;
use crate::AppState;

pub async fn list_todos(State(state): State<AppState>) -> Json<Value> {
    let todos = state.todos.load().await;
    info!(count = todos.len(), "Listed todos");
    Json(json!({ "ok": true, "todos": todos }))
}

pub async fn add_todo(
    State(state): State<AppState>,
    LenientJson(req): LenientJson<CreateTodo>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Some(text) = req.trimmed_text() else {
        return Err(AppError::BadRequest("text is required"));
    };

    let todo = state.todos.add(text).await?;
    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "todo": todo }))))
}

pub async fn toggle_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    match state.todos.toggle(&id).await? {
        Some(todo) => Ok(Json(json!({ "ok": true, "todo": todo }))),
        None => Err(AppError::NotFound),
    }
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if state.todos.delete(&id).await? {
        Ok(Json(json!({ "ok": true })))
    } else {
        Err(AppError::NotFound)
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true, "status": "healthy" }))
}
