//! Local stand-in for the remote store, speaking the same REST dialect.

use crate::store::{COLLECTION, MemoryStore, SpendStore};
use crate::{AppError, SpendEntry};
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::net::TcpListener;

pub fn router(store: MemoryStore) -> Router {
    Router::new()
        .route("/", get(root))
        .route(&format!("/{COLLECTION}.json"), get(list_entries))
        .route(&format!("/{COLLECTION}/{{file}}"), put(put_entry))
        .with_state(store)
}

/// Serves `store` on `listener` until the task is dropped.
pub async fn serve(listener: TcpListener, store: MemoryStore) -> Result<(), AppError> {
    let addr = listener.local_addr().map_err(AppError::Emulator)?;
    tracing::info!(%addr, "store emulator listening");
    axum::serve(listener, router(store))
        .await
        .map_err(AppError::Emulator)
}

enum EmulatorError {
    NotFound,
    BadRequest(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for EmulatorError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            EmulatorError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            EmulatorError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            EmulatorError::Internal(message) => {
                tracing::error!("emulator error: {message}");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

async fn root() -> &'static str {
    "moneyspend store emulator"
}

async fn list_entries(
    State(store): State<MemoryStore>,
) -> Json<Option<BTreeMap<String, SpendEntry>>> {
    let records = store.snapshot().await;
    Json((!records.is_empty()).then_some(records))
}

async fn put_entry(
    State(store): State<MemoryStore>,
    Path(file): Path<String>,
    payload: Result<Json<SpendEntry>, JsonRejection>,
) -> Result<Json<SpendEntry>, EmulatorError> {
    let key = file
        .strip_suffix(".json")
        .filter(|key| !key.is_empty())
        .ok_or(EmulatorError::NotFound)?;
    let Json(entry) = payload.map_err(|err| EmulatorError::BadRequest(err.body_text()))?;

    tracing::debug!(%key, "emulator write");
    store
        .put(key, &entry)
        .await
        .map_err(|err| EmulatorError::Internal(err.to_string()))?;
    Ok(Json(entry))
}
