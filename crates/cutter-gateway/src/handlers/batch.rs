use crate::error::Result;
use crate::extract::Owner;
use crate::model::{BatchRequestEntry, BatchResponseEntry};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use cutter_shortener::BatchRequest;

pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    request: std::result::Result<Json<Vec<BatchRequestEntry>>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<BatchResponseEntry>>)> {
    let Json(entries) = request?;
    let requests = entries
        .into_iter()
        .map(|entry| BatchRequest {
            correlation_id: entry.correlation_id,
            original_url: entry.original_url,
        })
        .collect();

    let items = state
        .shortener()
        .shorten_batch(&owner_id, requests)
        .await?;

    let body = items
        .into_iter()
        .map(|item| BatchResponseEntry {
            short_url: state.short_url(&item.short_code),
            correlation_id: item.correlation_id,
        })
        .collect();
    Ok((StatusCode::CREATED, Json(body)))
}
