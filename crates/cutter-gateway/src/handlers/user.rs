use crate::error::{AppError, Result};
use crate::extract::Owner;
use crate::model::UserUrl;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cutter_core::ShortCode;
use cutter_shortener::{DeletionJob, ShortenerError};
use tracing::debug;

/// `GET /api/user/urls`: the caller's live URLs, `204` when there are none.
pub async fn list_user_urls_handler(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
) -> Result<Response> {
    let pairs = state.shortener().list(&owner_id).await?;
    if pairs.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<UserUrl> = pairs
        .into_iter()
        .map(|pair| UserUrl {
            short_url: state.short_url(&pair.short_code),
            original_url: pair.original_url,
        })
        .collect();
    Ok(Json(body).into_response())
}

/// `DELETE /api/user/urls` with a JSON array of codes.
///
/// Responds `202` once the job is queued; the tombstones are applied later.
pub async fn delete_user_urls_handler(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    request: std::result::Result<Json<Vec<String>>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(raw_codes) = request?;
    if raw_codes.is_empty() {
        return Err(AppError::BadRequest("no short codes given".to_string()));
    }

    let codes = raw_codes
        .into_iter()
        .map(ShortCode::new)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(ShortenerError::from)?;

    debug!(owner_id = %owner_id, count = codes.len(), "queueing deletion");
    state.deletions().submit(DeletionJob { owner_id, codes })?;
    Ok(StatusCode::ACCEPTED)
}
