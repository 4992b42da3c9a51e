use crate::error::Result;
use crate::extract::Owner;
use crate::model::{ShortenRequest, ShortenResponse};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::Json;
use cutter_shortener::Shortened;

fn status_of(shortened: &Shortened) -> StatusCode {
    if shortened.is_created() {
        StatusCode::CREATED
    } else {
        StatusCode::CONFLICT
    }
}

/// `POST /` with the URL as a plain-text body.
pub async fn shorten_text_handler(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    body: String,
) -> Result<(StatusCode, String)> {
    let shortened = state.shortener().shorten(body.trim(), &owner_id).await?;
    Ok((status_of(&shortened), state.short_url(shortened.code())))
}

/// `POST /api/shorten` with `{"url": ...}`.
pub async fn shorten_json_handler(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    request: std::result::Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ShortenResponse>)> {
    let Json(request) = request?;
    let shortened = state.shortener().shorten(&request.url, &owner_id).await?;
    Ok((
        status_of(&shortened),
        Json(ShortenResponse {
            result: state.short_url(shortened.code()),
        }),
    ))
}

/// `GET /{id}`: temporary redirect to the original URL.
pub async fn redirect_handler(
    Path(short_code): Path<String>,
    State(state): State<AppState>,
) -> Result<Redirect> {
    let original_url = state.shortener().resolve(&short_code).await?;
    Ok(Redirect::temporary(&original_url))
}
