use axum::{
    Json,
    extract::State,
    response::{Html, IntoResponse},
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::session::Session;
use crate::with_db;

/// Landing page for anonymous visitors, home timeline for everyone else.
pub async fn index(
    State(state): State<AppState>,
    session: Session,
) -> Result<Html<String>, ApiError> {
    let Some(viewer) = session.current_user(&state).await? else {
        return Ok(Html(state.views.landing()?));
    };

    let id = viewer.id;
    let limit = state.timeline_limit;
    let (entries, liked) = with_db(&state, move |db| {
        Ok((db.home_timeline(id, limit)?, db.liked_message_ids(id)?))
    })
    .await?;

    Ok(Html(state.views.timeline(&viewer, &entries, &liked)?))
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
