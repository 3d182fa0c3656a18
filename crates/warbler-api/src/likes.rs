use axum::{
    extract::{Path, State},
    response::Response,
};
use tracing::debug;

use warbler_db::DbError;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::session::Session;
use crate::{found, with_db};

/// Toggle the signed-in user's like on a message.
///
/// Liking your own message is refused unless `allow_self_like` is set;
/// the request still redirects, with nothing changed.
pub async fn add_like(
    State(state): State<AppState>,
    session: Session,
    Path(message_id): Path<i64>,
) -> Result<Response, ApiError> {
    let viewer = session.require_user(&state).await?;
    let viewer_id = viewer.id;
    let allow_self_like = state.allow_self_like;

    let liked = with_db(&state, move |db| {
        let entry = db.get_message(message_id)?.ok_or(DbError::NotFound)?;
        if entry.message.user_id == viewer_id && !allow_self_like {
            return Ok(None);
        }
        db.toggle_like(viewer_id, message_id).map(Some)
    })
    .await?;

    match liked {
        Some(liked) => debug!("User #{} like on #{} -> {}", viewer_id, message_id, liked),
        None => debug!("User #{} refused self-like on #{}", viewer_id, message_id),
    }

    Ok(found("/"))
}
