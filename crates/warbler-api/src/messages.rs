use std::collections::HashSet;

use axum::{
    Form,
    extract::{Path, State, rejection::FormRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::{debug, warn};

use warbler_db::{DbError, MessageDeletion};
use warbler_types::api::MessageForm;
use warbler_types::models::{MESSAGE_MAX_LEN, User};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::session::Session;
use crate::{found, with_db};

pub async fn new_message_form(
    State(state): State<AppState>,
    session: Session,
) -> Result<Html<String>, ApiError> {
    let viewer = session.require_user(&state).await?;
    Ok(Html(state.views.message_form(&viewer, "", None)?))
}

fn message_error(
    state: &AppState,
    viewer: &User,
    text: &str,
    problem: &str,
) -> Result<Response, ApiError> {
    let page = state.views.message_form(viewer, text, Some(problem))?;
    Ok((StatusCode::BAD_REQUEST, Html(page)).into_response())
}

/// Post a message as the signed-in user. The session is checked before the
/// form, so anonymous posts are redirected whatever their body.
pub async fn create_message(
    State(state): State<AppState>,
    session: Session,
    form: Result<Form<MessageForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let viewer = session.require_user(&state).await?;

    let text = match form {
        Ok(Form(form)) => form.text,
        Err(rejection) => {
            debug!("Unreadable message form from #{}: {}", viewer.id, rejection);
            String::new()
        }
    };

    if text.trim().is_empty() {
        return message_error(&state, &viewer, &text, "Message text is required.");
    }

    let user_id = viewer.id;
    let body = text.clone();
    match with_db(&state, move |db| db.create_message(user_id, &body)).await {
        Ok(_) => Ok(found(&format!("/users/{user_id}"))),
        Err(ApiError::Db(DbError::LengthViolation { .. })) => {
            debug!("Message from #{} over {} characters", user_id, MESSAGE_MAX_LEN);
            let problem = format!("Messages are limited to {MESSAGE_MAX_LEN} characters.");
            message_error(&state, &viewer, &text, &problem)
        }
        Err(e) => Err(e),
    }
}

pub async fn show_message(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Html<String>, ApiError> {
    let viewer = session.current_user(&state).await?;
    let viewer_id = viewer.as_ref().map(|v| v.id);

    let (entry, liked) = with_db(&state, move |db| {
        let entry = db.get_message(id)?.ok_or(DbError::NotFound)?;
        let liked = match viewer_id {
            Some(v) => db.liked_message_ids(v)?,
            None => HashSet::new(),
        };
        Ok((entry, liked))
    })
    .await?;

    Ok(Html(state.views.message_detail(viewer.as_ref(), &entry, &liked)?))
}

/// Delete a message. Only its owner may; anyone else is bounced to `/` and
/// the message stays.
pub async fn delete_message(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let viewer = session.require_user(&state).await?;
    let viewer_id = viewer.id;

    match with_db(&state, move |db| db.delete_message(id, viewer_id)).await? {
        MessageDeletion::Deleted => Ok(found(&format!("/users/{viewer_id}"))),
        MessageDeletion::NotOwner => {
            warn!("User #{} tried to delete message #{} they don't own", viewer_id, id);
            Err(ApiError::Unauthorized)
        }
        MessageDeletion::NotFound => Err(ApiError::NotFound),
    }
}
