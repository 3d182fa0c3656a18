use std::collections::HashSet;

use axum::{
    Form,
    extract::{Path, Query, State, rejection::FormRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, info};

use warbler_db::DbError;
use warbler_types::api::{ProfileForm, UserSearch, non_blank};
use warbler_types::models::{ProfileUpdate, User};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::session::{self, Session};
use crate::views::ProfilePage;
use crate::{found, with_db};

pub async fn list_users(
    State(state): State<AppState>,
    session: Session,
    Query(search): Query<UserSearch>,
) -> Result<Html<String>, ApiError> {
    let viewer = session.current_user(&state).await?;
    let query = non_blank(search.q);

    let q = query.clone();
    let users = with_db(&state, move |db| db.list_users(q.as_deref())).await?;

    Ok(Html(state.views.users_index(viewer.as_ref(), &users, query.as_deref())?))
}

pub async fn show_user(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Html<String>, ApiError> {
    let viewer = session.current_user(&state).await?;
    let viewer_id = viewer.as_ref().map(|v| v.id);
    let limit = state.timeline_limit;

    let page = with_db(&state, move |db| {
        let user = db.get_user(id)?.ok_or(DbError::NotFound)?;
        let stats = db.user_stats(id)?;
        let messages = db.user_messages(id, limit)?;
        let (liked, is_following) = match viewer_id {
            Some(v) if v == id => (db.liked_message_ids(v)?, None),
            Some(v) => (db.liked_message_ids(v)?, Some(db.is_following(v, id)?)),
            None => (HashSet::new(), None),
        };

        Ok(ProfilePage {
            user,
            stats,
            messages,
            liked,
            is_following,
        })
    })
    .await?;

    Ok(Html(state.views.user_detail(viewer.as_ref(), &page)?))
}

/// Who `id` follows. Signed-in users only.
pub async fn show_following(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Html<String>, ApiError> {
    let viewer = session.require_user(&state).await?;
    let (owner, users) = with_db(&state, move |db| {
        let owner = db.get_user(id)?.ok_or(DbError::NotFound)?;
        Ok((owner, db.following(id)?))
    })
    .await?;

    Ok(Html(state.views.follow_list(&viewer, &owner, "following", &users)?))
}

/// Who follows `id`. Signed-in users only.
pub async fn show_followers(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Html<String>, ApiError> {
    let viewer = session.require_user(&state).await?;
    let (owner, users) = with_db(&state, move |db| {
        let owner = db.get_user(id)?.ok_or(DbError::NotFound)?;
        Ok((owner, db.followers(id)?))
    })
    .await?;

    Ok(Html(state.views.follow_list(&viewer, &owner, "followers", &users)?))
}

pub async fn show_likes(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Html<String>, ApiError> {
    let viewer = session.require_user(&state).await?;
    let viewer_id = viewer.id;
    let limit = state.timeline_limit;

    let (owner, entries, liked) = with_db(&state, move |db| {
        let owner = db.get_user(id)?.ok_or(DbError::NotFound)?;
        Ok((owner, db.liked_messages(id, limit)?, db.liked_message_ids(viewer_id)?))
    })
    .await?;

    Ok(Html(state.views.likes_list(&viewer, &owner, &entries, &liked)?))
}

pub async fn follow(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let viewer = session.require_user(&state).await?;
    let viewer_id = viewer.id;

    match with_db(&state, move |db| db.follow(viewer_id, id)).await {
        Ok(created) => {
            if created {
                info!("User #{} now follows #{}", viewer_id, id);
            }
        }
        Err(ApiError::Db(DbError::ForeignKeyViolation)) => return Err(ApiError::NotFound),
        Err(e) => return Err(e),
    }

    Ok(found(&format!("/users/{viewer_id}/following")))
}

pub async fn stop_following(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let viewer = session.require_user(&state).await?;
    let viewer_id = viewer.id;

    if with_db(&state, move |db| db.unfollow(viewer_id, id)).await? {
        info!("User #{} stopped following #{}", viewer_id, id);
    }

    Ok(found(&format!("/users/{viewer_id}/following")))
}

pub async fn edit_profile_form(
    State(state): State<AppState>,
    session: Session,
) -> Result<Html<String>, ApiError> {
    let viewer = session.require_user(&state).await?;
    let values = stored_values(&viewer);
    Ok(Html(state.views.profile_form(&viewer, &values, None)?))
}

pub async fn edit_profile(
    State(state): State<AppState>,
    session: Session,
    form: Result<Form<ProfileForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let viewer = session.require_user(&state).await?;

    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            debug!("Unreadable profile form from #{}: {}", viewer.id, rejection);
            let values = stored_values(&viewer);
            return profile_error(
                &state,
                StatusCode::BAD_REQUEST,
                &viewer,
                &values,
                "Username and a valid email are required.",
            );
        }
    };

    let update = ProfileUpdate {
        username: form.username.trim().to_string(),
        email: form.email.trim().to_string(),
        image_url: non_blank(form.image_url),
        header_image_url: non_blank(form.header_image_url),
        bio: non_blank(form.bio),
        location: non_blank(form.location),
    };

    if update.username.is_empty() || !update.email.contains('@') {
        return profile_error(
            &state,
            StatusCode::BAD_REQUEST,
            &viewer,
            &update,
            "Username and a valid email are required.",
        );
    }

    let id = viewer.id;
    let password = form.password;
    let changes = update.clone();
    let result = with_db(&state, move |db| db.update_profile(id, &password, &changes)).await;

    match result {
        Ok(Some(user)) => {
            info!("User #{} edited their profile", user.id);
            Ok(found(&format!("/users/{}", user.id)))
        }
        Ok(None) => profile_error(
            &state,
            StatusCode::UNAUTHORIZED,
            &viewer,
            &update,
            "Wrong password, please try again.",
        ),
        Err(ApiError::Db(DbError::UniquenessViolation { field })) => profile_error(
            &state,
            StatusCode::CONFLICT,
            &viewer,
            &update,
            &format!("That {field} is already taken."),
        ),
        Err(ApiError::Db(e @ DbError::LengthViolation { .. })) => profile_error(
            &state,
            StatusCode::BAD_REQUEST,
            &viewer,
            &update,
            &e.to_string(),
        ),
        Err(e) => Err(e),
    }
}

fn stored_values(user: &User) -> ProfileUpdate {
    ProfileUpdate {
        username: user.username.clone(),
        email: user.email.clone(),
        image_url: Some(user.image_url.clone()),
        header_image_url: Some(user.header_image_url.clone()),
        bio: user.bio.clone(),
        location: user.location.clone(),
    }
}

fn profile_error(
    state: &AppState,
    status: StatusCode,
    viewer: &User,
    values: &ProfileUpdate,
    problem: &str,
) -> Result<Response, ApiError> {
    debug!("Profile edit by #{} rejected: {}", viewer.id, problem);
    let page = state.views.profile_form(viewer, values, Some(problem))?;
    Ok((status, Html(page)).into_response())
}

/// Delete the signed-in user and everything they own, then end the session.
pub async fn delete_user(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let viewer = session.require_user(&state).await?;
    let id = viewer.id;

    with_db(&state, move |db| db.delete_user(id)).await?;
    info!("User {} (#{}) deleted their account", viewer.username, id);

    Ok((session::end(jar), found("/signup")).into_response())
}
