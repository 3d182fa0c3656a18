use std::sync::Arc;

use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Duration;
use tracing::{debug, info};

use warbler_crypto::session::SessionKeys;
use warbler_db::{Database, DbError};
use warbler_types::api::{LoginForm, SignupForm, non_blank};

use crate::config::Config;
use crate::error::ApiError;
use crate::session::{self, Session};
use crate::views::Views;
use crate::{found, with_db};

/// Minimum password length accepted at signup.
pub const PASSWORD_MIN_LEN: usize = 6;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub sessions: SessionKeys,
    pub allow_self_like: bool,
    pub timeline_limit: u32,
    pub views: Views,
}

impl AppStateInner {
    /// Fails only if the bundled templates don't parse.
    pub fn new(db: Database, config: &Config) -> tera::Result<AppState> {
        Ok(Arc::new(Self {
            db,
            sessions: SessionKeys::new(
                &config.session_secret,
                Duration::hours(config.session_ttl_hours),
            ),
            allow_self_like: config.allow_self_like,
            timeline_limit: config.timeline_limit,
            views: Views::load()?,
        }))
    }
}

pub async fn signup_form(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, ApiError> {
    if session.current_user(&state).await?.is_some() {
        return Ok(found("/"));
    }
    Ok(Html(state.views.signup_form(&SignupForm::default(), None)?).into_response())
}

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response, ApiError> {
    if let Some(problem) = validate_signup(&form) {
        return signup_error(&state, StatusCode::BAD_REQUEST, &form, problem);
    }

    let username = form.username.trim().to_string();
    let email = form.email.trim().to_string();
    let password = form.password.clone();
    let image_url = non_blank(form.image_url.clone());

    let created = with_db(&state, move |db| {
        db.signup(&username, &email, &password, image_url.as_deref())
    })
    .await;

    match created {
        Ok(user) => {
            info!("New signup: {} (#{})", user.username, user.id);
            let jar = session::start(jar, &state.sessions, user.id)?;
            Ok((jar, found("/")).into_response())
        }
        Err(ApiError::Db(DbError::UniquenessViolation { field })) => signup_error(
            &state,
            StatusCode::CONFLICT,
            &form,
            &format!("That {field} is already taken."),
        ),
        Err(ApiError::Db(e @ DbError::LengthViolation { .. })) => {
            signup_error(&state, StatusCode::BAD_REQUEST, &form, &e.to_string())
        }
        Err(e) => Err(e),
    }
}

fn validate_signup(form: &SignupForm) -> Option<&'static str> {
    if form.username.trim().is_empty() {
        return Some("Username is required.");
    }
    if !form.email.contains('@') {
        return Some("A valid email is required.");
    }
    if form.password.chars().count() < PASSWORD_MIN_LEN {
        return Some("Password must be at least 6 characters.");
    }
    None
}

fn signup_error(
    state: &AppState,
    status: StatusCode,
    form: &SignupForm,
    problem: &str,
) -> Result<Response, ApiError> {
    debug!("Signup rejected: {}", problem);
    let page = state.views.signup_form(form, Some(problem))?;
    Ok((status, Html(page)).into_response())
}

pub async fn login_form(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, ApiError> {
    if session.current_user(&state).await?.is_some() {
        return Ok(found("/"));
    }
    Ok(Html(state.views.login_form("", None)?).into_response())
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let username = form.username.clone();
    let password = form.password.clone();
    let user = with_db(&state, move |db| db.authenticate(&username, &password)).await?;

    match user {
        Some(user) => {
            info!("User {} logged in", user.username);
            let jar = session::start(jar, &state.sessions, user.id)?;
            Ok((jar, found("/")).into_response())
        }
        None => {
            debug!("Failed login for {:?}", form.username);
            let page = state.views.login_form(&form.username, Some("Invalid credentials."))?;
            Ok((StatusCode::UNAUTHORIZED, Html(page)).into_response())
        }
    }
}

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (session::end(jar), found("/login"))
}
