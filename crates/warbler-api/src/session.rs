use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::debug;

use warbler_crypto::session::SessionKeys;
use warbler_types::models::User;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::with_db;

pub const SESSION_COOKIE: &str = "warbler_session";

/// The identity a request carries: the user id from a valid session
/// cookie, or nothing. Extracted per request and handed to handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    pub user_id: Option<i64>,
}

impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let user_id = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| state.sessions.verify(cookie.value()));

        Ok(Self { user_id })
    }
}

impl Session {
    /// The signed-in user, if the session names one that still exists.
    pub async fn current_user(&self, state: &AppState) -> Result<Option<User>, ApiError> {
        let Some(id) = self.user_id else {
            return Ok(None);
        };

        let user = with_db(state, move |db| db.get_user(id)).await?;
        if user.is_none() {
            debug!("Session names user #{} which no longer exists", id);
        }
        Ok(user)
    }

    /// Gate for anything that changes state. Anonymous requests become
    /// `ApiError::Unauthorized`, which renders as a redirect to `/`.
    pub async fn require_user(&self, state: &AppState) -> Result<User, ApiError> {
        self.current_user(state)
            .await?
            .ok_or(ApiError::Unauthorized)
    }
}

/// Attach a fresh session cookie for `user_id`.
pub fn start(jar: CookieJar, keys: &SessionKeys, user_id: i64) -> Result<CookieJar, ApiError> {
    let token = keys.issue(user_id)?;
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    Ok(jar.add(cookie))
}

pub fn end(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}
