//! Shared helpers for driving the router in-process.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use tower::util::ServiceExt; // for `oneshot`

use warbler_api::auth::{AppState, AppStateInner};
use warbler_api::config::Config;
use warbler_api::session::SESSION_COOKIE;
use warbler_db::Database;
use warbler_types::models::User;

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let db = Database::open_in_memory().expect("in-memory database");
        let state = AppStateInner::new(db, &config).expect("templates parse");
        let router = warbler_api::router(state.clone());
        Self { state, router }
    }

    pub fn signup(&self, username: &str, email: &str, password: &str) -> User {
        self.state
            .db
            .signup(username, email, password, None)
            .expect("signup")
    }

    /// A `Cookie` header value that logs the request in as `user_id`.
    pub fn cookie_for(&self, user_id: i64) -> String {
        let token = self.state.sessions.issue(user_id).expect("session token");
        format!("{SESSION_COOKIE}={token}")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        self.send(Method::GET, uri, None, cookie).await
    }

    pub async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response {
        self.send(Method::POST, uri, Some(body), cookie).await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>) -> Response {
        self.send(Method::POST, uri, Some(""), cookie).await
    }

    /// GET the redirect target of `resp` with the same cookie, asserting
    /// the response really was a 302.
    pub async fn follow_redirect(&self, resp: Response, cookie: Option<&str>) -> Response {
        assert_eq!(resp.status(), StatusCode::FOUND);
        let target = location(&resp);
        self.get(&target, cookie).await
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<&str>,
        cookie: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn location(resp: &Response) -> String {
    resp.headers()
        .get(header::LOCATION)
        .expect("Location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// The `name=value` part of the session Set-Cookie header, if any.
pub fn session_cookie(resp: &Response) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(SESSION_COOKIE))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub async fn body_text(resp: Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
