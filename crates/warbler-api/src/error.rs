use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use warbler_crypto::CryptoError;
use warbler_db::DbError;

use crate::found;
use crate::views::ErrorPage;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No valid session, or not the owner. Never shown as an error page.
    #[error("access unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("template rendering failed: {0}")]
    Render(#[from] tera::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Bare status plus an `ErrorPage` marker; the router's response layer
/// fills in the body from the templates.
fn error_page(status: StatusCode, page: ErrorPage) -> Response {
    let mut response = status.into_response();
    response.extensions_mut().insert(page);
    response
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => {
                debug!("Access unauthorized, redirecting to /");
                found("/")
            }
            Self::NotFound | Self::Db(DbError::NotFound) => {
                error_page(StatusCode::NOT_FOUND, ErrorPage::NotFound)
            }
            other => {
                error!("Request failed: {}", other);
                error_page(StatusCode::INTERNAL_SERVER_ERROR, ErrorPage::ServerError)
            }
        }
    }
}
