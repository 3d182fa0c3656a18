//! Warbler Crypto Library
//!
//! Password hashing (Argon2id, PHC strings) and the signed tokens that back
//! the session cookie.

pub mod password;
pub mod session;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("session token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
