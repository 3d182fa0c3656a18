use rusqlite::{ErrorCode, ffi};
use warbler_crypto::CryptoError;
use warbler_types::models::{MESSAGE_MAX_LEN, USERNAME_MAX_LEN};

/// Names of the CHECK constraints declared in the schema, with the field
/// and limit they guard.
pub(crate) const USERNAME_LENGTH_CHECK: &str = "users_username_length";
pub(crate) const MESSAGE_LENGTH_CHECK: &str = "messages_text_length";

const LENGTH_CHECKS: &[(&str, &str, usize)] = &[
    (USERNAME_LENGTH_CHECK, "username", USERNAME_MAX_LEN),
    (MESSAGE_LENGTH_CHECK, "text", MESSAGE_MAX_LEN),
];

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("{field} already taken")]
    UniquenessViolation { field: String },

    #[error("referenced row does not exist")]
    ForeignKeyViolation,

    #[error("{field} exceeds {max} characters")]
    LengthViolation { field: &'static str, max: usize },

    #[error("{column} must not be null")]
    NullViolation { column: String },

    #[error("row not found")]
    NotFound,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::UniquenessViolation { .. }
                | Self::ForeignKeyViolation
                | Self::LengthViolation { .. }
                | Self::NullViolation { .. }
        )
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, msg) if code.code == ErrorCode::ConstraintViolation => {
                let classified =
                    classify_constraint(code.extended_code, msg.as_deref().unwrap_or_default());
                match classified {
                    Some(e) => e,
                    None => Self::Sqlite(rusqlite::Error::SqliteFailure(code, msg)),
                }
            }
            other => Self::Sqlite(other),
        }
    }
}

/// SQLite reports e.g. "UNIQUE constraint failed: users.email" or
/// "CHECK constraint failed: users_username_length".
fn classify_constraint(extended_code: i32, msg: &str) -> Option<DbError> {
    let detail = msg.split_once(": ").map_or(msg, |(_, d)| d);

    match extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
            Some(DbError::UniquenessViolation {
                field: column_names(detail),
            })
        }
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(DbError::ForeignKeyViolation),
        ffi::SQLITE_CONSTRAINT_NOTNULL => Some(DbError::NullViolation {
            column: column_names(detail),
        }),
        ffi::SQLITE_CONSTRAINT_CHECK => LENGTH_CHECKS
            .iter()
            .find(|(name, _, _)| *name == detail)
            .map(|&(_, field, max)| DbError::LengthViolation { field, max }),
        _ => None,
    }
}

/// "users.username, users.email" -> "username, email"
fn column_names(detail: &str) -> String {
    detail
        .split(", ")
        .map(|qualified| qualified.rsplit('.').next().unwrap_or(qualified))
        .collect::<Vec<_>>()
        .join(", ")
}
