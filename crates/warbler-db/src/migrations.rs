use rusqlite::Connection;
use tracing::info;

use warbler_types::models::{
    DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL, MESSAGE_MAX_LEN, USERNAME_MAX_LEN,
};

use crate::Result;
use crate::error::{MESSAGE_LENGTH_CHECK, USERNAME_LENGTH_CHECK};

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(&initial_schema())?;
    }

    info!("Database migrations complete");
    Ok(())
}

/// Foreign keys are declared without ON DELETE CASCADE: deleting a user is an
/// explicit, ordered sequence of deletes (see `Database::delete_user`).
fn initial_schema() -> String {
    format!(
        "
        BEGIN;

        CREATE TABLE users (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            email             TEXT NOT NULL UNIQUE,
            username          TEXT NOT NULL UNIQUE,
            image_url         TEXT NOT NULL DEFAULT '{DEFAULT_IMAGE_URL}',
            header_image_url  TEXT NOT NULL DEFAULT '{DEFAULT_HEADER_IMAGE_URL}',
            bio               TEXT,
            location          TEXT,
            password          TEXT NOT NULL,
            CONSTRAINT {USERNAME_LENGTH_CHECK} CHECK (length(username) <= {USERNAME_MAX_LEN})
        );

        CREATE TABLE follows (
            user_being_followed_id  INTEGER NOT NULL REFERENCES users(id),
            user_following_id       INTEGER NOT NULL REFERENCES users(id),
            PRIMARY KEY (user_being_followed_id, user_following_id)
        );

        CREATE INDEX idx_follows_follower
            ON follows(user_following_id);

        CREATE TABLE messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            text        TEXT NOT NULL,
            timestamp   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
            user_id     INTEGER NOT NULL REFERENCES users(id),
            CONSTRAINT {MESSAGE_LENGTH_CHECK} CHECK (length(text) <= {MESSAGE_MAX_LEN})
        );

        CREATE INDEX idx_messages_user
            ON messages(user_id, timestamp);

        CREATE TABLE likes (
            user_id     INTEGER NOT NULL REFERENCES users(id),
            message_id  INTEGER NOT NULL REFERENCES messages(id),
            PRIMARY KEY (user_id, message_id)
        );

        CREATE INDEX idx_likes_message
            ON likes(message_id);

        INSERT INTO schema_version (version) VALUES (1);

        COMMIT;
        "
    )
}
