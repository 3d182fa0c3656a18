use std::collections::HashSet;

use rusqlite::{Connection, params};
use tracing::debug;

use warbler_types::models::AuthoredMessage;

use crate::messages::{self, MESSAGE_COLUMNS};
use crate::{Database, DbError, Result};

impl Database {
    /// Toggle a like: removes it if present, inserts it if not.
    /// Returns the liked state after the call.
    pub fn toggle_like(&self, user_id: i64, message_id: i64) -> Result<bool> {
        let liked = self.with_tx(|tx| {
            if messages::owner(tx, message_id)?.is_none() {
                return Err(DbError::NotFound);
            }

            if exists(tx, user_id, message_id)? {
                delete(tx, user_id, message_id)?;
                Ok(false)
            } else {
                insert(tx, user_id, message_id)?;
                Ok(true)
            }
        })?;

        debug!("User #{} like on message #{} -> {}", user_id, message_id, liked);
        Ok(liked)
    }

    pub fn is_liked(&self, user_id: i64, message_id: i64) -> Result<bool> {
        self.with_conn(|conn| exists(conn, user_id, message_id))
    }

    pub fn liked_message_ids(&self, user_id: i64) -> Result<HashSet<i64>> {
        self.with_conn(|conn| liked_ids(conn, user_id))
    }

    /// Messages the user has liked, newest first.
    pub fn liked_messages(&self, user_id: i64, limit: u32) -> Result<Vec<AuthoredMessage>> {
        self.with_conn(|conn| liked(conn, user_id, limit))
    }
}

pub fn exists(conn: &Connection, user_id: i64, message_id: i64) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = ?1 AND message_id = ?2)",
        params![user_id, message_id],
        |r| r.get(0),
    )?)
}

pub fn insert(conn: &Connection, user_id: i64, message_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO likes (user_id, message_id) VALUES (?1, ?2)",
        params![user_id, message_id],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, user_id: i64, message_id: i64) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
        params![user_id, message_id],
    )?;
    Ok(deleted > 0)
}

pub fn liked_ids(conn: &Connection, user_id: i64) -> Result<HashSet<i64>> {
    let mut stmt = conn.prepare("SELECT message_id FROM likes WHERE user_id = ?1")?;
    let ids = stmt
        .query_map([user_id], |r| r.get(0))?
        .collect::<std::result::Result<HashSet<i64>, _>>()?;
    Ok(ids)
}

pub fn liked(conn: &Connection, user_id: i64, limit: u32) -> Result<Vec<AuthoredMessage>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS}
         FROM likes l
         JOIN messages m ON m.id = l.message_id
         JOIN users u ON u.id = m.user_id
         WHERE l.user_id = ?1
         ORDER BY m.timestamp DESC, m.id DESC
         LIMIT ?2"
    );
    messages::collect(conn, &sql, user_id, limit)
}

/// Likes given by the user and likes on the user's messages.
pub fn delete_for_user(conn: &Connection, user_id: i64) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM likes
         WHERE user_id = ?1
            OR message_id IN (SELECT id FROM messages WHERE user_id = ?1)",
        [user_id],
    )?)
}

pub fn delete_for_message(conn: &Connection, message_id: i64) -> Result<usize> {
    Ok(conn.execute("DELETE FROM likes WHERE message_id = ?1", [message_id])?)
}
