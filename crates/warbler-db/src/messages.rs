use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

use warbler_types::models::{AuthoredMessage, Message};

use crate::models::parse_timestamp;
use crate::{Database, DbError, Result, likes};

/// Column list for `messages m JOIN users u`, in the order `map_authored` expects.
pub(crate) const MESSAGE_COLUMNS: &str = "m.id, m.text, m.timestamp, m.user_id, u.username, u.image_url";

/// Outcome of a delete request for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDeletion {
    Deleted,
    NotOwner,
    NotFound,
}

impl Database {
    pub fn create_message(&self, user_id: i64, text: &str) -> Result<Message> {
        let message = self.with_tx(|tx| {
            let id = insert(tx, user_id, text)?;
            find(tx, id)?
                .map(|m| m.message)
                .ok_or(DbError::NotFound)
        })?;

        debug!("User #{} posted message #{}", user_id, message.id);
        Ok(message)
    }

    pub fn get_message(&self, id: i64) -> Result<Option<AuthoredMessage>> {
        self.with_conn(|conn| find(conn, id))
    }

    /// A user's own messages, newest first.
    pub fn user_messages(&self, user_id: i64, limit: u32) -> Result<Vec<AuthoredMessage>> {
        self.with_conn(|conn| by_user(conn, user_id, limit))
    }

    /// The user's messages plus those of everyone they follow, newest first.
    pub fn home_timeline(&self, user_id: i64, limit: u32) -> Result<Vec<AuthoredMessage>> {
        self.with_conn(|conn| timeline(conn, user_id, limit))
    }

    /// Delete a message on behalf of `requester_id`. Only the owner may
    /// delete; anyone else leaves the message untouched.
    pub fn delete_message(&self, id: i64, requester_id: i64) -> Result<MessageDeletion> {
        let outcome = self.with_tx(|tx| match owner(tx, id)? {
            None => Ok(MessageDeletion::NotFound),
            Some(owner_id) if owner_id != requester_id => Ok(MessageDeletion::NotOwner),
            Some(_) => {
                likes::delete_for_message(tx, id)?;
                delete(tx, id)?;
                Ok(MessageDeletion::Deleted)
            }
        })?;

        if outcome == MessageDeletion::Deleted {
            info!("User #{} deleted message #{}", requester_id, id);
        }
        Ok(outcome)
    }
}

pub(crate) fn map_authored(row: &Row<'_>) -> rusqlite::Result<AuthoredMessage> {
    let timestamp: String = row.get(2)?;
    Ok(AuthoredMessage {
        message: Message {
            id: row.get(0)?,
            text: row.get(1)?,
            timestamp: parse_timestamp(&timestamp),
            user_id: row.get(3)?,
        },
        username: row.get(4)?,
        image_url: row.get(5)?,
    })
}

pub fn insert(conn: &Connection, user_id: i64, text: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO messages (user_id, text) VALUES (?1, ?2)",
        params![user_id, text],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find(conn: &Connection, id: i64) -> Result<Option<AuthoredMessage>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages m JOIN users u ON u.id = m.user_id WHERE m.id = ?1"
    );
    Ok(conn.query_row(&sql, [id], map_authored).optional()?)
}

pub fn owner(conn: &Connection, id: i64) -> Result<Option<i64>> {
    Ok(conn
        .query_row("SELECT user_id FROM messages WHERE id = ?1", [id], |r| r.get(0))
        .optional()?)
}

pub fn by_user(conn: &Connection, user_id: i64, limit: u32) -> Result<Vec<AuthoredMessage>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS}
         FROM messages m
         JOIN users u ON u.id = m.user_id
         WHERE m.user_id = ?1
         ORDER BY m.timestamp DESC, m.id DESC
         LIMIT ?2"
    );
    collect(conn, &sql, user_id, limit)
}

pub fn timeline(conn: &Connection, user_id: i64, limit: u32) -> Result<Vec<AuthoredMessage>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS}
         FROM messages m
         JOIN users u ON u.id = m.user_id
         WHERE m.user_id = ?1
            OR m.user_id IN (SELECT user_being_followed_id FROM follows WHERE user_following_id = ?1)
         ORDER BY m.timestamp DESC, m.id DESC
         LIMIT ?2"
    );
    collect(conn, &sql, user_id, limit)
}

pub(crate) fn collect(
    conn: &Connection,
    sql: &str,
    user_id: i64,
    limit: u32,
) -> Result<Vec<AuthoredMessage>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![user_id, limit], map_authored)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM messages WHERE id = ?1", [id])? > 0)
}

pub fn delete_for_user(conn: &Connection, user_id: i64) -> Result<usize> {
    Ok(conn.execute("DELETE FROM messages WHERE user_id = ?1", [user_id])?)
}
