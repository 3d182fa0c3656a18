use rusqlite::{Connection, params};
use tracing::debug;

use warbler_types::models::User;

use crate::users::{USER_COLUMNS, map_user};
use crate::{Database, Result};

impl Database {
    /// Start following `followed_id`. Returns whether a new edge was created;
    /// following twice, or following yourself, changes nothing.
    pub fn follow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        if follower_id == followed_id {
            debug!("User #{} tried to follow themselves", follower_id);
            return Ok(false);
        }
        self.with_tx(|tx| insert(tx, follower_id, followed_id))
    }

    /// Stop following. Unfollowing someone you don't follow is a no-op.
    pub fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        self.with_tx(|tx| delete(tx, follower_id, followed_id))
    }

    /// Does `user_id` follow `other_id`?
    pub fn is_following(&self, user_id: i64, other_id: i64) -> Result<bool> {
        self.with_conn(|conn| exists(conn, user_id, other_id))
    }

    /// Is `user_id` followed by `other_id`?
    pub fn is_followed_by(&self, user_id: i64, other_id: i64) -> Result<bool> {
        self.with_conn(|conn| exists(conn, other_id, user_id))
    }

    /// Users that `user_id` follows.
    pub fn following(&self, user_id: i64) -> Result<Vec<User>> {
        self.with_conn(|conn| following(conn, user_id))
    }

    /// Users that follow `user_id`.
    pub fn followers(&self, user_id: i64) -> Result<Vec<User>> {
        self.with_conn(|conn| followers(conn, user_id))
    }
}

pub fn insert(conn: &Connection, follower_id: i64, followed_id: i64) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO follows (user_being_followed_id, user_following_id) VALUES (?1, ?2)
         ON CONFLICT DO NOTHING",
        params![followed_id, follower_id],
    )?;
    Ok(inserted > 0)
}

pub fn delete(conn: &Connection, follower_id: i64, followed_id: i64) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM follows WHERE user_being_followed_id = ?1 AND user_following_id = ?2",
        params![followed_id, follower_id],
    )?;
    Ok(deleted > 0)
}

pub fn exists(conn: &Connection, follower_id: i64, followed_id: i64) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM follows WHERE user_being_followed_id = ?1 AND user_following_id = ?2
         )",
        params![followed_id, follower_id],
        |r| r.get(0),
    )?)
}

pub fn following(conn: &Connection, user_id: i64) -> Result<Vec<User>> {
    let sql = format!(
        "SELECT {USER_COLUMNS}
         FROM follows f
         JOIN users u ON u.id = f.user_being_followed_id
         WHERE f.user_following_id = ?1
         ORDER BY u.username"
    );
    users_for(conn, &sql, user_id)
}

pub fn followers(conn: &Connection, user_id: i64) -> Result<Vec<User>> {
    let sql = format!(
        "SELECT {USER_COLUMNS}
         FROM follows f
         JOIN users u ON u.id = f.user_following_id
         WHERE f.user_being_followed_id = ?1
         ORDER BY u.username"
    );
    users_for(conn, &sql, user_id)
}

fn users_for(conn: &Connection, sql: &str, user_id: i64) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(sql)?;
    let users = stmt
        .query_map([user_id], map_user)?
        .map(|row| row.map(User::from))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Remove every edge touching `user_id`, in either direction.
pub fn delete_for_user(conn: &Connection, user_id: i64) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM follows WHERE user_being_followed_id = ?1 OR user_following_id = ?1",
        [user_id],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbError;
    use crate::test_support::two_users;

    #[test]
    fn follow_predicates_are_inverses() {
        let (db, u1, u2) = two_users();

        assert!(!db.is_following(u1.id, u2.id).unwrap());
        assert!(!db.is_followed_by(u2.id, u1.id).unwrap());

        assert!(db.follow(u1.id, u2.id).unwrap());

        assert!(db.is_following(u1.id, u2.id).unwrap());
        assert!(db.is_followed_by(u2.id, u1.id).unwrap());
        // Directional: u2 does not follow u1 back.
        assert!(!db.is_following(u2.id, u1.id).unwrap());
        assert!(!db.is_followed_by(u1.id, u2.id).unwrap());

        assert_eq!(db.following(u1.id).unwrap(), vec![u2.clone()]);
        assert_eq!(db.followers(u2.id).unwrap(), vec![u1.clone()]);
        assert!(db.followers(u1.id).unwrap().is_empty());
    }

    #[test]
    fn follow_twice_and_self_follow_change_nothing() {
        let (db, u1, u2) = two_users();
        assert!(db.follow(u1.id, u2.id).unwrap());
        assert!(!db.follow(u1.id, u2.id).unwrap());
        assert!(!db.follow(u1.id, u1.id).unwrap());
        assert_eq!(db.user_stats(u1.id).unwrap().following, 1);
    }

    #[test]
    fn unfollow_is_idempotent() {
        let (db, u1, u2) = two_users();
        assert!(!db.unfollow(u1.id, u2.id).unwrap());

        db.follow(u1.id, u2.id).unwrap();
        assert!(db.unfollow(u1.id, u2.id).unwrap());
        assert!(!db.is_following(u1.id, u2.id).unwrap());
        assert!(!db.unfollow(u1.id, u2.id).unwrap());
    }

    #[test]
    fn following_a_missing_user_is_a_foreign_key_violation() {
        let (db, u1, _) = two_users();
        let err = db.follow(u1.id, 9999).unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation));
    }
}
