use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{info, warn};

use warbler_crypto::password::{hash_password, verify_password};
use warbler_types::models::{DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL, ProfileUpdate, User, UserStats};

use crate::models::UserRow;
use crate::{Database, DbError, Result, follows, likes, messages};

/// Column list for `users u`, in the order `map_user` expects.
pub(crate) const USER_COLUMNS: &str =
    "u.id, u.username, u.email, u.image_url, u.header_image_url, u.bio, u.location, u.password";

impl Database {
    // -- Accounts --

    /// Create a user. The password is hashed before it reaches the database.
    pub fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
        image_url: Option<&str>,
    ) -> Result<User> {
        let password_hash = hash_password(password)?;

        let row = self.with_tx(|tx| {
            let id = insert(tx, username, email, &password_hash, image_url)?;
            find_by_id(tx, id)?.ok_or(DbError::NotFound)
        })?;

        info!("Created user {} (#{})", row.username, row.id);
        Ok(row.into())
    }

    /// `Ok(None)` for an unknown username or a wrong password.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let Some(row) = self.with_conn(|conn| find_by_username(conn, username))? else {
            return Ok(None);
        };

        match verify_password(password, &row.password) {
            Ok(true) => Ok(Some(row.into())),
            Ok(false) => Ok(None),
            Err(e) => {
                warn!("Unusable password hash for user #{}: {}", row.id, e);
                Ok(None)
            }
        }
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.get_user_row(id)?.map(User::from))
    }

    pub fn get_user_row(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| find_by_id(conn, id))
    }

    /// All users, or those whose username contains `query`.
    pub fn list_users(&self, query: Option<&str>) -> Result<Vec<User>> {
        self.with_conn(|conn| search(conn, query))
    }

    pub fn user_stats(&self, id: i64) -> Result<UserStats> {
        self.with_conn(|conn| stats(conn, id))
    }

    /// Apply a profile edit after re-checking the user's current password.
    /// `Ok(None)` means the password did not match and nothing changed.
    pub fn update_profile(
        &self,
        id: i64,
        current_password: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<User>> {
        let updated = self.with_tx(|tx| {
            let row = find_by_id(tx, id)?.ok_or(DbError::NotFound)?;
            if !verify_password(current_password, &row.password)? {
                return Ok(None);
            }

            update_profile(tx, id, update)?;
            find_by_id(tx, id)
        })?;

        if updated.is_some() {
            info!("Updated profile of user #{}", id);
        }
        Ok(updated.map(User::from))
    }

    /// Delete a user and everything that depends on it, in one transaction:
    /// likes (given and received), messages, follow edges, then the user.
    /// Returns whether the user existed.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        self.with_tx(|tx| {
            let likes = likes::delete_for_user(tx, id)?;
            let messages = messages::delete_for_user(tx, id)?;
            let follows = follows::delete_for_user(tx, id)?;
            let deleted = delete(tx, id)?;
            if deleted {
                info!(
                    "Deleted user #{} with {} messages, {} follows, {} likes",
                    id, messages, follows, likes
                );
            }
            Ok(deleted)
        })
    }
}

pub(crate) fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        image_url: row.get(3)?,
        header_image_url: row.get(4)?,
        bio: row.get(5)?,
        location: row.get(6)?,
        password: row.get(7)?,
    })
}

pub fn insert(
    conn: &Connection,
    username: &str,
    email: &str,
    password_hash: &str,
    image_url: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (username, email, password, image_url) VALUES (?1, ?2, ?3, ?4)",
        params![
            username,
            email,
            password_hash,
            image_url.unwrap_or(DEFAULT_IMAGE_URL)
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1");
    Ok(conn.query_row(&sql, [id], map_user).optional()?)
}

pub fn find_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = ?1");
    Ok(conn.query_row(&sql, [username], map_user).optional()?)
}

pub fn search(conn: &Connection, query: Option<&str>) -> Result<Vec<User>> {
    let pattern = match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => format!("%{}%", escape_like(q)),
        None => "%".to_string(),
    };

    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users u
         WHERE u.username LIKE ?1 ESCAPE '\\'
         ORDER BY u.username"
    );
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map([pattern], map_user)?
        .map(|row| row.map(User::from))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(users)
}

pub fn update_profile(conn: &Connection, id: i64, update: &ProfileUpdate) -> Result<()> {
    let changed = conn.execute(
        "UPDATE users
         SET username = ?2, email = ?3, image_url = ?4, header_image_url = ?5, bio = ?6, location = ?7
         WHERE id = ?1",
        params![
            id,
            update.username,
            update.email,
            update.image_url.as_deref().unwrap_or(DEFAULT_IMAGE_URL),
            update
                .header_image_url
                .as_deref()
                .unwrap_or(DEFAULT_HEADER_IMAGE_URL),
            update.bio,
            update.location,
        ],
    )?;

    if changed == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])? > 0)
}

pub fn stats(conn: &Connection, id: i64) -> Result<UserStats> {
    let counts: (i64, i64, i64, i64) = conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM messages WHERE user_id = ?1),
            (SELECT COUNT(*) FROM follows WHERE user_following_id = ?1),
            (SELECT COUNT(*) FROM follows WHERE user_being_followed_id = ?1),
            (SELECT COUNT(*) FROM likes WHERE user_id = ?1)",
        [id],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
    )?;

    Ok(UserStats {
        messages: counts.0.max(0) as u64,
        following: counts.1.max(0) as u64,
        followers: counts.2.max(0) as u64,
        likes: counts.3.max(0) as u64,
    })
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::two_users;
    use warbler_types::models::USERNAME_MAX_LEN;

    #[test]
    fn new_user_has_defaults_and_nothing_attached() {
        let (db, _, _) = two_users();
        let user = db
            .signup("testuser3", "test3@test.com", "HASHED_PASSWORD", None)
            .unwrap();

        assert_eq!(user.image_url, DEFAULT_IMAGE_URL);
        assert_eq!(user.header_image_url, DEFAULT_HEADER_IMAGE_URL);
        assert_eq!(db.user_stats(user.id).unwrap(), UserStats::default());
        assert!(db.followers(user.id).unwrap().is_empty());
    }

    #[test]
    fn stored_password_is_hashed() {
        let (db, user, _) = two_users();
        let row = db.get_user_row(user.id).unwrap().unwrap();
        assert_ne!(row.password, "testuser");
        assert!(verify_password("testuser", &row.password).unwrap());
    }

    #[test]
    fn duplicate_username_is_rejected_without_a_row() {
        let (db, _, _) = two_users();
        let err = db.signup("testuser", "other@test", "password", None).unwrap_err();
        assert!(matches!(err, DbError::UniquenessViolation { ref field } if field == "username"));
        assert_eq!(db.list_users(None).unwrap().len(), 2);
    }

    #[test]
    fn duplicate_email_is_rejected_without_a_row() {
        let (db, _, _) = two_users();
        let err = db.signup("someone", "test@test", "password", None).unwrap_err();
        assert!(matches!(err, DbError::UniquenessViolation { ref field } if field == "email"));
        assert_eq!(db.list_users(None).unwrap().len(), 2);
    }

    #[test]
    fn overlong_username_is_a_length_violation() {
        let (db, _, _) = two_users();
        let name = "u".repeat(USERNAME_MAX_LEN + 1);
        let err = db.signup(&name, "long@test", "password", None).unwrap_err();
        assert!(matches!(err, DbError::LengthViolation { field: "username", .. }));
    }

    #[test]
    fn null_password_is_rejected_by_the_schema() {
        let (db, _, _) = two_users();
        let err = db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO users (username, email, password) VALUES ('x', 'x@test', NULL)",
                    [],
                )?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, DbError::NullViolation { ref column } if column == "password"));
    }

    #[test]
    fn authenticate_accepts_only_matching_credentials() {
        let (db, user, _) = two_users();

        let found = db.authenticate("testuser", "testuser").unwrap();
        assert_eq!(found, Some(user));

        assert_eq!(db.authenticate("badusername", "testuser").unwrap(), None);
        assert_eq!(db.authenticate("testuser", "badpassword").unwrap(), None);
    }

    #[test]
    fn authenticate_against_unhashed_row_is_a_failure_not_an_error() {
        let (db, _, _) = two_users();
        db.with_conn(|conn| insert(conn, "raw", "raw@test", "HASHED_PASSWORD", None))
            .unwrap();
        assert_eq!(db.authenticate("raw", "HASHED_PASSWORD").unwrap(), None);
    }

    #[test]
    fn search_matches_substrings_and_escapes_wildcards() {
        let (db, _, _) = two_users();
        db.signup("other_name", "o@test", "password", None).unwrap();

        let names = |q: Option<&str>| -> Vec<String> {
            db.list_users(q)
                .unwrap()
                .into_iter()
                .map(|u| u.username)
                .collect()
        };

        assert_eq!(names(None), vec!["other_name", "testuser", "testuser2"]);
        assert_eq!(names(Some("user2")), vec!["testuser2"]);
        assert_eq!(names(Some("_")), vec!["other_name"]);
        assert_eq!(names(Some("   ")).len(), 3);
    }

    #[test]
    fn profile_update_requires_current_password() {
        let (db, user, _) = two_users();
        let update = ProfileUpdate {
            username: "renamed".into(),
            email: "renamed@test".into(),
            image_url: None,
            header_image_url: Some("/h.png".into()),
            bio: Some("hello".into()),
            location: None,
        };

        assert_eq!(db.update_profile(user.id, "wrong", &update).unwrap(), None);
        assert_eq!(db.get_user(user.id).unwrap().unwrap().username, "testuser");

        let updated = db.update_profile(user.id, "testuser", &update).unwrap().unwrap();
        assert_eq!(updated.username, "renamed");
        assert_eq!(updated.header_image_url, "/h.png");
        assert_eq!(updated.image_url, DEFAULT_IMAGE_URL);
        assert_eq!(updated.bio.as_deref(), Some("hello"));
    }

    #[test]
    fn profile_update_checks_the_password_stored_when_it_runs() {
        let (db, user, _) = two_users();
        let update = ProfileUpdate {
            username: "renamed".into(),
            email: "renamed@test".into(),
            image_url: None,
            header_image_url: None,
            bio: None,
            location: None,
        };

        let rotated = hash_password("rotated").unwrap();
        db.with_conn(|conn| {
            conn.execute("UPDATE users SET password = ?1 WHERE id = ?2", params![rotated, user.id])?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.update_profile(user.id, "testuser", &update).unwrap(), None);
        assert_eq!(db.get_user(user.id).unwrap(), Some(user.clone()));

        let updated = db.update_profile(user.id, "rotated", &update).unwrap().unwrap();
        assert_eq!(updated.username, "renamed");

        assert!(matches!(
            db.update_profile(9999, "rotated", &update),
            Err(DbError::NotFound)
        ));
    }

    #[test]
    fn profile_update_to_taken_username_fails() {
        let (db, user, _) = two_users();
        let update = ProfileUpdate {
            username: "testuser2".into(),
            email: "test@test".into(),
            image_url: None,
            header_image_url: None,
            bio: None,
            location: None,
        };

        let err = db.update_profile(user.id, "testuser", &update).unwrap_err();
        assert!(matches!(err, DbError::UniquenessViolation { .. }));
    }

    #[test]
    fn delete_user_cascades_to_messages_follows_and_likes() {
        let (db, u1, u2) = two_users();
        let own = db.create_message(u1.id, "mine").unwrap();
        let theirs = db.create_message(u2.id, "theirs").unwrap();
        db.follow(u1.id, u2.id).unwrap();
        db.follow(u2.id, u1.id).unwrap();
        db.toggle_like(u1.id, theirs.id).unwrap();
        db.toggle_like(u2.id, own.id).unwrap();

        assert!(db.delete_user(u1.id).unwrap());

        assert_eq!(db.get_user(u1.id).unwrap(), None);
        assert!(db.get_message(own.id).unwrap().is_none());
        assert!(db.get_message(theirs.id).unwrap().is_some());
        assert!(db.followers(u2.id).unwrap().is_empty());
        assert!(db.following(u2.id).unwrap().is_empty());
        assert!(db.liked_message_ids(u2.id).unwrap().is_empty());
        assert_eq!(db.user_stats(u2.id).unwrap().messages, 1);

        assert!(!db.delete_user(u1.id).unwrap());
    }
}
