//! User records for [`SqliteStore`].

use rusqlite::{Connection, Row, params};

use docflow_core::user::User;

use crate::error::{Result, StorageError};
use crate::sqlite::documents::is_constraint_violation;
use crate::sqlite::store::SqliteStore;

fn scan_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
    })
}

pub(crate) fn get_user_on_conn(conn: &Connection, id: &str) -> Result<User> {
    conn.query_row(
        "SELECT id, name, email FROM users WHERE id = ?1",
        params![id],
        scan_user,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("user", id),
        other => StorageError::Query(other),
    })
}

impl SqliteStore {
    pub fn create_user_impl(&self, user: &User) -> Result<()> {
        if user.id.trim().is_empty() {
            return Err(StorageError::validation("user id is required"));
        }
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO users (id, name, email) VALUES (?1, ?2, ?3)",
            params![user.id, user.name, user.email],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StorageError::already_exists("user", &user.id)
            } else {
                StorageError::Query(e)
            }
        })?;
        Ok(())
    }

    pub fn get_user_impl(&self, id: &str) -> Result<User> {
        let conn = self.lock_conn()?;
        get_user_on_conn(&conn, id)
    }

    pub fn list_users_impl(&self) -> Result<Vec<User>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT id, name, email FROM users ORDER BY id")?;
        let rows = stmt.query_map([], scan_user)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}
