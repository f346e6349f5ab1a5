use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::models::User;

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub fn create_user(conn: &Connection, email: &str, password_hash: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO users (email, password_hash) VALUES (?, ?)",
        params![email, password_hash],
    )?;
    let id = conn.last_insert_rowid();
    debug!(user_id = id, "Inserted user");
    Ok(id)
}

/// Case-insensitive lookup.
pub fn find_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT id, email, password_hash, created_at FROM users WHERE email = ? COLLATE NOCASE",
        [email],
        row_to_user,
    )
    .optional()
}

pub fn get_user(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT id, email, password_hash, created_at FROM users WHERE id = ?",
        [id],
        row_to_user,
    )
    .optional()
}

pub fn email_exists(conn: &Connection, email: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? COLLATE NOCASE)",
        [email],
        |row| row.get(0),
    )
}

pub fn update_password_hash(
    conn: &Connection,
    user_id: i64,
    password_hash: &str,
) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE users SET password_hash = ? WHERE id = ?",
        params![password_hash, user_id],
    )?;
    Ok(rows > 0)
}
