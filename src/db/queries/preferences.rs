use rusqlite::{params, Connection, OptionalExtension};

/// Raw JSON value stored under `key` for one user.
pub fn get_preference(conn: &Connection, user_id: i64, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM preferences WHERE user_id = ? AND key = ?",
        params![user_id, key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_preference(conn: &Connection, user_id: i64, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO preferences (user_id, key, value, updated_at)
         VALUES (?, ?, ?, datetime('now'))
         ON CONFLICT(user_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![user_id, key, value],
    )?;
    Ok(())
}
