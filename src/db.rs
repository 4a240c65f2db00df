use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::auth;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("schoolhub.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    // Email lookup is case-sensitive on purpose (BINARY collation); the
    // login contract is an exact match against the seeded set.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS identities(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            secret_salt TEXT NOT NULL,
            secret_digest TEXT NOT NULL,
            role TEXT NOT NULL,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            teacher_name TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            starts_at TEXT NOT NULL,
            location TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_starts_at ON events(starts_at)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS admissions(
            id TEXT PRIMARY KEY,
            applicant_name TEXT NOT NULL,
            email TEXT NOT NULL,
            grade_applied TEXT NOT NULL,
            note TEXT,
            submitted_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_admissions_submitted ON admissions(submitted_at)",
        [],
    )?;

    ensure_events_created_by(&conn)?;
    auth::seed_identities_if_empty(&conn)?;

    Ok(conn)
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn settings_delete(conn: &Connection, key: &str) -> anyhow::Result<()> {
    conn.execute("DELETE FROM settings WHERE key = ?", [key])?;
    Ok(())
}

fn ensure_events_created_by(conn: &Connection) -> anyhow::Result<()> {
    // Workspaces created before events carried an author need the column.
    if table_has_column(conn, "events", "created_by")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE events ADD COLUMN created_by TEXT NOT NULL DEFAULT ''",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
