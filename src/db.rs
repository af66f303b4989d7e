use crate::resources;
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "trainingd.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Creates every collection table plus `settings`. Safe to run on an existing workspace.
pub fn create_schema(conn: &Connection) -> anyhow::Result<()> {
    for schema in resources::ALL {
        let table = schema.collection;
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table}(
                    id TEXT PRIMARY KEY,
                    organization_id TEXT,
                    data_source TEXT NOT NULL DEFAULT 'offline',
                    created_at TEXT NOT NULL,
                    updated_at TEXT,
                    fields TEXT NOT NULL DEFAULT '{{}}'
                )"
            ),
            [],
        )?;
        // Workspaces created before edits were tracked lack updated_at.
        ensure_updated_at(conn, table)?;
        conn.execute(
            &format!("CREATE INDEX IF NOT EXISTS idx_{table}_org ON {table}(organization_id)"),
            [],
        )?;
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

fn ensure_updated_at(conn: &Connection, table: &str) -> anyhow::Result<()> {
    if table_has_column(conn, table, "updated_at")? {
        return Ok(());
    }
    conn.execute(&format!("ALTER TABLE {} ADD COLUMN updated_at TEXT", table), [])?;
    conn.execute(
        &format!("UPDATE {} SET updated_at = created_at WHERE updated_at IS NULL", table),
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

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(s) => Ok(Some(
            serde_json::from_str(&s).with_context(|| format!("setting {} is not JSON", key))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}
