//! SQLite DDL for the bill store.
//!
//! Table creation is idempotent; columns added after the first release are
//! applied as additive `ALTER TABLE` steps so older databases keep opening.

use rusqlite::Connection;

use super::types::CURRENT_SCHEMA_VERSION;

pub(crate) const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bills (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    vendor         TEXT NOT NULL,
    amount         REAL NOT NULL,
    due_date       TEXT NOT NULL,      -- YYYY-MM-DD
    account_info   TEXT,
    payment_method TEXT,
    category       TEXT,
    notes          TEXT,
    recurring      TEXT DEFAULT 'none',
    reminder_days  INTEGER DEFAULT 3,
    status         TEXT DEFAULT 'pending',
    created_at     DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_bills_status   ON bills(status);
CREATE INDEX IF NOT EXISTS idx_bills_due_date ON bills(due_date);

CREATE TABLE IF NOT EXISTS settings (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    notification_method  TEXT DEFAULT 'none',
    telegram_chat_id     TEXT,
    telegram_bot_token   TEXT,
    whatsapp_number      TEXT,
    google_calendar_sync INTEGER DEFAULT 0,
    created_at           DATETIME DEFAULT CURRENT_TIMESTAMP
);

INSERT OR IGNORE INTO settings (id, notification_method) VALUES (1, 'none');
"#;

/// Columns added after the initial `bills` table shipped.
const ADDITIVE_COLUMNS: &[(&str, &str)] = &[
    ("calendar_event_id", "ALTER TABLE bills ADD COLUMN calendar_event_id TEXT"),
    ("last_notified_at", "ALTER TABLE bills ADD COLUMN last_notified_at DATETIME"),
];

/// Apply the full schema to an open connection.
///
/// Safe to call multiple times.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    for (column, ddl) in ADDITIVE_COLUMNS {
        if !has_column(conn, "bills", column)? {
            conn.execute_batch(ddl)?;
        }
    }

    let version_str = CURRENT_SCHEMA_VERSION.to_string();
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![version_str],
    )?;

    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Read the current schema version from the database.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}
