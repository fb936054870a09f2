//! SQLite-backed bill store.
//!
//! A single database file holds the `bills` table and the singleton
//! `settings` row.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use super::schema::{apply_schema, read_schema_version};
use super::types::{
    Bill, BillDraft, BillStatus, Category, DEFAULT_REMINDER_DAYS, NotificationMethod, Recurrence,
    Settings, format_timestamp, parse_timestamp,
};

const BILL_COLUMNS: &str = "id, vendor, amount, due_date, account_info, payment_method, \
     category, notes, recurring, reminder_days, status, calendar_event_id, last_notified_at, \
     created_at";

/// SQLite-backed bill store.
///
/// Thread-safe via an internal `Mutex<Connection>`. Every mutation is a
/// single statement, so a concurrent edit and a dispatcher update never
/// interleave inside one row write.
pub struct BillStore {
    conn: Mutex<Connection>,
}

impl BillStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Read the current schema version from the database.
    pub fn schema_version(&self) -> Result<Option<u32>, StoreError> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    /// All bills ordered by due date.
    ///
    /// Rows that cannot be decoded (e.g. a blank `due_date` written by an
    /// older release) are logged and left out.
    pub fn list_bills(&self) -> Result<Vec<Bill>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BILL_COLUMNS} FROM bills ORDER BY due_date ASC, id ASC"
        ))?;
        let rows = stmt.query_map([], decode_bill_row)?;
        collect_bills(rows)
    }

    /// Bills with the given status, ordered by due date.
    pub fn list_bills_with_status(&self, status: BillStatus) -> Result<Vec<Bill>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE status = ?1 ORDER BY due_date ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![status.as_str()], decode_bill_row)?;
        collect_bills(rows)
    }

    pub fn get_bill(&self, id: i64) -> Result<Option<Bill>, StoreError> {
        let conn = self.lock()?;
        let bill = conn
            .query_row(
                &format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = ?1"),
                params![id],
                row_to_bill,
            )
            .optional()?;
        Ok(bill)
    }

    /// Insert a new bill and return its id.
    pub fn insert_bill(&self, draft: &BillDraft) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO bills \
             (vendor, amount, due_date, account_info, payment_method, category, notes, \
              recurring, reminder_days, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                draft.vendor,
                draft.amount,
                draft.due_date.format("%Y-%m-%d").to_string(),
                draft.account_info,
                draft.payment_method,
                draft.category.map(Category::as_str),
                draft.notes,
                draft.recurring.as_str(),
                draft.reminder_days,
                draft.status.as_str(),
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Replace the editable fields of a bill.
    ///
    /// Leaves `calendar_event_id` and `last_notified_at` untouched.
    pub fn update_bill(&self, id: i64, draft: &BillDraft) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE bills SET vendor = ?1, amount = ?2, due_date = ?3, account_info = ?4, \
             payment_method = ?5, category = ?6, notes = ?7, recurring = ?8, \
             reminder_days = ?9, status = ?10 WHERE id = ?11",
            params![
                draft.vendor,
                draft.amount,
                draft.due_date.format("%Y-%m-%d").to_string(),
                draft.account_info,
                draft.payment_method,
                draft.category.map(Category::as_str),
                draft.notes,
                draft.recurring.as_str(),
                draft.reminder_days,
                draft.status.as_str(),
                id
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    pub fn set_calendar_event_id(&self, id: i64, event_id: Option<&str>) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE bills SET calendar_event_id = ?1 WHERE id = ?2",
            params![event_id, id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    /// Record that a reminder went out for this bill at `at`.
    pub fn set_last_notified(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE bills SET last_notified_at = ?1 WHERE id = ?2",
            params![format_timestamp(at), id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    pub fn delete_bill(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM bills WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    /// Load the singleton settings row, recreating it if it went missing.
    pub fn settings(&self) -> Result<Settings, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO settings (id, notification_method) VALUES (1, 'none')",
            [],
        )?;
        let settings = conn.query_row(
            "SELECT notification_method, telegram_bot_token, telegram_chat_id, \
             whatsapp_number, google_calendar_sync FROM settings WHERE id = 1",
            [],
            row_to_settings,
        )?;
        Ok(settings)
    }

    pub fn update_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings \
             (id, notification_method, telegram_bot_token, telegram_chat_id, whatsapp_number, \
              google_calendar_sync) \
             VALUES (1, ?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(id) DO UPDATE SET \
             notification_method = excluded.notification_method, \
             telegram_bot_token = excluded.telegram_bot_token, \
             telegram_chat_id = excluded.telegram_chat_id, \
             whatsapp_number = excluded.whatsapp_number, \
             google_calendar_sync = excluded.google_calendar_sync",
            params![
                settings.notification_method.as_str(),
                settings.telegram_bot_token,
                settings.telegram_chat_id,
                settings.whatsapp_number,
                settings.google_calendar_sync,
            ],
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

/// Errors from the SQLite bill store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("bill not found: {0}")]
    NotFound(i64),

    #[error("lock poisoned: {0}")]
    Lock(String),
}

// ---------------------------------------------------------------------------
// Row conversion helpers
// ---------------------------------------------------------------------------

/// A bill row keyed by id, with decoding failures kept per row.
type DecodedRow = (i64, rusqlite::Result<Bill>);

fn decode_bill_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DecodedRow> {
    let id: i64 = row.get(0)?;
    Ok((id, row_to_bill(row)))
}

/// Collect decoded rows, skipping the ones that failed to decode.
///
/// Stepping errors still abort the whole query.
fn collect_bills(
    rows: impl Iterator<Item = rusqlite::Result<DecodedRow>>,
) -> Result<Vec<Bill>, StoreError> {
    let mut out = Vec::new();
    for r in rows {
        match r? {
            (_, Ok(bill)) => out.push(bill),
            (bill_id, Err(e)) => warn!(bill_id, "skipping unreadable bill row: {e}"),
        }
    }
    Ok(out)
}

fn row_to_bill(row: &rusqlite::Row<'_>) -> rusqlite::Result<Bill> {
    let due_raw: String = row.get(3)?;
    let due_date = NaiveDate::parse_from_str(due_raw.trim(), "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let category: Option<String> = row.get(6)?;
    let recurring: Option<String> = row.get(8)?;
    let reminder_days: Option<i64> = row.get(9)?;
    let status: Option<String> = row.get(10)?;
    let last_notified: Option<String> = row.get(12)?;
    let created: Option<String> = row.get(13)?;

    Ok(Bill {
        id: row.get(0)?,
        vendor: row.get(1)?,
        amount: row.get(2)?,
        due_date,
        account_info: row.get(4)?,
        payment_method: row.get(5)?,
        category: category.as_deref().and_then(Category::parse),
        notes: row.get(7)?,
        recurring: recurring
            .as_deref()
            .and_then(Recurrence::parse)
            .unwrap_or_default(),
        reminder_days: reminder_days
            .and_then(|d| u32::try_from(d).ok())
            .unwrap_or(DEFAULT_REMINDER_DAYS),
        status: status.as_deref().and_then(BillStatus::parse).unwrap_or_default(),
        calendar_event_id: row.get(11)?,
        last_notified_at: last_notified.as_deref().and_then(parse_timestamp),
        created_at: created.as_deref().and_then(parse_timestamp),
    })
}

fn row_to_settings(row: &rusqlite::Row<'_>) -> rusqlite::Result<Settings> {
    let method: Option<String> = row.get(0)?;
    let calendar_sync: Option<i64> = row.get(4)?;
    Ok(Settings {
        notification_method: method
            .as_deref()
            .and_then(NotificationMethod::parse)
            .unwrap_or_default(),
        telegram_bot_token: row.get(1)?,
        telegram_chat_id: row.get(2)?,
        whatsapp_number: row.get(3)?,
        google_calendar_sync: calendar_sync.unwrap_or(0) != 0,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::TimeZone;

    fn test_store() -> (tempfile::TempDir, BillStore) {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let store = BillStore::open(&dir.path().join("bills.db")).expect("open store");
        (dir, store)
    }

    fn draft(vendor: &str, due: &str) -> BillDraft {
        BillDraft {
            vendor: vendor.to_owned(),
            amount: 42.5,
            due_date: NaiveDate::parse_from_str(due, "%Y-%m-%d").unwrap(),
            account_info: None,
            payment_method: Some("Card".to_owned()),
            category: Some(Category::Utilities),
            notes: None,
            recurring: Recurrence::Monthly,
            reminder_days: 3,
            status: BillStatus::Pending,
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let (_dir, store) = test_store();
        let id = store.insert_bill(&draft("Power Co", "2024-06-01")).expect("insert");

        let bill = store.get_bill(id).expect("get").expect("bill exists");
        assert_eq!(bill.vendor, "Power Co");
        assert_eq!(bill.category, Some(Category::Utilities));
        assert_eq!(bill.recurring, Recurrence::Monthly);
        assert!(bill.last_notified_at.is_none());
        assert!(bill.calendar_event_id.is_none());
        assert!(bill.created_at.is_some());
    }

    #[test]
    fn list_orders_by_due_date() {
        let (_dir, store) = test_store();
        store.insert_bill(&draft("Later", "2024-08-01")).expect("insert");
        store.insert_bill(&draft("Sooner", "2024-02-01")).expect("insert");

        let vendors: Vec<String> = store
            .list_bills()
            .expect("list")
            .into_iter()
            .map(|b| b.vendor)
            .collect();
        assert_eq!(vendors, vec!["Sooner", "Later"]);
    }

    #[test]
    fn list_with_status_filters() {
        let (_dir, store) = test_store();
        let mut paid = draft("Paid Co", "2024-02-01");
        paid.status = BillStatus::Paid;
        store.insert_bill(&paid).expect("insert");
        store.insert_bill(&draft("Pending Co", "2024-03-01")).expect("insert");

        let pending = store
            .list_bills_with_status(BillStatus::Pending)
            .expect("list pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].vendor, "Pending Co");
    }

    #[test]
    fn update_keeps_notification_and_calendar_fields() {
        let (_dir, store) = test_store();
        let id = store.insert_bill(&draft("Gas", "2024-06-01")).expect("insert");
        let at = Utc.with_ymd_and_hms(2024, 5, 30, 9, 15, 0).unwrap();
        store.set_last_notified(id, at).expect("notified");
        store.set_calendar_event_id(id, Some("evt-1")).expect("event id");

        let mut edited = draft("Gas & Electric", "2024-06-02");
        edited.status = BillStatus::Paid;
        store.update_bill(id, &edited).expect("update");

        let bill = store.get_bill(id).expect("get").expect("exists");
        assert_eq!(bill.vendor, "Gas & Electric");
        assert_eq!(bill.status, BillStatus::Paid);
        assert_eq!(bill.last_notified_at, Some(at));
        assert_eq!(bill.calendar_event_id.as_deref(), Some("evt-1"));
    }

    #[test]
    fn missing_rows_report_not_found() {
        let (_dir, store) = test_store();
        assert!(store.get_bill(99).expect("get").is_none());
        assert!(matches!(
            store.update_bill(99, &draft("x", "2024-01-01")),
            Err(StoreError::NotFound(99))
        ));
        assert!(matches!(store.delete_bill(99), Err(StoreError::NotFound(99))));
        assert!(matches!(
            store.set_last_notified(99, Utc::now()),
            Err(StoreError::NotFound(99))
        ));
    }

    #[test]
    fn delete_removes_row() {
        let (_dir, store) = test_store();
        let id = store.insert_bill(&draft("Gym", "2024-06-01")).expect("insert");
        store.delete_bill(id).expect("delete");
        assert!(store.get_bill(id).expect("get").is_none());
    }

    #[test]
    fn settings_default_then_update() {
        let (_dir, store) = test_store();
        let initial = store.settings().expect("settings");
        assert_eq!(initial.notification_method, NotificationMethod::None);
        assert!(!initial.google_calendar_sync);

        let updated = Settings {
            notification_method: NotificationMethod::Telegram,
            telegram_bot_token: Some("123:abc".to_owned()),
            telegram_chat_id: Some("42".to_owned()),
            whatsapp_number: None,
            google_calendar_sync: true,
        };
        store.update_settings(&updated).expect("update");
        assert_eq!(store.settings().expect("settings"), updated);
    }

    #[test]
    fn settings_row_is_restored_when_deleted() {
        let (_dir, store) = test_store();
        {
            let conn = store.lock().expect("lock");
            conn.execute("DELETE FROM settings", []).expect("delete");
        }
        let settings = store.settings().expect("settings");
        assert_eq!(settings.notification_method, NotificationMethod::None);
    }

    #[test]
    fn legacy_rows_parse_leniently() {
        let (_dir, store) = test_store();
        {
            let conn = store.lock().expect("lock");
            conn.execute(
                "INSERT INTO bills (vendor, amount, due_date, category, recurring, status, \
                 last_notified_at, created_at) \
                 VALUES ('Old', 10.0, '2023-01-05', '', NULL, 'pending', \
                 '2023-01-04 09:12:00', '2023-01-01 00:00:00')",
                [],
            )
            .expect("raw insert");
        }
        let bills = store.list_bills().expect("list");
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].category, None);
        assert_eq!(bills[0].recurring, Recurrence::None);
        assert_eq!(
            bills[0].last_notified_at,
            Some(Utc.with_ymd_and_hms(2023, 1, 4, 9, 12, 0).unwrap())
        );
    }

    #[test]
    fn unreadable_rows_are_skipped_in_listings() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("bills.db");
        {
            let conn = Connection::open(&path).expect("raw open");
            conn.execute_batch(
                "CREATE TABLE bills (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    vendor TEXT NOT NULL,
                    amount REAL NOT NULL,
                    due_date TEXT NOT NULL,
                    account_info TEXT,
                    payment_method TEXT,
                    category TEXT,
                    notes TEXT,
                    recurring TEXT DEFAULT 'none',
                    reminder_days INTEGER DEFAULT 3,
                    status TEXT DEFAULT 'pending',
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
                );
                INSERT INTO bills (vendor, amount, due_date) VALUES ('Blank', 10, '');
                INSERT INTO bills (vendor, amount, due_date) VALUES ('Garbled', 10, 'next friday');",
            )
            .expect("legacy rows");
        }

        let store = BillStore::open(&path).expect("open");
        store.insert_bill(&draft("Water", "2024-05-01")).expect("insert");

        let vendors: Vec<String> = store
            .list_bills()
            .expect("list")
            .into_iter()
            .map(|b| b.vendor)
            .collect();
        assert_eq!(vendors, vec!["Water"]);

        let pending = store
            .list_bills_with_status(BillStatus::Pending)
            .expect("list pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].vendor, "Water");
    }

    #[test]
    fn reopen_preserves_data() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("nested").join("bills.db");
        let id = {
            let store = BillStore::open(&path).expect("open");
            store.insert_bill(&draft("Rent", "2024-07-01")).expect("insert")
        };
        let store = BillStore::open(&path).expect("reopen");
        assert!(store.get_bill(id).expect("get").is_some());
        assert_eq!(
            store.schema_version().expect("version"),
            Some(super::super::types::CURRENT_SCHEMA_VERSION)
        );
    }

    #[test]
    fn concurrent_notified_updates_do_not_lose_rows() {
        let (_dir, store) = test_store();
        let store = std::sync::Arc::new(store);
        let mut ids = Vec::new();
        for i in 0..8 {
            ids.push(
                store
                    .insert_bill(&draft(&format!("Vendor {i}"), "2024-06-01"))
                    .expect("insert"),
            );
        }

        let handles: Vec<_> = ids
            .iter()
            .map(|&id| {
                let s = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    s.set_last_notified(id, Utc::now()).expect("update");
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread join");
        }

        let bills = store.list_bills().expect("list");
        assert_eq!(bills.len(), 8);
        assert!(bills.iter().all(|b| b.last_notified_at.is_some()));
    }
}
