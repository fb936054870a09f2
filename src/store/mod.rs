//! Persistent bill and settings storage.
//!
//! - `types`: row types and enumerations.
//! - `schema`: SQLite DDL and additive upgrades.
//! - `sqlite`: the `BillStore` repository.

pub(crate) mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::{BillStore, StoreError};
pub use types::{
    Bill, BillDraft, BillStatus, Category, DEFAULT_REMINDER_DAYS, MAX_REMINDER_DAYS,
    NotificationMethod, Recurrence, Settings,
};
