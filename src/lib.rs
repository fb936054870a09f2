//! Billarr: self-hosted bill tracker with reminders.
//!
//! Bills live in SQLite and are managed over a small REST API. A background
//! scheduler sends reminders through Telegram and WhatsApp as due dates
//! approach, and bills can be mirrored into Google Calendar.
//!
//! # Architecture
//!
//! - **Store**: `bills` table and singleton `settings` row via `rusqlite`
//! - **Reminder windows**: pure decision of whether a bill should fire now
//! - **Dispatcher**: one notification pass over pending bills
//! - **Scheduler**: drives the dispatcher on a fixed interval
//! - **Recurring**: due-date arithmetic and roll-forward on payment
//! - **Channels**: Telegram and WhatsApp delivery
//! - **Calendar**: Google Calendar event sync
//! - **Server**: `axum` REST API with an optional password gate

pub mod calendar;
pub mod channels;
pub mod config;
pub mod error;
pub mod expenses;
pub mod paths;
pub mod recurring;
pub mod reminder;
pub mod scheduler;
pub mod server;
pub mod service;
pub mod store;

pub use config::BillarrConfig;
pub use error::{BillarrError, Result};
pub use scheduler::{Dispatcher, NotificationScheduler};
pub use service::BillService;
pub use store::BillStore;
