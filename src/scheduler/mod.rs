//! Reminder scheduling.
//!
//! The dispatcher performs one notification pass; the runner drives it on a
//! fixed interval.

pub mod dispatcher;
pub mod runner;

pub use dispatcher::{DispatchOutcome, DispatchSummary, Dispatcher};
pub use runner::NotificationScheduler;
