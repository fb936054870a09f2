//! Reminder policy: which bills are candidates, when to fire, what to say.

pub mod message;
pub mod window;

use chrono::NaiveDate;

use crate::store::Bill;

pub use message::format_reminder;
pub use window::{NotificationWindow, ReminderTier, active_window, should_notify_now};

/// Overdue bills stay candidates for this many days past their due date.
pub const OVERDUE_LOOKBACK_DAYS: i64 = 30;

/// Whole days from `today` until `due`. Negative when overdue.
pub fn days_until_due(due: NaiveDate, today: NaiveDate) -> i64 {
    (due - today).num_days()
}

/// Whether a pending bill is close enough to its due date to be evaluated.
pub fn is_candidate(days_until_due: i64, reminder_days: u32) -> bool {
    (-OVERDUE_LOOKBACK_DAYS..=i64::from(reminder_days)).contains(&days_until_due)
}

/// Pending bills paired with their days-until-due, keeping only candidates.
pub fn candidates(bills: Vec<Bill>, today: NaiveDate) -> Vec<(Bill, i64)> {
    bills
        .into_iter()
        .filter_map(|bill| {
            let days = days_until_due(bill.due_date, today);
            is_candidate(days, bill.reminder_days).then_some((bill, days))
        })
        .collect()
}
