//! Reminder-window evaluator.
//!
//! Decides whether a reminder for a bill should go out right now, given how
//! many days remain until it is due and when the last reminder was sent.
//!
//! | Days until due | Windows (local time)                   | Dedup      |
//! |----------------|----------------------------------------|------------|
//! | overdue        | 09:00–10:59                            | once a day |
//! | due today      | 09:00–10:59, 12:00–13:59, 18:00–19:59  | per window |
//! | 1–2            | 09:00–10:59, 18:00–19:59               | per window |
//! | 3 or more      | 09:00–10:59                            | once a day |
//!
//! Windows are two hours wide so a dispatcher polling every 30–60 minutes
//! still lands inside each one when a tick runs late.

use chrono::{DateTime, TimeZone, Timelike, Utc};

/// Width of every notification window in hours.
pub const WINDOW_HOURS: u32 = 2;

/// A daily hour range during which a reminder tier may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationWindow {
    /// Label used in logs.
    pub name: &'static str,
    /// First hour of the window (inclusive).
    pub start_hour: u32,
}

impl NotificationWindow {
    pub const MORNING: Self = Self {
        name: "morning",
        start_hour: 9,
    };
    pub const MIDDAY: Self = Self {
        name: "midday",
        start_hour: 12,
    };
    pub const EVENING: Self = Self {
        name: "evening",
        start_hour: 18,
    };

    /// `true` when `hour` falls in `[start, start + WINDOW_HOURS)`.
    pub fn contains_hour(self, hour: u32) -> bool {
        hour >= self.start_hour && hour < self.start_hour + WINDOW_HOURS
    }
}

/// How a tier suppresses repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dedup {
    /// At most one reminder per calendar day.
    Daily,
    /// At most one reminder per window per day.
    PerWindow,
}

/// Urgency bucket derived from the number of days until a bill is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderTier {
    Overdue,
    DueToday,
    DueSoon,
    Upcoming,
}

impl ReminderTier {
    pub fn for_days(days_until_due: i64) -> Self {
        match days_until_due {
            d if d < 0 => Self::Overdue,
            0 => Self::DueToday,
            1 | 2 => Self::DueSoon,
            _ => Self::Upcoming,
        }
    }

    /// Windows during which this tier may fire.
    pub fn windows(self) -> &'static [NotificationWindow] {
        match self {
            Self::Overdue | Self::Upcoming => &[NotificationWindow::MORNING],
            Self::DueToday => &[
                NotificationWindow::MORNING,
                NotificationWindow::MIDDAY,
                NotificationWindow::EVENING,
            ],
            Self::DueSoon => &[NotificationWindow::MORNING, NotificationWindow::EVENING],
        }
    }

    fn dedup(self) -> Dedup {
        match self {
            Self::Overdue | Self::Upcoming => Dedup::Daily,
            Self::DueToday | Self::DueSoon => Dedup::PerWindow,
        }
    }
}

/// The window of this tier that contains `now`, if any.
pub fn active_window<Tz: TimeZone>(
    days_until_due: i64,
    now: &DateTime<Tz>,
) -> Option<NotificationWindow> {
    let hour = now.hour();
    ReminderTier::for_days(days_until_due)
        .windows()
        .iter()
        .copied()
        .find(|w| w.contains_hour(hour))
}

/// Whether a reminder should go out at `now`.
///
/// Hours and "today" are read in `now`'s time zone; `last_notified_at` is
/// converted into that zone before comparison.
pub fn should_notify_now<Tz: TimeZone>(
    days_until_due: i64,
    last_notified_at: Option<DateTime<Utc>>,
    now: &DateTime<Tz>,
) -> bool {
    let Some(window) = active_window(days_until_due, now) else {
        return false;
    };
    let Some(last) = last_notified_at else {
        return true;
    };
    let last = last.with_timezone(&now.timezone());

    match ReminderTier::for_days(days_until_due).dedup() {
        Dedup::Daily => !notified_today(&last, now),
        Dedup::PerWindow => !notified_in_window(&last, now, window),
    }
}

/// `last` lies in `[midnight of now, now]`.
fn notified_today<Tz: TimeZone>(last: &DateTime<Tz>, now: &DateTime<Tz>) -> bool {
    last.date_naive() == now.date_naive() && last <= now
}

/// `last` lies in `[W:00:00, W+1:59:59.999]` on now's calendar day.
fn notified_in_window<Tz: TimeZone>(
    last: &DateTime<Tz>,
    now: &DateTime<Tz>,
    window: NotificationWindow,
) -> bool {
    last.date_naive() == now.date_naive() && window.contains_hour(last.hour())
}
