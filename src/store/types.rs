//! Row types shared by the store, the dispatcher and the HTTP layer.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version stamped into `schema_meta`.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Default reminder window in days.
pub const DEFAULT_REMINDER_DAYS: u32 = 3;

/// Largest accepted reminder window in days.
pub const MAX_REMINDER_DAYS: u32 = 30;

/// Payment status of a bill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    #[default]
    Pending,
    Paid,
    Overdue,
}

impl BillStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "overdue" => Some(Self::Overdue),
            _ => None,
        }
    }
}

/// How often a bill repeats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    #[default]
    None,
    Weekly,
    Monthly,
    Quarterly,
    Annually,
}

impl Recurrence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Annually => "annually",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "quarterly" => Some(Self::Quarterly),
            "annually" => Some(Self::Annually),
            _ => None,
        }
    }

    pub fn is_recurring(self) -> bool {
        self != Self::None
    }
}

/// Bill category as offered by the web form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Utilities,
    Rent,
    Insurance,
    Subscription,
    CreditCard,
    Loan,
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Utilities => "utilities",
            Self::Rent => "rent",
            Self::Insurance => "insurance",
            Self::Subscription => "subscription",
            Self::CreditCard => "credit-card",
            Self::Loan => "loan",
            Self::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "utilities" => Some(Self::Utilities),
            "rent" => Some(Self::Rent),
            "insurance" => Some(Self::Insurance),
            "subscription" => Some(Self::Subscription),
            "credit-card" => Some(Self::CreditCard),
            "loan" => Some(Self::Loan),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Which outbound channels reminders go to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationMethod {
    #[default]
    None,
    Telegram,
    Whatsapp,
    All,
}

impl NotificationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Telegram => "telegram",
            Self::Whatsapp => "whatsapp",
            Self::All => "all",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "telegram" => Some(Self::Telegram),
            "whatsapp" => Some(Self::Whatsapp),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn includes_telegram(self) -> bool {
        matches!(self, Self::Telegram | Self::All)
    }

    pub fn includes_whatsapp(self) -> bool {
        matches!(self, Self::Whatsapp | Self::All)
    }
}

/// A stored bill row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: i64,
    pub vendor: String,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub account_info: Option<String>,
    pub payment_method: Option<String>,
    pub category: Option<Category>,
    pub notes: Option<String>,
    pub recurring: Recurrence,
    pub reminder_days: u32,
    pub status: BillStatus,
    pub calendar_event_id: Option<String>,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Bill {
    /// The editable fields of this bill.
    pub fn draft(&self) -> BillDraft {
        BillDraft {
            vendor: self.vendor.clone(),
            amount: self.amount,
            due_date: self.due_date,
            account_info: self.account_info.clone(),
            payment_method: self.payment_method.clone(),
            category: self.category,
            notes: self.notes.clone(),
            recurring: self.recurring,
            reminder_days: self.reminder_days,
            status: self.status,
        }
    }
}

/// Validated, user-editable bill fields. Used for inserts and full updates.
#[derive(Debug, Clone, PartialEq)]
pub struct BillDraft {
    pub vendor: String,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub account_info: Option<String>,
    pub payment_method: Option<String>,
    pub category: Option<Category>,
    pub notes: Option<String>,
    pub recurring: Recurrence,
    pub reminder_days: u32,
    pub status: BillStatus,
}

/// The singleton settings row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub notification_method: NotificationMethod,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub whatsapp_number: Option<String>,
    pub google_calendar_sync: bool,
}

/// Format an instant as the RFC 3339 UTC string stored in SQLite.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 and SQLite's `CURRENT_TIMESTAMP` form
/// (`YYYY-MM-DD HH:MM:SS`, UTC) written by older databases.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::TimeZone;

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!(BillStatus::parse(" Paid "), Some(BillStatus::Paid));
        assert_eq!(Recurrence::parse("QUARTERLY"), Some(Recurrence::Quarterly));
        assert_eq!(Category::parse("credit-card"), Some(Category::CreditCard));
        assert_eq!(NotificationMethod::parse("All"), Some(NotificationMethod::All));
        assert_eq!(BillStatus::parse("cancelled"), None);
    }

    #[test]
    fn category_serializes_kebab_case() {
        let json = serde_json::to_string(&Category::CreditCard).unwrap();
        assert_eq!(json, "\"credit-card\"");
    }

    #[test]
    fn notification_method_channel_flags() {
        assert!(NotificationMethod::All.includes_telegram());
        assert!(NotificationMethod::All.includes_whatsapp());
        assert!(!NotificationMethod::Telegram.includes_whatsapp());
        assert!(!NotificationMethod::None.includes_telegram());
    }

    #[test]
    fn parse_timestamp_accepts_sqlite_format() {
        let at = parse_timestamp("2024-03-05 09:30:00").expect("sqlite format");
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap());
    }

    #[test]
    fn timestamp_storage_format_parses_back() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 18, 1, 2).unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(at)), Some(at));
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_none());
    }
}
