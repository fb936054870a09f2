//! Google Calendar sync for bills.
//!
//! Every bill maps to one all-day event on its due date. Sync is best-effort:
//! failures are logged and never fail the bill operation that caused them.

pub mod google;

use std::sync::Arc;

use chrono::Days;
use serde::{Deserialize, Serialize};

use crate::reminder::message::{format_event_description, format_event_summary};
use crate::store::{BillDraft, BillStatus};

pub use google::{GoogleCalendarClient, GoogleCredentials, load_credentials};

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Event resource body sent to the Calendar API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: EventDate,
    pub end: EventDate,
    pub reminders: EventReminders,
    pub color_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDate {
    /// `YYYY-MM-DD` for all-day events.
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReminders {
    pub use_default: bool,
    pub overrides: Vec<ReminderOverride>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderOverride {
    pub method: String,
    pub minutes: u32,
}

/// Calendar color for a bill status: yellow, green, red.
pub fn color_id(status: BillStatus) -> &'static str {
    match status {
        BillStatus::Pending => "5",
        BillStatus::Paid => "10",
        BillStatus::Overdue => "11",
    }
}

/// Build the event body for a bill.
///
/// The end date is exclusive, as the Calendar API requires for all-day
/// events, so a one-day event ends the day after the due date.
pub fn event_for_bill(bill: &BillDraft) -> CalendarEvent {
    let start = bill.due_date;
    let end = start.checked_add_days(Days::new(1)).unwrap_or(start);
    let minutes = bill.reminder_days * MINUTES_PER_DAY;
    CalendarEvent {
        summary: format_event_summary(bill),
        description: format_event_description(bill),
        start: EventDate {
            date: start.format("%Y-%m-%d").to_string(),
        },
        end: EventDate {
            date: end.format("%Y-%m-%d").to_string(),
        },
        reminders: EventReminders {
            use_default: false,
            overrides: ["popup", "email"]
                .into_iter()
                .map(|method| ReminderOverride {
                    method: method.to_owned(),
                    minutes,
                })
                .collect(),
        },
        color_id: color_id(bill.status).to_owned(),
    }
}

/// Best-effort calendar sync.
///
/// Holds no client when credentials were not available at startup; the
/// per-call `enabled` flag mirrors the `google_calendar_sync` setting.
#[derive(Clone, Default)]
pub struct CalendarSync {
    client: Option<Arc<GoogleCalendarClient>>,
}

impl CalendarSync {
    pub fn new(client: Option<GoogleCalendarClient>) -> Self {
        Self {
            client: client.map(Arc::new),
        }
    }

    /// A sync that never talks to Google.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Build from config, logging and disabling on credential errors.
    pub fn from_config(config: &crate::config::CalendarConfig, http: reqwest::Client) -> Self {
        match load_credentials(config) {
            Ok(Some(credentials)) => {
                tracing::info!(
                    calendar_id = %config.calendar_id,
                    "google calendar sync available ({credentials:?})"
                );
                Self::new(Some(GoogleCalendarClient::new(config, credentials, http)))
            }
            Ok(None) => Self::disabled(),
            Err(e) => {
                tracing::error!("google calendar credentials unusable: {e:#}");
                Self::disabled()
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    /// Create or update the event for a bill.
    ///
    /// Returns the event id to persist, or `None` when sync is off or failed.
    pub async fn upsert(
        &self,
        enabled: bool,
        event_id: Option<&str>,
        bill: &BillDraft,
    ) -> Option<String> {
        let client = self.client.as_ref().filter(|_| enabled)?;
        let event = event_for_bill(bill);
        let result = match event_id {
            Some(id) => client.update_event(id, &event).await,
            None => client.insert_event(&event).await,
        };
        match result {
            Ok(id) => {
                tracing::info!(vendor = %bill.vendor, event_id = %id, "calendar event synced");
                Some(id)
            }
            Err(e) => {
                tracing::warn!(vendor = %bill.vendor, "calendar sync failed: {e:#}");
                None
            }
        }
    }

    /// Delete a bill's event when it has one.
    pub async fn remove(&self, enabled: bool, event_id: Option<&str>) {
        let (Some(client), Some(id)) = (self.client.as_ref().filter(|_| enabled), event_id) else {
            return;
        };
        match client.delete_event(id).await {
            Ok(()) => tracing::info!(event_id = %id, "calendar event deleted"),
            Err(e) => tracing::warn!(event_id = %id, "calendar delete failed: {e:#}"),
        }
    }
}
