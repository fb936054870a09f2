//! Bill operations behind the REST API.
//!
//! Applies input validation, writes to the store, keeps the calendar in sync
//! and rolls recurring bills forward when they are paid. Calendar and
//! roll-forward problems are logged and never fail the request.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::calendar::CalendarSync;
use crate::error::{BillarrError, Result};
use crate::expenses::{ExpenseReport, project_year};
use crate::recurring::{next_occurrence, should_roll_forward};
use crate::store::{
    Bill, BillDraft, BillStatus, BillStore, Category, DEFAULT_REMINDER_DAYS, MAX_REMINDER_DAYS,
    NotificationMethod, Recurrence, Settings,
};

/// A JSON number or the string form a web form submits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumberInput {
    Number(f64),
    Text(String),
}

impl NumberInput {
    /// `None` for blank strings.
    fn value(&self) -> Option<std::result::Result<f64, ()>> {
        match self {
            Self::Number(n) => Some(Ok(*n)),
            Self::Text(s) if s.trim().is_empty() => None,
            Self::Text(s) => Some(s.trim().parse::<f64>().map_err(|_| ())),
        }
    }
}

/// A JSON bool, `0`/`1`, or `"true"`/`"false"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FlagInput {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl FlagInput {
    fn value(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Number(0) => Some(false),
            Self::Number(1) => Some(true),
            Self::Number(_) => None,
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Some(true),
                "false" | "0" | "off" | "no" | "" => Some(false),
                _ => None,
            },
        }
    }
}

/// Bill fields as submitted by a client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BillInput {
    pub vendor: Option<String>,
    pub amount: Option<NumberInput>,
    pub due_date: Option<String>,
    pub account_info: Option<String>,
    pub payment_method: Option<String>,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub recurring: Option<String>,
    pub reminder_days: Option<NumberInput>,
    pub status: Option<String>,
}

impl BillInput {
    /// Check every field and collect one message per problem.
    ///
    /// A missing `status` takes `default_status`: pending for new bills, the
    /// stored status for updates.
    pub fn validate(&self, default_status: BillStatus) -> std::result::Result<BillDraft, Vec<String>> {
        let mut errors = Vec::new();

        let vendor = text(&self.vendor);
        if vendor.is_none() {
            errors.push("vendor is required".to_owned());
        }

        let amount = match self.amount.as_ref().and_then(NumberInput::value) {
            None => {
                errors.push("amount is required".to_owned());
                None
            }
            Some(Err(())) => {
                errors.push("amount must be a number".to_owned());
                None
            }
            Some(Ok(a)) if !a.is_finite() || a <= 0.0 => {
                errors.push("amount must be greater than 0".to_owned());
                None
            }
            Some(Ok(a)) => Some(a),
        };

        let due_date = match text(&self.due_date) {
            None => {
                errors.push("due_date is required".to_owned());
                None
            }
            Some(raw) => {
                let parsed = parse_due_date(&raw);
                if parsed.is_none() {
                    errors.push("due_date must be a valid date (YYYY-MM-DD)".to_owned());
                }
                parsed
            }
        };

        let recurring = match text(&self.recurring) {
            None => Recurrence::None,
            Some(raw) => Recurrence::parse(&raw).unwrap_or_else(|| {
                errors.push(
                    "recurring must be one of none, weekly, monthly, quarterly, annually"
                        .to_owned(),
                );
                Recurrence::None
            }),
        };

        let reminder_days = match self.reminder_days.as_ref().and_then(NumberInput::value) {
            None => DEFAULT_REMINDER_DAYS,
            Some(Ok(d)) if d.fract() != 0.0 || !d.is_finite() => {
                errors.push("reminder_days must be a whole number".to_owned());
                DEFAULT_REMINDER_DAYS
            }
            Some(Ok(d)) if d < 0.0 || d > f64::from(MAX_REMINDER_DAYS) => {
                errors.push(format!(
                    "reminder_days must be between 0 and {MAX_REMINDER_DAYS}"
                ));
                DEFAULT_REMINDER_DAYS
            }
            Some(Ok(d)) => d as u32,
            Some(Err(())) => {
                errors.push("reminder_days must be a whole number".to_owned());
                DEFAULT_REMINDER_DAYS
            }
        };

        let status = match text(&self.status) {
            None => default_status,
            Some(raw) => BillStatus::parse(&raw).unwrap_or_else(|| {
                errors.push("status must be one of pending, paid, overdue".to_owned());
                default_status
            }),
        };

        let category = match text(&self.category) {
            None => None,
            Some(raw) => {
                let parsed = Category::parse(&raw);
                if parsed.is_none() {
                    errors.push(
                        "category must be one of utilities, rent, insurance, subscription, \
                         credit-card, loan, other"
                            .to_owned(),
                    );
                }
                parsed
            }
        };

        match (vendor, amount, due_date) {
            (Some(vendor), Some(amount), Some(due_date)) if errors.is_empty() => Ok(BillDraft {
                vendor,
                amount,
                due_date,
                account_info: text(&self.account_info),
                payment_method: text(&self.payment_method),
                category,
                notes: text(&self.notes),
                recurring,
                reminder_days,
                status,
            }),
            _ => Err(errors),
        }
    }
}

/// Settings as submitted by a client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettingsInput {
    pub notification_method: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub whatsapp_number: Option<String>,
    pub google_calendar_sync: Option<FlagInput>,
}

impl SettingsInput {
    pub fn validate(&self) -> std::result::Result<Settings, Vec<String>> {
        let mut errors = Vec::new();

        let notification_method = match text(&self.notification_method) {
            None => NotificationMethod::None,
            Some(raw) => NotificationMethod::parse(&raw).unwrap_or_else(|| {
                errors.push(
                    "notification_method must be one of none, telegram, whatsapp, all".to_owned(),
                );
                NotificationMethod::None
            }),
        };

        let google_calendar_sync = match &self.google_calendar_sync {
            None => false,
            Some(flag) => flag.value().unwrap_or_else(|| {
                errors.push("google_calendar_sync must be true or false".to_owned());
                false
            }),
        };

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Settings {
            notification_method,
            telegram_bot_token: text(&self.telegram_bot_token),
            telegram_chat_id: text(&self.telegram_chat_id),
            whatsapp_number: text(&self.whatsapp_number),
            google_calendar_sync,
        })
    }
}

/// Trimmed text, with blanks treated as absent.
fn text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// `YYYY-MM-DD`, also accepting a full ISO timestamp's date part.
fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        let (date, _) = raw.split_once('T')?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
    })
}

/// Bill and settings operations.
#[derive(Clone)]
pub struct BillService {
    store: Arc<BillStore>,
    calendar: CalendarSync,
}

impl BillService {
    pub fn new(store: Arc<BillStore>, calendar: CalendarSync) -> Self {
        Self { store, calendar }
    }

    pub fn store(&self) -> &Arc<BillStore> {
        &self.store
    }

    pub fn list_bills(&self) -> Result<Vec<Bill>> {
        Ok(self.store.list_bills()?)
    }

    pub fn get_bill(&self, id: i64) -> Result<Bill> {
        self.store.get_bill(id)?.ok_or(BillarrError::NotFound(id))
    }

    /// Validate and insert a bill, then create its calendar event.
    ///
    /// New bills always start pending; a submitted `status` is ignored.
    pub async fn create_bill(&self, input: &BillInput) -> Result<i64> {
        let input = BillInput {
            status: None,
            ..input.clone()
        };
        let draft = input
            .validate(BillStatus::Pending)
            .map_err(BillarrError::Validation)?;
        let id = self.store.insert_bill(&draft)?;
        info!(bill_id = id, vendor = %draft.vendor, "bill created");
        self.sync_event(id, None, &draft).await;
        Ok(id)
    }

    /// Validate and replace a bill's editable fields.
    ///
    /// Returns the number of rows changed. Paying a recurring bill creates
    /// its next occurrence.
    pub async fn update_bill(&self, id: i64, input: &BillInput) -> Result<usize> {
        let existing = self.get_bill(id)?;
        let draft = input
            .validate(existing.status)
            .map_err(BillarrError::Validation)?;
        self.store.update_bill(id, &draft)?;
        info!(bill_id = id, status = draft.status.as_str(), "bill updated");

        self.sync_event(id, existing.calendar_event_id.as_deref(), &draft)
            .await;

        if should_roll_forward(existing.status, &draft) {
            self.roll_forward(id, &draft).await;
        }
        Ok(1)
    }

    /// Delete a bill and its calendar event.
    pub async fn delete_bill(&self, id: i64) -> Result<usize> {
        let existing = self.get_bill(id)?;
        self.calendar
            .remove(self.calendar_enabled(), existing.calendar_event_id.as_deref())
            .await;
        self.store.delete_bill(id)?;
        info!(bill_id = id, vendor = %existing.vendor, "bill deleted");
        Ok(1)
    }

    pub fn settings(&self) -> Result<Settings> {
        Ok(self.store.settings()?)
    }

    pub fn update_settings(&self, input: &SettingsInput) -> Result<Settings> {
        let settings = input.validate().map_err(BillarrError::Validation)?;
        self.store.update_settings(&settings)?;
        info!(
            method = settings.notification_method.as_str(),
            calendar_sync = settings.google_calendar_sync,
            "settings updated"
        );
        Ok(settings)
    }

    /// Monthly totals for `year` with recurring bills projected past `today`.
    pub fn expenses(&self, year: i32, today: NaiveDate) -> Result<ExpenseReport> {
        let bills = self.store.list_bills()?;
        Ok(project_year(&bills, year, today))
    }

    async fn roll_forward(&self, paid_id: i64, paid: &BillDraft) {
        let Some(next) = next_occurrence(paid) else {
            warn!(bill_id = paid_id, "no next occurrence for recurring bill");
            return;
        };
        match self.store.insert_bill(&next) {
            Ok(next_id) => {
                info!(
                    bill_id = paid_id,
                    next_id,
                    due_date = %next.due_date,
                    "recurring bill rolled forward"
                );
                self.sync_event(next_id, None, &next).await;
            }
            Err(e) => error!(bill_id = paid_id, "failed to roll recurring bill forward: {e}"),
        }
    }

    /// Push the bill to the calendar and persist a new event id.
    async fn sync_event(&self, id: i64, event_id: Option<&str>, draft: &BillDraft) {
        if !self.calendar.is_available() {
            return;
        }
        let Some(synced) = self
            .calendar
            .upsert(self.calendar_enabled(), event_id, draft)
            .await
        else {
            return;
        };
        if event_id == Some(synced.as_str()) {
            return;
        }
        if let Err(e) = self.store.set_calendar_event_id(id, Some(&synced)) {
            warn!(bill_id = id, "failed to save calendar event id: {e}");
        }
    }

    fn calendar_enabled(&self) -> bool {
        if !self.calendar.is_available() {
            return false;
        }
        match self.store.settings() {
            Ok(settings) => settings.google_calendar_sync,
            Err(e) => {
                warn!("cannot read settings for calendar sync: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn input(json: serde_json::Value) -> BillInput {
        serde_json::from_value(json).expect("bill input")
    }

    fn service() -> BillService {
        BillService::new(
            Arc::new(BillStore::open_in_memory().unwrap()),
            CalendarSync::disabled(),
        )
    }

    #[test]
    fn form_strings_are_accepted() {
        let draft = input(serde_json::json!({
            "vendor": "  Water Co ",
            "amount": "42.10",
            "due_date": "2024-05-01",
            "reminder_days": "7",
            "category": "",
            "recurring": "monthly",
            "notes": "   "
        }))
        .validate(BillStatus::Pending)
        .unwrap();
        assert_eq!(draft.vendor, "Water Co");
        assert_eq!(draft.amount, 42.10);
        assert_eq!(draft.reminder_days, 7);
        assert_eq!(draft.category, None);
        assert_eq!(draft.notes, None);
        assert_eq!(draft.recurring, Recurrence::Monthly);
        assert_eq!(draft.status, BillStatus::Pending);
    }

    #[test]
    fn every_problem_is_reported() {
        let errors = input(serde_json::json!({
            "vendor": "",
            "amount": -5,
            "due_date": "2024-02-30",
            "reminder_days": 31,
            "status": "cancelled",
            "recurring": "daily",
            "category": "food"
        }))
        .validate(BillStatus::Pending)
        .unwrap_err();
        assert_eq!(errors.len(), 7, "{errors:?}");
        assert!(errors.contains(&"vendor is required".to_owned()));
        assert!(errors.contains(&"amount must be greater than 0".to_owned()));
        assert!(errors.contains(&"reminder_days must be between 0 and 30".to_owned()));
    }

    #[test]
    fn missing_fields_are_required() {
        let errors = BillInput::default()
            .validate(BillStatus::Pending)
            .unwrap_err();
        assert_eq!(
            errors,
            vec![
                "vendor is required".to_owned(),
                "amount is required".to_owned(),
                "due_date is required".to_owned(),
            ]
        );
    }

    #[test]
    fn reminder_days_bounds() {
        let base = serde_json::json!({"vendor": "V", "amount": 1, "due_date": "2024-01-01"});
        let with = |days: serde_json::Value| {
            let mut v = base.clone();
            v["reminder_days"] = days;
            input(v).validate(BillStatus::Pending)
        };
        assert_eq!(with(serde_json::json!(0)).unwrap().reminder_days, 0);
        assert_eq!(with(serde_json::json!(30)).unwrap().reminder_days, 30);
        assert!(with(serde_json::json!(2.5)).is_err());
        assert!(with(serde_json::json!("abc")).is_err());
        assert_eq!(with(serde_json::json!(null)).unwrap().reminder_days, 3);
    }

    #[test]
    fn iso_timestamp_due_date_keeps_date_part() {
        assert_eq!(
            parse_due_date("2024-03-15T00:00:00.000Z"),
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
        assert_eq!(parse_due_date("15/03/2024"), None);
    }

    #[test]
    fn settings_flags_accept_form_encodings() {
        for (raw, expected) in [
            (serde_json::json!(1), true),
            (serde_json::json!(0), false),
            (serde_json::json!(true), true),
            (serde_json::json!("false"), false),
        ] {
            let parsed: SettingsInput = serde_json::from_value(serde_json::json!({
                "notification_method": "telegram",
                "google_calendar_sync": raw
            }))
            .unwrap();
            assert_eq!(parsed.validate().unwrap().google_calendar_sync, expected);
        }
    }

    #[test]
    fn invalid_notification_method_is_rejected() {
        let parsed: SettingsInput =
            serde_json::from_value(serde_json::json!({"notification_method": "pigeon"})).unwrap();
        assert_eq!(parsed.validate().unwrap_err().len(), 1);
    }

    #[tokio::test]
    async fn paying_recurring_bill_rolls_forward_once() {
        let svc = service();
        let id = svc
            .create_bill(&input(serde_json::json!({
                "vendor": "Rent",
                "amount": 1200,
                "due_date": "2024-01-31",
                "recurring": "monthly"
            })))
            .await
            .unwrap();
        svc.store().set_last_notified(id, chrono::Utc::now()).unwrap();

        let paid = serde_json::json!({
            "vendor": "Rent",
            "amount": 1200,
            "due_date": "2024-01-31",
            "recurring": "monthly",
            "status": "paid"
        });
        assert_eq!(svc.update_bill(id, &input(paid.clone())).await.unwrap(), 1);
        // Saving an already-paid bill again does not create another copy.
        svc.update_bill(id, &input(paid)).await.unwrap();

        let bills = svc.list_bills().unwrap();
        assert_eq!(bills.len(), 2);
        let next = bills.iter().find(|b| b.id != id).unwrap();
        assert_eq!(next.due_date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(next.status, BillStatus::Pending);
        assert_eq!(next.recurring, Recurrence::Monthly);
        assert!(next.last_notified_at.is_none());
        assert!(next.calendar_event_id.is_none());
    }

    #[tokio::test]
    async fn created_bills_start_pending() {
        let svc = service();
        for status in ["paid", "overdue", "bogus"] {
            let id = svc
                .create_bill(&input(serde_json::json!({
                    "vendor": "Rent",
                    "amount": 1200,
                    "due_date": "2024-01-31",
                    "recurring": "monthly",
                    "status": status
                })))
                .await
                .unwrap();
            assert_eq!(svc.get_bill(id).unwrap().status, BillStatus::Pending, "{status}");
        }
    }

    #[tokio::test]
    async fn paying_one_off_bill_does_not_roll_forward() {
        let svc = service();
        let id = svc
            .create_bill(&input(serde_json::json!({
                "vendor": "Repair", "amount": 90, "due_date": "2024-01-10"
            })))
            .await
            .unwrap();
        svc.update_bill(
            id,
            &input(serde_json::json!({
                "vendor": "Repair", "amount": 90, "due_date": "2024-01-10", "status": "paid"
            })),
        )
        .await
        .unwrap();
        assert_eq!(svc.list_bills().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_without_status_keeps_stored_status() {
        let svc = service();
        let body = serde_json::json!({"vendor": "Gym", "amount": 30, "due_date": "2024-01-10"});
        let id = svc.create_bill(&input(body.clone())).await.unwrap();
        let mut overdue = body.clone();
        overdue["status"] = serde_json::json!("overdue");
        svc.update_bill(id, &input(overdue)).await.unwrap();
        svc.update_bill(id, &input(body)).await.unwrap();
        assert_eq!(svc.get_bill(id).unwrap().status, BillStatus::Overdue);
    }

    #[tokio::test]
    async fn missing_bills_are_not_found() {
        let svc = service();
        let body = input(serde_json::json!({"vendor": "X", "amount": 1, "due_date": "2024-01-01"}));
        assert!(matches!(svc.get_bill(9), Err(BillarrError::NotFound(9))));
        assert!(matches!(
            svc.update_bill(9, &body).await,
            Err(BillarrError::NotFound(9))
        ));
        assert!(matches!(svc.delete_bill(9).await, Err(BillarrError::NotFound(9))));
    }

    #[tokio::test]
    async fn invalid_create_is_a_validation_error() {
        let svc = service();
        let err = svc.create_bill(&BillInput::default()).await.unwrap_err();
        assert!(matches!(err, BillarrError::Validation(ref v) if v.len() == 3));
        assert!(svc.list_bills().unwrap().is_empty());
    }

    #[tokio::test]
    async fn calendar_events_follow_bill_lifecycle() {
        use crate::calendar::{GoogleCalendarClient, load_credentials};
        use crate::config::CalendarConfig;
        use wiremock::matchers::{method, path, path_regex};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"access_token": "a", "expires_in": 3600}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "evt-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/calendars/primary/events/evt-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "evt-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path_regex("^/calendars/primary/events/evt-1$"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("creds.json"),
            r#"{"installed":{"client_id":"c","client_secret":"s"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("token.json"), r#"{"refresh_token":"r"}"#).unwrap();
        let cfg = CalendarConfig {
            credentials_path: dir.path().join("creds.json"),
            token_path: dir.path().join("token.json"),
            calendar_id: "primary".to_owned(),
            api_base: server.uri(),
            token_uri: Some(format!("{}/token", server.uri())),
        };
        let creds = load_credentials(&cfg).unwrap().unwrap();
        let calendar = CalendarSync::new(Some(GoogleCalendarClient::new(
            &cfg,
            creds,
            reqwest::Client::new(),
        )));

        let store = Arc::new(BillStore::open_in_memory().unwrap());
        store
            .update_settings(&Settings {
                google_calendar_sync: true,
                ..Settings::default()
            })
            .unwrap();
        let svc = BillService::new(Arc::clone(&store), calendar);

        let body = serde_json::json!({"vendor": "Net", "amount": 60, "due_date": "2024-04-04"});
        let id = svc.create_bill(&input(body.clone())).await.unwrap();
        assert_eq!(
            svc.get_bill(id).unwrap().calendar_event_id.as_deref(),
            Some("evt-1")
        );
        svc.update_bill(id, &input(body)).await.unwrap();
        svc.delete_bill(id).await.unwrap();
        assert!(svc.list_bills().unwrap().is_empty());
    }
}
