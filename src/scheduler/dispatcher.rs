//! One notification pass over pending bills.
//!
//! A pass loads settings, finds candidate bills, asks the window evaluator
//! whether each should fire now, delivers the reminder to every enabled
//! channel and stamps `last_notified_at`. Passes never overlap: a pass
//! requested while one is running reports [`DispatchOutcome::AlreadyRunning`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::channels::{ChannelEndpoints, NotificationChannel, OutboundMessage, build_channels};
use crate::error::Result;
use crate::reminder::{self, format_reminder, should_notify_now};
use crate::store::{Bill, BillStatus, BillStore, NotificationMethod};

/// Counters for one completed pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    /// Pending bills inside their reminder range.
    pub candidates: usize,
    /// Bills a reminder was sent for.
    pub notified: usize,
    /// Candidates outside an open window or already reminded in it.
    pub skipped: usize,
    /// Individual channel deliveries that failed.
    pub failed_deliveries: usize,
}

/// Result of asking the dispatcher to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The pass ran to completion.
    Completed(DispatchSummary),
    /// Notification method is `none`.
    Disabled,
    /// Another pass holds the run flag.
    AlreadyRunning,
}

/// Runs notification passes against the store.
pub struct Dispatcher {
    store: Arc<BillStore>,
    endpoints: ChannelEndpoints,
    client: reqwest::Client,
    running: AtomicBool,
    passes: AtomicU64,
}

/// Clears the run flag when a pass ends, including on early return.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Dispatcher {
    pub fn new(store: Arc<BillStore>, endpoints: ChannelEndpoints, client: reqwest::Client) -> Self {
        Self {
            store,
            endpoints,
            client,
            running: AtomicBool::new(false),
            passes: AtomicU64::new(0),
        }
    }

    /// Number of passes that got past the run flag since startup.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Acquire)
    }

    /// `true` while a pass is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run a pass using the server's local clock.
    pub async fn check_and_notify(&self) -> Result<DispatchOutcome> {
        self.check_and_notify_at(Local::now()).await
    }

    /// Run a pass as of `now`. Hours and "today" are taken in `now`'s zone.
    pub async fn check_and_notify_at<Tz>(&self, now: DateTime<Tz>) -> Result<DispatchOutcome>
    where
        Tz: TimeZone + Send + Sync,
        Tz::Offset: Send + Sync,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("notification check already running, skipping");
            return Ok(DispatchOutcome::AlreadyRunning);
        }
        let _guard = RunGuard(&self.running);
        self.passes.fetch_add(1, Ordering::AcqRel);

        let settings = self.store.settings()?;
        if settings.notification_method == NotificationMethod::None {
            debug!("notifications disabled");
            return Ok(DispatchOutcome::Disabled);
        }

        let (channels, unconfigured) = build_channels(&settings, &self.endpoints, &self.client);
        for note in &unconfigured {
            warn!("{note}");
        }

        let pending = self.store.list_bills_with_status(BillStatus::Pending)?;
        let today = now.date_naive();
        let candidates = reminder::candidates(pending, today);

        let mut summary = DispatchSummary {
            candidates: candidates.len(),
            ..DispatchSummary::default()
        };
        let now_utc = now.with_timezone(&Utc);

        for (bill, days_until_due) in candidates {
            if !should_notify_now(days_until_due, bill.last_notified_at, &now) {
                summary.skipped += 1;
                continue;
            }
            summary.failed_deliveries += deliver(&channels, &bill, days_until_due).await;
            summary.notified += 1;

            if let Err(e) = self.store.set_last_notified(bill.id, now_utc) {
                error!(bill_id = bill.id, "failed to record notification time: {e}");
            }
        }

        info!(
            candidates = summary.candidates,
            notified = summary.notified,
            skipped = summary.skipped,
            failed = summary.failed_deliveries,
            "notification check complete"
        );
        Ok(DispatchOutcome::Completed(summary))
    }
}

/// Send one reminder to every channel; returns the number of failures.
async fn deliver(channels: &[Arc<dyn NotificationChannel>], bill: &Bill, days: i64) -> usize {
    let message = OutboundMessage::new(format_reminder(bill, days));
    let mut failures = 0;
    for channel in channels {
        match channel.send(&message).await {
            Ok(()) => info!(
                bill_id = bill.id,
                vendor = %bill.vendor,
                channel = channel.id(),
                "reminder sent"
            ),
            Err(e) => {
                failures += 1;
                warn!(
                    bill_id = bill.id,
                    channel = channel.id(),
                    "reminder delivery failed: {e:#}"
                );
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::store::{BillDraft, Recurrence, Settings};
    use chrono::{Days, FixedOffset, NaiveDate};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
    }

    fn draft(vendor: &str, due: NaiveDate) -> BillDraft {
        BillDraft {
            vendor: vendor.to_owned(),
            amount: 50.0,
            due_date: due,
            account_info: None,
            payment_method: None,
            category: None,
            notes: None,
            recurring: Recurrence::None,
            reminder_days: 3,
            status: BillStatus::Pending,
        }
    }

    async fn telegram_server(status: u16) -> MockServer {
        let server = MockServer::start().await;
        let body = if status == 200 {
            serde_json::json!({"ok": true, "result": {}})
        } else {
            serde_json::json!({"ok": false, "description": "boom"})
        };
        Mock::given(method("POST"))
            .and(path("/bottok/sendMessage"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    fn dispatcher(store: Arc<BillStore>, server: &MockServer) -> Dispatcher {
        let mut endpoints = ChannelEndpoints::default();
        endpoints.telegram.api_base = server.uri();
        Dispatcher::new(store, endpoints, reqwest::Client::new())
    }

    fn enable_telegram(store: &BillStore) {
        store
            .update_settings(&Settings {
                notification_method: NotificationMethod::Telegram,
                telegram_bot_token: Some("tok".to_owned()),
                telegram_chat_id: Some("1".to_owned()),
                ..Settings::default()
            })
            .unwrap();
    }

    #[tokio::test]
    async fn disabled_method_is_a_no_op() {
        let server = telegram_server(200).await;
        let store = Arc::new(BillStore::open_in_memory().unwrap());
        let d = dispatcher(store, &server);
        let outcome = d.check_and_notify_at(at(2024, 3, 1, 9, 30)).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Disabled);
        assert!(!d.is_running());
    }

    #[tokio::test]
    async fn due_today_sequence_sends_once_per_window() {
        let server = telegram_server(200).await;
        let store = Arc::new(BillStore::open_in_memory().unwrap());
        enable_telegram(&store);
        let due = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let id = store.insert_bill(&draft("Rent", due)).unwrap();
        let d = dispatcher(Arc::clone(&store), &server);

        let first = d.check_and_notify_at(at(2024, 3, 1, 9, 30)).await.unwrap();
        let DispatchOutcome::Completed(s) = first else {
            panic!("expected completed run, got {first:?}");
        };
        assert_eq!((s.candidates, s.notified, s.skipped), (1, 1, 0));
        let stamped = store.get_bill(id).unwrap().unwrap().last_notified_at;
        assert_eq!(stamped, Some(at(2024, 3, 1, 9, 30).with_timezone(&Utc)));

        let second = d.check_and_notify_at(at(2024, 3, 1, 9, 45)).await.unwrap();
        assert!(matches!(
            second,
            DispatchOutcome::Completed(DispatchSummary { notified: 0, skipped: 1, .. })
        ));

        let third = d.check_and_notify_at(at(2024, 3, 1, 12, 15)).await.unwrap();
        assert!(matches!(
            third,
            DispatchOutcome::Completed(DispatchSummary { notified: 1, .. })
        ));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[tokio::test]
    async fn only_candidates_in_range_are_considered() {
        let server = telegram_server(200).await;
        let store = Arc::new(BillStore::open_in_memory().unwrap());
        enable_telegram(&store);
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        store
            .insert_bill(&draft("Far", today.checked_add_days(Days::new(31)).unwrap()))
            .unwrap();
        store
            .insert_bill(&draft("Ancient", today.checked_sub_days(Days::new(31)).unwrap()))
            .unwrap();
        store
            .insert_bill(&draft("Late", today.checked_sub_days(Days::new(29)).unwrap()))
            .unwrap();
        let mut paid = draft("Paid", today);
        paid.status = BillStatus::Paid;
        store.insert_bill(&paid).unwrap();

        let d = dispatcher(store, &server);
        let outcome = d.check_and_notify_at(at(2024, 3, 1, 9, 5)).await.unwrap();
        assert!(matches!(
            outcome,
            DispatchOutcome::Completed(DispatchSummary { candidates: 1, notified: 1, .. })
        ));
        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        assert!(body.contains("Late"));
        assert!(body.contains("OVERDUE by 29 days"));
    }

    #[tokio::test]
    async fn delivery_failure_still_records_notification() {
        let server = telegram_server(500).await;
        let store = Arc::new(BillStore::open_in_memory().unwrap());
        enable_telegram(&store);
        let due = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let id = store.insert_bill(&draft("Gym", due)).unwrap();

        let d = dispatcher(Arc::clone(&store), &server);
        let outcome = d.check_and_notify_at(at(2024, 3, 1, 18, 10)).await.unwrap();
        assert!(matches!(
            outcome,
            DispatchOutcome::Completed(DispatchSummary {
                notified: 1,
                failed_deliveries: 1,
                ..
            })
        ));
        assert!(store.get_bill(id).unwrap().unwrap().last_notified_at.is_some());
    }

    #[tokio::test]
    async fn outside_windows_nothing_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Reminder"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let store = Arc::new(BillStore::open_in_memory().unwrap());
        enable_telegram(&store);
        let due = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        store.insert_bill(&draft("Rent", due)).unwrap();

        let d = dispatcher(store, &server);
        let outcome = d.check_and_notify_at(at(2024, 3, 1, 15, 0)).await.unwrap();
        assert!(matches!(
            outcome,
            DispatchOutcome::Completed(DispatchSummary { skipped: 1, notified: 0, .. })
        ));
    }

    #[tokio::test]
    async fn overlapping_run_is_reported() {
        let server = telegram_server(200).await;
        let store = Arc::new(BillStore::open_in_memory().unwrap());
        enable_telegram(&store);
        let d = dispatcher(store, &server);

        d.running.store(true, Ordering::Release);
        let outcome = d.check_and_notify_at(at(2024, 3, 1, 9, 0)).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::AlreadyRunning);
        // The flag belongs to the other run and is left untouched.
        assert!(d.is_running());
    }
}
