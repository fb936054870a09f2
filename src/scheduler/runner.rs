//! Notification scheduler background loop.
//!
//! Spawns a tokio task that runs the dispatcher immediately and then on a
//! fixed interval until stopped.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::scheduler::dispatcher::{DispatchOutcome, Dispatcher};

/// Owns the timer task driving the dispatcher.
pub struct NotificationScheduler {
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl NotificationScheduler {
    pub fn new(dispatcher: Arc<Dispatcher>, interval: Duration) -> Self {
        Self {
            dispatcher,
            interval,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    /// `true` between `start` and `stop`.
    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// Start the loop. Calling `start` on a running scheduler does nothing.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        let dispatcher = Arc::clone(&self.dispatcher);
        let cancel = self.cancel.clone();
        let period = self.interval;

        self.handle = Some(tokio::spawn(async move {
            info!(
                "notification scheduler started, checking every {} minute(s)",
                period.as_secs() / 60
            );
            // The first tick completes immediately.
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                tokio::select! {
                    () = cancel.cancelled() => break,
                    result = dispatcher.check_and_notify() => match result {
                        Ok(DispatchOutcome::AlreadyRunning) => {
                            info!("scheduled check skipped, a manual check is running");
                        }
                        Ok(_) => {}
                        Err(e) => error!("notification check failed: {e}"),
                    },
                }
            }
            info!("notification scheduler stopped");
        }));
    }

    /// Cancel the loop and wait for the task to finish.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            error!("notification scheduler task failed: {e}");
        }
    }
}

impl Drop for NotificationScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
