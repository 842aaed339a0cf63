//! # Feature: Reminder Scheduler
//!
//! Periodically finds reminders whose time has come, places one call for each,
//! and records the terminal status back in the store.
//!
//! Cycles never overlap: the periodic loop awaits each cycle before the next
//! tick, and every cycle (including ones triggered directly through
//! [`ReminderScheduler::run_cycle`]) holds the cycle lock for its whole run.
//! Because selection only returns `scheduled` reminders, a settled reminder is
//! never picked up again.
//!
//! A dispatcher that panics, hangs past the dispatch timeout, or reports an
//! error settles its reminder as `failed`, so a bad reminder is called at most
//! once.
//!
//! A crash after a call is placed but before its status is written leaves the
//! reminder `scheduled`; it will be selected and called again after restart.
//!
//! - **Version**: 2.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.1.0: Dispatcher panics settle the reminder as failed
//! - 2.0.0: Injected store, dispatcher and clock; stoppable task handle
//! - 1.1.0: Per-reminder failure isolation and guarded write-back
//! - 1.0.0: Initial release with 30 second polling

use super::model::{Reminder, ReminderStatus};
use super::store::{ReminderStore, SettleOutcome};
use crate::core::{Clock, Config, SystemClock};
use crate::features::calls::{CallDispatcher, CallOutcome, CallRequest};
use anyhow::Result;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Extra time a dispatcher gets beyond the configured call timeout
const DISPATCH_GRACE: Duration = Duration::from_secs(5);

/// What happened to one selected reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Settled(ReminderStatus),
    /// Write-back refused; the record was deleted or edited meanwhile
    Skipped(SettleOutcome),
}

/// Tally of one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub selected: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: ProcessOutcome) {
        match outcome {
            ProcessOutcome::Settled(ReminderStatus::Completed) => self.completed += 1,
            ProcessOutcome::Settled(ReminderStatus::Failed) => self.failed += 1,
            // settle() only ever produces terminal statuses
            ProcessOutcome::Settled(ReminderStatus::Scheduled) => self.errors += 1,
            ProcessOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

#[derive(Clone)]
pub struct ReminderScheduler {
    store: Arc<dyn ReminderStore>,
    dispatcher: Arc<dyn CallDispatcher>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    dispatch_timeout: Duration,
    cycle_lock: Arc<Mutex<()>>,
}

impl ReminderScheduler {
    pub fn new(store: Arc<dyn ReminderStore>, dispatcher: Arc<dyn CallDispatcher>) -> Self {
        ReminderScheduler {
            store,
            dispatcher,
            clock: Arc::new(SystemClock),
            interval: Duration::from_secs(crate::core::config::DEFAULT_POLL_INTERVAL_SECONDS),
            dispatch_timeout: Duration::from_secs(crate::core::config::DEFAULT_CALL_TIMEOUT_SECONDS)
                + DISPATCH_GRACE,
            cycle_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Scheduler with interval and timeout taken from `config`
    pub fn from_config(
        config: &Config,
        store: Arc<dyn ReminderStore>,
        dispatcher: Arc<dyn CallDispatcher>,
    ) -> Self {
        Self::new(store, dispatcher)
            .with_interval(config.poll_interval)
            .with_dispatch_timeout(config.call_timeout + DISPATCH_GRACE)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Upper bound on a single dispatch before it is treated as failed
    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    /// Spawn the periodic loop and return its handle
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Reminder scheduler started (interval: {}s)",
            self.interval.as_secs_f64()
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = interval.tick() => {}
            }

            // A panic anywhere in the cycle ends that cycle only
            let scheduler = self.clone();
            match tokio::spawn(async move { scheduler.run_cycle().await }).await {
                Ok(report) if report.selected > 0 || report.errors > 0 => info!(
                    "Reminder cycle finished: {} selected, {} completed, {} failed, {} skipped, {} errors",
                    report.selected, report.completed, report.failed, report.skipped, report.errors
                ),
                Ok(_) => {}
                Err(e) => error!("Reminder cycle aborted: {e}"),
            }

            if *shutdown.borrow() {
                break;
            }
        }

        info!("Reminder scheduler stopped");
    }

    /// Run one poll cycle against a single snapshot of "now".
    ///
    /// Waits for any cycle already in progress.
    pub async fn run_cycle(&self) -> CycleReport {
        let _cycle = self.cycle_lock.lock().await;
        let mut report = CycleReport::default();

        let now = self.clock.now();
        debug!("Checking for reminders due at {now}");

        let mut due = match self.store.due_reminders(now).await {
            Ok(due) => due,
            Err(e) => {
                error!("Failed to query due reminders: {e}");
                report.errors += 1;
                return report;
            }
        };
        due.retain(|r| r.is_due(now));
        due.sort_by(|a, b| {
            a.scheduled_time
                .cmp(&b.scheduled_time)
                .then_with(|| a.id.cmp(&b.id))
        });

        for reminder in due {
            report.selected += 1;
            let id = reminder.id;
            let scheduler = self.clone();

            match tokio::spawn(async move { scheduler.process(reminder).await }).await {
                Ok(Ok(outcome)) => report.record(outcome),
                Ok(Err(e)) => {
                    error!("Failed to process reminder {id}: {e}");
                    report.errors += 1;
                }
                Err(e) => {
                    error!("Processing of reminder {id} aborted: {e}");
                    report.errors += 1;
                }
            }
        }

        report
    }

    /// Dispatch one reminder and write back its terminal status
    async fn process(&self, reminder: Reminder) -> Result<ProcessOutcome> {
        info!("Triggering reminder: {} - {}", reminder.id, reminder.title);

        let request = CallRequest::from_reminder(&reminder);
        let dispatcher = self.dispatcher.clone();
        let mut call = tokio::spawn(async move { dispatcher.dispatch(&request).await });

        // Dispatcher faults of any kind settle the reminder as failed
        let outcome = match tokio::time::timeout(self.dispatch_timeout, &mut call).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) if e.is_panic() => CallOutcome::Failed {
                reason: "Dispatcher panicked".to_string(),
            },
            Ok(Err(e)) => CallOutcome::Failed {
                reason: format!("Dispatch aborted: {e}"),
            },
            Err(_) => {
                call.abort();
                CallOutcome::Failed {
                    reason: format!("Dispatch timed out after {:?}", self.dispatch_timeout),
                }
            }
        };

        let settlement = reminder.settle(&outcome)?;

        match self.store.settle(&reminder, &settlement).await? {
            SettleOutcome::Settled => {
                match settlement.status {
                    ReminderStatus::Completed => {
                        info!("Reminder {} completed: {outcome}", reminder.id)
                    }
                    _ => warn!("Reminder {} failed: {outcome}", reminder.id),
                }
                Ok(ProcessOutcome::Settled(settlement.status))
            }
            skipped @ SettleOutcome::NotFound => {
                warn!(
                    "Reminder {} was deleted while its call was in flight ({outcome}); skipping",
                    reminder.id
                );
                Ok(ProcessOutcome::Skipped(skipped))
            }
            skipped @ SettleOutcome::Conflict => {
                warn!(
                    "Reminder {} changed while its call was in flight ({outcome}); leaving it untouched",
                    reminder.id
                );
                Ok(ProcessOutcome::Skipped(skipped))
            }
        }
    }
}

/// Handle to a running scheduler loop.
///
/// Dropping the handle also stops the loop after its current cycle.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask the loop to exit after the current cycle
    pub fn request_stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Request a stop and wait for the loop to finish its in-flight cycle
    pub async fn stop(self) -> Result<()> {
        self.request_stop();
        self.task
            .await
            .map_err(|e| anyhow::anyhow!("Reminder scheduler task failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;
    use crate::database::Database;
    use crate::features::calls::{VapiDispatcher, MOCK_CALL_ID};
    use crate::features::reminders::{NewReminder, Settlement};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FAILING_NUMBER: &str = "+15550000000";
    const PANICKING_NUMBER: &str = "+15550000001";

    /// Records every request; fails or panics for the reserved numbers
    #[derive(Default)]
    struct ScriptedDispatcher {
        calls: std::sync::Mutex<Vec<CallRequest>>,
        delay: Duration,
    }

    impl ScriptedDispatcher {
        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<CallRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CallDispatcher for ScriptedDispatcher {
        async fn dispatch(&self, request: &CallRequest) -> CallOutcome {
            self.calls.lock().unwrap().push(request.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match request.phone_number.as_str() {
                FAILING_NUMBER => CallOutcome::Failed {
                    reason: "connection reset".to_string(),
                },
                PANICKING_NUMBER => panic!("dispatcher exploded"),
                _ => CallOutcome::Placed {
                    call_id: format!("call_{}", request.reminder_id),
                },
            }
        }
    }

    /// Deletes the reminder from the store mid-call
    struct DeletingDispatcher {
        db: Database,
    }

    #[async_trait]
    impl CallDispatcher for DeletingDispatcher {
        async fn dispatch(&self, request: &CallRequest) -> CallOutcome {
            self.db.delete_reminder(request.reminder_id).await.unwrap();
            CallOutcome::Placed {
                call_id: "call_orphan".to_string(),
            }
        }
    }

    /// Never answers
    struct HangingDispatcher;

    #[async_trait]
    impl CallDispatcher for HangingDispatcher {
        async fn dispatch(&self, _request: &CallRequest) -> CallOutcome {
            std::future::pending::<CallOutcome>().await
        }
    }

    /// Delegates to a database but refuses to write one reminder
    struct FlakyStore {
        db: Database,
        broken_id: i64,
        settle_calls: AtomicUsize,
    }

    #[async_trait]
    impl ReminderStore for FlakyStore {
        async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
            self.db.due_reminders(now).await
        }

        async fn settle(
            &self,
            reminder: &Reminder,
            settlement: &Settlement,
        ) -> Result<SettleOutcome> {
            self.settle_calls.fetch_add(1, Ordering::SeqCst);
            if reminder.id == self.broken_id {
                return Err(anyhow::anyhow!("disk I/O error"));
            }
            self.db.settle(reminder, settlement).await
        }
    }

    /// First query panics, second fails, later ones reach the database
    struct RecoveringStore {
        db: Database,
        queries: AtomicUsize,
    }

    #[async_trait]
    impl ReminderStore for RecoveringStore {
        async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
            match self.queries.fetch_add(1, Ordering::SeqCst) {
                0 => panic!("store connection lost"),
                1 => Err(anyhow::anyhow!("database is locked")),
                _ => self.db.due_reminders(now).await,
            }
        }

        async fn settle(
            &self,
            reminder: &Reminder,
            settlement: &Settlement,
        ) -> Result<SettleOutcome> {
            self.db.settle(reminder, settlement).await
        }
    }

    async fn seed(db: &Database, title: &str, number: &str, due: DateTime<Utc>) -> Reminder {
        db.create_reminder(&NewReminder::new(title, "Water the plants", number, due))
            .await
            .unwrap()
    }

    fn scheduler(
        db: &Database,
        dispatcher: Arc<dyn CallDispatcher>,
        clock: Arc<ManualClock>,
    ) -> ReminderScheduler {
        ReminderScheduler::new(Arc::new(db.clone()), dispatcher).with_clock(clock)
    }

    #[tokio::test]
    async fn test_due_reminder_completes_with_mock_call() {
        let db = Database::new(":memory:").await.unwrap();
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let r = seed(&db, "Plants", "+15551234567", now - chrono::Duration::seconds(1)).await;

        let mock = VapiDispatcher::new(
            "http://127.0.0.1:1/call/phone",
            None,
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        let report = scheduler(&db, Arc::new(mock), clock).run_cycle().await;

        assert_eq!(report.selected, 1);
        assert_eq!(report.completed, 1);
        let stored = db.get_reminder(r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Completed);
        assert_eq!(stored.call_reference.as_deref(), Some(MOCK_CALL_ID));
    }

    #[tokio::test]
    async fn test_future_reminder_is_not_dispatched_early() {
        let db = Database::new(":memory:").await.unwrap();
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let r = seed(&db, "Later", "+15551234567", now + chrono::Duration::hours(1)).await;
        let dispatcher = Arc::new(ScriptedDispatcher::default());
        let scheduler = scheduler(&db, dispatcher.clone(), clock.clone());

        let report = scheduler.run_cycle().await;
        assert_eq!(report, CycleReport::default());
        assert!(dispatcher.calls().is_empty());
        let stored = db.get_reminder(r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Scheduled);
        assert!(stored.call_reference.is_none());

        clock.advance(chrono::Duration::hours(2));
        let report = scheduler.run_cycle().await;
        assert_eq!(report.completed, 1);
        assert_eq!(dispatcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_mixed_outcomes_diverge_without_aborting() {
        let db = Database::new(":memory:").await.unwrap();
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let due = now - chrono::Duration::seconds(5);
        let bad = seed(&db, "Bad line", FAILING_NUMBER, due).await;
        let good = seed(&db, "Good line", "+15551234567", due).await;
        let dispatcher = Arc::new(ScriptedDispatcher::default());

        let report = scheduler(&db, dispatcher.clone(), clock).run_cycle().await;

        assert_eq!(report.selected, 2);
        assert_eq!(report.completed, 1);
        assert_eq!(report.failed, 1);

        let bad = db.get_reminder(bad.id).await.unwrap().unwrap();
        assert_eq!(bad.status, ReminderStatus::Failed);
        assert!(bad.call_reference.is_none());

        let good = db.get_reminder(good.id).await.unwrap().unwrap();
        assert_eq!(good.status, ReminderStatus::Completed);
        assert_eq!(good.call_reference, Some(format!("call_{}", good.id)));
    }

    #[tokio::test]
    async fn test_settled_reminders_are_never_selected_again() {
        let db = Database::new(":memory:").await.unwrap();
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        seed(&db, "Once", "+15551234567", now - chrono::Duration::minutes(1)).await;
        seed(&db, "Once failed", FAILING_NUMBER, now - chrono::Duration::minutes(1)).await;
        let dispatcher = Arc::new(ScriptedDispatcher::default());
        let scheduler = scheduler(&db, dispatcher.clone(), clock.clone());

        scheduler.run_cycle().await;
        clock.advance(chrono::Duration::seconds(30));
        let second = scheduler.run_cycle().await;

        assert_eq!(second.selected, 0);
        assert_eq!(dispatcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_cycle_processes_earliest_due_first() {
        let db = Database::new(":memory:").await.unwrap();
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let middle = seed(&db, "middle", "+15551234567", now - chrono::Duration::minutes(2)).await;
        let last = seed(&db, "last", "+15551234567", now - chrono::Duration::minutes(1)).await;
        let first = seed(&db, "first", "+15551234567", now - chrono::Duration::minutes(3)).await;
        let dispatcher = Arc::new(ScriptedDispatcher::default());

        scheduler(&db, dispatcher.clone(), clock).run_cycle().await;

        let order: Vec<i64> = dispatcher.calls().iter().map(|c| c.reminder_id).collect();
        assert_eq!(order, vec![first.id, middle.id, last.id]);
    }

    #[tokio::test]
    async fn test_overlapping_cycles_are_serialized() {
        let db = Database::new(":memory:").await.unwrap();
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        seed(&db, "Slow", "+15551234567", now - chrono::Duration::seconds(1)).await;
        let dispatcher = Arc::new(ScriptedDispatcher::slow(Duration::from_millis(200)));
        let scheduler = scheduler(&db, dispatcher.clone(), clock);

        let (a, b) = tokio::join!(scheduler.run_cycle(), scheduler.run_cycle());

        assert_eq!(dispatcher.calls().len(), 1);
        assert_eq!(a.completed + b.completed, 1);
        assert_eq!(a.selected + b.selected, 1);
    }

    #[tokio::test]
    async fn test_deleted_during_dispatch_is_not_resurrected() {
        let db = Database::new(":memory:").await.unwrap();
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let r = seed(&db, "Gone", "+15551234567", now - chrono::Duration::seconds(1)).await;
        let dispatcher = Arc::new(DeletingDispatcher { db: db.clone() });

        let report = scheduler(&db, dispatcher, clock).run_cycle().await;

        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors, 0);
        assert!(db.get_reminder(r.id).await.unwrap().is_none());
        assert!(db.list_reminders(0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_error_does_not_abort_cycle() {
        let db = Database::new(":memory:").await.unwrap();
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let broken = seed(&db, "Broken", "+15551234567", now - chrono::Duration::minutes(2)).await;
        let fine = seed(&db, "Fine", "+15551234567", now - chrono::Duration::minutes(1)).await;
        let store = Arc::new(FlakyStore {
            db: db.clone(),
            broken_id: broken.id,
            settle_calls: AtomicUsize::new(0),
        });

        let scheduler =
            ReminderScheduler::new(store.clone(), Arc::new(ScriptedDispatcher::default()))
                .with_clock(clock);
        let report = scheduler.run_cycle().await;

        assert_eq!(report.errors, 1);
        assert_eq!(report.completed, 1);
        assert_eq!(store.settle_calls.load(Ordering::SeqCst), 2);
        let fine = db.get_reminder(fine.id).await.unwrap().unwrap();
        assert_eq!(fine.status, ReminderStatus::Completed);
    }

    #[tokio::test]
    async fn test_panicking_dispatch_settles_as_failed() {
        let db = Database::new(":memory:").await.unwrap();
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let boom = seed(&db, "Boom", PANICKING_NUMBER, now - chrono::Duration::minutes(2)).await;
        let fine = seed(&db, "Fine", "+15551234567", now - chrono::Duration::minutes(1)).await;
        let dispatcher = Arc::new(ScriptedDispatcher::default());
        let scheduler = scheduler(&db, dispatcher.clone(), clock.clone());

        let report = scheduler.run_cycle().await;

        assert_eq!(report.errors, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(report.completed, 1);
        let boom_stored = db.get_reminder(boom.id).await.unwrap().unwrap();
        assert_eq!(boom_stored.status, ReminderStatus::Failed);
        assert!(boom_stored.call_reference.is_none());
        let fine = db.get_reminder(fine.id).await.unwrap().unwrap();
        assert_eq!(fine.status, ReminderStatus::Completed);

        // Never dialled again
        clock.advance(chrono::Duration::seconds(30));
        let second = scheduler.run_cycle().await;
        assert_eq!(second.selected, 0);
        let boom_calls = dispatcher
            .calls()
            .iter()
            .filter(|c| c.reminder_id == boom.id)
            .count();
        assert_eq!(boom_calls, 1);
    }

    #[tokio::test]
    async fn test_hung_dispatch_times_out_as_failure() {
        let db = Database::new(":memory:").await.unwrap();
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let r = seed(&db, "Hung", "+15551234567", now - chrono::Duration::seconds(1)).await;

        let report = scheduler(&db, Arc::new(HangingDispatcher), clock)
            .with_dispatch_timeout(Duration::from_millis(50))
            .run_cycle()
            .await;

        assert_eq!(report.failed, 1);
        let stored = db.get_reminder(r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Failed);
        assert!(stored.call_reference.is_none());
    }

    #[tokio::test]
    async fn test_started_loop_dispatches_and_stops() {
        let db = Database::new(":memory:").await.unwrap();
        let r = seed(&db, "Loop", "+15551234567", Utc::now() - chrono::Duration::seconds(1)).await;
        let dispatcher = Arc::new(ScriptedDispatcher::default());

        let handle = ReminderScheduler::new(Arc::new(db.clone()), dispatcher.clone())
            .with_interval(Duration::from_millis(20))
            .start();
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.stop().await.unwrap();

        assert_eq!(dispatcher.calls().len(), 1);
        let stored = db.get_reminder(r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Completed);
    }

    #[tokio::test]
    async fn test_started_loop_survives_failed_cycles() {
        let db = Database::new(":memory:").await.unwrap();
        let r = seed(&db, "Retry", "+15551234567", Utc::now() - chrono::Duration::seconds(1)).await;
        let store = Arc::new(RecoveringStore {
            db: db.clone(),
            queries: AtomicUsize::new(0),
        });
        let dispatcher = Arc::new(ScriptedDispatcher::default());

        let handle = ReminderScheduler::new(store.clone(), dispatcher.clone())
            .with_interval(Duration::from_millis(20))
            .start();
        tokio::time::timeout(Duration::from_secs(5), async {
            while dispatcher.calls().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        handle.stop().await.unwrap();

        assert!(store.queries.load(Ordering::SeqCst) >= 3);
        assert_eq!(dispatcher.calls().len(), 1);
        let stored = db.get_reminder(r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Completed);
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_cycle() {
        let db = Database::new(":memory:").await.unwrap();
        let r = seed(&db, "Slow", "+15551234567", Utc::now() - chrono::Duration::seconds(1)).await;
        let dispatcher = Arc::new(ScriptedDispatcher::slow(Duration::from_millis(300)));

        let handle = ReminderScheduler::new(Arc::new(db.clone()), dispatcher.clone())
            .with_interval(Duration::from_millis(10))
            .start();

        // First tick fires immediately; wait until the call is in flight
        while dispatcher.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.stop().await.unwrap();

        let stored = db.get_reminder(r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Completed);
        assert_eq!(dispatcher.calls().len(), 1);
    }
}
