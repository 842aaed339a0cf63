//! # Reminder Store Contract
//!
//! What the poller needs from durable storage: the eligible set at an instant,
//! and a guarded terminal write per reminder.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Revision-guarded settlement with explicit conflict outcome
//! - 1.0.0: Initial release

use super::model::{Reminder, Settlement};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Result of a guarded settlement write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Terminal status recorded
    Settled,
    /// Record no longer exists
    NotFound,
    /// Record was edited or settled since it was selected
    Conflict,
}

#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Reminders with status `scheduled` and `scheduled_time <= now`,
    /// earliest due first.
    async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>>;

    /// Record a terminal status for `reminder`, provided it is still
    /// `scheduled` at the revision it was selected with.
    async fn settle(&self, reminder: &Reminder, settlement: &Settlement) -> Result<SettleOutcome>;
}
