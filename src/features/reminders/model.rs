//! # Reminder Model
//!
//! The reminder record, its status state machine, and the CRUD input types.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: Added `revision` for optimistic settlement
//! - 1.1.0: Added timezone label and partial updates
//! - 1.0.0: Initial release

use crate::features::calls::CallOutcome;
use anyhow::Result;
use chrono::{DateTime, Utc};
use regex::Regex;

/// Phone numbers we can route a call to: optional `+`, 7 to 15 digits
const CALLABLE_NUMBER_PATTERN: &str = r"^\+?[0-9]{7,15}$";

/// Lifecycle status of a reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderStatus {
    /// Waiting for its scheduled time
    Scheduled,
    /// Call placed (terminal)
    Completed,
    /// Call could not be placed (terminal)
    Failed,
}

/// Something that happened to a reminder while it was being considered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderEvent {
    /// Scheduled time has not arrived yet
    NotYetDue,
    /// Call placed, carrying the external reference id
    DispatchSucceeded { call_reference: String },
    /// Call could not be placed
    DispatchFailed,
}

impl ReminderStatus {
    pub fn is_terminal(self) -> bool {
        match self {
            ReminderStatus::Scheduled => false,
            ReminderStatus::Completed | ReminderStatus::Failed => true,
        }
    }

    /// Apply an event, returning the next status.
    ///
    /// Terminal states accept no events.
    pub fn transition(self, event: &ReminderEvent) -> Result<ReminderStatus> {
        match (self, event) {
            (ReminderStatus::Scheduled, ReminderEvent::NotYetDue) => Ok(ReminderStatus::Scheduled),
            (ReminderStatus::Scheduled, ReminderEvent::DispatchSucceeded { .. }) => {
                Ok(ReminderStatus::Completed)
            }
            (ReminderStatus::Scheduled, ReminderEvent::DispatchFailed) => Ok(ReminderStatus::Failed),
            (ReminderStatus::Completed | ReminderStatus::Failed, _) => Err(anyhow::anyhow!(
                "Reminder is already {} and cannot accept {:?}",
                self,
                event
            )),
        }
    }
}

impl std::fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReminderStatus::Scheduled => write!(f, "scheduled"),
            ReminderStatus::Completed => write!(f, "completed"),
            ReminderStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ReminderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(ReminderStatus::Scheduled),
            "completed" => Ok(ReminderStatus::Completed),
            "failed" => Ok(ReminderStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid reminder status: {}", s)),
        }
    }
}

/// A stored reminder
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    /// Store-assigned identifier
    pub id: i64,

    pub title: String,

    /// Text spoken to the callee
    pub message: String,

    /// Destination number
    pub phone_number: String,

    /// When the call becomes due (normalized to UTC)
    pub scheduled_time: DateTime<Utc>,

    /// Zone label the reminder was scheduled in
    pub timezone: String,

    pub status: ReminderStatus,

    /// External call id, present only once completed
    pub call_reference: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Edit counter bumped on every record change outside settlement
    pub revision: i64,
}

impl Reminder {
    /// Check whether the reminder should be dispatched at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ReminderStatus::Scheduled && self.scheduled_time <= now
    }

    /// Compute the terminal settlement for a dispatch outcome
    pub fn settle(&self, outcome: &CallOutcome) -> Result<Settlement> {
        let event = match outcome.call_reference() {
            Some(reference) => ReminderEvent::DispatchSucceeded {
                call_reference: reference.to_string(),
            },
            None => ReminderEvent::DispatchFailed,
        };

        let status = self.status.transition(&event)?;
        let call_reference = match event {
            ReminderEvent::DispatchSucceeded { call_reference } => Some(call_reference),
            ReminderEvent::DispatchFailed | ReminderEvent::NotYetDue => None,
        };

        Ok(Settlement {
            status,
            call_reference,
        })
    }
}

/// Terminal write-back for a dispatched reminder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub status: ReminderStatus,
    pub call_reference: Option<String>,
}

/// Input for creating a reminder
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub title: String,
    pub message: String,
    pub phone_number: String,
    pub scheduled_time: DateTime<Utc>,
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl NewReminder {
    pub fn new(
        title: &str,
        message: &str,
        phone_number: &str,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            phone_number: phone_number.to_string(),
            scheduled_time,
            timezone: default_timezone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(anyhow::anyhow!("Reminder title cannot be empty"));
        }
        if self.message.trim().is_empty() {
            return Err(anyhow::anyhow!("Reminder message cannot be empty"));
        }
        validate_phone_number(&self.phone_number)
    }
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct ReminderUpdate {
    pub title: Option<String>,
    pub message: Option<String>,
    pub phone_number: Option<String>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub status: Option<ReminderStatus>,
}

impl ReminderUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.message.is_none()
            && self.phone_number.is_none()
            && self.scheduled_time.is_none()
            && self.timezone.is_none()
            && self.status.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if matches!(&self.title, Some(t) if t.trim().is_empty()) {
            return Err(anyhow::anyhow!("Reminder title cannot be empty"));
        }
        if matches!(&self.message, Some(m) if m.trim().is_empty()) {
            return Err(anyhow::anyhow!("Reminder message cannot be empty"));
        }
        if let Some(ref number) = self.phone_number {
            validate_phone_number(number)?;
        }
        // Only a dispatch can produce a call reference
        if self.status == Some(ReminderStatus::Completed) {
            return Err(anyhow::anyhow!(
                "Reminders can only be completed by placing their call"
            ));
        }
        Ok(())
    }

    /// Apply onto a copy of `reminder`.
    ///
    /// Moving back to `scheduled` drops any call reference so the record
    /// never carries one outside `completed`.
    pub fn apply_to(&self, reminder: &Reminder) -> Reminder {
        let mut updated = reminder.clone();
        if let Some(ref title) = self.title {
            updated.title = title.clone();
        }
        if let Some(ref message) = self.message {
            updated.message = message.clone();
        }
        if let Some(ref number) = self.phone_number {
            updated.phone_number = number.clone();
        }
        if let Some(time) = self.scheduled_time {
            updated.scheduled_time = time;
        }
        if let Some(ref timezone) = self.timezone {
            updated.timezone = timezone.clone();
        }
        if let Some(status) = self.status {
            updated.status = status;
            if status != ReminderStatus::Completed {
                updated.call_reference = None;
            }
        }
        updated
    }
}

/// Check that a phone number can be dialled
pub fn validate_phone_number(number: &str) -> Result<()> {
    let compact: String = number
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    if compact.is_empty() {
        return Err(anyhow::anyhow!("Phone number cannot be empty"));
    }
    if !Regex::new(CALLABLE_NUMBER_PATTERN)?.is_match(&compact) {
        return Err(anyhow::anyhow!("Phone number is not callable: {}", number));
    }
    Ok(())
}
