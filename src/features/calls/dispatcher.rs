//! # Call Dispatcher Contract
//!
//! The seam between the poller and whatever places phone calls. Implementations
//! never return errors: every way a call can go wrong is folded into
//! [`CallOutcome::Failed`].
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Simulated outcome split out from real placements
//! - 1.0.0: Initial release

use crate::features::reminders::Reminder;
use async_trait::async_trait;

/// Reserved reference id reported for simulated calls
pub const MOCK_CALL_ID: &str = "mock-call-id";

/// What to call and what to say
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    /// Correlation only, not sent to the provider
    pub reminder_id: i64,
    pub phone_number: String,
    pub message: String,
}

impl CallRequest {
    pub fn from_reminder(reminder: &Reminder) -> Self {
        Self {
            reminder_id: reminder.id,
            phone_number: reminder.phone_number.clone(),
            message: reminder.message.clone(),
        }
    }
}

/// Normalized result of one dispatch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// Provider accepted the call and returned its id
    Placed { call_id: String },
    /// No credentials configured; nothing was sent
    Simulated,
    /// Call could not be placed
    Failed { reason: String },
}

impl CallOutcome {
    /// Reference to record on the reminder, `None` for failures.
    ///
    /// A placement without an id counts as a failure.
    pub fn call_reference(&self) -> Option<&str> {
        match self {
            CallOutcome::Placed { call_id } if !call_id.trim().is_empty() => Some(call_id),
            CallOutcome::Placed { .. } | CallOutcome::Failed { .. } => None,
            CallOutcome::Simulated => Some(MOCK_CALL_ID),
        }
    }

    pub fn is_success(&self) -> bool {
        self.call_reference().is_some()
    }
}

impl std::fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallOutcome::Placed { call_id } => write!(f, "placed ({call_id})"),
            CallOutcome::Simulated => write!(f, "simulated ({MOCK_CALL_ID})"),
            CallOutcome::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Places exactly one call per invocation
#[async_trait]
pub trait CallDispatcher: Send + Sync {
    async fn dispatch(&self, request: &CallRequest) -> CallOutcome;
}
