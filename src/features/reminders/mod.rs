//! # Reminders Feature
//!
//! Scheduled reminders delivered as automated voice calls.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod model;
pub mod scheduler;
pub mod store;

pub use model::{
    validate_phone_number, NewReminder, Reminder, ReminderEvent, ReminderStatus, ReminderUpdate,
    Settlement,
};
pub use scheduler::{CycleReport, ProcessOutcome, ReminderScheduler, SchedulerHandle};
pub use store::{ReminderStore, SettleOutcome};
