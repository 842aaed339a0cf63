//! # Features
//!
//! - `calls`: outbound voice-call dispatch
//! - `reminders`: reminder records, store contract, and the due-reminder scheduler

pub mod calls;
pub mod reminders;

pub use calls::{CallDispatcher, CallOutcome, CallRequest, VapiDispatcher, MOCK_CALL_ID};
pub use reminders::{
    CycleReport, NewReminder, Reminder, ReminderScheduler, ReminderStatus, ReminderStore,
    ReminderUpdate, SchedulerHandle, SettleOutcome,
};
