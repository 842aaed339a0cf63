// Core layer - configuration, clock, and shared helpers
pub mod core;

// Features layer - calls and reminders
pub mod features;

// Infrastructure
pub mod database;

// Re-export core config for convenience
pub use crate::core::Config;

// Re-export feature items
pub use features::{
    // Calls
    CallDispatcher, CallOutcome, CallRequest, VapiDispatcher, MOCK_CALL_ID,
    // Reminders
    CycleReport, NewReminder, Reminder, ReminderScheduler, ReminderStatus, ReminderStore,
    ReminderUpdate, SchedulerHandle, SettleOutcome,
};

pub use database::Database;
