//! # Calls Feature
//!
//! Outbound voice-call dispatch for due reminders.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod dispatcher;
pub mod vapi;

pub use dispatcher::{CallDispatcher, CallOutcome, CallRequest, MOCK_CALL_ID};
pub use vapi::VapiDispatcher;
