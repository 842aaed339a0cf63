//! # Core Module
//!
//! Configuration, time source, and shared helpers for the reminder dispatcher.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Add clock abstraction and duration helpers
//! - 1.0.0: Initial creation with config module

pub mod clock;
pub mod config;
pub mod duration;

// Re-export commonly used items
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use duration::{format_duration, parse_duration};
