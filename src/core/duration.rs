//! # Duration Helpers
//!
//! Parsing of relative delays (`30m`, `2h`, `1h30m`) for scheduling and
//! human-readable formatting of the time left until a reminder is due.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 1.0.0: Extracted from the reminder CLI

/// Parse a time duration string like "30m", "2h", "1d", "1h30m" into seconds
pub fn parse_duration(time_str: &str) -> Option<i64> {
    let time_str = time_str.trim().to_lowercase();
    let mut total_seconds: i64 = 0;
    let mut current_number = String::new();

    for c in time_str.chars() {
        if c.is_ascii_digit() {
            current_number.push(c);
        } else if !current_number.is_empty() {
            let value: i64 = current_number.parse().ok()?;
            current_number.clear();

            let seconds = match c {
                's' => value,
                'm' => value.checked_mul(60)?,
                'h' => value.checked_mul(60 * 60)?,
                'd' => value.checked_mul(60 * 60 * 24)?,
                'w' => value.checked_mul(60 * 60 * 24 * 7)?,
                _ => return None,
            };
            total_seconds = total_seconds.checked_add(seconds)?;
        } else {
            return None;
        }
    }

    // Trailing digits without a unit
    if !current_number.is_empty() {
        return None;
    }

    if total_seconds > 0 {
        Some(total_seconds)
    } else {
        None
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Format a duration in seconds into a human-readable string
pub fn format_duration(seconds: i64) -> String {
    if seconds < 60 {
        format!("{} second{}", seconds, plural(seconds))
    } else if seconds < 3600 {
        let mins = seconds / 60;
        format!("{} minute{}", mins, plural(mins))
    } else if seconds < 86400 {
        let hours = seconds / 3600;
        let mins = (seconds % 3600) / 60;
        if mins > 0 {
            format!(
                "{} hour{} {} minute{}",
                hours,
                plural(hours),
                mins,
                plural(mins)
            )
        } else {
            format!("{} hour{}", hours, plural(hours))
        }
    } else {
        let days = seconds / 86400;
        let hours = (seconds % 86400) / 3600;
        if hours > 0 {
            format!(
                "{} day{} {} hour{}",
                days,
                plural(days),
                hours,
                plural(hours)
            )
        } else {
            format!("{} day{}", days, plural(days))
        }
    }
}
