//! Interactive reminder management
//!
//! Create, list, delete and reset reminders in the daemon's database.
//!
//! Usage: cargo run --features cli --bin remind

use anyhow::Result;
use chrono::{Duration, Utc};
use dialoguer::{Confirm, Input, Select};
use dotenvy::dotenv;

use voice_reminders::core::{format_duration, parse_duration, Config};
use voice_reminders::database::Database;
use voice_reminders::features::reminders::{
    validate_phone_number, NewReminder, Reminder, ReminderStatus,
};

const PAGE_SIZE: i64 = 20;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let config = Config::from_env()?;
    let database = Database::new(&config.database_path).await?;

    println!("Voice Reminders");
    println!("===============");
    println!("Database: {}\n", config.database_path);

    let actions = vec![
        "Create a reminder",
        "List reminders",
        "Delete a reminder",
        "Reset a failed reminder",
        "Quit",
    ];

    loop {
        let choice = Select::new()
            .with_prompt("Action")
            .items(&actions)
            .default(0)
            .interact()?;

        let result = match choice {
            0 => create(&database).await,
            1 => list(&database).await,
            2 => delete(&database).await,
            3 => reset(&database).await,
            _ => break,
        };

        if let Err(e) = result {
            eprintln!("Error: {e}");
        }
        println!();
    }

    Ok(())
}

async fn create(database: &Database) -> Result<()> {
    let title: String = Input::new()
        .with_prompt("Title")
        .validate_with(|input: &String| -> Result<(), String> {
            if input.trim().is_empty() {
                return Err("Title cannot be empty".to_string());
            }
            Ok(())
        })
        .interact_text()?;

    let message: String = Input::new()
        .with_prompt("Message to speak")
        .validate_with(|input: &String| -> Result<(), String> {
            if input.trim().is_empty() {
                return Err("Message cannot be empty".to_string());
            }
            Ok(())
        })
        .interact_text()?;

    let phone_number: String = Input::new()
        .with_prompt("Phone number (e.g. +15551234567)")
        .validate_with(|input: &String| -> Result<(), String> {
            validate_phone_number(input).map_err(|e| e.to_string())
        })
        .interact_text()?;

    let delay: String = Input::new()
        .with_prompt("Call in (e.g. 30m, 2h, 1h30m)")
        .validate_with(|input: &String| -> Result<(), String> {
            match parse_duration(input) {
                Some(_) => Ok(()),
                None => Err("Invalid time format. Use: 30s, 5m, 2h, 1d, 1w".to_string()),
            }
        })
        .interact_text()?;

    let timezone: String = Input::new()
        .with_prompt("Timezone label")
        .default("UTC".to_string())
        .interact_text()?;

    let seconds =
        parse_duration(&delay).ok_or_else(|| anyhow::anyhow!("Invalid delay '{}'", delay))?;
    let mut new = NewReminder::new(
        &title,
        &message,
        &phone_number,
        Utc::now() + Duration::seconds(seconds),
    );
    new.timezone = timezone;

    let reminder = database.create_reminder(&new).await?;
    println!(
        "Created reminder #{} - call in {}",
        reminder.id,
        format_duration(seconds)
    );
    Ok(())
}

async fn list(database: &Database) -> Result<()> {
    let mut offset = 0;
    loop {
        let page = database.list_reminders(offset, PAGE_SIZE).await?;
        if page.is_empty() {
            if offset == 0 {
                println!("No reminders.");
            }
            return Ok(());
        }

        for reminder in &page {
            println!("{}", describe(reminder));
        }

        if (page.len() as i64) < PAGE_SIZE {
            return Ok(());
        }
        let more = Confirm::new()
            .with_prompt("Show more?")
            .default(true)
            .interact()?;
        if !more {
            return Ok(());
        }
        offset += PAGE_SIZE;
    }
}

fn describe(reminder: &Reminder) -> String {
    let delta = (reminder.scheduled_time - Utc::now()).num_seconds();
    let when = if reminder.status != ReminderStatus::Scheduled {
        reminder.scheduled_time.format("%Y-%m-%d %H:%M UTC").to_string()
    } else if delta > 0 {
        format!("in {}", format_duration(delta))
    } else {
        "due now".to_string()
    };

    let mut line = format!(
        "#{} [{}] {} - {} ({}, {})",
        reminder.id, reminder.status, reminder.title, reminder.phone_number, when, reminder.timezone
    );
    if let Some(call_reference) = &reminder.call_reference {
        line.push_str(&format!(" call {call_reference}"));
    }
    line
}

fn prompt_id(prompt: &str) -> Result<i64> {
    let id: i64 = Input::new().with_prompt(prompt).interact_text()?;
    Ok(id)
}

async fn delete(database: &Database) -> Result<()> {
    let id = prompt_id("Reminder id to delete")?;
    if database.delete_reminder(id).await? {
        println!("Deleted reminder #{id}");
    } else {
        println!("Reminder #{id} not found");
    }
    Ok(())
}

async fn reset(database: &Database) -> Result<()> {
    let id = prompt_id("Reminder id to reset")?;
    match database.reset_reminder(id).await? {
        Some(reminder) => println!("{}", describe(&reminder)),
        None => println!("Reminder #{id} not found"),
    }
    Ok(())
}
