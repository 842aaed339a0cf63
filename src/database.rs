//! # Database
//!
//! SQLite persistence for reminders. Backs both the operator CRUD surface and
//! the [`ReminderStore`] contract used by the poller.
//!
//! Instants are stored as UTC milliseconds since the epoch so eligibility is a
//! plain integer comparison.
//!
//! - **Version**: 1.3.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.3.0: Reset limited to failed reminders
//! - 1.2.0: Revision column and guarded settlement
//! - 1.1.0: Partial updates and reset for retry
//! - 1.0.0: Initial reminders schema

use crate::features::reminders::{
    NewReminder, Reminder, ReminderStatus, ReminderStore, ReminderUpdate, SettleOutcome,
    Settlement,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlite::{Connection, State, Statement};
use std::sync::Arc;
use tokio::sync::Mutex;

const REMINDER_COLUMNS: &str = "id, title, message, phone_number, scheduled_at, timezone, \
     status, call_id, created_at, revision";

#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at `db_path`. `:memory:` gives a
    /// private in-memory database.
    pub async fn new(db_path: &str) -> Result<Self> {
        let connection = sqlite::open(db_path)?;
        let database = Database {
            connection: Arc::new(Mutex::new(connection)),
        };
        database.init_tables().await?;
        info!("Database initialized at {db_path}");
        Ok(database)
    }

    async fn init_tables(&self) -> Result<()> {
        let conn = self.connection.lock().await;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS reminders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                phone_number TEXT NOT NULL,
                scheduled_at INTEGER NOT NULL,
                timezone TEXT NOT NULL DEFAULT 'UTC',
                status TEXT NOT NULL DEFAULT 'scheduled',
                call_id TEXT,
                created_at INTEGER NOT NULL,
                revision INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_reminders_due
                ON reminders (status, scheduled_at);",
        )?;
        Ok(())
    }

    /// Insert a new reminder in `scheduled` status
    pub async fn create_reminder(&self, new: &NewReminder) -> Result<Reminder> {
        new.validate()?;

        let conn = self.connection.lock().await;
        {
            let mut stmt = conn.prepare(
                "INSERT INTO reminders
                    (title, message, phone_number, scheduled_at, timezone, status, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )?;
            stmt.bind((1, new.title.trim()))?;
            stmt.bind((2, new.message.as_str()))?;
            stmt.bind((3, new.phone_number.trim()))?;
            stmt.bind((4, new.scheduled_time.timestamp_millis()))?;
            stmt.bind((5, new.timezone.as_str()))?;
            stmt.bind((6, ReminderStatus::Scheduled.to_string().as_str()))?;
            stmt.bind((7, Utc::now().timestamp_millis()))?;
            stmt.next()?;
        }

        let id = last_insert_id(&conn)?;
        let reminder = fetch_reminder(&conn, id)?
            .ok_or_else(|| anyhow::anyhow!("Reminder {} vanished after insert", id))?;

        debug!(
            "Created reminder {} '{}' due at {}",
            reminder.id, reminder.title, reminder.scheduled_time
        );
        Ok(reminder)
    }

    pub async fn get_reminder(&self, id: i64) -> Result<Option<Reminder>> {
        let conn = self.connection.lock().await;
        fetch_reminder(&conn, id)
    }

    /// List reminders ordered by scheduled time
    pub async fn list_reminders(&self, offset: i64, limit: i64) -> Result<Vec<Reminder>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare(format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             ORDER BY scheduled_at ASC, id ASC
             LIMIT ? OFFSET ?"
        ))?;
        stmt.bind((1, limit))?;
        stmt.bind((2, offset))?;
        read_all(&mut stmt)
    }

    /// Apply a partial update. Returns `None` if the reminder does not exist.
    pub async fn update_reminder(
        &self,
        id: i64,
        update: &ReminderUpdate,
    ) -> Result<Option<Reminder>> {
        update.validate()?;

        let conn = self.connection.lock().await;
        let Some(current) = fetch_reminder(&conn, id)? else {
            return Ok(None);
        };
        if update.is_empty() {
            return Ok(Some(current));
        }

        let updated = update.apply_to(&current);
        {
            let mut stmt = conn.prepare(
                "UPDATE reminders
                 SET title = ?, message = ?, phone_number = ?, scheduled_at = ?,
                     timezone = ?, status = ?, call_id = ?, revision = revision + 1
                 WHERE id = ?",
            )?;
            stmt.bind((1, updated.title.trim()))?;
            stmt.bind((2, updated.message.as_str()))?;
            stmt.bind((3, updated.phone_number.trim()))?;
            stmt.bind((4, updated.scheduled_time.timestamp_millis()))?;
            stmt.bind((5, updated.timezone.as_str()))?;
            stmt.bind((6, updated.status.to_string().as_str()))?;
            stmt.bind((7, updated.call_reference.as_deref()))?;
            stmt.bind((8, id))?;
            stmt.next()?;
        }

        debug!("Updated reminder {id}");
        fetch_reminder(&conn, id)
    }

    /// Put a failed reminder back to `scheduled` so the poller dispatches it
    /// again. Completed reminders are refused since their call was placed.
    pub async fn reset_reminder(&self, id: i64) -> Result<Option<Reminder>> {
        let Some(current) = self.get_reminder(id).await? else {
            return Ok(None);
        };
        if current.status != ReminderStatus::Failed {
            return Err(anyhow::anyhow!(
                "Reminder {} is {}, only failed reminders can be reset",
                id,
                current.status
            ));
        }

        let update = ReminderUpdate {
            status: Some(ReminderStatus::Scheduled),
            ..Default::default()
        };
        self.update_reminder(id, &update).await
    }

    /// Delete a reminder. Returns whether a row was removed.
    pub async fn delete_reminder(&self, id: i64) -> Result<bool> {
        let conn = self.connection.lock().await;
        {
            let mut stmt = conn.prepare("DELETE FROM reminders WHERE id = ?")?;
            stmt.bind((1, id))?;
            stmt.next()?;
        }
        let deleted = conn.change_count() > 0;
        if deleted {
            debug!("Deleted reminder {id}");
        }
        Ok(deleted)
    }
}

#[async_trait]
impl ReminderStore for Database {
    async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare(format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE status = ? AND scheduled_at <= ?
             ORDER BY scheduled_at ASC, id ASC"
        ))?;
        stmt.bind((1, ReminderStatus::Scheduled.to_string().as_str()))?;
        stmt.bind((2, now.timestamp_millis()))?;
        read_all(&mut stmt)
    }

    async fn settle(&self, reminder: &Reminder, settlement: &Settlement) -> Result<SettleOutcome> {
        let conn = self.connection.lock().await;
        {
            let mut stmt = conn.prepare(
                "UPDATE reminders SET status = ?, call_id = ?
                 WHERE id = ? AND status = ? AND revision = ?",
            )?;
            stmt.bind((1, settlement.status.to_string().as_str()))?;
            stmt.bind((2, settlement.call_reference.as_deref()))?;
            stmt.bind((3, reminder.id))?;
            stmt.bind((4, ReminderStatus::Scheduled.to_string().as_str()))?;
            stmt.bind((5, reminder.revision))?;
            stmt.next()?;
        }

        if conn.change_count() > 0 {
            return Ok(SettleOutcome::Settled);
        }

        match fetch_reminder(&conn, reminder.id)? {
            Some(_) => Ok(SettleOutcome::Conflict),
            None => Ok(SettleOutcome::NotFound),
        }
    }
}

fn last_insert_id(conn: &Connection) -> Result<i64> {
    let mut stmt = conn.prepare("SELECT last_insert_rowid() AS id")?;
    match stmt.next()? {
        State::Row => Ok(stmt.read::<i64, _>("id")?),
        State::Done => Err(anyhow::anyhow!("No row id after insert")),
    }
}

fn fetch_reminder(conn: &Connection, id: i64) -> Result<Option<Reminder>> {
    let mut stmt = conn.prepare(format!(
        "SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?"
    ))?;
    stmt.bind((1, id))?;
    match stmt.next()? {
        State::Row => Ok(Some(read_reminder(&stmt)?)),
        State::Done => Ok(None),
    }
}

fn read_all(stmt: &mut Statement<'_>) -> Result<Vec<Reminder>> {
    let mut reminders = Vec::new();
    while let State::Row = stmt.next()? {
        reminders.push(read_reminder(stmt)?);
    }
    Ok(reminders)
}

fn read_reminder(stmt: &Statement<'_>) -> Result<Reminder> {
    let status: String = stmt.read::<String, _>("status")?;

    Ok(Reminder {
        id: stmt.read::<i64, _>("id")?,
        title: stmt.read::<String, _>("title")?,
        message: stmt.read::<String, _>("message")?,
        phone_number: stmt.read::<String, _>("phone_number")?,
        scheduled_time: from_millis(stmt.read::<i64, _>("scheduled_at")?)?,
        timezone: stmt.read::<String, _>("timezone")?,
        status: status.parse()?,
        call_reference: stmt.read::<Option<String>, _>("call_id")?,
        created_at: from_millis(stmt.read::<i64, _>("created_at")?)?,
        revision: stmt.read::<i64, _>("revision")?,
    })
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| anyhow::anyhow!("Timestamp out of range: {}", millis))
}
