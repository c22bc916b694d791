use crate::attendance::store::StoreError;
use crate::database::models::{GuildSettings, LeaveRecord, LeaveStatus};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const LEAVE_COLUMNS: &str =
    "id, subject_id, guild_id, start_date, end_date, reason, status, created_at";

// Discord snowflakes are stored as TEXT
pub fn parse_id(raw: &str, column: &str) -> Result<u64, StoreError> {
    raw.parse::<u64>()
        .map_err(|_| StoreError::Malformed(format!("{} is not a snowflake: {:?}", column, raw)))
}

fn parse_optional_id(raw: Option<String>, column: &str) -> Result<Option<u64>, StoreError> {
    raw.map(|value| parse_id(&value, column)).transpose()
}

pub fn leave_from_row(row: &SqliteRow) -> Result<LeaveRecord, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(LeaveRecord {
        id: row.try_get("id")?,
        subject_id: parse_id(&row.try_get::<String, _>("subject_id")?, "subject_id")?,
        guild_id: parse_id(&row.try_get::<String, _>("guild_id")?, "guild_id")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        reason: row.try_get("reason")?,
        status: status.parse().map_err(StoreError::Malformed)?,
        created_at: row.try_get("created_at")?,
    })
}

// Leave queries
pub async fn create_leave(
    pool: &SqlitePool,
    subject_id: u64,
    guild_id: u64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: &str,
    created_at: DateTime<Utc>,
) -> Result<LeaveRecord> {
    let result = sqlx::query(
        "INSERT INTO leave_records (subject_id, guild_id, start_date, end_date, reason, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(subject_id.to_string())
    .bind(guild_id.to_string())
    .bind(start_date)
    .bind(end_date)
    .bind(reason)
    .bind(LeaveStatus::Pending.as_str())
    .bind(created_at)
    .execute(pool)
    .await?;

    let leave_id = result.last_insert_rowid();
    get_leave_by_id(pool, guild_id, leave_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Leave {} vanished after insert", leave_id))
}

pub async fn get_leave_by_id(pool: &SqlitePool, guild_id: u64, leave_id: i64) -> Result<Option<LeaveRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM leave_records WHERE id = ? AND guild_id = ?",
        LEAVE_COLUMNS
    ))
    .bind(leave_id)
    .bind(guild_id.to_string())
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(leave_from_row).transpose()?)
}

pub async fn find_approved_leave(
    pool: &SqlitePool,
    subject_id: u64,
    guild_id: u64,
    day: NaiveDate,
) -> Result<Option<LeaveRecord>, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM leave_records
         WHERE subject_id = ? AND guild_id = ? AND status = ? AND start_date <= ? AND end_date >= ?
         ORDER BY start_date ASC
         LIMIT 1",
        LEAVE_COLUMNS
    ))
    .bind(subject_id.to_string())
    .bind(guild_id.to_string())
    .bind(LeaveStatus::Approved.as_str())
    .bind(day)
    .bind(day)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(leave_from_row).transpose()
}

/// Pending requests plus approved leaves covering `day`.
pub async fn list_current_leaves(pool: &SqlitePool, guild_id: u64, day: NaiveDate) -> Result<Vec<LeaveRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM leave_records
         WHERE guild_id = ?
           AND (status = ? OR (status = ? AND start_date <= ? AND end_date >= ?))
         ORDER BY start_date ASC, id ASC",
        LEAVE_COLUMNS
    ))
    .bind(guild_id.to_string())
    .bind(LeaveStatus::Pending.as_str())
    .bind(LeaveStatus::Approved.as_str())
    .bind(day)
    .bind(day)
    .fetch_all(pool)
    .await?;

    let leaves = rows
        .iter()
        .map(leave_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(leaves)
}

/// Moves a leave to `next` if the transition is allowed. Returns the updated record,
/// or `None` when the leave does not exist in this guild.
pub async fn update_leave_status(
    pool: &SqlitePool,
    guild_id: u64,
    leave_id: i64,
    next: LeaveStatus,
    reviewed_by: u64,
) -> Result<Option<LeaveRecord>> {
    let Some(current) = get_leave_by_id(pool, guild_id, leave_id).await? else {
        return Ok(None);
    };

    if !current.status.can_transition_to(next) {
        return Err(anyhow::anyhow!(
            "Leave #{} is {} and cannot become {}",
            leave_id,
            current.status,
            next
        ));
    }

    // The status guard keeps concurrent reviews from both succeeding.
    let result = sqlx::query(
        "UPDATE leave_records
         SET status = ?, reviewed_by = ?, updated_at = CURRENT_TIMESTAMP
         WHERE id = ? AND guild_id = ? AND status = ?",
    )
    .bind(next.as_str())
    .bind(reviewed_by.to_string())
    .bind(leave_id)
    .bind(guild_id.to_string())
    .bind(current.status.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(anyhow::anyhow!("Leave #{} was changed by someone else", leave_id));
    }

    get_leave_by_id(pool, guild_id, leave_id).await
}

/// Marks approved leaves that ended before `today` as completed.
pub async fn complete_finished_leaves(pool: &SqlitePool, today: NaiveDate) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE leave_records
         SET status = ?, updated_at = CURRENT_TIMESTAMP
         WHERE status = ? AND end_date < ?",
    )
    .bind(LeaveStatus::Completed.as_str())
    .bind(LeaveStatus::Approved.as_str())
    .bind(today)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

// Guild settings queries
pub async fn get_guild_settings(pool: &SqlitePool, guild_id: u64) -> Result<GuildSettings> {
    let row = sqlx::query(
        "SELECT guild_id, tracked_role_id, log_channel_id, presence_role_id FROM guild_settings WHERE guild_id = ?",
    )
    .bind(guild_id.to_string())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(GuildSettings {
            guild_id,
            ..GuildSettings::default()
        });
    };

    Ok(GuildSettings {
        guild_id,
        tracked_role_id: parse_optional_id(row.try_get("tracked_role_id")?, "tracked_role_id")?,
        log_channel_id: parse_optional_id(row.try_get("log_channel_id")?, "log_channel_id")?,
        presence_role_id: parse_optional_id(row.try_get("presence_role_id")?, "presence_role_id")?,
    })
}

pub async fn upsert_guild_settings(pool: &SqlitePool, settings: &GuildSettings) -> Result<()> {
    sqlx::query(
        "INSERT INTO guild_settings (guild_id, tracked_role_id, log_channel_id, presence_role_id)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(guild_id) DO UPDATE SET
             tracked_role_id = excluded.tracked_role_id,
             log_channel_id = excluded.log_channel_id,
             presence_role_id = excluded.presence_role_id,
             updated_at = CURRENT_TIMESTAMP",
    )
    .bind(settings.guild_id.to_string())
    .bind(settings.tracked_role_id.map(|id| id.to_string()))
    .bind(settings.log_channel_id.map(|id| id.to_string()))
    .bind(settings.presence_role_id.map(|id| id.to_string()))
    .execute(pool)
    .await?;

    Ok(())
}
