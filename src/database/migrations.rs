use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    create_attendance_days_table(pool).await?;
    create_attendance_sessions_table(pool).await?;
    create_leave_records_table(pool).await?;
    create_guild_settings_table(pool).await?;
    add_column_if_missing(pool, "guild_settings", "presence_role_id", "TEXT").await?;

    info!("Database migrations completed successfully");
    Ok(())
}

async fn create_attendance_days_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_days (
            user_id TEXT NOT NULL,
            guild_id TEXT NOT NULL,
            date DATE NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (user_id, guild_id, date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_attendance_days_guild_date ON attendance_days (guild_id, date)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_attendance_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_sessions (
            user_id TEXT NOT NULL,
            guild_id TEXT NOT NULL,
            date DATE NOT NULL,
            position INTEGER NOT NULL,
            check_in DATETIME NOT NULL,
            check_out DATETIME,
            duration_minutes INTEGER,
            PRIMARY KEY (user_id, guild_id, date, position),
            FOREIGN KEY (user_id, guild_id, date)
                REFERENCES attendance_days (user_id, guild_id, date) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_attendance_sessions_open ON attendance_sessions (guild_id, check_out)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_leave_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS leave_records (
            id INTEGER PRIMARY KEY,
            subject_id TEXT NOT NULL,
            guild_id TEXT NOT NULL,
            start_date DATE NOT NULL,
            end_date DATE NOT NULL,
            reason TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'approved', 'rejected', 'completed')),
            reviewed_by TEXT,
            created_at DATETIME NOT NULL,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            CHECK (start_date <= end_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_leave_records_subject ON leave_records (guild_id, subject_id, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_guild_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS guild_settings (
            guild_id TEXT PRIMARY KEY,
            tracked_role_id TEXT,
            log_channel_id TEXT,
            presence_role_id TEXT,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Databases created before a column existed get it added in place.
async fn add_column_if_missing(pool: &SqlitePool, table: &str, column: &str, definition: &str) -> Result<()> {
    let matches: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
        .bind(table)
        .bind(column)
        .fetch_one(pool)
        .await?;
    if matches > 0 {
        return Ok(());
    }

    let statement = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition);
    sqlx::query(&statement).execute(pool).await?;
    info!(table, column, "Added missing column");
    Ok(())
}
