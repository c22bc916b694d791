use crate::attendance::AttendanceError;
use crate::bot::commands::{guild_id, reply_ephemeral};
use crate::bot::{Context, Error};
use crate::database::models::AttendanceRecord;
use crate::utils::format::{
    create_info_embed, create_open_sessions_embed, format_error_message, format_info_message,
    format_success_message, mention,
};
use crate::utils::time::{format_duration_minutes, format_time_local};
use chrono::FixedOffset;
use poise::serenity_prelude as serenity;

pub fn describe_check_in(result: &Result<AttendanceRecord, AttendanceError>, offset: FixedOffset) -> String {
    match result {
        Ok(record) => match record.last_session() {
            Some(session) => format_success_message(&format!(
                "Checked in at {} (session #{} today)",
                format_time_local(session.check_in, offset),
                record.sessions.len()
            )),
            None => format_success_message("Checked in"),
        },
        Err(AttendanceError::SessionAlreadyOpen { since }) => format_error_message(&format!(
            "You are already checked in since {}. Use `/checkout` first.",
            format_time_local(*since, offset)
        )),
        Err(e) => describe_failure(e),
    }
}

pub fn describe_check_out(result: &Result<AttendanceRecord, AttendanceError>, offset: FixedOffset) -> String {
    match result {
        Ok(record) => {
            let Some(session) = record.last_session() else {
                return format_success_message("Checked out");
            };
            let total: i64 = record.sessions.iter().filter_map(|s| s.closed_minutes()).sum();
            format_success_message(&format!(
                "Checked out at {}\nSession: {} (today: {})",
                session
                    .check_out
                    .map(|t| format_time_local(t, offset))
                    .unwrap_or_else(|| "-".to_string()),
                format_duration_minutes(session.closed_minutes().unwrap_or(0)),
                format_duration_minutes(total)
            ))
        }
        Err(AttendanceError::NoOpenSession) => {
            format_error_message("You are not checked in. Use `/checkin` first.")
        }
        Err(e) => describe_failure(e),
    }
}

fn describe_failure(error: &AttendanceError) -> String {
    match error {
        AttendanceError::AlreadyInProgress => {
            format_info_message("Still processing your previous request, try again in a moment.")
        }
        e if e.is_business_rule() => format_error_message(&e.to_string()),
        _ => format_error_message("Attendance records are unavailable right now, please try again later."),
    }
}

/// Check in for today
#[poise::command(slash_command, guild_only)]
pub async fn checkin(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let tracker = &ctx.data().tracker;
    let now = tracker.clock().now();

    let result = tracker.check_in(ctx.author().id.get(), guild_id, now).await;
    reply_ephemeral(ctx, describe_check_in(&result, tracker.clock().offset())).await
}

/// Check out of your current session
#[poise::command(slash_command, guild_only)]
pub async fn checkout(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let tracker = &ctx.data().tracker;
    let now = tracker.clock().now();

    let result = tracker.check_out(ctx.author().id.get(), guild_id, now).await;
    reply_ephemeral(ctx, describe_check_out(&result, tracker.clock().offset())).await
}

/// Close another member's open session
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn force_checkout(
    ctx: Context<'_>,
    #[description = "Member to check out"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let tracker = &ctx.data().tracker;
    let offset = tracker.clock().offset();
    let now = tracker.clock().now();

    let result = tracker
        .force_check_out(user.id.get(), guild_id, now, ctx.author().id.get())
        .await;
    let message = match &result {
        Ok(_) => format!("{} {}", mention(user.id.get()), describe_check_out(&result, offset)),
        Err(AttendanceError::NoOpenSession) => {
            format_error_message(&format!("{} is not checked in.", mention(user.id.get())))
        }
        Err(e) => describe_failure(e),
    };
    reply_ephemeral(ctx, message).await
}

/// List members who are currently checked in
#[poise::command(slash_command, guild_only)]
pub async fn open_sessions(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let tracker = &ctx.data().tracker;

    match tracker.open_sessions(guild_id).await {
        Ok(records) => {
            let embed = create_open_sessions_embed(&records, tracker.clock().offset());
            ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
                .await?;
            Ok(())
        }
        Err(e) => reply_ephemeral(ctx, describe_failure(&e)).await,
    }
}

/// Post a check-in/check-out panel in this channel
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_CHANNELS")]
pub async fn attendance_panel(ctx: Context<'_>) -> Result<(), Error> {
    let buttons = vec![
        serenity::CreateButton::new("check_in")
            .label("🟢 Check in")
            .style(serenity::ButtonStyle::Success),
        serenity::CreateButton::new("check_out")
            .label("🔴 Check out")
            .style(serenity::ButtonStyle::Danger),
    ];
    let message = serenity::CreateMessage::new()
        .embed(create_info_embed(
            "🕒 Attendance",
            "Use the buttons below to check in and out. Replies are only visible to you.",
        ))
        .components(vec![serenity::CreateActionRow::Buttons(buttons)]);

    ctx.channel_id().send_message(ctx.http(), message).await?;
    reply_ephemeral(ctx, format_success_message("Attendance panel posted")).await
}
