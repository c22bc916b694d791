use crate::bot::commands::{guild_id, reply_ephemeral};
use crate::bot::{Context, Error};
use crate::utils::format::{
    create_absence_report_embed, create_daily_report_embed, format_error_message, format_info_message,
    format_success_message,
};
use crate::utils::time::parse_date_string;
use chrono::NaiveDate;
use poise::serenity_prelude as serenity;
use std::collections::BTreeSet;

/// Resolves the optional `date` argument, defaulting to today.
fn report_date(ctx: Context<'_>, date: Option<String>) -> Result<NaiveDate, String> {
    match date {
        Some(raw) => parse_date_string(&raw).map_err(|e| e.to_string()),
        None => Ok(ctx.data().tracker.clock().today()),
    }
}

/// Attendance summary for a day
#[poise::command(slash_command, guild_only)]
pub async fn daily_report(
    ctx: Context<'_>,
    #[description = "Day to report (DD/MM/YYYY), today by default"] date: Option<String>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let date = match report_date(ctx, date) {
        Ok(date) => date,
        Err(e) => return reply_ephemeral(ctx, format_error_message(&e)).await,
    };
    let tracker = &ctx.data().tracker;

    match tracker.daily_report(guild_id, date).await {
        Ok(report) => {
            let embed = create_daily_report_embed(&report, tracker.clock().offset());
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
            Ok(())
        }
        Err(e) => {
            reply_ephemeral(ctx, format_error_message(&format!("Could not build the report: {}", e))).await
        }
    }
}

/// Members of the tracked role who neither attended nor were on leave
#[poise::command(slash_command, guild_only)]
pub async fn absence_report(
    ctx: Context<'_>,
    #[description = "Day to report (DD/MM/YYYY), today by default"] date: Option<String>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let date = match report_date(ctx, date) {
        Ok(date) => date,
        Err(e) => return reply_ephemeral(ctx, format_error_message(&e)).await,
    };

    // Member pagination can take a while on large guilds. Deferred privately so
    // roster problems are only shown to the caller.
    ctx.defer_ephemeral().await?;

    let roster = ctx.data().roster.eligible_subjects(guild_id).await;
    if let Err(e) = &roster {
        tracing::warn!(guild_id, "Failed to resolve roster: {:?}", e);
    }
    let eligible = match eligible_or_message(roster) {
        Ok(eligible) => eligible,
        Err(message) => return reply_ephemeral(ctx, message).await,
    };

    match ctx.data().tracker.absence_report(guild_id, date, &eligible).await {
        Ok(report) => {
            let message = serenity::CreateMessage::new().embed(create_absence_report_embed(&report));
            ctx.channel_id().send_message(ctx.http(), message).await?;
            reply_ephemeral(ctx, format_success_message("Absence report posted")).await
        }
        Err(e) => {
            reply_ephemeral(ctx, format_error_message(&format!("Could not build the report: {}", e))).await
        }
    }
}

/// The eligible set, or the message explaining why there is none.
fn eligible_or_message(roster: anyhow::Result<Option<BTreeSet<u64>>>) -> Result<BTreeSet<u64>, String> {
    match roster {
        Ok(Some(eligible)) => Ok(eligible),
        Ok(None) => Err(format_info_message(
            "No tracked role is configured. Set one with `/attendance_settings`.",
        )),
        Err(_) => Err(format_error_message("Could not load the member list")),
    }
}
