use crate::bot::commands::{guild_id, reply_ephemeral};
use crate::bot::{Context, Error};
use crate::database::models::LeaveStatus;
use crate::database::queries;
use crate::utils::format::{create_leave_list_embed, format_error_message, format_success_message, mention};
use crate::utils::time::format_date;
use crate::utils::validation::validate_leave_request;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum LeaveDecision {
    Approve,
    Reject,
}

impl From<LeaveDecision> for LeaveStatus {
    fn from(decision: LeaveDecision) -> Self {
        match decision {
            LeaveDecision::Approve => LeaveStatus::Approved,
            LeaveDecision::Reject => LeaveStatus::Rejected,
        }
    }
}

/// Leave requests
#[poise::command(slash_command, guild_only, subcommands("request", "review", "list"), subcommand_required)]
pub async fn leave(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Request leave for a date range
#[poise::command(slash_command, guild_only)]
pub async fn request(
    ctx: Context<'_>,
    #[description = "First day of leave (DD/MM/YYYY)"] start: String,
    #[description = "Last day of leave (DD/MM/YYYY)"] end: String,
    #[description = "Reason"] reason: String,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let clock = ctx.data().tracker.clock();

    let input = match validate_leave_request(&start, &end, &reason, clock.today()) {
        Ok(input) => input,
        Err(e) => return reply_ephemeral(ctx, format_error_message(&e.to_string())).await,
    };

    let user_id = ctx.author().id.get();
    let message = match queries::create_leave(
        &ctx.data().pool,
        user_id,
        guild_id,
        input.start_date,
        input.end_date,
        &input.reason,
        clock.now(),
    )
    .await
    {
        Ok(leave) => {
            tracing::info!(user_id, guild_id, leave_id = leave.id, "Leave requested");
            format_success_message(&format!(
                "Leave request #{} submitted for {} → {}. A moderator will review it.",
                leave.id,
                format_date(leave.start_date),
                format_date(leave.end_date)
            ))
        }
        Err(e) => {
            tracing::error!(user_id, guild_id, "Failed to create leave: {:?}", e);
            format_error_message("Could not save your leave request")
        }
    };
    reply_ephemeral(ctx, message).await
}

/// Approve or reject a pending leave request
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn review(
    ctx: Context<'_>,
    #[description = "Leave request number"] id: i64,
    #[description = "Decision"] decision: LeaveDecision,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let reviewer = ctx.author().id.get();

    let message =
        match queries::update_leave_status(&ctx.data().pool, guild_id, id, decision.into(), reviewer).await {
            Ok(Some(leave)) => {
                tracing::info!(guild_id, leave_id = id, reviewer, status = %leave.status, "Leave reviewed");
                format_success_message(&format!(
                    "Leave #{} of {} is now {}",
                    leave.id,
                    mention(leave.subject_id),
                    leave.status
                ))
            }
            Ok(None) => format_error_message(&format!("Leave #{} does not exist", id)),
            Err(e) => format_error_message(&e.to_string()),
        };
    reply_ephemeral(ctx, message).await
}

/// Show today's leaves and pending requests
#[poise::command(slash_command, guild_only)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let today = ctx.data().tracker.clock().today();

    match queries::list_current_leaves(&ctx.data().pool, guild_id, today).await {
        Ok(leaves) => {
            ctx.send(poise::CreateReply::default().embed(create_leave_list_embed(&leaves)).ephemeral(true))
                .await?;
            Ok(())
        }
        Err(e) => {
            tracing::error!(guild_id, "Failed to list leaves: {:?}", e);
            reply_ephemeral(ctx, format_error_message("Could not load leaves")).await
        }
    }
}
