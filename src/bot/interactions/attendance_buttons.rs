use crate::bot::commands::attendance::{describe_check_in, describe_check_out};
use crate::bot::{Data, Error};
use crate::utils::format::format_error_message;
use poise::serenity_prelude as serenity;

pub const CHECK_IN_ID: &str = "check_in";
pub const CHECK_OUT_ID: &str = "check_out";

pub async fn handle_attendance_interaction(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> Result<(), Error> {
    let custom_id = interaction.data.custom_id.as_str();
    if custom_id != CHECK_IN_ID && custom_id != CHECK_OUT_ID {
        return respond(ctx, interaction, format_error_message("Unknown action")).await;
    }

    let Some(guild_id) = interaction.guild_id else {
        return respond(ctx, interaction, format_error_message("Attendance only works inside a server")).await;
    };

    // Store retries can outlast the interaction deadline.
    interaction.defer_ephemeral(&ctx.http).await?;

    let tracker = &data.tracker;
    let user_id = interaction.user.id.get();
    let offset = tracker.clock().offset();
    let now = tracker.clock().now();

    let message = if custom_id == CHECK_IN_ID {
        describe_check_in(&tracker.check_in(user_id, guild_id.get(), now).await, offset)
    } else {
        describe_check_out(&tracker.check_out(user_id, guild_id.get(), now).await, offset)
    };

    interaction
        .create_followup(
            &ctx.http,
            serenity::CreateInteractionResponseFollowup::new()
                .content(message)
                .ephemeral(true),
        )
        .await?;
    Ok(())
}

async fn respond(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    content: String,
) -> Result<(), Error> {
    interaction
        .create_response(
            &ctx.http,
            serenity::CreateInteractionResponse::Message(
                serenity::CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}
