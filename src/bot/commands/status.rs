use crate::bot::commands::guild_id;
use crate::bot::{Context, Error};
use crate::utils::format::{create_error_embed, create_status_embed};

/// Show your attendance sessions for today
#[poise::command(slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let username = ctx.author().name.clone();
    let tracker = &ctx.data().tracker;
    let now = tracker.clock().now();

    let embed = match tracker.record_for(ctx.author().id.get(), guild_id, now).await {
        Ok(record) => create_status_embed(&username, record.as_ref(), tracker.clock().offset()),
        Err(e) => create_error_embed("Error", &format!("Could not load your attendance: {}", e)),
    };

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}
