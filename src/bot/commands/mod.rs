pub mod attendance;
pub mod leave;
pub mod reports;
pub mod settings;
pub mod status;

use crate::bot::{Context, Error};

/// Replies visibly to the caller only.
pub async fn reply_ephemeral(ctx: Context<'_>, content: impl Into<String>) -> Result<(), Error> {
    ctx.send(poise::CreateReply::default().content(content).ephemeral(true))
        .await?;
    Ok(())
}

/// Guild id of the invocation. Commands are registered `guild_only`, so `None`
/// only happens when Discord delivers an inconsistent payload.
pub fn guild_id(ctx: Context<'_>) -> Result<u64, Error> {
    ctx.guild_id()
        .map(|id| id.get())
        .ok_or_else(|| "This command can only be used in a server".into())
}
