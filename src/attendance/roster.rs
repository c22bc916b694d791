use async_trait::async_trait;
use std::collections::BTreeSet;

/// Source of the subjects expected to attend in a guild.
#[async_trait]
pub trait Roster: Send + Sync {
    /// `None` when the guild has no tracked roster configured.
    async fn eligible_subjects(&self, guild_id: u64) -> anyhow::Result<Option<BTreeSet<u64>>>;
}
