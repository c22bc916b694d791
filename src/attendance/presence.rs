use async_trait::async_trait;
use std::sync::Arc;

use crate::attendance::notify::{AttendanceEvent, NotificationSink};

/// Marks members as currently present, e.g. with a guild role.
#[async_trait]
pub trait PresenceRoles: Send + Sync {
    /// Does nothing when the guild has no presence marker configured.
    async fn set_present(&self, guild_id: u64, user_id: u64, present: bool) -> anyhow::Result<()>;
}

/// Updates presence on check-in/check-out events, then forwards every event to `inner`.
/// A presence failure is logged and never blocks the forwarded event.
pub struct PresenceRoleSink {
    roles: Arc<dyn PresenceRoles>,
    inner: Arc<dyn NotificationSink>,
}

impl PresenceRoleSink {
    pub fn new(roles: Arc<dyn PresenceRoles>, inner: Arc<dyn NotificationSink>) -> Self {
        Self { roles, inner }
    }
}

#[async_trait]
impl NotificationSink for PresenceRoleSink {
    async fn emit(&self, event: &AttendanceEvent) -> anyhow::Result<()> {
        let change = match event {
            AttendanceEvent::CheckIn { user_id, guild_id, .. } => Some((*guild_id, *user_id, true)),
            AttendanceEvent::CheckOut { user_id, guild_id, .. } => Some((*guild_id, *user_id, false)),
            AttendanceEvent::DailyReport(_) | AttendanceEvent::AbsenceReport(_) => None,
        };

        if let Some((guild_id, user_id, present)) = change {
            if let Err(e) = self.roles.set_present(guild_id, user_id, present).await {
                tracing::warn!(guild_id, user_id, present, "Failed to update presence role: {:?}", e);
            }
        }

        self.inner.emit(event).await
    }
}
