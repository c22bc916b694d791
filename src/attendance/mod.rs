//! Attendance core: the check-in/check-out state machine, per-user locking,
//! and the daily/absence aggregations built on top of it.
//!
//! Everything outside this module talks to it through [`AttendanceTracker`];
//! persistence, time, notifications and rosters are injected collaborators.

pub mod clock;
pub mod error;
pub mod guard;
pub mod notify;
pub mod presence;
pub mod report;
pub mod retry;
pub mod roster;
pub mod store;
pub mod tracker;

#[cfg(test)]
pub mod testing;

pub use clock::{Clock, SystemClock};
pub use error::AttendanceError;
pub use guard::ConcurrencyGuard;
pub use notify::{AttendanceEvent, NotificationSink};
pub use presence::{PresenceRoleSink, PresenceRoles};
pub use report::{AbsenceReport, DailyReport};
pub use retry::{RetryPolicy, RetryingStore};
pub use roster::Roster;
pub use store::{RecordStore, StoreError};
pub use tracker::AttendanceTracker;
