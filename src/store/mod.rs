//! Persistence collaborators of the daily attendance reconciliation.

use async_trait::async_trait;

use crate::calendar::DayWindow;
use crate::error::StoreError;
use crate::model::attendance::NewAttendance;
use crate::model::user::RosterEntry;
use crate::model::work_schedule::WorkSchedule;

#[cfg(test)]
pub mod memory;
pub mod mysql;

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything the reconciliation job reads and writes.
///
/// Range queries take a [`DayWindow`] and match instants inside `[start, end]`.
#[async_trait]
pub trait ReconcileStore: Send + Sync {
    /// The singleton schedule, or `None` when it was never configured.
    async fn work_schedule(&self) -> StoreResult<Option<WorkSchedule>>;

    async fn special_working_day_exists(&self, window: &DayWindow) -> StoreResult<bool>;

    async fn holiday_exists(&self, window: &DayWindow) -> StoreResult<bool>;

    /// Every user, without filtering by role.
    async fn list_users(&self) -> StoreResult<Vec<RosterEntry>>;

    /// User ids owning at least one attendance record dated inside the window.
    /// Ids may repeat.
    async fn attendance_user_ids(&self, window: &DayWindow) -> StoreResult<Vec<u64>>;

    /// User ids with an approved leave whose interval overlaps the window.
    async fn approved_leave_user_ids(&self, window: &DayWindow) -> StoreResult<Vec<u64>>;

    /// Writes the records in one transaction and returns the ids of the users written.
    ///
    /// Users who gained a record inside `window` after it was read are skipped, under the
    /// same per-user lock check-in takes.
    async fn insert_attendance(
        &self,
        window: &DayWindow,
        records: &[NewAttendance],
    ) -> StoreResult<Vec<u64>>;
}
