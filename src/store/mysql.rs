use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{MySql, MySqlPool, QueryBuilder};

use super::{ReconcileStore, StoreResult};
use crate::calendar::DayWindow;
use crate::error::StoreError;
use crate::model::attendance::NewAttendance;
use crate::model::calendar_day::OverrideKind;
use crate::model::leave_request::LeaveStatus;
use crate::model::user::RosterEntry;
use crate::model::work_schedule::{WorkSchedule, WorkScheduleRow};

/// MySQL has a 65535 placeholder limit per statement; 7 columns per row.
const INSERT_CHUNK: usize = 1000;

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn override_exists(&self, kind: OverrideKind, window: &DayWindow) -> StoreResult<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE date BETWEEN ? AND ?)",
            kind.table()
        );
        let exists = sqlx::query_scalar::<_, i64>(&sql)
            .bind(window.start)
            .bind(window.end)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists != 0)
    }
}

#[async_trait]
impl ReconcileStore for MySqlStore {
    async fn work_schedule(&self) -> StoreResult<Option<WorkSchedule>> {
        load_work_schedule(&self.pool).await
    }

    async fn special_working_day_exists(&self, window: &DayWindow) -> StoreResult<bool> {
        self.override_exists(OverrideKind::SpecialWorkingDay, window)
            .await
    }

    async fn holiday_exists(&self, window: &DayWindow) -> StoreResult<bool> {
        self.override_exists(OverrideKind::Holiday, window).await
    }

    async fn list_users(&self) -> StoreResult<Vec<RosterEntry>> {
        let users = sqlx::query_as::<_, RosterEntry>(
            "SELECT id, display_name FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn attendance_user_ids(&self, window: &DayWindow) -> StoreResult<Vec<u64>> {
        let ids = sqlx::query_scalar::<_, u64>(
            "SELECT DISTINCT user_id FROM attendance WHERE date BETWEEN ? AND ?",
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn approved_leave_user_ids(&self, window: &DayWindow) -> StoreResult<Vec<u64>> {
        let ids = sqlx::query_scalar::<_, u64>(
            r#"
            SELECT DISTINCT user_id
            FROM leave_requests
            WHERE status = ?
            AND start_date <= ?
            AND end_date >= ?
            "#,
        )
        .bind(LeaveStatus::Approved.as_ref())
        .bind(window.end)
        .bind(window.start)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn insert_attendance(
        &self,
        window: &DayWindow,
        records: &[NewAttendance],
    ) -> StoreResult<Vec<u64>> {
        insert_attendance(&self.pool, window, records).await
    }
}

/// Loads the singleton schedule row, if any.
pub async fn load_work_schedule(pool: &MySqlPool) -> StoreResult<Option<WorkSchedule>> {
    let row = sqlx::query_as::<_, WorkScheduleRow>(
        "SELECT work_days, work_start, late_after_minutes FROM work_schedule WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;

    row.map(WorkSchedule::try_from)
        .transpose()
        .map_err(StoreError::Corrupt)
}

/// Multi-row insert, chunked to stay under the placeholder limit. All chunks commit together.
///
/// The users' rows are locked in id order first, so a concurrent check-in either
/// commits before the re-check below or waits for this transaction.
pub async fn insert_attendance(
    pool: &MySqlPool,
    window: &DayWindow,
    records: &[NewAttendance],
) -> StoreResult<Vec<u64>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let mut ids: Vec<u64> = records.iter().map(|r| r.user_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut tx = pool.begin().await?;
    let mut recorded = HashSet::new();

    for chunk in ids.chunks(INSERT_CHUNK) {
        let mut lock = QueryBuilder::<MySql>::new("SELECT id FROM users WHERE id IN (");
        let mut list = lock.separated(", ");
        for id in chunk {
            list.push_bind(*id);
        }
        list.push_unseparated(") ORDER BY id FOR UPDATE");
        lock.build_query_scalar::<u64>()
            .fetch_all(&mut *tx)
            .await?;

        let mut existing = QueryBuilder::<MySql>::new(
            "SELECT DISTINCT user_id FROM attendance WHERE date BETWEEN ",
        );
        existing
            .push_bind(window.start)
            .push(" AND ")
            .push_bind(window.end)
            .push(" AND user_id IN (");
        let mut list = existing.separated(", ");
        for id in chunk {
            list.push_bind(*id);
        }
        list.push_unseparated(")");
        recorded.extend(
            existing
                .build_query_scalar::<u64>()
                .fetch_all(&mut *tx)
                .await?,
        );
    }

    let fresh: Vec<&NewAttendance> = records
        .iter()
        .filter(|r| !recorded.contains(&r.user_id))
        .collect();

    for chunk in fresh.chunks(INSERT_CHUNK) {
        let mut builder = QueryBuilder::<MySql>::new(
            "INSERT INTO attendance (user_id, date, check_in, check_out, hours, status, notes) ",
        );
        builder.push_values(chunk, |mut row, record| {
            row.push_bind(record.user_id)
                .push_bind(record.date)
                .push_bind(record.check_in)
                .push_bind(record.check_out)
                .push_bind(record.hours)
                .push_bind(record.status.as_ref())
                .push_bind(record.notes.as_deref());
        });
        builder.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(fresh.iter().map(|r| r.user_id).collect())
}
