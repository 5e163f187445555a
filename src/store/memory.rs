use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ReconcileStore, StoreResult};
use crate::calendar::DayWindow;
use crate::error::StoreError;
use crate::model::attendance::NewAttendance;
use crate::model::leave_request::LeaveStatus;
use crate::model::user::RosterEntry;
use crate::model::work_schedule::WorkSchedule;

#[derive(Debug, Clone)]
pub struct StoredLeave {
    pub user_id: u64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: LeaveStatus,
}

#[derive(Default)]
struct State {
    schedule: Option<WorkSchedule>,
    holidays: Vec<DateTime<Utc>>,
    special_days: Vec<DateTime<Utc>>,
    users: Vec<RosterEntry>,
    attendance: Vec<NewAttendance>,
    /// Committed by someone else between the job's reads and its write.
    concurrent_check_ins: Vec<NewAttendance>,
    leaves: Vec<StoredLeave>,
    insert_calls: usize,
    fail_reads: bool,
    fail_inserts: bool,
}

/// In-process store for exercising the reconciliation without a database.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schedule(self, schedule: WorkSchedule) -> Self {
        self.state.lock().unwrap().schedule = Some(schedule);
        self
    }

    pub fn with_user(self, id: u64, name: &str) -> Self {
        self.state.lock().unwrap().users.push(RosterEntry {
            id,
            display_name: name.to_string(),
        });
        self
    }

    pub fn with_holiday(self, date: DateTime<Utc>) -> Self {
        self.state.lock().unwrap().holidays.push(date);
        self
    }

    pub fn with_special_day(self, date: DateTime<Utc>) -> Self {
        self.state.lock().unwrap().special_days.push(date);
        self
    }

    pub fn with_attendance(self, record: NewAttendance) -> Self {
        self.state.lock().unwrap().attendance.push(record);
        self
    }

    pub fn with_check_in_during_insert(self, record: NewAttendance) -> Self {
        self.state.lock().unwrap().concurrent_check_ins.push(record);
        self
    }

    pub fn with_leave(
        self,
        user_id: u64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: LeaveStatus,
    ) -> Self {
        self.state.lock().unwrap().leaves.push(StoredLeave {
            user_id,
            start,
            end,
            status,
        });
        self
    }

    pub fn failing_reads(self) -> Self {
        self.state.lock().unwrap().fail_reads = true;
        self
    }

    pub fn failing_inserts(self) -> Self {
        self.state.lock().unwrap().fail_inserts = true;
        self
    }

    pub fn attendance(&self) -> Vec<NewAttendance> {
        self.state.lock().unwrap().attendance.clone()
    }

    pub fn insert_calls(&self) -> usize {
        self.state.lock().unwrap().insert_calls
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> StoreResult<T> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(f(&state))
    }
}

#[async_trait]
impl ReconcileStore for MemoryStore {
    async fn work_schedule(&self) -> StoreResult<Option<WorkSchedule>> {
        self.read(|s| s.schedule.clone())
    }

    async fn special_working_day_exists(&self, window: &DayWindow) -> StoreResult<bool> {
        self.read(|s| s.special_days.iter().any(|d| window.contains(*d)))
    }

    async fn holiday_exists(&self, window: &DayWindow) -> StoreResult<bool> {
        self.read(|s| s.holidays.iter().any(|d| window.contains(*d)))
    }

    async fn list_users(&self) -> StoreResult<Vec<RosterEntry>> {
        self.read(|s| s.users.clone())
    }

    async fn attendance_user_ids(&self, window: &DayWindow) -> StoreResult<Vec<u64>> {
        self.read(|s| {
            s.attendance
                .iter()
                .filter(|a| window.contains(a.date))
                .map(|a| a.user_id)
                .collect()
        })
    }

    async fn approved_leave_user_ids(&self, window: &DayWindow) -> StoreResult<Vec<u64>> {
        self.read(|s| {
            s.leaves
                .iter()
                .filter(|l| l.status == LeaveStatus::Approved && window.overlaps(l.start, l.end))
                .map(|l| l.user_id)
                .collect()
        })
    }

    async fn insert_attendance(
        &self,
        window: &DayWindow,
        records: &[NewAttendance],
    ) -> StoreResult<Vec<u64>> {
        let mut state = self.state.lock().unwrap();
        state.insert_calls += 1;
        if state.fail_inserts {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }

        let concurrent = std::mem::take(&mut state.concurrent_check_ins);
        state.attendance.extend(concurrent);

        let recorded: HashSet<u64> = state
            .attendance
            .iter()
            .filter(|a| window.contains(a.date))
            .map(|a| a.user_id)
            .collect();
        let fresh: Vec<NewAttendance> = records
            .iter()
            .filter(|r| !recorded.contains(&r.user_id))
            .cloned()
            .collect();
        let written = fresh.iter().map(|r| r.user_id).collect();
        state.attendance.extend(fresh);
        Ok(written)
    }
}
