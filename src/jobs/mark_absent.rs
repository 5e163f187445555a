//! Daily attendance reconciliation.
//!
//! Every user without an attendance record for the current local day gets one:
//! `leave` when an approved leave covers the day, `absent` otherwise. Nothing
//! is written on non-working days.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use futures::lock::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::calendar::{DayWindow, is_working_day, stored_instant};
use crate::error::StoreError;
use crate::model::attendance::NewAttendance;
use crate::model::user::RosterEntry;
use crate::store::ReconcileStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub success: bool,
    #[schema(example = "Marked 1 users as absent and 1 users as on leave")]
    pub message: String,
    pub is_working_day: bool,
    #[schema(example = 1)]
    pub marked_absent: usize,
    #[schema(example = 1)]
    pub marked_leave: usize,
    #[schema(value_type = Vec<Object>, example = json!([{"id": 3, "name": "Carol"}]))]
    pub absent_users: Vec<RosterEntry>,
    #[schema(value_type = Vec<Object>, example = json!([{"id": 2, "name": "Bob"}]))]
    pub leave_users: Vec<RosterEntry>,
}

impl ReconcileSummary {
    fn not_working_day() -> Self {
        Self {
            success: true,
            message: "Today is not a working day. No records created.".to_string(),
            is_working_day: false,
            marked_absent: 0,
            marked_leave: 0,
            absent_users: Vec::new(),
            leave_users: Vec::new(),
        }
    }

    fn all_recorded() -> Self {
        Self {
            message: "All users already have attendance records for today".to_string(),
            is_working_day: true,
            ..Self::not_working_day()
        }
    }

    fn marked(classification: Classification) -> Self {
        Self {
            success: true,
            message: format!(
                "Marked {} users as absent and {} users as on leave",
                classification.absent.len(),
                classification.leave.len()
            ),
            is_working_day: true,
            marked_absent: classification.absent.len(),
            marked_leave: classification.leave.len(),
            absent_users: classification.absent,
            leave_users: classification.leave,
        }
    }
}

/// Users still lacking an attendance record, split by outcome.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Classification {
    pub leave: Vec<RosterEntry>,
    pub absent: Vec<RosterEntry>,
}

impl Classification {
    /// Keeps only the users whose record was written.
    pub fn retain_written(&mut self, written: &HashSet<u64>) {
        self.leave.retain(|u| written.contains(&u.id));
        self.absent.retain(|u| written.contains(&u.id));
    }

    pub fn records(&self, now: DateTime<Utc>) -> Vec<NewAttendance> {
        self.leave
            .iter()
            .map(|u| NewAttendance::on_leave(u.id, now))
            .chain(self.absent.iter().map(|u| NewAttendance::absent(u.id, now)))
            .collect()
    }
}

/// Roster minus every user that already owns a record today, whatever its status.
pub fn users_without_attendance(roster: Vec<RosterEntry>, recorded: &[u64]) -> Vec<RosterEntry> {
    let recorded: HashSet<u64> = recorded.iter().copied().collect();
    roster
        .into_iter()
        .filter(|user| !recorded.contains(&user.id))
        .collect()
}

pub fn classify(pending: Vec<RosterEntry>, on_leave: &[u64]) -> Classification {
    let on_leave: HashSet<u64> = on_leave.iter().copied().collect();
    let (leave, absent) = pending
        .into_iter()
        .partition(|user| on_leave.contains(&user.id));
    Classification { leave, absent }
}

/// One reconciliation pass for the local day containing `now`.
pub async fn reconcile(
    store: &dyn ReconcileStore,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<ReconcileSummary, StoreError> {
    let now = stored_instant(now);
    let window = DayWindow::containing(now, offset).ok_or(StoreError::OutOfRange(now))?;

    let (schedule, special_day, holiday) = futures::try_join!(
        store.work_schedule(),
        store.special_working_day_exists(&window),
        store.holiday_exists(&window),
    )?;
    let schedule = schedule.unwrap_or_default();

    if !is_working_day(&schedule, window.weekday(), special_day, holiday) {
        info!(date = %window.date, special_day, holiday, "Not a working day, skipping reconciliation");
        return Ok(ReconcileSummary::not_working_day());
    }

    let (roster, recorded) =
        futures::try_join!(store.list_users(), store.attendance_user_ids(&window))?;
    let roster_size = roster.len();
    let pending = users_without_attendance(roster, &recorded);

    if pending.is_empty() {
        info!(date = %window.date, roster_size, "Every user already has attendance today");
        return Ok(ReconcileSummary::all_recorded());
    }

    let on_leave = store.approved_leave_user_ids(&window).await?;
    let mut classification = classify(pending, &on_leave);
    let records = classification.records(now);

    if !records.is_empty() {
        let written: HashSet<u64> = store
            .insert_attendance(&window, &records)
            .await?
            .into_iter()
            .collect();
        if written.len() < records.len() {
            warn!(
                skipped = records.len() - written.len(),
                "Users recorded attendance during reconciliation, their records were kept"
            );
        }
        debug!(written = written.len(), "Attendance batch written");
        classification.retain_written(&written);
    }

    let summary = ReconcileSummary::marked(classification);
    info!(
        date = %window.date,
        marked_absent = summary.marked_absent,
        marked_leave = summary.marked_leave,
        "Attendance reconciliation finished"
    );
    Ok(summary)
}

/// Shared handle that runs at most one reconciliation at a time in this process.
pub struct MarkAbsentJob {
    store: Arc<dyn ReconcileStore>,
    offset: FixedOffset,
    running: Mutex<()>,
}

impl MarkAbsentJob {
    pub fn new(store: Arc<dyn ReconcileStore>, offset: FixedOffset) -> Self {
        Self {
            store,
            offset,
            running: Mutex::new(()),
        }
    }

    /// Overlapping calls queue up; a later call sees the records of an earlier one.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<ReconcileSummary, StoreError> {
        let _running = self.running.lock().await;
        reconcile(self.store.as_ref(), now, self.offset).await
    }
}
