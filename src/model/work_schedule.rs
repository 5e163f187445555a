use std::collections::BTreeSet;

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Weekday numbers, 0 = Sunday .. 6 = Saturday.
pub const DEFAULT_WORK_DAYS: [u8; 5] = [1, 2, 3, 4, 5];
pub const DEFAULT_LATE_AFTER_MINUTES: u32 = 15;
pub const MAX_LATE_AFTER_MINUTES: u32 = 720;

/// The singleton work-schedule configuration, loaded once per use and passed explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkSchedule {
    #[schema(example = json!([1, 2, 3, 4, 5]), value_type = Vec<u8>)]
    pub work_days: BTreeSet<u8>,
    #[schema(example = "09:00", value_type = String)]
    #[serde(serialize_with = "serialize_hh_mm")]
    pub work_start: NaiveTime,
    #[schema(example = 15)]
    pub late_after_minutes: u32,
}

impl Default for WorkSchedule {
    fn default() -> Self {
        Self {
            work_days: DEFAULT_WORK_DAYS.into_iter().collect(),
            work_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            late_after_minutes: DEFAULT_LATE_AFTER_MINUTES,
        }
    }
}

impl WorkSchedule {
    /// `weekday` counts from Sunday = 0.
    pub fn is_work_day(&self, weekday: u8) -> bool {
        self.work_days.contains(&weekday)
    }

    /// Local time of day after which a check-in counts as late.
    pub fn late_cutoff(&self) -> NaiveTime {
        let (cutoff, wrapped) = self
            .work_start
            .overflowing_add_signed(Duration::minutes(self.late_after_minutes as i64));
        if wrapped != 0 {
            NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
        } else {
            cutoff
        }
    }

    pub fn work_days_column(&self) -> String {
        self.work_days
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn serialize_hh_mm<S: serde::Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&time.format("%H:%M").to_string())
}

/// Row shape of the `work_schedule` table.
#[derive(Debug, sqlx::FromRow)]
pub struct WorkScheduleRow {
    pub work_days: String,
    pub work_start: NaiveTime,
    pub late_after_minutes: u32,
}

impl TryFrom<WorkScheduleRow> for WorkSchedule {
    type Error = String;

    fn try_from(row: WorkScheduleRow) -> Result<Self, Self::Error> {
        Ok(Self {
            work_days: parse_work_days(&row.work_days)?,
            work_start: row.work_start,
            late_after_minutes: row.late_after_minutes,
        })
    }
}

/// Parses the stored comma separated weekday list, e.g. `"1,2,3,4,5"`.
pub fn parse_work_days(raw: &str) -> Result<BTreeSet<u8>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<u8>() {
            Ok(d) if d <= 6 => Ok(d),
            _ => Err(format!("invalid weekday `{s}` in work_days")),
        })
        .collect()
}

/// Body of `PUT /settings/work-schedule`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkSchedule {
    #[schema(example = json!([0, 1, 2, 3, 4]))]
    pub work_days: Vec<i64>,
    #[schema(example = "09:30")]
    pub work_start: Option<String>,
    #[schema(example = 10)]
    pub late_after_minutes: Option<u32>,
}

impl UpdateWorkSchedule {
    /// Validates the payload against the current schedule, filling omitted fields from it.
    pub fn apply_to(&self, current: &WorkSchedule) -> Result<WorkSchedule, String> {
        if self.work_days.is_empty() {
            return Err("workDays must contain at least one weekday".to_string());
        }
        let mut work_days = BTreeSet::new();
        for day in &self.work_days {
            match u8::try_from(*day) {
                Ok(d) if d <= 6 => {
                    work_days.insert(d);
                }
                _ => return Err(format!("workDays entries must be 0..=6, got {day}")),
            }
        }

        let work_start = match &self.work_start {
            Some(raw) => NaiveTime::parse_from_str(raw, "%H:%M")
                .map_err(|_| format!("workStart must be HH:MM, got `{raw}`"))?,
            None => current.work_start,
        };

        let late_after_minutes = self.late_after_minutes.unwrap_or(current.late_after_minutes);
        if late_after_minutes > MAX_LATE_AFTER_MINUTES {
            return Err(format!(
                "lateAfterMinutes must be at most {MAX_LATE_AFTER_MINUTES}"
            ));
        }

        Ok(WorkSchedule {
            work_days,
            work_start,
            late_after_minutes,
        })
    }
}
