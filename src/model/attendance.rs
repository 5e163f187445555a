use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

pub const LEAVE_NOTE: &str = "Auto-marked on leave (Approved Leave)";
pub const ABSENT_NOTE: &str = "Auto-marked absent by system";

/// Hours credited for a day covered by approved leave.
pub const LEAVE_HOURS: f64 = 8.0;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    Leave,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub user_id: u64,
    #[schema(example = "2026-01-05T03:02:11Z", format = "date-time", value_type = String)]
    pub date: DateTime<Utc>,
    #[schema(example = "2026-01-05T03:02:11Z", format = "date-time", value_type = String, nullable = true)]
    pub check_in: Option<DateTime<Utc>>,
    #[schema(example = "2026-01-05T11:30:00Z", format = "date-time", value_type = String, nullable = true)]
    pub check_out: Option<DateTime<Utc>>,
    #[schema(example = 8.46)]
    pub hours: f64,
    #[schema(example = "present", value_type = String)]
    pub status: String,
    #[schema(nullable = true)]
    pub notes: Option<String>,
}

/// A record about to be written; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendance {
    pub user_id: u64,
    pub date: DateTime<Utc>,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub hours: f64,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

impl NewAttendance {
    pub fn on_leave(user_id: u64, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            date: now,
            check_in: None,
            check_out: None,
            hours: LEAVE_HOURS,
            status: AttendanceStatus::Leave,
            notes: Some(LEAVE_NOTE.to_string()),
        }
    }

    pub fn absent(user_id: u64, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            date: now,
            check_in: None,
            check_out: None,
            hours: 0.0,
            status: AttendanceStatus::Absent,
            notes: Some(ABSENT_NOTE.to_string()),
        }
    }

    pub fn checked_in(user_id: u64, now: DateTime<Utc>, status: AttendanceStatus) -> Self {
        Self {
            user_id,
            date: now,
            check_in: Some(now),
            check_out: None,
            hours: 0.0,
            status,
            notes: None,
        }
    }
}

/// Worked hours between check-in and check-out, rounded to two decimals.
pub fn worked_hours(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> f64 {
    let seconds = (check_out - check_in).num_seconds().max(0) as f64;
    (seconds / 3600.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_strings_match_stored_values() {
        assert_eq!(AttendanceStatus::Leave.as_ref(), "leave");
        assert_eq!(AttendanceStatus::Absent.to_string(), "absent");
        assert_eq!("late".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::Late);
        assert!("missing".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn auto_marked_records_carry_fixed_hours_and_notes() {
        let now = Utc.with_ymd_and_hms(2026, 1, 7, 12, 0, 0).unwrap();

        let leave = NewAttendance::on_leave(7, now);
        assert_eq!(leave.hours, 8.0);
        assert_eq!(leave.status, AttendanceStatus::Leave);
        assert_eq!(leave.notes.as_deref(), Some("Auto-marked on leave (Approved Leave)"));
        assert!(leave.check_in.is_none() && leave.check_out.is_none());

        let absent = NewAttendance::absent(8, now);
        assert_eq!(absent.hours, 0.0);
        assert_eq!(absent.status, AttendanceStatus::Absent);
        assert_eq!(absent.notes.as_deref(), Some("Auto-marked absent by system"));
        assert_eq!(absent.date, now);
    }

    #[test]
    fn worked_hours_rounds_to_two_decimals() {
        let check_in = Utc.with_ymd_and_hms(2026, 1, 7, 3, 0, 0).unwrap();
        let check_out = Utc.with_ymd_and_hms(2026, 1, 7, 11, 20, 0).unwrap();
        assert_eq!(worked_hours(check_in, check_out), 8.33);
        assert_eq!(worked_hours(check_out, check_in), 0.0);
    }
}
