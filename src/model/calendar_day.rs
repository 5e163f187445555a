use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Which override table a calendar day lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    /// Non-working regardless of the weekly schedule.
    Holiday,
    /// Working regardless of the weekly schedule or a holiday.
    SpecialWorkingDay,
}

impl OverrideKind {
    pub fn table(self) -> &'static str {
        match self {
            OverrideKind::Holiday => "holidays",
            OverrideKind::SpecialWorkingDay => "special_working_days",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OverrideKind::Holiday => "Holiday",
            OverrideKind::SpecialWorkingDay => "Special working day",
        }
    }
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct CalendarDay {
    #[schema(example = 1)]
    pub id: u64,
    /// Local midnight of the day, stored in UTC
    #[schema(example = "2026-03-25T18:00:00Z", format = "date-time", value_type = String)]
    pub date: DateTime<Utc>,
    #[schema(example = "Independence Day")]
    pub name: String,
}
