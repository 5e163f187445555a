use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use crate::calendar::DayWindow;
use crate::error::ApiError;

pub mod attendance;
pub mod cron;
pub mod leave_request;
pub mod settings;

/// Window of a client supplied date; dates without one are rejected.
pub fn date_window(date: NaiveDate, offset: FixedOffset) -> Result<DayWindow, ApiError> {
    DayWindow::for_date(date, offset)
        .ok_or_else(|| ApiError::BadRequest(format!("Date {date} is out of range")))
}

/// Window of the server's current day.
pub fn today_window(now: DateTime<Utc>, offset: FixedOffset) -> Result<DayWindow, ApiError> {
    DayWindow::containing(now, offset).ok_or_else(|| {
        tracing::error!(%now, "Current instant has no local day");
        ApiError::Internal
    })
}
