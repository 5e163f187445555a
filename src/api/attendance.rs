use actix_web::{HttpResponse, web};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    api::{date_window, today_window},
    calendar::stored_instant,
    config::Config,
    error::{ApiError, internal},
    model::{
        attendance::{Attendance, AttendanceStatus, NewAttendance, worked_hours},
        work_schedule::WorkSchedule,
    },
    store::mysql::load_work_schedule,
};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct AttendanceQuery {
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u32>,
    /// Items per page, at most 100
    #[schema(example = 20)]
    pub per_page: Option<u32>,
    /// First local date to include
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    #[param(value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    /// Last local date to include
    #[schema(example = "2026-01-31", format = "date", value_type = Option<String>)]
    #[param(value_type = Option<String>)]
    pub to: Option<NaiveDate>,
    /// Ignored for employees, who only see their own records
    #[schema(example = 1000)]
    pub user_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<Attendance>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

/// `late` once the local time is past the schedule's start plus grace minutes.
pub fn check_in_status(
    now: DateTime<Utc>,
    offset: FixedOffset,
    schedule: &WorkSchedule,
) -> AttendanceStatus {
    if now.with_timezone(&offset).time() > schedule.late_cutoff() {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 200, description = "Checked in successfully", body = Object, example = json!({
            "message": "Checked in successfully",
            "status": "present"
        })),
        (status = 400, description = "Attendance already recorded today", body = Object, example = json!({
            "message": "Attendance already recorded for today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let now = stored_instant(Utc::now());
    let window = today_window(now, config.utc_offset)?;
    let schedule = load_work_schedule(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load work schedule");
            ApiError::Internal
        })?
        .unwrap_or_default();

    let mut tx = pool
        .begin()
        .await
        .map_err(internal("Failed to open check-in transaction"))?;

    // serializes concurrent check-ins of the same user
    sqlx::query("SELECT id FROM users WHERE id = ? FOR UPDATE")
        .bind(auth.user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(internal("Failed to lock user for check-in"))?
        .ok_or_else(|| ApiError::Unauthorized("Unknown user".into()))?;

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM attendance WHERE user_id = ? AND date BETWEEN ? AND ?",
    )
    .bind(auth.user_id)
    .bind(window.start)
    .bind(window.end)
    .fetch_one(&mut *tx)
    .await
    .map_err(internal("Failed to look up today's attendance"))?;

    if existing > 0 {
        return Err(ApiError::BadRequest(
            "Attendance already recorded for today".into(),
        ));
    }

    let record = NewAttendance::checked_in(
        auth.user_id,
        now,
        check_in_status(now, config.utc_offset, &schedule),
    );

    sqlx::query(
        r#"
        INSERT INTO attendance (user_id, date, check_in, hours, status)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.user_id)
    .bind(record.date)
    .bind(record.check_in)
    .bind(record.hours)
    .bind(record.status.as_ref())
    .execute(&mut *tx)
    .await
    .map_err(internal("Check-in failed"))?;

    tx.commit()
        .await
        .map_err(internal("Failed to commit check-in"))?;

    info!(user_id = auth.user_id, status = %record.status, "Checked in");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked in successfully",
        "status": record.status
    })))
}

#[derive(sqlx::FromRow)]
struct OpenCheckIn {
    id: u64,
    check_in: DateTime<Utc>,
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/attendance/check-out",
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "message": "Checked out successfully",
            "hours": 8.25
        })),
        (status = 400, description = "No active check-in found for today", body = Object, example = json!({
            "message": "No active check-in found for today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let now = stored_instant(Utc::now());
    let window = today_window(now, config.utc_offset)?;

    let open = sqlx::query_as::<_, OpenCheckIn>(
        r#"
        SELECT id, check_in
        FROM attendance
        WHERE user_id = ?
        AND date BETWEEN ? AND ?
        AND check_in IS NOT NULL
        AND check_out IS NULL
        ORDER BY date DESC
        LIMIT 1
        "#,
    )
    .bind(auth.user_id)
    .bind(window.start)
    .bind(window.end)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(internal("Failed to find open check-in"))?
    .ok_or_else(|| ApiError::BadRequest("No active check-in found for today".into()))?;

    let hours = worked_hours(open.check_in, now);

    let result = sqlx::query(
        "UPDATE attendance SET check_out = ?, hours = ? WHERE id = ? AND check_out IS NULL",
    )
    .bind(now)
    .bind(hours)
    .bind(open.id)
    .execute(pool.get_ref())
    .await
    .map_err(internal("Check-out failed"))?;

    if result.rows_affected() == 0 {
        return Err(ApiError::BadRequest(
            "No active check-in found for today".into(),
        ));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked out successfully",
        "hours": hours
    })))
}

/// Attendance history
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Paginated attendance list", body = AttendanceListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, ApiError> {
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let mut conditions = Vec::new();
    let mut user_filter = None;
    let mut from = None;
    let mut to = None;

    if let Some(user_id) = auth.scope_user_filter(query.user_id) {
        conditions.push("user_id = ?");
        user_filter = Some(user_id);
    }
    if let Some(date) = query.from {
        conditions.push("date >= ?");
        from = Some(date_window(date, config.utc_offset)?.start);
    }
    if let Some(date) = query.to {
        conditions.push("date <= ?");
        to = Some(date_window(date, config.utc_offset)?.end);
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM attendance {}", where_clause);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(v) = user_filter {
        count_q = count_q.bind(v);
    }
    for bound in [from, to].into_iter().flatten() {
        count_q = count_q.bind(bound);
    }
    let total = count_q
        .fetch_one(pool.get_ref())
        .await
        .map_err(internal("Failed to count attendance"))?;

    let data_sql = format!(
        r#"
        SELECT id, user_id, date, check_in, check_out, hours, status, notes
        FROM attendance
        {}
        ORDER BY date DESC
        LIMIT ? OFFSET ?
        "#,
        where_clause
    );
    let mut data_q = sqlx::query_as::<_, Attendance>(&data_sql);
    if let Some(v) = user_filter {
        data_q = data_q.bind(v);
    }
    for bound in [from, to].into_iter().flatten() {
        data_q = data_q.bind(bound);
    }
    let data = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(internal("Failed to fetch attendance"))?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};

    #[test]
    fn check_in_after_grace_is_late() {
        let schedule = WorkSchedule::default(); // 09:00 + 15 min
        let utc = FixedOffset::east_opt(0).unwrap();
        let at = |h, m| Utc.with_ymd_and_hms(2026, 1, 7, h, m, 0).unwrap();

        assert_eq!(check_in_status(at(8, 55), utc, &schedule), AttendanceStatus::Present);
        assert_eq!(check_in_status(at(9, 15), utc, &schedule), AttendanceStatus::Present);
        assert_eq!(check_in_status(at(9, 16), utc, &schedule), AttendanceStatus::Late);
    }

    #[test]
    fn lateness_uses_local_time() {
        let schedule = WorkSchedule {
            work_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            late_after_minutes: 0,
            ..WorkSchedule::default()
        };
        let dhaka = FixedOffset::east_opt(6 * 3600).unwrap();
        // 02:30 UTC is 08:30 in Dhaka
        let now = Utc.with_ymd_and_hms(2026, 1, 7, 2, 30, 0).unwrap();
        assert_eq!(check_in_status(now, dhaka, &schedule), AttendanceStatus::Present);
        let now = Utc.with_ymd_and_hms(2026, 1, 7, 3, 30, 0).unwrap();
        assert_eq!(check_in_status(now, dhaka, &schedule), AttendanceStatus::Late);
    }
}
