use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    api::date_window,
    config::Config,
    error::{ApiError, internal, is_duplicate_key},
    model::{
        calendar_day::{CalendarDay, OverrideKind},
        work_schedule::{UpdateWorkSchedule, WorkSchedule},
    },
    store::mysql::load_work_schedule,
};

const MAX_NAME_LEN: usize = 128;

#[derive(Deserialize, ToSchema)]
pub struct CreateCalendarDay {
    /// Local calendar date
    #[schema(example = "2026-03-26", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "Independence Day")]
    pub name: String,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct CalendarDayQuery {
    /// Only days within this calendar year
    #[schema(example = 2026)]
    pub year: Option<i32>,
}

async fn current_schedule(pool: &MySqlPool) -> Result<WorkSchedule, ApiError> {
    load_work_schedule(pool)
        .await
        .map(Option::unwrap_or_default)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load work schedule");
            ApiError::Internal
        })
}

/// Current weekly schedule, or the Monday-Friday default
#[utoipa::path(
    get,
    path = "/api/settings/work-schedule",
    responses(
        (status = 200, description = "Work schedule", body = WorkSchedule),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Settings"
)]
pub async fn get_work_schedule(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(current_schedule(pool.get_ref()).await?))
}

/// Replace the weekly schedule (Admin)
#[utoipa::path(
    put,
    path = "/api/settings/work-schedule",
    request_body = UpdateWorkSchedule,
    responses(
        (status = 200, description = "Updated work schedule", body = WorkSchedule),
        (status = 400, description = "Invalid schedule"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Settings"
)]
pub async fn update_work_schedule(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<UpdateWorkSchedule>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let current = current_schedule(pool.get_ref()).await?;
    let schedule = payload.apply_to(&current).map_err(ApiError::BadRequest)?;

    sqlx::query(
        r#"
        INSERT INTO work_schedule (id, work_days, work_start, late_after_minutes)
        VALUES (1, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            work_days = VALUES(work_days),
            work_start = VALUES(work_start),
            late_after_minutes = VALUES(late_after_minutes)
        "#,
    )
    .bind(schedule.work_days_column())
    .bind(schedule.work_start)
    .bind(schedule.late_after_minutes)
    .execute(pool.get_ref())
    .await
    .map_err(internal("Failed to save work schedule"))?;

    info!(
        user_id = auth.user_id,
        work_days = %schedule.work_days_column(),
        "Work schedule updated"
    );

    Ok(HttpResponse::Ok().json(schedule))
}

async fn list_days(
    pool: &MySqlPool,
    config: &Config,
    kind: OverrideKind,
    year: Option<i32>,
) -> Result<HttpResponse, ApiError> {
    let mut sql = format!("SELECT id, date, name FROM {}", kind.table());

    let range = match year {
        Some(year) => {
            let first = NaiveDate::from_ymd_opt(year, 1, 1);
            let last = NaiveDate::from_ymd_opt(year, 12, 31);
            match (first, last) {
                (Some(first), Some(last)) => Some((
                    date_window(first, config.utc_offset)?.start,
                    date_window(last, config.utc_offset)?.end,
                )),
                _ => return Err(ApiError::BadRequest(format!("Invalid year {year}"))),
            }
        }
        None => None,
    };
    if range.is_some() {
        sql.push_str(" WHERE date BETWEEN ? AND ?");
    }
    sql.push_str(" ORDER BY date");

    let mut query = sqlx::query_as::<_, CalendarDay>(&sql);
    if let Some((start, end)) = range {
        query = query.bind(start).bind(end);
    }

    let days = query.fetch_all(pool).await.map_err(|e| {
        tracing::error!(error = %e, table = kind.table(), "Failed to list calendar days");
        ApiError::Internal
    })?;

    Ok(HttpResponse::Ok().json(days))
}

async fn create_day(
    pool: &MySqlPool,
    config: &Config,
    kind: OverrideKind,
    payload: &CreateCalendarDay,
) -> Result<HttpResponse, ApiError> {
    let name = payload.name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "name must be 1..={MAX_NAME_LEN} characters"
        )));
    }

    let date = date_window(payload.date, config.utc_offset)?.start;
    let sql = format!("INSERT INTO {} (date, name) VALUES (?, ?)", kind.table());

    let result = sqlx::query(&sql)
        .bind(date)
        .bind(name)
        .execute(pool)
        .await;

    match result {
        Ok(done) => {
            info!(table = kind.table(), date = %payload.date, "Calendar day added");
            Ok(HttpResponse::Created().json(CalendarDay {
                id: done.last_insert_id(),
                date,
                name: name.to_string(),
            }))
        }
        Err(e) if is_duplicate_key(&e) => Err(ApiError::Conflict(format!(
            "{} already exists for {}",
            kind.label(),
            payload.date
        ))),
        Err(e) => Err(internal("Failed to add calendar day")(e)),
    }
}

async fn delete_day(pool: &MySqlPool, kind: OverrideKind, id: u64) -> Result<HttpResponse, ApiError> {
    let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());

    let result = sqlx::query(&sql)
        .bind(id)
        .execute(pool)
        .await
        .map_err(internal("Failed to delete calendar day"))?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("{} not found", kind.label())));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted"
    })))
}

#[utoipa::path(
    get,
    path = "/api/settings/holidays",
    params(CalendarDayQuery),
    responses(
        (status = 200, description = "Holidays ordered by date", body = Vec<CalendarDay>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Settings"
)]
pub async fn list_holidays(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<CalendarDayQuery>,
) -> Result<HttpResponse, ApiError> {
    list_days(pool.get_ref(), &config, OverrideKind::Holiday, query.year).await
}

#[utoipa::path(
    post,
    path = "/api/settings/holidays",
    request_body = CreateCalendarDay,
    responses(
        (status = 201, description = "Holiday created", body = CalendarDay),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "A holiday already exists on that date")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Settings"
)]
pub async fn create_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateCalendarDay>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    create_day(pool.get_ref(), &config, OverrideKind::Holiday, &payload).await
}

#[utoipa::path(
    delete,
    path = "/api/settings/holidays/{id}",
    params(
        ("id" = u64, Path, description = "Holiday ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Holiday not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Settings"
)]
pub async fn delete_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    delete_day(pool.get_ref(), OverrideKind::Holiday, path.into_inner()).await
}

#[utoipa::path(
    get,
    path = "/api/settings/special-days",
    params(CalendarDayQuery),
    responses(
        (status = 200, description = "Special working days ordered by date", body = Vec<CalendarDay>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Settings"
)]
pub async fn list_special_days(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<CalendarDayQuery>,
) -> Result<HttpResponse, ApiError> {
    list_days(pool.get_ref(), &config, OverrideKind::SpecialWorkingDay, query.year).await
}

#[utoipa::path(
    post,
    path = "/api/settings/special-days",
    request_body = CreateCalendarDay,
    responses(
        (status = 201, description = "Special working day created", body = CalendarDay),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "A special working day already exists on that date")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Settings"
)]
pub async fn create_special_day(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateCalendarDay>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    create_day(pool.get_ref(), &config, OverrideKind::SpecialWorkingDay, &payload).await
}

#[utoipa::path(
    delete,
    path = "/api/settings/special-days/{id}",
    params(
        ("id" = u64, Path, description = "Special working day ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Special working day not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Settings"
)]
pub async fn delete_special_day(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    delete_day(pool.get_ref(), OverrideKind::SpecialWorkingDay, path.into_inner()).await
}
