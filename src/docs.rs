use crate::api::attendance::{AttendanceListResponse, AttendanceQuery};
use crate::api::leave_request::{CreateLeave, LeaveFilter, LeaveListResponse};
use crate::api::settings::{CalendarDayQuery, CreateCalendarDay};
use crate::jobs::mark_absent::ReconcileSummary;
use crate::model::attendance::{Attendance, AttendanceStatus};
use crate::model::calendar_day::CalendarDay;
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use crate::model::work_schedule::{UpdateWorkSchedule, WorkSchedule};
use crate::models::{LoginReqDto, RegisterReqDto, TokenPair};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HR Attendance API",
        version = "1.0.0",
        description = r#"
## HR Attendance Service

Attendance, leave and working-calendar backend for an HR web application.

### 🔹 Key Features
- **Attendance**
  - Daily check-in and check-out with late detection
- **Leave Management**
  - Apply for leave, approve/reject requests, and view leave history
- **Working Calendar**
  - Weekly work schedule, holidays and special working days
- **Daily Reconciliation**
  - `/cron/mark-absent` marks every user without attendance as absent or on leave

### 🔐 Security
Endpoints under `/api` require a **JWT Bearer** access token.
The reconciliation trigger accepts the scheduler's shared secret or an admin token.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::list_attendance,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,

        crate::api::settings::get_work_schedule,
        crate::api::settings::update_work_schedule,
        crate::api::settings::list_holidays,
        crate::api::settings::create_holiday,
        crate::api::settings::delete_holiday,
        crate::api::settings::list_special_days,
        crate::api::settings::create_special_day,
        crate::api::settings::delete_special_day,

        crate::api::cron::mark_absent
    ),
    components(
        schemas(
            RegisterReqDto,
            LoginReqDto,
            TokenPair,
            Attendance,
            AttendanceStatus,
            AttendanceQuery,
            AttendanceListResponse,
            LeaveRequest,
            LeaveStatus,
            LeaveType,
            LeaveFilter,
            CreateLeave,
            LeaveListResponse,
            WorkSchedule,
            UpdateWorkSchedule,
            CalendarDay,
            CreateCalendarDay,
            CalendarDayQuery,
            ReconcileSummary
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and token APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Settings", description = "Work schedule and calendar APIs"),
        (name = "Jobs", description = "Scheduled job triggers"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_trigger_and_security_scheme() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert!(doc["paths"]["/cron/mark-absent"]["post"].is_object());
        assert!(doc["paths"]["/api/settings/holidays"]["get"].is_object());
        assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
    }
}
