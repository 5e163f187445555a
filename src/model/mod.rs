pub mod attendance;
pub mod calendar_day;
pub mod leave_request;
pub mod role;
pub mod user;
pub mod work_schedule;
