use crate::api::dashboard::RolloverResponse;
use crate::api::employee::{CreateEmployee, EmployeeListResponse, UpdateEmployee};
use crate::api::leave_request::{CreateLeave, LeaveListResponse, LeaveQuery};
use crate::api::public_holiday::{CreateHoliday, ImportHolidays};
use crate::api::special_leave::CreateSpecialLeaveType;
use crate::model::employee::Employee;
use crate::model::leave_request::LeaveResponse;
use crate::model::public_holiday::PublicHoliday;
use crate::model::special_leave::SpecialLeaveType;
use crate::models::{LoginReqDto, UserReq};
use crate::repo::leave_repo::{ApprovedLeaveRow, CalendarEntry};
use crate::repo::special_leave_repo::UsageReportRow;
use crate::service::reporting::{
    Dashboard, ExistingRange, MonthCalendar, MySummary, Remaining, SpecialUsageView, YearTotal,
};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave Tracker API",
        version = "1.0.0",
        description = r#"
## Leave Tracker

Holiday and leave management for an organisation.

### 🔹 Key Features
- **Leave requests**
  - Submit, approve, reject and delete requests; working days are counted
    excluding weekends and the employee's public holidays
- **Balances**
  - Yearly entitlement credited once per year, unused days carry over
- **Special leave**
  - Typed leave with a yearly cap per employee
- **Public holidays**
  - Maintained per country, importable from Calendarific
- **Reports**
  - CSV export, monthly calendar, special leave usage

### 🔐 Security
Endpoints under `/api` require a **JWT Bearer** access token obtained from `/auth/login`.
What a caller may see or decide depends on the capabilities of their role.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::delete_leave,
        crate::api::leave_request::my_leave,
        crate::api::leave_request::existing_leave,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::remaining_holidays,
        crate::api::employee::total_holidays,

        crate::api::special_leave::list_types,
        crate::api::special_leave::create_type,
        crate::api::special_leave::own_usage,
        crate::api::special_leave::usage_report,

        crate::api::public_holiday::list_holidays,
        crate::api::public_holiday::create_holiday,
        crate::api::public_holiday::import_holidays,

        crate::api::report::export_holidays,
        crate::api::report::calendar,
        crate::api::report::approved,

        crate::api::dashboard::dashboard,
        crate::api::dashboard::run_rollover
    ),
    components(
        schemas(
            UserReq,
            LoginReqDto,
            CreateLeave,
            LeaveQuery,
            LeaveResponse,
            LeaveListResponse,
            MySummary,
            ExistingRange,
            CreateEmployee,
            UpdateEmployee,
            Employee,
            EmployeeListResponse,
            Remaining,
            YearTotal,
            SpecialLeaveType,
            CreateSpecialLeaveType,
            SpecialUsageView,
            UsageReportRow,
            PublicHoliday,
            CreateHoliday,
            ImportHolidays,
            ApprovedLeaveRow,
            CalendarEntry,
            MonthCalendar,
            Dashboard,
            RolloverResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Leave", description = "Leave request lifecycle APIs"),
        (name = "Employee", description = "Employee management and balances"),
        (name = "Special Leave", description = "Special leave types and usage"),
        (name = "Public Holidays", description = "Country public holiday calendars"),
        (name = "Reports", description = "Exports and overviews"),
        (name = "Dashboard", description = "Dashboard and annual rollover"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
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
    fn openapi_documents_bearer_scheme_and_leave_paths() {
        let doc = ApiDoc::openapi();
        let components = doc.components.as_ref().unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(doc.paths.paths.contains_key("/api/leave/{leave_id}/approve"));
        assert!(doc.paths.paths.contains_key("/api/reports/export"));
    }
}
