//! Read-side views: personal summaries, per-employee totals, exports and calendars.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::domain::authz::{Actor, Capability, Scope};
use crate::domain::lifecycle::{LeaveRequest, LeaveStatus};
use crate::domain::rollover::taken_days;
use crate::error::{AppError, AppResult};
use crate::export;
use crate::model::employee::Employee;
use crate::model::leave_request::LeaveResponse;
use crate::model::public_holiday::PublicHoliday;
use crate::model::special_leave::SpecialLeaveType;
use crate::repo::leave_repo::{self, ApprovedLeaveRow, CalendarEntry, LeaveFilter};
use crate::repo::special_leave_repo::{self, UsageReportRow};
use crate::repo::{employee_repo, public_holiday_repo};

async fn load_employee(pool: &MySqlPool, employee_id: u64) -> AppResult<Employee> {
    employee_repo::find(pool, employee_id)
        .await?
        .ok_or(AppError::NotFound("Employee"))
}

fn ensure_in_scope(scope: Scope, employee: &Employee) -> AppResult<()> {
    if scope.includes(employee) {
        Ok(())
    } else {
        Err(AppError::forbidden("You don't manage this employee."))
    }
}

/// Employee visible to the actor through the all/managed employee capabilities.
pub async fn visible_employee(
    pool: &MySqlPool,
    actor: &Actor,
    employee_id: u64,
) -> AppResult<Employee> {
    let employee = load_employee(pool, employee_id).await?;
    if actor.employee_id == Some(employee_id) {
        return Ok(employee);
    }
    let scope = actor.scope(Capability::ViewAllEmployees, Capability::ViewManagedEmployees)?;
    ensure_in_scope(scope, &employee)?;
    Ok(employee)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MySummary {
    pub employee: Employee,
    #[schema(example = 2025)]
    pub year: i32,
    /// Regular days approved or pending in `year`
    #[schema(example = 7)]
    pub holidays_taken: i32,
    #[schema(example = 2)]
    pub special_holidays_taken: i32,
    pub pending: Vec<LeaveResponse>,
    pub upcoming_approved: Vec<LeaveResponse>,
    pub past_approved: Vec<LeaveResponse>,
    pub rejected: Vec<LeaveResponse>,
    /// Years that have at least one request, newest first
    pub years: Vec<i32>,
}

fn is_approved(r: &LeaveRequest) -> bool {
    matches!(r.status, LeaveStatus::Approved(_))
}

fn pick(requests: &[LeaveRequest], pred: impl Fn(&LeaveRequest) -> bool) -> Vec<LeaveResponse> {
    requests.iter().filter(|&r| pred(r)).map(LeaveResponse::from).collect()
}

pub async fn my_summary(
    pool: &MySqlPool,
    actor: &Actor,
    year: i32,
    today: NaiveDate,
) -> AppResult<MySummary> {
    let employee = load_employee(pool, actor.employee_id()?).await?;
    let requests: Vec<LeaveRequest> = leave_repo::for_employee(pool, employee.id)
        .await?
        .into_iter()
        .filter(|r| !r.is_deleted())
        .collect();

    let mut years: Vec<i32> = requests.iter().map(|r| r.start_date.year()).collect();
    years.sort_unstable_by(|a, b| b.cmp(a));
    years.dedup();

    Ok(MySummary {
        year,
        holidays_taken: taken_days(&requests, year, false),
        special_holidays_taken: taken_days(&requests, year, true),
        pending: pick(&requests, |r| r.status == LeaveStatus::Pending),
        upcoming_approved: pick(&requests, |r| is_approved(r) && r.start_date >= today),
        past_approved: pick(&requests, |r| is_approved(r) && r.end_date < today),
        rejected: pick(&requests, |r| matches!(r.status, LeaveStatus::Rejected(_))),
        years,
        employee,
    })
}

/// Regular days approved or pending that touch `year` or the year after,
/// each request counted once.
pub fn booked_ahead(requests: &[LeaveRequest], year: i32) -> i32 {
    requests
        .iter()
        .filter(|r| r.is_active() && !r.reset && !r.kind.is_special())
        .filter(|r| {
            let (start, end) = (r.start_date.year(), r.end_date.year());
            start <= year + 1 && end >= year
        })
        .map(|r| r.days_taken)
        .sum()
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Dashboard {
    #[schema(example = 2025)]
    pub year: i32,
    #[schema(nullable = true)]
    pub employee: Option<Employee>,
    /// Regular days booked this year and next
    #[schema(example = 5)]
    pub holidays_taken: i32,
    pub special_leave_types: Vec<SpecialLeaveType>,
    /// Pending requests awaiting the actor's review, when they review anyone
    #[schema(example = 3, nullable = true)]
    pub pending_reviews: Option<i64>,
}

pub async fn dashboard(pool: &MySqlPool, actor: &Actor, year: i32) -> AppResult<Dashboard> {
    let (employee, holidays_taken) = match actor.employee_id {
        Some(id) => {
            let employee = load_employee(pool, id).await?;
            let requests = leave_repo::for_employee(pool, id).await?;
            (Some(employee), booked_ahead(&requests, year))
        }
        None => (None, 0),
    };

    let pending_reviews = match actor.review_scope() {
        Ok(scope) => Some(
            leave_repo::count(
                pool,
                &LeaveFilter {
                    manager_id: scope.manager_id(),
                    status: Some("pending".into()),
                    ..Default::default()
                },
            )
            .await?,
        ),
        Err(_) => None,
    };

    Ok(Dashboard {
        year,
        employee,
        holidays_taken,
        special_leave_types: special_leave_repo::list_types(pool).await?,
        pending_reviews,
    })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Remaining {
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = 18)]
    pub remaining: i32,
}

pub async fn remaining(pool: &MySqlPool, actor: &Actor, employee_id: u64) -> AppResult<Remaining> {
    let employee = visible_employee(pool, actor, employee_id).await?;
    Ok(Remaining {
        employee_id,
        remaining: employee.available_balance,
    })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct YearTotal {
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = 2025)]
    pub year: i32,
    /// Approved regular days of requests starting in `year`
    #[schema(example = 12)]
    pub total_days: i32,
}

pub async fn year_total(
    pool: &MySqlPool,
    actor: &Actor,
    employee_id: u64,
    year: i32,
) -> AppResult<YearTotal> {
    visible_employee(pool, actor, employee_id).await?;
    let rows = leave_repo::approved_in_year(pool, year, Some(employee_id), None).await?;
    Ok(YearTotal {
        employee_id,
        year,
        total_days: rows
            .iter()
            .filter(|r| r.special_type.is_none())
            .map(|r| r.days_taken)
            .sum(),
    })
}

/// Approved requests of `year`, limited to what the actor may see.
pub async fn approved(
    pool: &MySqlPool,
    actor: &Actor,
    employee_id: Option<u64>,
    year: i32,
) -> AppResult<Vec<ApprovedLeaveRow>> {
    let scope = actor.scope(Capability::ViewAllEmployees, Capability::ViewManagedEmployees)?;
    Ok(leave_repo::approved_in_year(pool, year, employee_id, scope.manager_id()).await?)
}

pub async fn export_csv(pool: &MySqlPool, actor: &Actor, year: i32) -> AppResult<Vec<u8>> {
    if !actor.capabilities.has(Capability::ExportHolidays) {
        return Err(AppError::forbidden(
            "You don't have permission to export holiday data.",
        ));
    }
    let rows = leave_repo::approved_in_year(pool, year, None, None).await?;
    export::holidays_csv(&rows).map_err(|e| AppError::Internal(e.into()))
}

pub async fn special_report(
    pool: &MySqlPool,
    actor: &Actor,
    year: Option<i32>,
) -> AppResult<Vec<UsageReportRow>> {
    let scope = actor.scope(
        Capability::ViewSpecialUsageAll,
        Capability::ViewSpecialUsageManaged,
    )?;
    Ok(special_leave_repo::usage_report(pool, year, scope.manager_id()).await?)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SpecialUsageView {
    #[schema(example = "Marriage Leave")]
    pub leave_type: String,
    #[schema(example = 2025)]
    pub year: i32,
    #[schema(example = 5)]
    pub max_days: i32,
    #[schema(example = 2)]
    pub used_days: i32,
    #[schema(example = 3)]
    pub remaining_days: i32,
}

pub async fn own_special_usage(
    pool: &MySqlPool,
    actor: &Actor,
    leave_type_id: u64,
    year: i32,
) -> AppResult<SpecialUsageView> {
    let employee_id = actor.employee_id()?;
    let leave_type = special_leave_repo::find_type(pool, leave_type_id)
        .await?
        .ok_or(AppError::NotFound("Special leave type"))?;
    let used_days = special_leave_repo::usage(pool, employee_id, leave_type_id, year)
        .await?
        .map(|u| u.days_used)
        .unwrap_or(0);

    Ok(SpecialUsageView {
        year,
        max_days: leave_type.max_days,
        used_days,
        remaining_days: (leave_type.max_days - used_days).max(0),
        leave_type: leave_type.name,
    })
}

pub fn month_range(year: i32, month: u32) -> AppResult<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::validation("Invalid year or month."))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last = next
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| AppError::validation("Invalid year or month."))?;
    Ok((first, last))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthCalendar {
    pub employee_holidays: Vec<CalendarEntry>,
    pub public_holidays: Vec<PublicHoliday>,
}

pub async fn calendar(
    pool: &MySqlPool,
    year: i32,
    month: u32,
    country_code: Option<&str>,
) -> AppResult<MonthCalendar> {
    let (from, to) = month_range(year, month)?;
    Ok(MonthCalendar {
        employee_holidays: leave_repo::calendar(pool, from, to).await?,
        public_holidays: public_holiday_repo::list(pool, country_code, Some(from), Some(to))
            .await?,
    })
}

/// Requests the actor may review, newest first.
pub async fn review_queue(
    pool: &MySqlPool,
    actor: &Actor,
    mut filter: LeaveFilter,
    limit: u64,
    offset: u64,
) -> AppResult<(Vec<LeaveRequest>, i64)> {
    let scope = actor.review_scope()?;
    filter.manager_id = scope.manager_id();

    let total = leave_repo::count(pool, &filter).await?;
    let requests = leave_repo::list(pool, &filter, limit, offset).await?;
    Ok((requests, total))
}

/// A single request: own requests always, others within review or holiday-view reach.
pub async fn visible_request(
    pool: &MySqlPool,
    actor: &Actor,
    request_id: u64,
) -> AppResult<LeaveRequest> {
    let request = leave_repo::find(pool, request_id)
        .await?
        .ok_or(AppError::NotFound("Leave request"))?;

    let view_only =
        actor.capabilities.has(Capability::ViewHoliday) && actor.review_scope().is_err();
    if actor.employee_id == Some(request.employee_id) || view_only {
        return Ok(request);
    }
    let employee = load_employee(pool, request.employee_id).await?;
    ensure_in_scope(actor.review_scope()?, &employee)?;
    Ok(request)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExistingRange {
    #[schema(example = "2025-07-21", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2025-07-23", value_type = String, format = "date")]
    pub end_date: NaiveDate,
}

/// Date ranges already booked by the actor, used to grey out the date picker.
pub async fn existing_ranges(pool: &MySqlPool, actor: &Actor) -> AppResult<Vec<ExistingRange>> {
    let requests = leave_repo::for_employee(pool, actor.employee_id()?).await?;
    Ok(requests
        .iter()
        .filter(|r| r.is_active())
        .map(|r| ExistingRange {
            start_date: r.start_date,
            end_date: r.end_date,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::LeaveKind;
    use crate::domain::lifecycle::{Deletion, Stamp};
    use chrono::{DateTime, Utc};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn request(start: NaiveDate, end: NaiveDate, days: i32, status: LeaveStatus) -> LeaveRequest {
        LeaveRequest {
            id: 1,
            employee_id: 1,
            start_date: start,
            end_date: end,
            days_taken: days,
            kind: LeaveKind::Regular,
            status,
            deletion: Deletion::Active,
            reset: false,
            created_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn month_range_handles_december_and_leap_february() {
        assert_eq!(month_range(2025, 12).unwrap(), (d(2025, 12, 1), d(2025, 12, 31)));
        assert_eq!(month_range(2024, 2).unwrap(), (d(2024, 2, 1), d(2024, 2, 29)));
        assert!(month_range(2025, 13).is_err());
        assert!(month_range(2025, 0).is_err());
    }

    #[test]
    fn booked_ahead_counts_year_spanning_request_once() {
        let approved = LeaveStatus::Approved(Stamp {
            by: None,
            at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        });
        let mut special = request(d(2025, 3, 3), d(2025, 3, 4), 2, approved);
        special.kind = LeaveKind::Special { type_id: 1 };
        let mut deleted = request(d(2025, 5, 5), d(2025, 5, 6), 2, LeaveStatus::Pending);
        deleted.deletion = Deletion::Deleted(Stamp {
            by: None,
            at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        });

        let requests = vec![
            request(d(2025, 12, 29), d(2026, 1, 2), 4, approved),
            request(d(2026, 7, 1), d(2026, 7, 3), 3, LeaveStatus::Pending),
            request(d(2024, 7, 1), d(2024, 7, 3), 3, approved),
            special,
            deleted,
        ];
        assert_eq!(booked_ahead(&requests, 2025), 7);
    }
}
