use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{Executor, MySql};
use utoipa::ToSchema;

use crate::domain::lifecycle::{Deletion, LeaveRequest, LeaveStatus, NewLeaveRequest};
use crate::error::AppResult;
use crate::model::leave_request::{LEAVE_COLUMNS, LeaveRequestRow};
use crate::repo::{FilterValue, bind_all, bind_all_scalar};

fn into_domain(rows: Vec<LeaveRequestRow>) -> AppResult<Vec<LeaveRequest>> {
    rows.into_iter().map(LeaveRequest::try_from).collect()
}

pub async fn find<'e, E>(exec: E, id: u64) -> AppResult<Option<LeaveRequest>>
where
    E: Executor<'e, Database = MySql>,
{
    let row = sqlx::query_as::<_, LeaveRequestRow>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(exec)
    .await?;

    row.map(LeaveRequest::try_from).transpose()
}

pub async fn find_for_update<'e, E>(exec: E, id: u64) -> AppResult<Option<LeaveRequest>>
where
    E: Executor<'e, Database = MySql>,
{
    let row = sqlx::query_as::<_, LeaveRequestRow>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ? FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(exec)
    .await?;

    row.map(LeaveRequest::try_from).transpose()
}

/// Non-deleted pending/approved requests of `employee_id` sharing a day with `[start, end]`.
pub async fn active_overlapping<'e, E>(
    exec: E,
    employee_id: u64,
    start: NaiveDate,
    end: NaiveDate,
) -> AppResult<Vec<LeaveRequest>>
where
    E: Executor<'e, Database = MySql>,
{
    let rows = sqlx::query_as::<_, LeaveRequestRow>(&format!(
        r#"
        SELECT {LEAVE_COLUMNS}
        FROM leave_requests
        WHERE employee_id = ?
          AND deleted_at IS NULL
          AND status IN ('pending', 'approved')
          AND start_date <= ?
          AND end_date >= ?
        "#
    ))
    .bind(employee_id)
    .bind(end)
    .bind(start)
    .fetch_all(exec)
    .await?;

    into_domain(rows)
}

pub async fn insert<'e, E>(exec: E, new: &NewLeaveRequest) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, start_date, end_date, days_taken, status, special_type_id)
        VALUES (?, ?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(new.employee_id)
    .bind(new.start_date)
    .bind(new.end_date)
    .bind(new.days_taken)
    .bind(new.kind.special_type_id())
    .execute(exec)
    .await?;

    Ok(result.last_insert_id())
}

/// Writes the state-machine fields of `request` back.
pub async fn save_state<'e, E>(exec: E, request: &LeaveRequest) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let (approved_by, approved_at) = match request.status {
        LeaveStatus::Approved(s) => (s.by, Some(s.at)),
        _ => (None, None),
    };
    let (rejected_by, rejected_at) = match request.status {
        LeaveStatus::Rejected(s) => (s.by, Some(s.at)),
        _ => (None, None),
    };
    let (deleted_by, deleted_at) = match request.deletion {
        Deletion::Deleted(s) => (s.by, Some(s.at)),
        Deletion::Active => (None, None),
    };

    // approval columns are kept when an approved request is later rejected
    sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?,
            approved_by = COALESCE(?, approved_by),
            approved_at = COALESCE(?, approved_at),
            rejected_by = COALESCE(?, rejected_by),
            rejected_at = COALESCE(?, rejected_at),
            deleted_by = ?,
            deleted_at = ?,
            reset = ?
        WHERE id = ?
        "#,
    )
    .bind(request.status.name().to_string())
    .bind(approved_by)
    .bind(approved_at)
    .bind(rejected_by)
    .bind(rejected_at)
    .bind(deleted_by)
    .bind(deleted_at)
    .bind(request.reset)
    .bind(request.id)
    .execute(exec)
    .await?;
    Ok(())
}

pub async fn for_employee<'e, E>(exec: E, employee_id: u64) -> AppResult<Vec<LeaveRequest>>
where
    E: Executor<'e, Database = MySql>,
{
    let rows = sqlx::query_as::<_, LeaveRequestRow>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE employee_id = ? ORDER BY start_date"
    ))
    .bind(employee_id)
    .fetch_all(exec)
    .await?;

    into_domain(rows)
}

/// Approved, non-deleted, not yet reset requests that start before `year`.
pub async fn resettable_for_update<'e, E>(
    exec: E,
    employee_id: u64,
    year: i32,
) -> AppResult<Vec<LeaveRequest>>
where
    E: Executor<'e, Database = MySql>,
{
    let rows = sqlx::query_as::<_, LeaveRequestRow>(&format!(
        r#"
        SELECT {LEAVE_COLUMNS}
        FROM leave_requests
        WHERE employee_id = ?
          AND status = 'approved'
          AND reset = FALSE
          AND deleted_at IS NULL
          AND YEAR(start_date) < ?
        FOR UPDATE
        "#
    ))
    .bind(employee_id)
    .bind(year)
    .fetch_all(exec)
    .await?;

    into_domain(rows)
}

pub async fn mark_reset<'e, E>(exec: E, ids: &[u64]) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    if ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("UPDATE leave_requests SET reset = TRUE WHERE id IN ({placeholders})");
    let mut q = sqlx::query(&sql);
    for id in ids {
        q = q.bind(*id);
    }
    Ok(q.execute(exec).await?.rows_affected())
}

#[derive(Debug, Default)]
pub struct LeaveFilter {
    pub employee_id: Option<u64>,
    /// Restrict to direct reports of this manager
    pub manager_id: Option<u64>,
    pub status: Option<String>,
    pub include_deleted: bool,
}

impl LeaveFilter {
    fn where_clause(&self) -> (String, Vec<FilterValue>) {
        let mut where_sql = String::from(" WHERE 1=1");
        let mut args = Vec::new();

        if let Some(emp_id) = self.employee_id {
            where_sql.push_str(" AND l.employee_id = ?");
            args.push(FilterValue::U64(emp_id));
        }
        if let Some(manager_id) = self.manager_id {
            where_sql.push_str(" AND e.manager_id = ?");
            args.push(FilterValue::U64(manager_id));
        }
        if let Some(status) = &self.status {
            where_sql.push_str(" AND l.status = ?");
            args.push(FilterValue::Str(status.to_lowercase()));
        }
        if !self.include_deleted {
            where_sql.push_str(" AND l.deleted_at IS NULL");
        }
        (where_sql, args)
    }
}

pub async fn count<'e, E>(exec: E, filter: &LeaveFilter) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let (where_sql, args) = filter.where_clause();
    let sql = format!(
        "SELECT COUNT(*) FROM leave_requests l JOIN employees e ON e.id = l.employee_id{where_sql}"
    );
    bind_all_scalar(sqlx::query_scalar::<_, i64>(&sql), &args)
        .fetch_one(exec)
        .await
}

pub async fn list<'e, E>(
    exec: E,
    filter: &LeaveFilter,
    limit: u64,
    offset: u64,
) -> AppResult<Vec<LeaveRequest>>
where
    E: Executor<'e, Database = MySql>,
{
    let (where_sql, args) = filter.where_clause();
    let columns = LEAVE_COLUMNS
        .split(", ")
        .map(|c| format!("l.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        r#"
        SELECT {columns}
        FROM leave_requests l
        JOIN employees e ON e.id = l.employee_id
        {where_sql}
        ORDER BY l.created_at DESC
        LIMIT ? OFFSET ?
        "#
    );

    let rows = bind_all(sqlx::query_as::<_, LeaveRequestRow>(&sql), &args)
        .bind(limit)
        .bind(offset)
        .fetch_all(exec)
        .await?;

    into_domain(rows)
}

/// Approved, non-deleted request joined with its employee and leave type name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct ApprovedLeaveRow {
    #[schema(example = 12)]
    pub id: u64,
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = "John Doe")]
    pub full_name: String,
    #[schema(example = "2025-07-21", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2025-07-23", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(example = 3)]
    pub days_taken: i32,
    #[schema(example = "Marriage Leave", nullable = true)]
    pub special_type: Option<String>,
}

impl ApprovedLeaveRow {
    pub fn leave_type_label(&self) -> String {
        match &self.special_type {
            Some(name) => format!("Special Leave - {name}"),
            None => "Regular Leave".to_string(),
        }
    }
}

pub async fn approved_in_year<'e, E>(
    exec: E,
    year: i32,
    employee_id: Option<u64>,
    manager_id: Option<u64>,
) -> Result<Vec<ApprovedLeaveRow>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let mut sql = String::from(
        r#"
        SELECT l.id, l.employee_id,
               CONCAT(e.first_name, ' ', e.last_name) AS full_name,
               l.start_date, l.end_date, l.days_taken,
               t.name AS special_type
        FROM leave_requests l
        JOIN employees e ON e.id = l.employee_id
        LEFT JOIN special_leave_types t ON t.id = l.special_type_id
        WHERE l.status = 'approved'
          AND l.deleted_at IS NULL
          AND YEAR(l.start_date) = ?
        "#,
    );
    let mut args = vec![FilterValue::I32(year)];
    if let Some(id) = employee_id {
        sql.push_str(" AND l.employee_id = ?");
        args.push(FilterValue::U64(id));
    }
    if let Some(id) = manager_id {
        sql.push_str(" AND e.manager_id = ?");
        args.push(FilterValue::U64(id));
    }
    sql.push_str(" ORDER BY full_name, l.start_date");

    bind_all(sqlx::query_as::<_, ApprovedLeaveRow>(&sql), &args)
        .fetch_all(exec)
        .await
}

/// Pending or approved, non-deleted request overlapping a calendar window.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct CalendarEntry {
    #[schema(example = "John Doe")]
    pub employee_name: String,
    #[schema(example = "2025-07-21", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2025-07-23", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(example = "approved")]
    pub status: String,
    /// Set for special leave
    #[schema(example = 3, nullable = true)]
    pub special_type_id: Option<u64>,
}

pub async fn calendar<'e, E>(
    exec: E,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<CalendarEntry>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, CalendarEntry>(
        r#"
        SELECT CONCAT(e.first_name, ' ', e.last_name) AS employee_name,
               l.start_date, l.end_date, l.status,
               l.special_type_id
        FROM leave_requests l
        JOIN employees e ON e.id = l.employee_id
        WHERE l.status IN ('pending', 'approved')
          AND l.deleted_at IS NULL
          AND l.start_date <= ?
          AND l.end_date >= ?
        ORDER BY l.start_date
        "#,
    )
    .bind(to)
    .bind(from)
    .fetch_all(exec)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_queue_filter_scopes_to_manager_and_hides_deleted() {
        let filter = LeaveFilter {
            employee_id: None,
            manager_id: Some(4),
            status: Some("Pending".into()),
            include_deleted: false,
        };
        let (sql, args) = filter.where_clause();
        assert_eq!(
            sql,
            " WHERE 1=1 AND e.manager_id = ? AND l.status = ? AND l.deleted_at IS NULL"
        );
        assert!(matches!(&args[1], FilterValue::Str(s) if s == "pending"));
    }

    #[test]
    fn leave_type_label_distinguishes_special() {
        let mut row = ApprovedLeaveRow {
            id: 1,
            employee_id: 1,
            full_name: "Ann Smith".into(),
            start_date: NaiveDate::from_ymd_opt(2025, 7, 21).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 7, 21).unwrap(),
            days_taken: 1,
            special_type: None,
        };
        assert_eq!(row.leave_type_label(), "Regular Leave");
        row.special_type = Some("Marriage Leave".into());
        assert_eq!(row.leave_type_label(), "Special Leave - Marriage Leave");
    }
}
