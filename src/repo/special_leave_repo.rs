use serde::Serialize;
use sqlx::{Executor, MySql};
use utoipa::ToSchema;

use crate::model::special_leave::{SpecialLeaveType, SpecialLeaveUsage};

pub async fn find_type<'e, E>(exec: E, id: u64) -> Result<Option<SpecialLeaveType>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, SpecialLeaveType>(
        "SELECT id, name, max_days FROM special_leave_types WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(exec)
    .await
}

pub async fn list_types<'e, E>(exec: E) -> Result<Vec<SpecialLeaveType>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, SpecialLeaveType>(
        "SELECT id, name, max_days FROM special_leave_types ORDER BY name",
    )
    .fetch_all(exec)
    .await
}

pub async fn insert_type<'e, E>(exec: E, name: &str, max_days: i32) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let result = sqlx::query("INSERT INTO special_leave_types (name, max_days) VALUES (?, ?)")
        .bind(name)
        .bind(max_days)
        .execute(exec)
        .await?;
    Ok(result.last_insert_id())
}

/// Creates the (employee, type, year) counter at zero if it does not exist yet.
pub async fn ensure_usage<'e, E>(
    exec: E,
    employee_id: u64,
    leave_type_id: u64,
    year: i32,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query(
        r#"
        INSERT IGNORE INTO special_leave_usage (employee_id, leave_type_id, year, days_used)
        VALUES (?, ?, ?, 0)
        "#,
    )
    .bind(employee_id)
    .bind(leave_type_id)
    .bind(year)
    .execute(exec)
    .await?;
    Ok(())
}

/// Must follow [`ensure_usage`] in the same transaction.
pub async fn usage_for_update<'e, E>(
    exec: E,
    employee_id: u64,
    leave_type_id: u64,
    year: i32,
) -> Result<Option<SpecialLeaveUsage>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, SpecialLeaveUsage>(
        r#"
        SELECT employee_id, leave_type_id, year, days_used
        FROM special_leave_usage
        WHERE employee_id = ? AND leave_type_id = ? AND year = ?
        FOR UPDATE
        "#,
    )
    .bind(employee_id)
    .bind(leave_type_id)
    .bind(year)
    .fetch_optional(exec)
    .await
}

pub async fn usage<'e, E>(
    exec: E,
    employee_id: u64,
    leave_type_id: u64,
    year: i32,
) -> Result<Option<SpecialLeaveUsage>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, SpecialLeaveUsage>(
        r#"
        SELECT employee_id, leave_type_id, year, days_used
        FROM special_leave_usage
        WHERE employee_id = ? AND leave_type_id = ? AND year = ?
        "#,
    )
    .bind(employee_id)
    .bind(leave_type_id)
    .bind(year)
    .fetch_optional(exec)
    .await
}

pub async fn save_usage<'e, E>(exec: E, usage: &SpecialLeaveUsage) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query(
        r#"
        UPDATE special_leave_usage
        SET days_used = ?
        WHERE employee_id = ? AND leave_type_id = ? AND year = ?
        "#,
    )
    .bind(usage.days_used)
    .bind(usage.employee_id)
    .bind(usage.leave_type_id)
    .bind(usage.year)
    .execute(exec)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct UsageReportRow {
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = "John Doe")]
    pub employee_name: String,
    #[schema(example = "Marriage Leave")]
    pub leave_type: String,
    #[schema(example = 2025)]
    pub year: i32,
    #[schema(example = 2)]
    pub days_used: i32,
    #[schema(example = 5)]
    pub max_days: i32,
}

/// Non-zero usage counters, optionally narrowed to one year and to the
/// direct reports of `manager_id`.
pub async fn usage_report<'e, E>(
    exec: E,
    year: Option<i32>,
    manager_id: Option<u64>,
) -> Result<Vec<UsageReportRow>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let mut sql = String::from(
        r#"
        SELECT u.employee_id,
               CONCAT(e.first_name, ' ', e.last_name) AS employee_name,
               t.name AS leave_type,
               u.year, u.days_used, t.max_days
        FROM special_leave_usage u
        JOIN employees e ON e.id = u.employee_id
        JOIN special_leave_types t ON t.id = u.leave_type_id
        WHERE u.days_used > 0
        "#,
    );
    if year.is_some() {
        sql.push_str(" AND u.year = ?");
    }
    if manager_id.is_some() {
        sql.push_str(" AND e.manager_id = ?");
    }
    sql.push_str(" ORDER BY u.year DESC, employee_name, leave_type");

    let mut q = sqlx::query_as::<_, UsageReportRow>(&sql);
    if let Some(year) = year {
        q = q.bind(year);
    }
    if let Some(manager_id) = manager_id {
        q = q.bind(manager_id);
    }
    q.fetch_all(exec).await
}
