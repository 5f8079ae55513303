use sqlx::{Executor, MySql};

use crate::model::employee::Employee;
use crate::repo::{FilterValue, bind_all, bind_all_scalar};

const COLUMNS: &str = "id, first_name, last_name, email, country_code, annual_entitlement, \
     available_balance, last_rollover_year, manager_id, position";

#[derive(Debug)]
pub struct NewEmployee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub country_code: String,
    pub annual_entitlement: i32,
    pub manager_id: Option<u64>,
    pub position: Option<String>,
    pub rollover_year: i32,
}

pub async fn find<'e, E>(exec: E, id: u64) -> Result<Option<Employee>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, Employee>(&format!("SELECT {COLUMNS} FROM employees WHERE id = ?"))
        .bind(id)
        .fetch_optional(exec)
        .await
}

/// Loads the employee and holds an exclusive lock on the row until the
/// surrounding transaction ends.
pub async fn find_for_update<'e, E>(exec: E, id: u64) -> Result<Option<Employee>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, Employee>(&format!(
        "SELECT {COLUMNS} FROM employees WHERE id = ? FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(exec)
    .await
}

pub async fn insert<'e, E>(exec: E, new: &NewEmployee) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO employees
            (first_name, last_name, email, country_code, annual_entitlement,
             available_balance, last_rollover_year, manager_id, position)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new.first_name)
    .bind(&new.last_name)
    .bind(&new.email)
    .bind(&new.country_code)
    .bind(new.annual_entitlement)
    .bind(new.annual_entitlement)
    .bind(new.rollover_year)
    .bind(new.manager_id)
    .bind(&new.position)
    .execute(exec)
    .await?;

    Ok(result.last_insert_id())
}

/// Persists a balance computed by the ledger. Only lifecycle and rollover code calls this.
pub async fn save_balance<'e, E>(exec: E, employee: &Employee) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query(
        "UPDATE employees SET available_balance = ?, last_rollover_year = ? WHERE id = ?",
    )
    .bind(employee.available_balance)
    .bind(employee.last_rollover_year)
    .bind(employee.id)
    .execute(exec)
    .await?;
    Ok(())
}

/// Ids of employees whose rollover is still due for `year`.
pub async fn due_for_rollover<'e, E>(exec: E, year: i32) -> Result<Vec<u64>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_scalar::<_, u64>(
        "SELECT id FROM employees WHERE last_rollover_year < ? ORDER BY id",
    )
    .bind(year)
    .fetch_all(exec)
    .await
}

pub async fn email_of<'e, E>(exec: E, id: u64) -> Result<Option<String>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_scalar::<_, String>("SELECT email FROM employees WHERE id = ?")
        .bind(id)
        .fetch_optional(exec)
        .await
}

/// E-mail addresses of employees linked to users holding one of `role_ids`.
pub async fn emails_for_roles<'e, E>(exec: E, role_ids: &[u8]) -> Result<Vec<String>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    if role_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; role_ids.len()].join(", ");
    let sql = format!(
        r#"
        SELECT DISTINCT e.email
        FROM users u
        JOIN employees e ON e.id = u.employee_id
        WHERE u.role_id IN ({placeholders})
        "#
    );
    let mut q = sqlx::query_scalar::<_, String>(&sql);
    for id in role_ids {
        q = q.bind(*id);
    }
    q.fetch_all(exec).await
}

#[derive(Debug, Default)]
pub struct EmployeeFilter {
    pub manager_id: Option<u64>,
    pub country_code: Option<String>,
    pub search: Option<String>,
}

impl EmployeeFilter {
    fn where_clause(&self) -> (String, Vec<FilterValue>) {
        let mut conditions = Vec::new();
        let mut args = Vec::new();

        if let Some(manager_id) = self.manager_id {
            conditions.push("manager_id = ?");
            args.push(FilterValue::U64(manager_id));
        }
        if let Some(country) = &self.country_code {
            conditions.push("country_code = ?");
            args.push(FilterValue::Str(country.clone()));
        }
        if let Some(search) = &self.search {
            conditions.push("(first_name LIKE ? OR last_name LIKE ? OR email LIKE ?)");
            let like = format!("%{}%", search);
            args.push(FilterValue::Str(like.clone()));
            args.push(FilterValue::Str(like.clone()));
            args.push(FilterValue::Str(like));
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        (clause, args)
    }
}

pub async fn count<'e, E>(exec: E, filter: &EmployeeFilter) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let (where_clause, args) = filter.where_clause();
    let sql = format!("SELECT COUNT(*) FROM employees {where_clause}");
    bind_all_scalar(sqlx::query_scalar::<_, i64>(&sql), &args)
        .fetch_one(exec)
        .await
}

pub async fn list<'e, E>(
    exec: E,
    filter: &EmployeeFilter,
    limit: u32,
    offset: u32,
) -> Result<Vec<Employee>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let (where_clause, args) = filter.where_clause();
    let sql = format!(
        "SELECT {COLUMNS} FROM employees {where_clause} ORDER BY last_name, first_name LIMIT ? OFFSET ?"
    );
    bind_all(sqlx::query_as::<_, Employee>(&sql), &args)
        .bind(limit)
        .bind(offset)
        .fetch_all(exec)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_has_no_where_clause() {
        let (clause, args) = EmployeeFilter::default().where_clause();
        assert!(clause.is_empty());
        assert!(args.is_empty());
    }

    #[test]
    fn managed_search_filter_binds_in_order() {
        let filter = EmployeeFilter {
            manager_id: Some(4),
            country_code: None,
            search: Some("ann".into()),
        };
        let (clause, args) = filter.where_clause();
        assert_eq!(
            clause,
            "WHERE manager_id = ? AND (first_name LIKE ? OR last_name LIKE ? OR email LIKE ?)"
        );
        assert_eq!(args.len(), 4);
        assert!(matches!(args[0], FilterValue::U64(4)));
        assert!(matches!(&args[1], FilterValue::Str(s) if s == "%ann%"));
    }
}
