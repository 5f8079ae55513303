use serde_json::Value;
use sqlx::{Executor, MySql};

use crate::error::{AppError, AppResult};

/// SQL bindable value for a partial update.
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    Null,
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Builds `UPDATE table SET .. WHERE id_column = ?` from a JSON object.
///
/// Only keys listed in `allowed` may be written; anything else is a
/// validation error naming the column. Values are bound, never spliced in.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
) -> AppResult<SqlUpdate> {
    let obj = payload
        .as_object()
        .ok_or_else(|| AppError::validation("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(AppError::validation("No fields provided for update"));
    }

    if let Some(key) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(AppError::validation(format!("Field '{key}' cannot be updated")));
    }

    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table, set_clause, id_column
    );

    let mut values = Vec::with_capacity(obj.len() + 1);
    for (key, value) in obj {
        let v = match value {
            Value::String(s) => SqlValue::String(s.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::I64(i),
                None => {
                    return Err(AppError::validation(format!("Field '{key}' must be an integer")));
                }
            },
            Value::Null => SqlValue::Null,
            _ => {
                return Err(AppError::validation(format!(
                    "Field '{key}' has an unsupported value type"
                )));
            }
        };
        values.push(v);
    }

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

pub async fn execute_update<'e, E>(exec: E, update: SqlUpdate) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(exec).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALLOWED: &[&str] = &["first_name", "annual_entitlement", "manager_id"];

    #[test]
    fn builds_parameterised_update_for_allowed_columns() {
        let update = build_update_sql(
            "employees",
            &json!({"first_name": "Ann", "manager_id": null}),
            ALLOWED,
            "id",
            7,
        )
        .unwrap();

        assert_eq!(
            update.sql,
            "UPDATE employees SET first_name = ?, manager_id = ? WHERE id = ?"
        );
        assert_eq!(
            update.values,
            vec![SqlValue::String("Ann".into()), SqlValue::Null, SqlValue::U64(7)]
        );
    }

    #[test]
    fn balance_column_is_not_writable() {
        let err = build_update_sql(
            "employees",
            &json!({"available_balance": 99}),
            ALLOWED,
            "id",
            7,
        )
        .unwrap_err();
        assert!(err.to_string().contains("available_balance"));
    }

    #[test]
    fn rejects_empty_and_non_object_payloads() {
        assert!(build_update_sql("employees", &json!({}), ALLOWED, "id", 1).is_err());
        assert!(build_update_sql("employees", &json!([1]), ALLOWED, "id", 1).is_err());
        assert!(
            build_update_sql("employees", &json!({"annual_entitlement": 2.5}), ALLOWED, "id", 1)
                .is_err()
        );
    }
}
