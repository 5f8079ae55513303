use chrono::NaiveDate;
use sqlx::{Executor, MySql};

use crate::model::public_holiday::PublicHoliday;
use crate::repo::{FilterValue, bind_all};

/// Holiday dates of `country_code` inside `[from, to]`.
pub async fn dates_between<'e, E>(
    exec: E,
    country_code: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<NaiveDate>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_scalar::<_, NaiveDate>(
        "SELECT date FROM public_holidays WHERE country_code = ? AND date BETWEEN ? AND ?",
    )
    .bind(country_code)
    .bind(from)
    .bind(to)
    .fetch_all(exec)
    .await
}

pub async fn list<'e, E>(
    exec: E,
    country_code: Option<&str>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<PublicHoliday>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let mut sql = String::from("SELECT id, name, date, country_code FROM public_holidays WHERE 1=1");
    let mut args = Vec::new();
    if let Some(country) = country_code {
        sql.push_str(" AND country_code = ?");
        args.push(FilterValue::Str(country.to_uppercase()));
    }
    if let Some(from) = from {
        sql.push_str(" AND date >= ?");
        args.push(FilterValue::Date(from));
    }
    if let Some(to) = to {
        sql.push_str(" AND date <= ?");
        args.push(FilterValue::Date(to));
    }
    sql.push_str(" ORDER BY date, country_code");

    bind_all(sqlx::query_as::<_, PublicHoliday>(&sql), &args)
        .fetch_all(exec)
        .await
}

/// Inserts unless (name, date, country) already exists. Returns whether a row was added.
pub async fn insert_ignore<'e, E>(
    exec: E,
    name: &str,
    date: NaiveDate,
    country_code: &str,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let result = sqlx::query(
        "INSERT IGNORE INTO public_holidays (name, date, country_code) VALUES (?, ?, ?)",
    )
    .bind(name)
    .bind(date)
    .bind(country_code)
    .execute(exec)
    .await?;
    Ok(result.rows_affected() > 0)
}
