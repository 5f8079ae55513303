//! SQL access, one module per table. Functions are generic over the executor so
//! they run against the pool for reads and inside a transaction for writes.

pub mod employee_repo;
pub mod leave_repo;
pub mod public_holiday_repo;
pub mod special_leave_repo;
pub mod user_repo;

/// Typed bind values for dynamically assembled WHERE clauses.
#[derive(Debug, Clone)]
pub enum FilterValue {
    U64(u64),
    I32(i32),
    Str(String),
    Date(chrono::NaiveDate),
}

pub(crate) fn bind_all<'q, O>(
    mut q: sqlx::query::QueryAs<'q, sqlx::MySql, O, sqlx::mysql::MySqlArguments>,
    args: &'q [FilterValue],
) -> sqlx::query::QueryAs<'q, sqlx::MySql, O, sqlx::mysql::MySqlArguments> {
    for arg in args {
        q = match arg {
            FilterValue::U64(v) => q.bind(*v),
            FilterValue::I32(v) => q.bind(*v),
            FilterValue::Str(s) => q.bind(s.as_str()),
            FilterValue::Date(d) => q.bind(*d),
        };
    }
    q
}

pub(crate) fn bind_all_scalar<'q, O>(
    mut q: sqlx::query::QueryScalar<'q, sqlx::MySql, O, sqlx::mysql::MySqlArguments>,
    args: &'q [FilterValue],
) -> sqlx::query::QueryScalar<'q, sqlx::MySql, O, sqlx::mysql::MySqlArguments> {
    for arg in args {
        q = match arg {
            FilterValue::U64(v) => q.bind(*v),
            FilterValue::I32(v) => q.bind(*v),
            FilterValue::Str(s) => q.bind(s.as_str()),
            FilterValue::Date(d) => q.bind(*d),
        };
    }
    q
}
