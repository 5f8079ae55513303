use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::domain::authz::Capability;
use crate::error::{AppError, AppResult};
use crate::service::reporting;
use crate::service::rollover::{self, current_year};

#[derive(Deserialize, IntoParams)]
pub struct RolloverQuery {
    /// Defaults to the current year; later years are refused
    pub year: Option<i32>,
}

/// A rollover into a future year would mark that year as done and retire
/// this year's approved requests.
fn rollover_year(requested: Option<i32>, current: i32) -> AppResult<i32> {
    match requested {
        Some(year) if year > current => Err(AppError::validation(format!(
            "Cannot roll over into {year}; the current year is {current}"
        ))),
        Some(year) => Ok(year),
        None => Ok(current),
    }
}

#[derive(Serialize, ToSchema)]
pub struct RolloverResponse {
    #[schema(example = 2026)]
    pub year: i32,
    /// Employees credited by this run; zero when the year was already rolled over
    #[schema(example = 12)]
    pub employees: usize,
    /// Requests retired from the previous years
    #[schema(example = 30)]
    pub reset_requests: usize,
}

/// Landing data. Applies a pending annual rollover first.
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Dashboard for the caller", body = Dashboard)
    ),
    tag = "Dashboard",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn dashboard(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let year = current_year();
    // a failed sweep must not block the landing page; the next visit retries
    if let Err(e) = rollover::run(pool.get_ref(), year).await {
        warn!(error = %e, year, "Rollover before dashboard failed");
    }

    let view = reporting::dashboard(pool.get_ref(), &auth.actor(), year).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    post,
    path = "/api/rollover",
    params(RolloverQuery),
    responses(
        (status = 200, description = "Rollover applied", body = RolloverResponse),
        (status = 400, description = "Year lies in the future"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Dashboard",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn run_rollover(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RolloverQuery>,
) -> AppResult<HttpResponse> {
    auth.actor().require(Capability::TriggerRollover)?;

    let year = rollover_year(query.year, current_year())?;
    let outcomes = rollover::run(pool.get_ref(), year).await?;
    info!(year, employees = outcomes.len(), user_id = auth.user_id, "Manual rollover");

    Ok(HttpResponse::Ok().json(RolloverResponse {
        year,
        employees: outcomes.len(),
        reset_requests: outcomes.iter().map(|o| o.reset_ids.len()).sum(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_rollover_refuses_future_years() {
        assert!(rollover_year(Some(2030), 2026).is_err());
        assert!(rollover_year(Some(2027), 2026).is_err());
    }

    #[test]
    fn manual_rollover_defaults_to_and_accepts_the_current_year() {
        assert_eq!(rollover_year(None, 2026).unwrap(), 2026);
        assert_eq!(rollover_year(Some(2026), 2026).unwrap(), 2026);
        assert_eq!(rollover_year(Some(2025), 2026).unwrap(), 2025);
    }
}
