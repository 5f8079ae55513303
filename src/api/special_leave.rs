use actix_web::{HttpResponse, web};
use chrono::Datelike;
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::domain::authz::Capability;
use crate::error::{AppError, AppResult};
use crate::model::special_leave::SpecialLeaveType;
use crate::repo::special_leave_repo;
use crate::service::reporting;

#[derive(Deserialize, ToSchema)]
pub struct CreateSpecialLeaveType {
    #[schema(example = "Marriage Leave")]
    pub name: String,
    /// Yearly cap per employee
    #[schema(example = 5)]
    pub max_days: i32,
}

#[derive(Deserialize, IntoParams)]
pub struct UsageQuery {
    pub leave_type_id: u64,
    /// Defaults to the current year
    pub year: Option<i32>,
}

#[derive(Deserialize, IntoParams)]
pub struct ReportQuery {
    /// All years when omitted
    pub year: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/special-leave/types",
    responses(
        (status = 200, description = "Configured special leave types", body = [SpecialLeaveType])
    ),
    tag = "Special Leave",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_types(_auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let types = special_leave_repo::list_types(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(types))
}

#[utoipa::path(
    post,
    path = "/api/special-leave/types",
    request_body = CreateSpecialLeaveType,
    responses(
        (status = 201, description = "Type created", body = SpecialLeaveType),
        (status = 400, description = "Invalid name or cap"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Special Leave",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_type(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateSpecialLeaveType>,
) -> AppResult<HttpResponse> {
    auth.actor().require(Capability::ManageCalendar)?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Name must not be empty"));
    }
    if payload.max_days < 0 {
        return Err(AppError::validation("max_days must not be negative"));
    }

    let id = special_leave_repo::insert_type(pool.get_ref(), name, payload.max_days).await?;
    info!(leave_type_id = id, %name, max_days = payload.max_days, "Special leave type created");

    Ok(HttpResponse::Created().json(SpecialLeaveType {
        id,
        name: name.to_string(),
        max_days: payload.max_days,
    }))
}

/// The caller's own usage of one special leave type in a year
#[utoipa::path(
    get,
    path = "/api/special-leave/usage",
    params(UsageQuery),
    responses(
        (status = 200, description = "Used and remaining days", body = SpecialUsageView),
        (status = 403, description = "No employee profile"),
        (status = 404, description = "Special leave type not found")
    ),
    tag = "Special Leave",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn own_usage(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<UsageQuery>,
) -> AppResult<HttpResponse> {
    let year = query.year.unwrap_or_else(|| chrono::Utc::now().year());
    let view =
        reporting::own_special_usage(pool.get_ref(), &auth.actor(), query.leave_type_id, year)
            .await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Special leave used per employee, type and year
#[utoipa::path(
    get,
    path = "/api/special-leave/report",
    params(ReportQuery),
    responses(
        (status = 200, description = "Usage rows with at least one day used", body = [UsageReportRow]),
        (status = 403, description = "Forbidden")
    ),
    tag = "Special Leave",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn usage_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ReportQuery>,
) -> AppResult<HttpResponse> {
    let rows = reporting::special_report(pool.get_ref(), &auth.actor(), query.year).await?;
    Ok(HttpResponse::Ok().json(rows))
}
