use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::IntoParams;

use crate::auth::auth::AuthUser;
use crate::error::AppResult;
use crate::export::export_filename;
use crate::holidays::normalize_country;
use crate::service::reporting;

#[derive(Deserialize, IntoParams)]
pub struct ExportQuery {
    /// Defaults to the current year
    pub year: Option<i32>,
}

#[derive(Deserialize, IntoParams)]
pub struct CalendarQuery {
    pub year: Option<i32>,
    /// 1-12, defaults to the current month
    pub month: Option<u32>,
    /// Restrict public holidays to one country
    pub country_code: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct ApprovedQuery {
    pub year: Option<i32>,
    pub employee_id: Option<u64>,
}

fn csv_attachment(year: i32, body: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(export_filename(year))],
        })
        .body(body)
}

/// Approved holidays of a year as CSV
#[utoipa::path(
    get,
    path = "/api/reports/export",
    params(ExportQuery),
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv"),
        (status = 403, description = "Missing export permission", body = Object, example = json!({
            "message": "You don't have permission to export holiday data."
        }))
    ),
    tag = "Reports",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn export_holidays(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ExportQuery>,
) -> AppResult<HttpResponse> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let csv = reporting::export_csv(pool.get_ref(), &auth.actor(), year).await?;
    info!(year, user_id = auth.user_id, bytes = csv.len(), "Holiday export generated");
    Ok(csv_attachment(year, csv))
}

/// Requests and public holidays of one month
#[utoipa::path(
    get,
    path = "/api/reports/calendar",
    params(CalendarQuery),
    responses(
        (status = 200, description = "Month view", body = MonthCalendar),
        (status = 400, description = "Invalid month or country")
    ),
    tag = "Reports",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn calendar(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<CalendarQuery>,
) -> AppResult<HttpResponse> {
    let today = Utc::now().date_naive();
    let country = query
        .country_code
        .as_deref()
        .map(normalize_country)
        .transpose()?;
    let view = reporting::calendar(
        pool.get_ref(),
        query.year.unwrap_or(today.year()),
        query.month.unwrap_or(today.month()),
        country.as_deref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Approved requests of a year within the caller's reach
#[utoipa::path(
    get,
    path = "/api/reports/approved",
    params(ApprovedQuery),
    responses(
        (status = 200, description = "Approved requests", body = [ApprovedLeaveRow]),
        (status = 403, description = "Forbidden")
    ),
    tag = "Reports",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn approved(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ApprovedQuery>,
) -> AppResult<HttpResponse> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let rows = reporting::approved(pool.get_ref(), &auth.actor(), query.employee_id, year).await?;
    Ok(HttpResponse::Ok().json(rows))
}
