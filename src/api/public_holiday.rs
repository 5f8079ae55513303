use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::domain::authz::Capability;
use crate::error::{AppError, AppResult};
use crate::holidays::{self, calendarific::CalendarificClient, normalize_country};
use crate::repo::public_holiday_repo;

#[derive(Deserialize, IntoParams)]
pub struct HolidayQuery {
    /// ISO 3166-1 alpha-2; every country when omitted
    pub country_code: Option<String>,
    pub year: Option<i32>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateHoliday {
    #[schema(example = "King's Day")]
    pub name: String,
    #[schema(example = "2026-04-27", format = "date", value_type = String)]
    pub date: NaiveDate,
    /// Defaults to the configured country
    #[schema(example = "NL", nullable = true)]
    pub country_code: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ImportHolidays {
    /// Defaults to the configured country
    #[schema(example = "NL", nullable = true)]
    pub country_code: Option<String>,
    /// Defaults to the current year
    #[schema(example = 2026, nullable = true)]
    pub year: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/public-holidays",
    params(HolidayQuery),
    responses(
        (status = 200, description = "Stored public holidays", body = [PublicHoliday]),
        (status = 400, description = "Invalid country or year")
    ),
    tag = "Public Holidays",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_holidays(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<HolidayQuery>,
) -> AppResult<HttpResponse> {
    let country = query
        .country_code
        .as_deref()
        .map(normalize_country)
        .transpose()?;
    let (from, to) = match query.year {
        Some(year) => {
            let from = NaiveDate::from_ymd_opt(year, 1, 1);
            let to = NaiveDate::from_ymd_opt(year, 12, 31);
            let (from, to) = from
                .zip(to)
                .ok_or_else(|| AppError::validation("Invalid year"))?;
            (Some(from), Some(to))
        }
        None => (None, None),
    };

    let holidays = public_holiday_repo::list(pool.get_ref(), country.as_deref(), from, to).await?;
    Ok(HttpResponse::Ok().json(holidays))
}

#[utoipa::path(
    post,
    path = "/api/public-holidays",
    request_body = CreateHoliday,
    responses(
        (status = 201, description = "Holiday stored", body = Object, example = json!({
            "message": "Holiday created"
        })),
        (status = 200, description = "Holiday already existed", body = Object, example = json!({
            "message": "Holiday already exists"
        })),
        (status = 400, description = "Invalid name or country"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Public Holidays",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateHoliday>,
) -> AppResult<HttpResponse> {
    auth.actor().require(Capability::ManageCalendar)?;

    let country = payload
        .country_code
        .as_deref()
        .unwrap_or(config.default_country_code.as_str());
    let created = holidays::create_holiday(pool.get_ref(), &payload.name, payload.date, country).await?;

    if created {
        info!(name = %payload.name, date = %payload.date, %country, "Public holiday created");
        Ok(HttpResponse::Created().json(json!({ "message": "Holiday created" })))
    } else {
        Ok(HttpResponse::Ok().json(json!({ "message": "Holiday already exists" })))
    }
}

/// Pull a country's holidays for a year from Calendarific
#[utoipa::path(
    post,
    path = "/api/public-holidays/import",
    request_body = ImportHolidays,
    responses(
        (status = 200, description = "Newly stored holidays", body = Object, example = json!({
            "imported": 11
        })),
        (status = 400, description = "Invalid country or API key not configured"),
        (status = 403, description = "Forbidden"),
        (status = 502, description = "Calendarific or storage failed", body = Object, example = json!({
            "message": "Failed to fetch holidays: Calendarific answered 401 Unauthorized",
            "imported": 0
        }))
    ),
    tag = "Public Holidays",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn import_holidays(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    client: web::Data<CalendarificClient>,
    payload: web::Json<ImportHolidays>,
) -> AppResult<HttpResponse> {
    auth.actor().require(Capability::ManageCalendar)?;

    let country = payload
        .country_code
        .as_deref()
        .unwrap_or(config.default_country_code.as_str());
    let year = payload.year.unwrap_or_else(|| Utc::now().year());

    let imported = holidays::import_holidays(pool.get_ref(), &client, country, year).await?;
    Ok(HttpResponse::Ok().json(json!({ "imported": imported })))
}
