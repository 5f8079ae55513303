use std::str::FromStr;

use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::domain::ledger::LeaveKind;
use crate::domain::lifecycle::{LeaveDraft, StatusName};
use crate::error::{AppError, AppResult};
use crate::model::leave_request::LeaveResponse;
use crate::notify::Mailer;
use crate::repo::leave_repo::LeaveFilter;
use crate::service::{leave_service, reporting};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-07", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    /// Draw the days from this special leave type instead of the annual balance
    #[schema(example = 3, nullable = true)]
    pub special_type_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
#[schema(example = json!({
    "data": [
        {
            "id": 1,
            "employee_id": 1000,
            "start_date": "2026-01-05",
            "end_date": "2026-01-07",
            "days_taken": 3,
            "status": "pending",
            "special_type_id": null,
            "reset": false,
            "deleted": false,
            "created_at": "2026-01-01T00:00:00Z"
        }
    ],
    "page": 1,
    "per_page": 10,
    "total": 1
}))]
pub struct LeaveListResponse {
    pub data: Vec<LeaveResponse>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveQuery {
    #[schema(example = 123)]
    /// Filter by employee ID
    pub employee_id: Option<u64>,
    #[schema(example = "pending")]
    /// Filter by leave status
    pub status: Option<String>,
    /// Also list soft-deleted requests
    pub include_deleted: Option<bool>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    #[schema(example = 10)]
    /// Pagination per page number
    pub per_page: Option<u64>,
}

#[derive(Deserialize, IntoParams)]
pub struct YearQuery {
    /// Defaults to the current year
    pub year: Option<i32>,
}

fn parse_status(raw: Option<&str>) -> AppResult<Option<String>> {
    raw.map(|s| {
        StatusName::from_str(&s.to_lowercase())
            .map(|name| name.to_string())
            .map_err(|_| AppError::validation("Invalid status. Allowed: pending, approved, rejected"))
    })
    .transpose()
}

/// Submit a leave request for the caller's own employee profile
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveResponse),
        (status = 400, description = "Invalid dates, overlap or no working days"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Insufficient balance or special leave quota", body = Object, example = json!({
            "message": "You don't have enough available holidays: requested 3, available 1."
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    mailer: web::Data<Mailer>,
    payload: web::Json<CreateLeave>,
) -> AppResult<HttpResponse> {
    let draft = LeaveDraft {
        start_date: payload.start_date,
        end_date: payload.end_date,
        kind: LeaveKind::from_special_type(payload.special_type_id),
    };

    let (request, notes) = leave_service::submit(pool.get_ref(), &auth.actor(), draft).await?;
    mailer.spawn_dispatch(pool.get_ref().clone(), notes);

    Ok(HttpResponse::Created().json(LeaveResponse::from(&request)))
}

/// Approve a pending leave request
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved", body = LeaveResponse),
        (status = 400, description = "Leave request is not pending", body = Object, example = json!({
            "message": "Only pending requests can be approved."
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    mailer: web::Data<Mailer>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let (request, notes) =
        leave_service::approve(pool.get_ref(), &auth.actor(), path.into_inner()).await?;
    mailer.spawn_dispatch(pool.get_ref().clone(), notes);

    Ok(HttpResponse::Ok().json(LeaveResponse::from(&request)))
}

/// Reject a pending or approved leave request, releasing its days
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    responses(
        (status = 200, description = "Leave rejected", body = LeaveResponse),
        (status = 400, description = "Leave request already rejected or deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    mailer: web::Data<Mailer>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let (request, notes) =
        leave_service::reject(pool.get_ref(), &auth.actor(), path.into_inner()).await?;
    mailer.spawn_dispatch(pool.get_ref().clone(), notes);

    Ok(HttpResponse::Ok().json(LeaveResponse::from(&request)))
}

/// Soft-delete a leave request
#[utoipa::path(
    delete,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to delete")
    ),
    responses(
        (status = 200, description = "Leave request deleted", body = Object, example = json!({
            "message": "Leave request deleted"
        })),
        (status = 400, description = "Already deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn delete_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let request = leave_service::delete(pool.get_ref(), &auth.actor(), path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave request deleted",
        "id": request.id
    })))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "message": "Leave request not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let request =
        reporting::visible_request(pool.get_ref(), &auth.actor(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(LeaveResponse::from(&request)))
}

/// Review queue: requests of the employees the caller may review
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveQuery),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 400, description = "Invalid status filter"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveQuery>,
) -> AppResult<HttpResponse> {
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let filter = LeaveFilter {
        employee_id: query.employee_id,
        manager_id: None,
        status: parse_status(query.status.as_deref())?,
        include_deleted: query.include_deleted.unwrap_or(false),
    };

    let (requests, total) =
        reporting::review_queue(pool.get_ref(), &auth.actor(), filter, per_page, offset).await?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: requests.iter().map(LeaveResponse::from).collect(),
        page,
        per_page,
        total,
    }))
}

/// Personal summary: balance, taken days and requests grouped by state
#[utoipa::path(
    get,
    path = "/api/leave/mine",
    params(YearQuery),
    responses(
        (status = 200, description = "Summary for the caller", body = MySummary),
        (status = 403, description = "No employee profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn my_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<YearQuery>,
) -> AppResult<HttpResponse> {
    let today = Utc::now().date_naive();
    let year = query.year.unwrap_or(today.year());
    let summary = reporting::my_summary(pool.get_ref(), &auth.actor(), year, today).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Date ranges the caller already has pending or approved
#[utoipa::path(
    get,
    path = "/api/leave/existing",
    responses(
        (status = 200, description = "Booked ranges", body = [ExistingRange]),
        (status = 403, description = "No employee profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn existing_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    let ranges = reporting::existing_ranges(pool.get_ref(), &auth.actor()).await?;
    Ok(HttpResponse::Ok().json(ranges))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_accepts_known_names_in_any_case() {
        assert_eq!(parse_status(Some("Approved")).unwrap().as_deref(), Some("approved"));
        assert_eq!(parse_status(None).unwrap(), None);
        assert!(parse_status(Some("cancelled")).is_err());
    }

    #[test]
    fn create_payload_defaults_to_regular_leave() {
        let payload: CreateLeave =
            serde_json::from_str(r#"{"start_date":"2026-01-05","end_date":"2026-01-07"}"#).unwrap();
        assert_eq!(
            LeaveKind::from_special_type(payload.special_type_id),
            LeaveKind::Regular
        );
    }
}
