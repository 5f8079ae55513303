use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    config::Config,
    domain::authz::Capability,
    error::{AppError, AppResult},
    holidays::normalize_country,
    model::employee::Employee,
    repo::employee_repo::{self, EmployeeFilter, NewEmployee},
    service::{reporting, rollover::current_year},
    utils::db_utils::{build_update_sql, execute_update},
};

const DEFAULT_ENTITLEMENT: i32 = 25;

/// Columns a PUT may touch. The balance only moves through the ledger.
const UPDATABLE: &[&str] = &[
    "first_name",
    "last_name",
    "email",
    "country_code",
    "annual_entitlement",
    "manager_id",
    "position",
];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "first name", value_type = String)]
    pub first_name: String,
    #[schema(example = "last name", value_type = String)]
    pub last_name: String,
    #[schema(example = "john@email.com", format = "email", value_type = String)]
    pub email: String,
    /// Defaults to the configured country
    #[schema(example = "NL", nullable = true)]
    pub country_code: Option<String>,
    /// Defaults to 25 days
    #[schema(example = 25, nullable = true)]
    pub annual_entitlement: Option<i32>,
    #[schema(example = 4, nullable = true)]
    pub manager_id: Option<u64>,
    #[schema(example = "Engineer", nullable = true)]
    pub position: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub country_code: Option<String>,
    /// Search by name or email
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

/// Documentation shape of the partial update body.
#[derive(Deserialize, ToSchema)]
pub struct UpdateEmployee {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub country_code: Option<String>,
    pub annual_entitlement: Option<i32>,
    pub manager_id: Option<u64>,
    pub position: Option<String>,
}

/// Unique email and manager foreign key violations are caller errors.
fn constraint_error(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23000") => {
            AppError::validation("Email already in use or manager does not exist")
        }
        other => other.into(),
    }
}

/// Field-level checks the generic update builder cannot make.
fn normalize_update(employee_id: u64, mut body: Value) -> AppResult<Value> {
    let Some(obj) = body.as_object_mut() else {
        return Err(AppError::validation("Payload must be a JSON object"));
    };

    if let Some(country) = obj.get("country_code") {
        let raw = country
            .as_str()
            .ok_or_else(|| AppError::validation("country_code must be a string"))?;
        let normalized = normalize_country(raw)?;
        obj.insert("country_code".into(), Value::String(normalized));
    }

    if let Some(entitlement) = obj.get("annual_entitlement") {
        if entitlement.as_i64().is_none_or(|n| n < 0) {
            return Err(AppError::validation(
                "annual_entitlement must be a non-negative integer",
            ));
        }
    }

    if obj.get("manager_id").and_then(Value::as_u64) == Some(employee_id) {
        return Err(AppError::validation("An employee cannot manage themselves"));
    }

    Ok(body)
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created successfully", body = Employee),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateEmployee>,
) -> AppResult<HttpResponse> {
    auth.actor().require(Capability::ManageEmployees)?;

    let payload = payload.into_inner();
    if payload.first_name.trim().is_empty() || payload.email.trim().is_empty() {
        return Err(AppError::validation("first_name and email are required"));
    }
    let annual_entitlement = payload.annual_entitlement.unwrap_or(DEFAULT_ENTITLEMENT);
    if annual_entitlement < 0 {
        return Err(AppError::validation("annual_entitlement must not be negative"));
    }
    let country_code = normalize_country(
        payload
            .country_code
            .as_deref()
            .unwrap_or(config.default_country_code.as_str()),
    )?;

    if let Some(manager_id) = payload.manager_id {
        employee_repo::find(pool.get_ref(), manager_id)
            .await?
            .ok_or(AppError::NotFound("Manager"))?;
    }

    let new = NewEmployee {
        first_name: payload.first_name,
        last_name: payload.last_name,
        email: payload.email,
        country_code,
        annual_entitlement,
        manager_id: payload.manager_id,
        position: payload.position,
        // the opening balance already is this year's entitlement
        rollover_year: current_year(),
    };
    let id = employee_repo::insert(pool.get_ref(), &new)
        .await
        .map_err(constraint_error)?;
    info!(employee_id = id, created_by = auth.user_id, "Employee created");

    let employee = employee_repo::find(pool.get_ref(), id)
        .await?
        .ok_or(AppError::NotFound("Employee"))?;
    Ok(HttpResponse::Created().json(employee))
}

#[utoipa::path(
    get,
    path = "/api/employee",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 403, description = "Forbidden")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> AppResult<HttpResponse> {
    let scope = auth
        .actor()
        .scope(Capability::ViewAllEmployees, Capability::ViewManagedEmployees)?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let filter = EmployeeFilter {
        manager_id: scope.manager_id(),
        country_code: query
            .country_code
            .as_deref()
            .map(normalize_country)
            .transpose()?,
        search: query.search.clone().filter(|s| !s.trim().is_empty()),
    };
    debug!(?filter, page, per_page, "Listing employees");

    let total = employee_repo::count(pool.get_ref(), &filter).await?;
    let employees = employee_repo::list(pool.get_ref(), &filter, per_page, offset).await?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated successfully", body = Employee),
        (status = 400, description = "Unknown or protected field", body = Object, example = json!({
            "message": "Field 'available_balance' cannot be updated"
        })),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.actor().require(Capability::ManageEmployees)?;
    let employee_id = path.into_inner();

    employee_repo::find(pool.get_ref(), employee_id)
        .await?
        .ok_or(AppError::NotFound("Employee"))?;

    let body = normalize_update(employee_id, body.into_inner())?;
    let update = build_update_sql("employees", &body, UPDATABLE, "id", employee_id)?;
    execute_update(pool.get_ref(), update)
        .await
        .map_err(constraint_error)?;
    info!(employee_id, updated_by = auth.user_id, "Employee updated");

    let employee = employee_repo::find(pool.get_ref(), employee_id)
        .await?
        .ok_or(AppError::NotFound("Employee"))?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let employee =
        reporting::visible_employee(pool.get_ref(), &auth.actor(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(employee))
}

#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}/remaining",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Available balance", body = Remaining),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn remaining_holidays(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let remaining = reporting::remaining(pool.get_ref(), &auth.actor(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(remaining))
}

#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}/total/{year}",
    params(
        ("employee_id", Path, description = "Employee ID"),
        ("year", Path, description = "Calendar year")
    ),
    responses(
        (status = 200, description = "Approved regular days in the year", body = YearTotal),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn total_holidays(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, i32)>,
) -> AppResult<HttpResponse> {
    let (employee_id, year) = path.into_inner();
    let total = reporting::year_total(pool.get_ref(), &auth.actor(), employee_id, year).await?;
    Ok(HttpResponse::Ok().json(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_normalizes_country_and_rejects_negative_entitlement() {
        let body = normalize_update(3, json!({"country_code": "nl"})).unwrap();
        assert_eq!(body["country_code"], "NL");

        assert!(normalize_update(3, json!({"annual_entitlement": -1})).is_err());
        assert!(normalize_update(3, json!({"country_code": "NLD"})).is_err());
    }

    #[test]
    fn employee_cannot_be_their_own_manager() {
        assert!(normalize_update(3, json!({"manager_id": 3})).is_err());
        assert!(normalize_update(3, json!({"manager_id": 4})).is_ok());
    }

    #[test]
    fn whitelist_excludes_ledger_columns() {
        for column in ["available_balance", "last_rollover_year", "id"] {
            assert!(!UPDATABLE.contains(&column));
        }
    }
}
