use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    domain::authz::Capability,
    error::{AppError, AppResult},
    model::role::Role,
    models::{Claims, LoginReqDto, TokenPair, TokenType, UserReq},
    repo::{employee_repo, user_repo},
};

fn internal(e: impl std::fmt::Display) -> AppError {
    AppError::Internal(anyhow::anyhow!("{e}"))
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn refresh_claims(req: &HttpRequest, config: &Config) -> Option<Claims> {
    let claims = verify_token(bearer(req)?, &config.jwt_secret).ok()?;
    (claims.token_type == TokenType::Refresh).then_some(claims)
}

/// Issues an access/refresh pair and stores the refresh token id.
async fn issue_tokens(
    pool: &MySqlPool,
    config: &Config,
    user_id: u64,
    username: &str,
    role_id: u8,
    employee_id: Option<u64>,
) -> AppResult<TokenPair> {
    let access_token = generate_access_token(
        user_id,
        username.to_string(),
        role_id,
        employee_id,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(internal)?;

    let (refresh_token, claims) = generate_refresh_token(
        user_id,
        username.to_string(),
        role_id,
        employee_id,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(internal)?;

    debug!(user_id, jti = %claims.jti, "Storing refresh token");
    user_repo::store_refresh_token(pool, user_id, &claims.jti, claims.exp as i64).await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// User registration handler.
///
/// The first user of an empty installation may pick any role. After that,
/// only callers allowed to manage employees may create non-employee users or
/// link a user to an employee profile.
#[instrument(name = "auth_register", skip_all, fields(username = %user.username))]
pub async fn register(
    caller: Option<AuthUser>,
    user: web::Json<UserReq>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    let username = user.username.trim();
    if username.is_empty() || user.password.is_empty() {
        return Err(AppError::validation(
            "Username and password must not be empty",
        ));
    }

    let first_user = user_repo::count(pool.get_ref()).await? == 0;
    let role = match user.role_id {
        Some(id) => Role::from_id(id).ok_or_else(|| AppError::validation("Invalid role"))?,
        None if first_user => Role::Admin,
        None => Role::Employee,
    };

    let privileged = role != Role::Employee || user.employee_id.is_some();
    if privileged && !first_user {
        let allowed = caller
            .as_ref()
            .is_some_and(|c| c.actor().capabilities.has(Capability::ManageEmployees));
        if !allowed {
            return Err(AppError::forbidden(
                "Only employee managers may assign roles or employee profiles.",
            ));
        }
    }

    if let Some(employee_id) = user.employee_id {
        employee_repo::find(pool.get_ref(), employee_id)
            .await?
            .ok_or(AppError::NotFound("Employee"))?;
    }

    let hashed = hash_password(&user.password).map_err(internal)?;
    match user_repo::insert(pool.get_ref(), username, &hashed, role.id(), user.employee_id).await {
        Ok(id) => {
            info!(user_id = id, %role, "User registered");
            Ok(HttpResponse::Created().json(json!({
                "message": "User registered successfully",
                "id": id,
                "role": role.to_string(),
            })))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
            Ok(HttpResponse::Conflict().json(json!({
                "message": "Username already exists"
            })))
        }
        Err(e) => Err(e.into()),
    }
}

#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(AppError::validation("Username or password required"));
    }

    let Some(db_user) = user_repo::find_by_username(pool.get_ref(), user.username.trim()).await?
    else {
        info!("Invalid credentials: user not found");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let tokens = issue_tokens(
        pool.get_ref(),
        &config,
        db_user.id,
        &db_user.username,
        db_user.role_id,
        db_user.employee_id,
    )
    .await?;

    if let Err(e) = user_repo::touch_last_login(pool.get_ref(), db_user.id).await {
        // login still succeeds
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");
    Ok(HttpResponse::Ok().json(tokens))
}

/// Rotates a refresh token: the presented one is revoked and a new pair issued.
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let claims = refresh_claims(&req, &config)
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".into()))?;

    let mut tx = pool.begin().await?;
    let record = match user_repo::refresh_token_for_update(&mut *tx, &claims.jti).await? {
        Some(r) if !r.revoked && r.user_id == claims.user_id => r,
        _ => {
            warn!(jti = %claims.jti, "Refresh with unknown or revoked token");
            return Err(AppError::Unauthorized("Invalid refresh token".into()));
        }
    };
    user_repo::revoke_refresh_token(&mut *tx, &claims.jti).await?;
    tx.commit().await?;

    let tokens = issue_tokens(
        pool.get_ref(),
        &config,
        record.user_id,
        &claims.sub,
        claims.role,
        claims.employee_id,
    )
    .await?;

    debug!(user_id = record.user_id, old = record.id, "Refresh token rotated");
    Ok(HttpResponse::Ok().json(tokens))
}

/// Revokes the presented refresh token. Always answers 204.
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    if let Some(claims) = refresh_claims(&req, &config) {
        if let Err(e) = user_repo::revoke_refresh_token(pool.get_ref(), &claims.jti).await {
            error!(error = %e, "Failed to revoke refresh token");
        }
    }
    HttpResponse::NoContent().finish()
}
