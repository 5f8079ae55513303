use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::domain::authz::Actor;
use crate::error::AppError;
use crate::model::role::Role;
use crate::models::{Claims, TokenType};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl AuthUser {
    /// Access-token claims to an authenticated user. Refresh tokens are refused.
    pub fn from_claims(claims: Claims) -> Result<Self, AppError> {
        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }
        let role = Role::from_id(claims.role)
            .ok_or_else(|| AppError::Unauthorized("Invalid role".into()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            employee_id: claims.employee_id,
        })
    }

    /// The user as seen by the lifecycle rules.
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            employee_id: self.employee_id,
            capabilities: self.role.capabilities(),
        }
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, AppError> {
    // already verified by auth_middleware
    if let Some(user) = req.extensions().get::<AuthUser>() {
        return Ok(user.clone());
    }

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;

    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Config missing from app data")))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid token".into()))?;

    AuthUser::from_claims(claims)
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req).map_err(Into::into))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use crate::domain::authz::Capability;
    use actix_web::{http::StatusCode, test};

    fn config() -> Config {
        Config::for_tests()
    }

    #[actix_web::test]
    async fn bearer_access_token_yields_actor_with_role_capabilities() {
        let cfg = config();
        let token =
            generate_access_token(10, "mgr".into(), Role::Manager.id(), Some(4), &cfg.jwt_secret, 60)
                .unwrap();
        let req = test::TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {token}")))
            .app_data(Data::new(cfg))
            .to_http_request();

        let user = AuthUser::extract(&req).await.unwrap();
        assert_eq!(user.role, Role::Manager);
        let actor = user.actor();
        assert_eq!(actor.employee_id, Some(4));
        assert!(actor.capabilities.has(Capability::ReviewManaged));
        assert!(!actor.capabilities.has(Capability::DeleteLeave));
    }

    #[actix_web::test]
    async fn missing_header_is_unauthorized() {
        let req = test::TestRequest::default()
            .app_data(Data::new(config()))
            .to_http_request();
        let err = AuthUser::extract(&req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn refresh_token_cannot_authenticate_requests() {
        let cfg = config();
        let (token, _) =
            generate_refresh_token(10, "ann".into(), Role::Employee.id(), None, &cfg.jwt_secret, 60)
                .unwrap();
        let req = test::TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {token}")))
            .app_data(Data::new(cfg))
            .to_http_request();
        assert!(AuthUser::extract(&req).await.is_err());
    }

    #[actix_web::test]
    async fn unknown_role_is_rejected() {
        let cfg = config();
        let token = generate_access_token(10, "x".into(), 42, None, &cfg.jwt_secret, 60).unwrap();
        let req = test::TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {token}")))
            .app_data(Data::new(cfg))
            .to_http_request();
        assert!(AuthUser::extract(&req).await.is_err());
    }
}
