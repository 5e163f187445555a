use actix_web::{
    FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data,
};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::role::Role;
use crate::models::TokenType;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    /// Validates a bearer access token; refresh tokens are refused.
    pub fn from_token(token: &str, secret: &str) -> Result<Self, ApiError> {
        let claims = verify_token(token, secret)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;

        if claims.token_type != TokenType::Access {
            return Err(ApiError::Unauthorized("Access token required".into()));
        }

        let role = Role::from_id(claims.role)
            .ok_or_else(|| ApiError::Unauthorized("Invalid role".into()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
        })
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin only".into()))
        }
    }

    pub fn require_hr_or_admin(&self) -> Result<(), ApiError> {
        if self.is_hr_or_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("HR/Admin only".into()))
        }
    }

    pub fn is_hr_or_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Hr)
    }

    /// Employees only see their own records; HR/Admin may pick anyone.
    pub fn scope_user_filter(&self, requested: Option<u64>) -> Option<u64> {
        if self.is_hr_or_admin() {
            requested
        } else {
            Some(self.user_id)
        }
    }
}

/// Pulls `token` out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by the auth middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match bearer_token(req) {
            Some(t) => t,
            None => return ready(Err(ApiError::Unauthorized("Missing token".into()))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                tracing::error!("Config missing from app data");
                return ready(Err(ApiError::Internal));
            }
        };

        ready(AuthUser::from_token(token, &config.jwt_secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use actix_web::test::TestRequest;

    const SECRET: &str = "test-secret";

    #[test]
    fn access_token_yields_user() {
        let token = generate_access_token(9, "hr", Role::Hr.id(), SECRET, 60).unwrap();
        let user = AuthUser::from_token(&token, SECRET).unwrap();
        assert_eq!(user.user_id, 9);
        assert_eq!(user.role, Role::Hr);
        assert!(user.require_hr_or_admin().is_ok());
        assert!(user.require_admin().is_err());
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let (token, _) = generate_refresh_token(9, "hr", Role::Hr.id(), SECRET, 60).unwrap();
        assert!(matches!(
            AuthUser::from_token(&token, SECRET),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let token = generate_access_token(9, "x", 42, SECRET, 60).unwrap();
        assert!(AuthUser::from_token(&token, SECRET).is_err());
    }

    #[test]
    fn employees_are_scoped_to_themselves() {
        let employee = AuthUser {
            user_id: 5,
            username: "e".into(),
            role: Role::Employee,
        };
        assert_eq!(employee.scope_user_filter(Some(6)), Some(5));
        assert_eq!(employee.scope_user_filter(None), Some(5));

        let hr = AuthUser {
            role: Role::Hr,
            ..employee
        };
        assert_eq!(hr.scope_user_filter(Some(6)), Some(6));
        assert_eq!(hr.scope_user_filter(None), None);
    }

    #[actix_web::test]
    async fn extractor_reads_bearer_header() {
        let token = generate_access_token(3, "admin", Role::Admin.id(), SECRET, 60).unwrap();
        let (req, mut payload) = TestRequest::default()
            .app_data(Data::new(Config::for_tests()))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_http_parts();

        let user = AuthUser::from_request(&req, &mut payload).await.unwrap();
        assert_eq!(user.role, Role::Admin);

        let (req, mut payload) = TestRequest::default()
            .app_data(Data::new(Config::for_tests()))
            .to_http_parts();
        assert!(AuthUser::from_request(&req, &mut payload).await.is_err());
    }
}
