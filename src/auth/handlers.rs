use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

use crate::{
    auth::{
        auth::bearer_token,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{ApiError, internal, is_duplicate_key},
    model::{role::Role, user::User},
    models::{Claims, LoginReqDto, RegisterReqDto, TokenPair, TokenType},
};

/// Inserts a user with a freshly hashed password.
pub async fn insert_user(
    pool: &MySqlPool,
    username: &str,
    display_name: &str,
    password: &str,
    role: Role,
) -> Result<u64, ApiError> {
    let hashed = hash_password(password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ApiError::Internal
    })?;

    let result = sqlx::query(
        r#"INSERT INTO users (username, display_name, password, role_id) VALUES (?, ?, ?, ?)"#,
    )
    .bind(username)
    .bind(display_name)
    .bind(hashed)
    .bind(role.id())
    .execute(pool)
    .await;

    match result {
        Ok(done) => Ok(done.last_insert_id()),
        Err(e) if is_duplicate_key(&e) => {
            Err(ApiError::Conflict("Username already exists".into()))
        }
        Err(e) => Err(internal("Failed to register user")(e)),
    }
}

/// Issues and persists a refresh token, then a matching access token.
async fn issue_tokens(
    pool: &MySqlPool,
    config: &Config,
    user_id: u64,
    username: &str,
    role: u8,
) -> Result<TokenPair, ApiError> {
    let token_error = |e: jsonwebtoken::errors::Error| {
        error!(error = %e, user_id, "Failed to sign token");
        ApiError::Internal
    };

    let access_token = generate_access_token(
        user_id,
        username,
        role,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(token_error)?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user_id,
        username,
        role,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(token_error)?;

    debug!(user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await
    .map_err(internal("Failed to store refresh token"))?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Decodes a bearer refresh token; access tokens are refused.
fn refresh_claims(req: &HttpRequest, config: &Config) -> Option<Claims> {
    let claims = verify_token(bearer_token(req)?, &config.jwt_secret).ok()?;
    (claims.token_type == TokenType::Refresh).then_some(claims)
}

/// Self registration; always creates an employee account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReqDto,
    responses(
        (status = 201, description = "User registered", body = Object, example = json!({
            "message": "User registered successfully", "id": 12
        })),
        (status = 400, description = "Missing fields"),
        (status = 409, description = "Username already exists")
    ),
    tag = "Auth"
)]
pub async fn register(
    user: web::Json<RegisterReqDto>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    let username = user.username.trim();
    let display_name = user.display_name.trim();

    if username.is_empty() || display_name.is_empty() || user.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Username, display name and password must not be empty".into(),
        ));
    }

    let id = insert_user(
        pool.get_ref(),
        username,
        display_name,
        &user.password,
        Role::Employee,
    )
    .await?;

    info!(user_id = id, "User registered");

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "id": id
    })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(ApiError::BadRequest("Username or password required".into()));
    }

    let db_user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, display_name, password, role_id, last_active_at
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim())
    .fetch_optional(pool.get_ref())
    .await
    .map_err(internal("Database error while fetching user"))?;

    let Some(db_user) = db_user else {
        info!("Invalid credentials: user not found");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let tokens = issue_tokens(
        pool.get_ref(),
        &config,
        db_user.id,
        &db_user.username,
        db_user.role_id,
    )
    .await?;

    // non-fatal
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = UTC_TIMESTAMP() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");

    Ok(HttpResponse::Ok().json(tokens))
}

/// Rotates a refresh token: the presented one is revoked, a new pair is issued
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let claims = refresh_claims(&req, &config)
        .ok_or_else(|| ApiError::Unauthorized("Invalid refresh token".into()))?;

    // revoke atomically so a token can only be rotated once
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = TRUE
        WHERE jti = ?
        AND revoked = FALSE
        AND expires_at > UTC_TIMESTAMP()
        "#,
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await
    .map_err(internal("Failed to revoke refresh token"))?;

    if revoked.rows_affected() == 0 {
        return Err(ApiError::Unauthorized("Refresh token revoked".into()));
    }

    let tokens = issue_tokens(
        pool.get_ref(),
        &config,
        claims.user_id,
        &claims.sub,
        claims.role,
    )
    .await?;

    Ok(HttpResponse::Ok().json(tokens))
}

/// Revokes the presented refresh token; always answers 204
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Logged out")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    if let Some(claims) = refresh_claims(&req, &config) {
        if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
            .bind(&claims.jti)
            .execute(pool.get_ref())
            .await
        {
            error!(error = %e, "Failed to revoke refresh token on logout");
        }
    }

    HttpResponse::NoContent().finish()
}

/// Seeds an admin account from configuration when it does not exist yet.
pub async fn ensure_bootstrap_admin(pool: &MySqlPool, config: &Config) -> anyhow::Result<()> {
    let Some((username, password)) = &config.bootstrap_admin else {
        return Ok(());
    };

    match insert_user(pool, username, "Administrator", password, Role::Admin).await {
        Ok(id) => info!(user_id = id, %username, "Bootstrap admin created"),
        Err(ApiError::Conflict(_)) => debug!(%username, "Bootstrap admin already exists"),
        Err(e) => return Err(anyhow::anyhow!("failed to seed bootstrap admin: {e}")),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn refresh_claims_require_refresh_tokens() {
        let config = Config::for_tests();

        let (refresh, _) =
            generate_refresh_token(1, "a", 3, &config.jwt_secret, 60).unwrap();
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {refresh}")))
            .to_http_request();
        assert_eq!(refresh_claims(&req, &config).unwrap().user_id, 1);

        let access = generate_access_token(1, "a", 3, &config.jwt_secret, 60).unwrap();
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {access}")))
            .to_http_request();
        assert!(refresh_claims(&req, &config).is_none());

        let req = TestRequest::default().to_http_request();
        assert!(refresh_claims(&req, &config).is_none());
    }
}
