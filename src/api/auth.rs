use axum::{extract::State, http::StatusCode, routing::post, Extension, Json, Router};
use bcrypt::{hash, verify, DEFAULT_COST};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::config::Config;
use crate::db::models::user::{Role, UserInfo};
use crate::db::queries::user::MIN_PASSWORD_CHARS;
use crate::middleware::auth::{PermissionCache, UserPermissions};
use crate::utils::api_response::ApiResponse;
use crate::utils::validation::FieldErrors;

/// Token lifetime in seconds (10 hours).
const TOKEN_TTL_SECS: i64 = 36_000;

/// JWT Claims used for authentication.
///
/// Roles are informational for the client; every request re-reads them from
/// the database through the permission cache.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject - User ID as String
    pub sub: String,
    pub username: String,
    pub roles: Vec<Role>,
    /// Expiration timestamp (UNIX TIME)
    pub exp: usize,
}

impl Claims {
    pub fn new(user_id: i32, username: String, roles: Vec<Role>, now: i64) -> Self {
        Claims {
            sub: user_id.to_string(),
            username,
            roles,
            exp: (now + TOKEN_TTL_SECS) as usize,
        }
    }

    /// Converts `sub` (user ID) to `i32`, or returns a descriptive error.
    pub fn user_id(&self) -> Result<i32, ApiResponse<()>> {
        self.sub.parse::<i32>().map_err(|_| {
            ApiResponse::error(StatusCode::BAD_REQUEST, "Invalid user ID format in token", None)
        })
    }
}

/// Represents a request to log in
#[derive(Serialize, Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Successful login: the bearer token plus who it belongs to.
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserInfo,
}

#[derive(sqlx::FromRow)]
struct Credentials {
    id: i32,
    username: String,
    password_hash: String,
}

fn invalid_credentials() -> ApiResponse<()> {
    ApiResponse::error(StatusCode::UNAUTHORIZED, "Invalid username or password.", None)
}

/// Handles user login
///
/// # Returns
/// * `200 OK` - JWT token and the user's roles.
/// * `401 Unauthorized` - If credentials are incorrect.
/// * `500 Internal Server Error` - If a database or token generation error occurs.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body(content = LoginRequest, description = "User login details"),
    responses(
        (status = 200, description = "Successful login", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid username or password"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn login(
    State(pool): State<PgPool>,
    Json(payload): Json<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, ApiResponse<()>> {
    let config = Config::get();

    let user = sqlx::query_as::<_, Credentials>(
        "SELECT id, username, password_hash FROM users WHERE username = $1",
    )
    .bind(payload.username.trim())
    .fetch_optional(&pool)
    .await
    .map_err(|e| ApiResponse::internal("Database error", e))?;

    let Some(user) = user else {
        warn!("❌ Login attempt for non-existent user: {}", payload.username);
        return Err(invalid_credentials());
    };

    let valid = verify(&payload.password, &user.password_hash)
        .map_err(|e| ApiResponse::internal("Password verification error", e))?;
    if !valid {
        warn!("❌ Invalid password attempt for user: {}", payload.username);
        return Err(invalid_credentials());
    }

    let roles: Vec<Role> =
        sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role")
            .bind(user.id)
            .fetch_all(&pool)
            .await
            .map_err(|e| ApiResponse::internal("Database error", e))?;

    let claims = Claims::new(user.id, user.username.clone(), roles.clone(), chrono::Utc::now().timestamp());
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiResponse::internal("Token generation failed", e))?;

    info!("✅ Login successful for user: {}", user.username);
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Login successful",
        LoginResponse {
            token,
            user: UserInfo { id: user.id, username: user.username, roles },
        },
    ))
}

/// Represents a request to change the caller's own password.
#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Lets an authenticated user change their own password after proving the
/// current one.
#[utoipa::path(
    post,
    path = "/auth/change_password",
    tag = "Authentication",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated successfully"),
        (status = 401, description = "Old password incorrect"),
        (status = 422, description = "New password too short"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn change_password(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let password_hash: Option<String> =
        sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
            .bind(perms.user_id)
            .fetch_optional(&pool)
            .await
            .map_err(|e| ApiResponse::internal("Database Query Failed", e))?;
    let password_hash = password_hash.ok_or_else(|| ApiResponse::not_found("User not found"))?;

    if !verify(&payload.old_password, &password_hash).unwrap_or(false) {
        return Err(ApiResponse::error(StatusCode::UNAUTHORIZED, "Incorrect old password", None));
    }
    new_password_errors(&payload.new_password).into_result()?;

    store_password(&pool, perms.user_id, &payload.new_password).await?;
    info!("🔑 Password changed by user {}", perms.username);
    Ok(ApiResponse::success(StatusCode::OK, "Password updated successfully", ()))
}

/// Represents an admin password reset request
#[derive(Deserialize, Debug, ToSchema)]
pub struct ResetPasswordRequest {
    /// ID of the user whose password is being reset
    pub user_id: i32,
    pub new_password: String,
}

/// Admin-only reset that skips the old-password check.
#[utoipa::path(
    post,
    path = "/auth/reset_password",
    tag = "Authentication",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn reset_password(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(cache): Extension<PermissionCache>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    perms.require_admin()?;
    new_password_errors(&payload.new_password).into_result()?;

    store_password(&pool, payload.user_id, &payload.new_password).await?;
    cache.invalidate(&payload.user_id);
    info!("🔑 Password of user {} reset by {}", payload.user_id, perms.username);
    Ok(ApiResponse::success(StatusCode::OK, "Password reset successfully", ()))
}

fn new_password_errors(password: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.check(
        password.chars().count() >= MIN_PASSWORD_CHARS,
        "new_password",
        "The new password must be at least 8 characters.",
    );
    errors
}

async fn store_password(pool: &PgPool, user_id: i32, password: &str) -> Result<(), ApiResponse<()>> {
    let new_hash = hash(password, DEFAULT_COST)
        .map_err(|e| ApiResponse::internal("Password hashing failed", e))?;

    let result = sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(new_hash)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| ApiResponse::internal("Failed to update password", e))?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::not_found("User not found"));
    }
    Ok(())
}

/// Public authentication routes.
///
/// # Routes
/// - `POST /auth/login` → Authenticate a user and return a JWT token.
///
/// ```sh
/// curl -X POST http://localhost:3000/auth/login -H "Content-Type: application/json" -d '{"username": "admin", "password": "secret123"}'
/// ```
pub fn auth_routes() -> Router<PgPool> {
    Router::new().route("/auth/login", post(login))
}

/// Authentication routes that need a valid token.
///
/// # Routes
/// - `POST /auth/change_password` → Change the caller's own password.
/// - `POST /auth/reset_password` → Admins reset another user's password.
pub fn secure_auth_routes() -> Router<PgPool> {
    Router::new()
        .route("/auth/change_password", post(change_password))
        .route("/auth/reset_password", post(reset_password))
}

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::openapi::Components;
use utoipa::Modify;
use utoipa::OpenApi;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut components = openapi.components.clone().unwrap_or(Components::default());
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
        openapi.components = Some(components);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(login, change_password, reset_password),
    components(
        schemas(LoginRequest, LoginResponse, ChangePasswordRequest, ResetPasswordRequest)
    ),
    tags(
        (name = "Authentication", description = "Login and password management")
    ),
    modifiers(&SecurityAddon)
)]
pub struct AuthDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    #[test]
    fn claims_round_trip_through_a_token() {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims::new(42, "budi".into(), vec![Role::Karyawan, Role::Pic], now);
        let key = b"test-secret";
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(key)).unwrap();

        let decoded = decode::<Claims>(&token, &DecodingKey::from_secret(key), &Validation::default())
            .unwrap()
            .claims;
        assert_eq!(decoded.user_id().unwrap(), 42);
        assert_eq!(decoded.roles, vec![Role::Karyawan, Role::Pic]);
        assert_eq!(decoded.exp, (now + TOKEN_TTL_SECS) as usize);
    }

    #[test]
    fn malformed_subject_is_rejected() {
        let claims = Claims { sub: "abc".into(), username: "x".into(), roles: vec![], exp: 0 };
        assert_eq!(claims.user_id().unwrap_err().status_code, 400);
    }

    #[test]
    fn short_new_password_is_invalid() {
        assert!(new_password_errors("1234567").get("new_password").is_some());
        assert!(new_password_errors("12345678").is_empty());
    }
}
