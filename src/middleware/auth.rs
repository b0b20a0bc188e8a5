use std::sync::Arc;
use axum::{
    extract::{Request, State, Extension},
    body::Body,
    http::StatusCode,
    middleware::Next,
    response::{Response, IntoResponse},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::error;
use moka::sync::Cache; // ✅ High-performance TTL Cache
use std::time::Duration;
use crate::config::Config;
use crate::db::models::user::Role;
use crate::utils::api_response::ApiResponse;
use serde_json::json;
use crate::api::auth::Claims;

/// ✅ **RBAC Permissions Cache Using `moka`**
pub type PermissionCache = Arc<Cache<i32, UserPermissions>>;

/// ✅ **Initialize the `moka` Cache**
pub fn create_permission_cache() -> PermissionCache {
    Arc::new(
        Cache::builder()
            .time_to_live(Duration::from_secs(600)) // ✅ TTL = 10 minutes
            .build(),
    )
}

/// ✅ **JWT Middleware** (Handles Token Authentication)
pub async fn jwt_middleware(
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    // Step 1: Extract Authorization header
    let auth_header = req.headers().get("Authorization").ok_or_else(|| {
        tracing::warn!("Missing Authorization header");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing Authorization header", None).into_response()
    })?;

    // Step 2: Convert header to string
    let token_str = auth_header.to_str().map_err(|_| {
        tracing::warn!("Invalid Authorization header format");
        ApiResponse::<()>::error(StatusCode::BAD_REQUEST, "Invalid Authorization header format", None).into_response()
    })?;

    // Step 3: Strip "Bearer " prefix
    let token = token_str.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::warn!("Invalid token format (missing 'Bearer ' prefix)");
        ApiResponse::<()>::error(StatusCode::BAD_REQUEST, "Invalid token format (missing 'Bearer ' prefix)", None).into_response()
    })?;

    // Step 4: Decode the JWT token
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(Config::get().jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::warn!("JWT decoding failed: {:?}", e);
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Invalid token", Some(json!({ "error": e.to_string() }))).into_response()
    })?;

    // Step 5: Insert claims into request extensions
    tracing::debug!("JWT decoded successfully for user {}", token_data.claims.username);
    req.extensions_mut().insert(token_data.claims);

    Ok(next.run(req).await)
}

/// ✅ **User Permissions Structure**
///
/// Resolved from the database on each request (through the cache), so role
/// changes apply without waiting for the token to expire.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserPermissions {
    pub user_id: i32,
    pub username: String,
    pub roles: Vec<Role>,
}

impl UserPermissions {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.has_role(*role))
    }

    /// ✅ **Check if user is a system-wide administrator**
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// `403` unless the caller is an admin.
    pub fn require_admin(&self) -> Result<(), ApiResponse<()>> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiResponse::forbidden("Only administrators can manage users"))
        }
    }
}

/// ✅ **RBAC Middleware with `moka`**
pub async fn rbac_middleware(
    State(db_pool): State<PgPool>,
    Extension(permission_cache): Extension<PermissionCache>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let claims = req.extensions()
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| {
            error!("Missing JWT claims in request");
            ApiResponse::<()>::error(
                StatusCode::UNAUTHORIZED,
                "Missing JWT claims in request",
                None,
            ).into_response()
        })?;

    let user_id = claims.user_id().map_err(|e| e.into_response())?;

    // ✅ **Check cache first before querying DB**
    if let Some(cached_permissions) = permission_cache.get(&user_id) {
        req.extensions_mut().insert(cached_permissions);
        return Ok(next.run(req).await);
    }

    // ❌ **If not cached, query database**
    let user_permissions = match fetch_rbac_from_db(user_id, &db_pool).await {
        Ok(Some(permissions)) => permissions,
        Ok(None) => {
            tracing::warn!("Token presented for missing user {}", user_id);
            return Err(ApiResponse::<()>::error(
                StatusCode::UNAUTHORIZED,
                "User no longer exists",
                None,
            ).into_response());
        }
        Err(err) => {
            error!("Database query failed: {:?}", err);
            return Err(ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load user permissions",
                Some(json!({ "error": err.to_string() })),
            ).into_response());
        }
    };

    permission_cache.insert(user_id, user_permissions.clone());

    req.extensions_mut().insert(user_permissions);
    Ok(next.run(req).await)
}

/// ✅ **Query Database for RBAC Data**
async fn fetch_rbac_from_db(user_id: i32, pool: &PgPool) -> Result<Option<UserPermissions>, sqlx::Error> {
    let username: Option<String> = sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    let Some(username) = username else {
        return Ok(None);
    };

    let roles: Vec<Role> = sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role")
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(Some(UserPermissions { user_id, username, roles }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms(roles: &[Role]) -> UserPermissions {
        UserPermissions { user_id: 1, username: "budi".into(), roles: roles.to_vec() }
    }

    #[test]
    fn role_checks_use_the_whole_role_set() {
        let p = perms(&[Role::Karyawan, Role::Pic]);
        assert!(p.has_role(Role::Pic));
        assert!(p.has_any_role(&[Role::Manager, Role::Pic]));
        assert!(!p.has_any_role(&[]));
        assert!(!p.is_admin());
        assert!(p.require_admin().is_err());
        assert!(perms(&[Role::Admin]).require_admin().is_ok());
    }

    #[test]
    fn cache_returns_inserted_permissions() {
        let cache = create_permission_cache();
        cache.insert(1, perms(&[Role::Manager]));
        assert_eq!(cache.get(&1).map(|p| p.roles), Some(vec![Role::Manager]));
        cache.invalidate(&1);
        assert!(cache.get(&1).is_none());
    }
}
