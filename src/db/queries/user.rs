use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use bcrypt::{hash, DEFAULT_COST};
use serde::Deserialize;
use sqlx::{PgPool, QueryBuilder};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::config::Config;
use crate::db::models::user::{
    NewUser, Role, UpdateRoles, UpdateUser, User, UserInfo, UserOption, UserRoleRow, UserWithRoles,
};
use crate::middleware::auth::{PermissionCache, UserPermissions};
use crate::utils::api_response::ApiResponse;
use crate::utils::pagination::{clamp_page, page_offset, Page, PER_PAGE};
use crate::utils::validation::{clean_optional, FieldErrors};

pub const MIN_PASSWORD_CHARS: usize = 8;

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    pub page: Option<i64>,
    /// Matches name, username or email
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct OptionsQuery {
    /// Only users holding this role, e.g. `PIC`
    pub role: Option<Role>,
}

/// Guards a role assignment: at least one role, and an admin cannot take
/// the admin role away from themselves.
pub fn check_role_change(
    actor: &UserPermissions,
    target_id: i32,
    roles: &[Role],
) -> Result<(), ApiResponse<()>> {
    let mut errors = FieldErrors::new();
    errors.check(!roles.is_empty(), "roles", "At least one role must be assigned.");
    errors.into_result()?;

    if actor.user_id == target_id && actor.is_admin() && !roles.contains(&Role::Admin) {
        return Err(ApiResponse::forbidden("You cannot remove the admin role from yourself"));
    }
    Ok(())
}

pub fn check_user_delete(actor: &UserPermissions, target_id: i32) -> Result<(), ApiResponse<()>> {
    if actor.user_id == target_id {
        return Err(ApiResponse::forbidden("You cannot delete your own account"));
    }
    Ok(())
}

fn validate_new_user(user: &NewUser) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.require_text("name", &user.name, 255);
    errors.require_text("username", &user.username, 100);
    check_email(&mut errors, user.email.as_deref());
    errors.check(
        user.password.chars().count() >= MIN_PASSWORD_CHARS,
        "password",
        "The password must be at least 8 characters.",
    );
    errors.check(!user.roles.is_empty(), "roles", "At least one role must be assigned.");
    errors
}

fn validate_update(update: &UpdateUser) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if let Some(name) = &update.name {
        errors.require_text("name", name, 255);
    }
    if let Some(username) = &update.username {
        errors.require_text("username", username, 100);
    }
    check_email(&mut errors, update.email.as_deref());
    if let Some(password) = &update.password {
        errors.check(
            password.chars().count() >= MIN_PASSWORD_CHARS,
            "password",
            "The password must be at least 8 characters.",
        );
    }
    errors
}

fn check_email(errors: &mut FieldErrors, email: Option<&str>) {
    if let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) {
        let well_formed = email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
            .unwrap_or(false);
        errors.check(well_formed, "email", "The email must be a valid email address.");
    }
}

/// `true` if another user already uses `value` in `column` (`username` or `email`).
async fn is_taken(
    pool: &PgPool,
    column: &'static str,
    value: &str,
    except_id: Option<i32>,
) -> Result<bool, ApiResponse<()>> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER({}) = LOWER($1) AND id <> $2)",
        column
    );
    sqlx::query_scalar::<_, bool>(&sql)
        .bind(value.trim())
        .bind(except_id.unwrap_or(0))
        .fetch_one(pool)
        .await
        .map_err(|e| ApiResponse::internal("Failed to validate user", e))
}

async fn load_roles(pool: &PgPool, user_ids: &[i32]) -> Result<HashMap<i32, Vec<Role>>, ApiResponse<()>> {
    let rows = sqlx::query_as::<_, UserRoleRow>(
        "SELECT user_id, role FROM user_roles WHERE user_id = ANY($1) ORDER BY role",
    )
    .bind(user_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| ApiResponse::internal("Failed to retrieve roles", e))?;

    let mut roles: HashMap<i32, Vec<Role>> = HashMap::new();
    for row in rows {
        roles.entry(row.user_id).or_default().push(row.role);
    }
    Ok(roles)
}

async fn find_user(pool: &PgPool, id: i32) -> Result<UserWithRoles, ApiResponse<()>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| ApiResponse::internal("Failed to retrieve user", e))?
        .ok_or_else(|| ApiResponse::not_found("User not found"))?;
    let roles = load_roles(pool, &[id]).await?.remove(&id).unwrap_or_default();
    Ok(UserWithRoles { user, roles })
}

#[utoipa::path(
    get,
    path = "/users",
    params(UserQuery),
    responses(
        (status = 200, description = "Page of users with their roles", body = ApiResponse<Page<UserWithRoles>>),
        (status = 403, description = "Admins only")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn get_all_users(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Query(params): Query<UserQuery>,
) -> Result<ApiResponse<Page<UserWithRoles>>, ApiResponse<()>> {
    perms.require_admin()?;
    let page = clamp_page(params.page);
    let search = clean_optional(params.search).map(|s| format!("%{}%", s));

    let mut count_qb: QueryBuilder<sqlx::Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM users WHERE TRUE");
    let mut list_qb: QueryBuilder<sqlx::Postgres> =
        QueryBuilder::new("SELECT * FROM users WHERE TRUE");
    if let Some(pattern) = &search {
        for qb in [&mut count_qb, &mut list_qb] {
            qb.push(" AND (name ILIKE ").push_bind(pattern.clone())
                .push(" OR username ILIKE ").push_bind(pattern.clone())
                .push(" OR email ILIKE ").push_bind(pattern.clone())
                .push(")");
        }
    }
    list_qb.push(" ORDER BY name, id LIMIT ").push_bind(PER_PAGE)
        .push(" OFFSET ").push_bind(page_offset(page));

    let total = count_qb
        .build_query_scalar::<i64>()
        .fetch_one(&pool)
        .await
        .map_err(|e| ApiResponse::internal("Failed to retrieve users", e))?;
    let users = list_qb
        .build_query_as::<User>()
        .fetch_all(&pool)
        .await
        .map_err(|e| ApiResponse::internal("Failed to retrieve users", e))?;

    let ids: Vec<i32> = users.iter().map(|u| u.id).collect();
    let mut roles = load_roles(&pool, &ids).await?;
    let items = users
        .into_iter()
        .map(|user| {
            let roles = roles.remove(&user.id).unwrap_or_default();
            UserWithRoles { user, roles }
        })
        .collect();

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Users retrieved successfully",
        Page::new(items, page, total),
    ))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Retrieve a single user", body = ApiResponse<UserWithRoles>),
        (status = 403, description = "Admins only"),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn get_user(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<UserWithRoles>, ApiResponse<()>> {
    perms.require_admin()?;
    let user = find_user(&pool, id).await?;
    Ok(ApiResponse::success(StatusCode::OK, "User retrieved successfully", user))
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = NewUser,
    responses(
        (status = 201, description = "User created", body = ApiResponse<UserWithRoles>),
        (status = 403, description = "Admins only"),
        (status = 422, description = "Validation failed or username/email taken")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn create_user(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Json(payload): Json<NewUser>,
) -> Result<ApiResponse<UserWithRoles>, ApiResponse<()>> {
    perms.require_admin()?;

    let mut errors = validate_new_user(&payload);
    let email = clean_optional(payload.email.clone());
    if !payload.username.trim().is_empty() {
        errors.check(
            !is_taken(&pool, "username", &payload.username, None).await?,
            "username",
            "The username has already been taken.",
        );
    }
    if let Some(email) = &email {
        errors.check(
            !is_taken(&pool, "email", email, None).await?,
            "email",
            "The email has already been taken.",
        );
    }
    errors.into_result()?;

    let password_hash = hash(&payload.password, DEFAULT_COST)
        .map_err(|e| ApiResponse::internal("Password hashing failed", e))?;

    let user = insert_user(
        &pool,
        payload.name.trim(),
        payload.username.trim(),
        email.as_deref(),
        &password_hash,
        &payload.roles,
    )
    .await
    .map_err(|e| ApiResponse::internal("Failed to create user", e))?;

    info!("👤 User {} created by {}", user.user.username, perms.username);
    Ok(ApiResponse::success(StatusCode::CREATED, "User created successfully", user))
}

async fn insert_user(
    pool: &PgPool,
    name: &str,
    username: &str,
    email: Option<&str>,
    password_hash: &str,
    roles: &[Role],
) -> Result<UserWithRoles, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, username, email, password_hash)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .fetch_one(&mut *tx)
    .await?;

    let mut roles = roles.to_vec();
    roles.sort();
    roles.dedup();
    for role in &roles {
        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
            .bind(user.id)
            .bind(role)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(UserWithRoles { user, roles })
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    request_body = UpdateUser,
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserWithRoles>),
        (status = 400, description = "No fields provided for update"),
        (status = 403, description = "Admins only"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn update_user(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(cache): Extension<PermissionCache>,
    Path(id): Path<i32>,
    Json(update): Json<UpdateUser>,
) -> Result<ApiResponse<UserWithRoles>, ApiResponse<()>> {
    perms.require_admin()?;
    if update.is_empty() {
        return Err(ApiResponse::error(
            StatusCode::BAD_REQUEST,
            "No fields provided for update",
            None,
        ));
    }

    let mut errors = validate_update(&update);
    let email = clean_optional(update.email.clone());
    if let Some(username) = update.username.as_deref().filter(|u| !u.trim().is_empty()) {
        errors.check(
            !is_taken(&pool, "username", username, Some(id)).await?,
            "username",
            "The username has already been taken.",
        );
    }
    if let Some(email) = &email {
        errors.check(
            !is_taken(&pool, "email", email, Some(id)).await?,
            "email",
            "The email has already been taken.",
        );
    }
    errors.into_result()?;

    let mut query_builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new("UPDATE users SET ");
    if let Some(name) = &update.name {
        query_builder.push("name = ").push_bind(name.trim().to_string()).push(", ");
    }
    if let Some(username) = &update.username {
        query_builder.push("username = ").push_bind(username.trim().to_string()).push(", ");
    }
    if update.email.is_some() {
        query_builder.push("email = ").push_bind(email).push(", ");
    }
    if let Some(password) = &update.password {
        let password_hash = hash(password, DEFAULT_COST)
            .map_err(|e| ApiResponse::internal("Password hashing failed", e))?;
        query_builder.push("password_hash = ").push_bind(password_hash).push(", ");
    }
    query_builder.push("updated_at = NOW() WHERE id = ").push_bind(id);

    let result = query_builder
        .build()
        .execute(&pool)
        .await
        .map_err(|e| ApiResponse::internal("Failed to update user", e))?;
    if result.rows_affected() == 0 {
        return Err(ApiResponse::not_found("User not found"));
    }

    cache.invalidate(&id);
    let user = find_user(&pool, id).await?;
    Ok(ApiResponse::success(StatusCode::OK, "User updated successfully", user))
}

/// Replaces the user's whole role set. Takes effect on their next request.
#[utoipa::path(
    put,
    path = "/users/{id}/roles",
    request_body = UpdateRoles,
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Roles replaced", body = ApiResponse<UserWithRoles>),
        (status = 403, description = "Admins only, and not your own admin role"),
        (status = 404, description = "User not found"),
        (status = 422, description = "No roles given")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn update_user_roles(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(cache): Extension<PermissionCache>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateRoles>,
) -> Result<ApiResponse<UserWithRoles>, ApiResponse<()>> {
    perms.require_admin()?;
    check_role_change(&perms, id, &payload.roles)?;
    find_user(&pool, id).await?;

    let mut roles = payload.roles;
    roles.sort();
    roles.dedup();

    let replace = async {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for role in &roles {
            sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
                .bind(id)
                .bind(role)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await
    };
    replace
        .await
        .map_err(|e: sqlx::Error| ApiResponse::internal("Failed to update roles", e))?;

    cache.invalidate(&id);
    info!("🔑 Roles of user {} set to {:?} by {}", id, roles, perms.username);
    let user = find_user(&pool, id).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Roles updated successfully", user))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted successfully"),
        (status = 403, description = "Admins only, and not yourself"),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(cache): Extension<PermissionCache>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    perms.require_admin()?;
    check_user_delete(&perms, id)?;

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| ApiResponse::internal("Failed to delete user", e))?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::not_found("User not found"));
    }

    cache.invalidate(&id);
    warn!("🗑️ User {} deleted by {}", id, perms.username);
    Ok(ApiResponse::success(StatusCode::OK, "User deleted successfully", ()))
}

#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Current authenticated user info", body = ApiResponse<UserInfo>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn get_me(
    Extension(perms): Extension<UserPermissions>,
) -> Result<ApiResponse<UserInfo>, ApiResponse<()>> {
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Authenticated user info",
        UserInfo {
            id: perms.user_id,
            username: perms.username.clone(),
            roles: perms.roles.clone(),
        },
    ))
}

/// Id/name pairs for pickers such as the person-in-charge field.
#[utoipa::path(
    get,
    path = "/users/options",
    params(OptionsQuery),
    responses(
        (status = 200, description = "Selectable users", body = ApiResponse<Vec<UserOption>>)
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn get_user_options(
    State(pool): State<PgPool>,
    Query(params): Query<OptionsQuery>,
) -> Result<ApiResponse<Vec<UserOption>>, ApiResponse<()>> {
    let options = match params.role {
        Some(role) => {
            sqlx::query_as::<_, UserOption>(
                r#"
                SELECT u.id, u.name
                FROM users u
                JOIN user_roles ur ON ur.user_id = u.id
                WHERE ur.role = $1
                ORDER BY u.name
                "#,
            )
            .bind(role)
            .fetch_all(&pool)
            .await
        }
        None => {
            sqlx::query_as::<_, UserOption>("SELECT id, name FROM users ORDER BY name")
                .fetch_all(&pool)
                .await
        }
    }
    .map_err(|e| ApiResponse::internal("Failed to retrieve users", e))?;

    Ok(ApiResponse::success(StatusCode::OK, "Users retrieved successfully", options))
}

#[utoipa::path(
    get,
    path = "/roles",
    responses(
        (status = 200, description = "Every assignable role", body = ApiResponse<Vec<Role>>)
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn get_roles() -> ApiResponse<Vec<Role>> {
    ApiResponse::success(StatusCode::OK, "Roles retrieved successfully", Role::ALL.to_vec())
}

/// Creates the configured admin account when no user exists yet.
pub async fn ensure_bootstrap_admin(pool: &PgPool, config: &Config) -> anyhow::Result<()> {
    let Some((username, password)) = &config.bootstrap_admin else {
        return Ok(());
    };

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    let password_hash = hash(password, DEFAULT_COST)?;
    insert_user(pool, "Administrator", username, None, &password_hash, &[Role::Admin]).await?;
    info!("👤 Bootstrap admin '{}' created", username);
    Ok(())
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        get_all_users,
        get_user,
        create_user,
        update_user,
        update_user_roles,
        delete_user,
        get_me,
        get_user_options,
        get_roles,
    ),
    components(
        schemas(User, UserWithRoles, NewUser, UpdateUser, UpdateRoles, UserInfo, UserOption, Role)
    ),
    tags(
        (name = "Users", description = "User and role management")
    )
)]
pub struct UserDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::policy::tests::actor;

    fn new_user() -> NewUser {
        NewUser {
            name: "Siti Rahma".into(),
            username: "siti".into(),
            email: Some("siti@kantor.go.id".into()),
            password: "rahasia123".into(),
            roles: vec![Role::Karyawan],
        }
    }

    #[test]
    fn admin_cannot_drop_own_admin_role() {
        let admin = actor(1, &[Role::Admin, Role::Manager]);
        assert!(check_role_change(&admin, 1, &[Role::Manager]).is_err());
        assert!(check_role_change(&admin, 1, &[Role::Admin]).is_ok());
        assert!(check_role_change(&admin, 2, &[Role::Karyawan]).is_ok());
    }

    #[test]
    fn empty_role_set_is_invalid() {
        let admin = actor(1, &[Role::Admin]);
        let err = check_role_change(&admin, 2, &[]).unwrap_err();
        assert_eq!(err.status_code, 422);
    }

    #[test]
    fn nobody_deletes_themselves() {
        let admin = actor(1, &[Role::Admin]);
        assert!(check_user_delete(&admin, 1).is_err());
        assert!(check_user_delete(&admin, 3).is_ok());
    }

    #[test]
    fn new_user_needs_password_and_roles() {
        assert!(validate_new_user(&new_user()).is_empty());

        let errors = validate_new_user(&NewUser {
            password: "short".into(),
            roles: vec![],
            email: Some("not-an-email".into()),
            ..new_user()
        });
        assert!(errors.get("password").is_some());
        assert!(errors.get("roles").is_some());
        assert!(errors.get("email").is_some());
    }

    #[test]
    fn partial_update_checks_only_given_fields() {
        let update = UpdateUser { name: None, username: None, email: None, password: Some("12345678".into()) };
        assert!(validate_update(&update).is_empty());

        let update = UpdateUser { name: Some(" ".into()), username: None, email: Some("".into()), password: None };
        let errors = validate_update(&update);
        assert!(errors.get("name").is_some());
        assert!(errors.get("email").is_none());
    }
}
