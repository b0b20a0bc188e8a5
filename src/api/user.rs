use axum::{
    routing::{get, put},
    Router,
};
use sqlx::PgPool;
use crate::db::queries::user::*;

/// Register user management routes; handlers enforce admin-only access
/// except for `/users/me`, `/users/options` and `/roles`.
pub fn user_routes() -> Router<PgPool> {
    Router::new()
        .route("/users", get(get_all_users).post(create_user))
        .route("/users/me", get(get_me))
        .route("/users/options", get(get_user_options))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/{id}/roles", put(update_user_roles))
        .route("/roles", get(get_roles))
}
