use axum::{routing::get, Router};
use sqlx::PgPool;

use crate::db::queries::dashboard::get_dashboard;

pub fn dashboard_routes() -> Router<PgPool> {
    Router::new().route("/dashboard", get(get_dashboard))
}
