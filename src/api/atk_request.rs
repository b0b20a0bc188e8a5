use crate::db::queries::atk_request::{
    approve_atk_request, complete_atk_request, create_atk_request, delete_atk_request,
    get_atk_request, list_atk_requests, reject_atk_request, update_atk_request,
};
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

/// Register ATK (stationery) request routes
pub fn atk_request_routes() -> Router<PgPool> {
    Router::new()
        .route("/atk-requests", get(list_atk_requests).post(create_atk_request))
        .route(
            "/atk-requests/{id}",
            get(get_atk_request).put(update_atk_request).delete(delete_atk_request),
        )
        .route("/atk-requests/{id}/approve", post(approve_atk_request))
        .route("/atk-requests/{id}/reject", post(reject_atk_request))
        .route("/atk-requests/{id}/complete", post(complete_atk_request))
}
