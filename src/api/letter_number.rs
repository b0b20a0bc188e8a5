use crate::db::queries::letter_number::{
    approve_letter_number, create_letter_number, delete_letter_number, get_letter_number,
    list_letter_numbers, reject_letter_number, update_letter_number,
};
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

/// Register letter-number request routes
pub fn letter_number_routes() -> Router<PgPool> {
    Router::new()
        .route("/letter-numbers", get(list_letter_numbers).post(create_letter_number))
        .route(
            "/letter-numbers/{id}",
            get(get_letter_number).put(update_letter_number).delete(delete_letter_number),
        )
        .route("/letter-numbers/{id}/approve", post(approve_letter_number))
        .route("/letter-numbers/{id}/reject", post(reject_letter_number))
}
