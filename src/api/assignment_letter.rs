use crate::db::queries::assignment_letter::{
    approve_assignment_letter, create_assignment_letter, delete_assignment_letter,
    download_assignment_letter_attachment, get_assignment_letter, list_assignment_letters,
    reject_assignment_letter, update_assignment_letter, upload_assignment_letter_attachment,
};
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

/// Register assignment letter routes, including the signed PDF
pub fn assignment_letter_routes() -> Router<PgPool> {
    Router::new()
        .route("/assignment-letters", get(list_assignment_letters).post(create_assignment_letter))
        .route(
            "/assignment-letters/{id}",
            get(get_assignment_letter).put(update_assignment_letter).delete(delete_assignment_letter),
        )
        .route("/assignment-letters/{id}/approve", post(approve_assignment_letter))
        .route("/assignment-letters/{id}/reject", post(reject_assignment_letter))
        .route(
            "/assignment-letters/{id}/attachment",
            post(upload_assignment_letter_attachment).get(download_assignment_letter_attachment),
        )
}
