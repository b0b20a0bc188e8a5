use crate::db::queries::inventory_loan::{
    approve_inventory_loan, complete_inventory_loan, create_inventory_loan, delete_inventory_loan,
    get_inventory_loan, list_inventory_loans, reject_inventory_loan, update_inventory_loan,
};
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

/// Register inventory loan routes
pub fn inventory_loan_routes() -> Router<PgPool> {
    Router::new()
        .route("/inventory-loans", get(list_inventory_loans).post(create_inventory_loan))
        .route(
            "/inventory-loans/{id}",
            get(get_inventory_loan).put(update_inventory_loan).delete(delete_inventory_loan),
        )
        .route("/inventory-loans/{id}/approve", post(approve_inventory_loan))
        .route("/inventory-loans/{id}/reject", post(reject_inventory_loan))
        .route("/inventory-loans/{id}/complete", post(complete_inventory_loan))
}
