use crate::db::queries::invoice::{
    approve_invoice, create_invoice, delete_invoice, download_invoice_attachment, get_invoice,
    list_invoices, reject_invoice, update_invoice, upload_invoice_attachment,
};
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

/// Register invoice routes, including the PDF attachment
pub fn invoice_routes() -> Router<PgPool> {
    Router::new()
        .route("/invoices", get(list_invoices).post(create_invoice))
        .route(
            "/invoices/{id}",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .route("/invoices/{id}/approve", post(approve_invoice))
        .route("/invoices/{id}/reject", post(reject_invoice))
        .route(
            "/invoices/{id}/attachment",
            post(upload_invoice_attachment).get(download_invoice_attachment),
        )
}
