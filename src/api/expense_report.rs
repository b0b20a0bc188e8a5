use crate::db::queries::expense_report::{
    approve_expense_report, create_expense_report, delete_expense_report,
    download_expense_report_attachment, get_expense_report, list_expense_reports,
    reject_expense_report, update_expense_report, upload_expense_report_attachment,
};
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

/// Register expense report routes, including the receipts PDF
pub fn expense_report_routes() -> Router<PgPool> {
    Router::new()
        .route("/expense-reports", get(list_expense_reports).post(create_expense_report))
        .route(
            "/expense-reports/{id}",
            get(get_expense_report).put(update_expense_report).delete(delete_expense_report),
        )
        .route("/expense-reports/{id}/approve", post(approve_expense_report))
        .route("/expense-reports/{id}/reject", post(reject_expense_report))
        .route(
            "/expense-reports/{id}/attachment",
            post(upload_expense_report_attachment).get(download_expense_report_attachment),
        )
}
