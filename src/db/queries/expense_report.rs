use axum::{
    extract::{Extension, Multipart, Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use sqlx::PgPool;

use crate::db::models::expense_report::{ExpenseReport, ExpenseReportForm};
use crate::db::models::submission::{RejectPayload, SubmissionView};
use crate::db::queries::attachment;
use crate::db::queries::submission::{
    self, authorize_create, created, finish_revision, prepare_revision, revision_builder,
    user_has_role, Transition, ViewResponse,
};
use crate::db::models::user::Role;
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::utils::pagination::{ListParams, Page};
use crate::utils::validation::FieldErrors;
use crate::workflow::policy::SharedPolicy;

fn validate(form: &ExpenseReportForm) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.require_text("activity", &form.activity, 255);
    errors.amount("amount", &form.amount);
    errors
}

/// Field checks plus the person in charge, who must hold the PIC role.
fn reference_errors(form: &ExpenseReportForm, pic_holds_role: bool) -> FieldErrors {
    let mut errors = validate(form);
    errors.check(
        pic_holds_role,
        "pic_id",
        "The selected person in charge must be a user with the PIC role.",
    );
    errors
}

async fn validate_with_references(
    pool: &PgPool,
    form: &ExpenseReportForm,
) -> Result<(), ApiResponse<()>> {
    let pic_holds_role = user_has_role(pool, form.pic_id, Role::Pic).await?;
    reference_errors(form, pic_holds_role).into_result()
}

#[utoipa::path(
    get,
    path = "/expense-reports",
    params(ListParams),
    responses(
        (status = 200, description = "Page of expense reports visible to the caller", body = ApiResponse<Page<SubmissionView<ExpenseReport>>>),
        (status = 403, description = "Caller may not view expense reports")
    ),
    tag = "Expense Reports",
    security(("bearerAuth" = []))
)]
pub async fn list_expense_reports(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Page<SubmissionView<ExpenseReport>>>, ApiResponse<()>> {
    let page = submission::list::<ExpenseReport>(&pool, &policy, &perms, &params).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Expense reports retrieved", page))
}

#[utoipa::path(
    get,
    path = "/expense-reports/{id}",
    params(("id" = i32, Path, description = "Expense report ID")),
    responses(
        (status = 200, description = "Expense report with action flags", body = ApiResponse<SubmissionView<ExpenseReport>>),
        (status = 403, description = "Not the caller's report"),
        (status = 404, description = "Expense report not found")
    ),
    tag = "Expense Reports",
    security(("bearerAuth" = []))
)]
pub async fn get_expense_report(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> ViewResponse<ExpenseReport> {
    submission::show::<ExpenseReport>(&pool, &policy, &perms, id).await
}

#[utoipa::path(
    post,
    path = "/expense-reports",
    request_body = ExpenseReportForm,
    responses(
        (status = 201, description = "Expense report submitted", body = ApiResponse<SubmissionView<ExpenseReport>>),
        (status = 403, description = "Caller may not file expense reports"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Expense Reports",
    security(("bearerAuth" = []))
)]
pub async fn create_expense_report(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Json(form): Json<ExpenseReportForm>,
) -> ViewResponse<ExpenseReport> {
    authorize_create::<ExpenseReport>(&policy, &perms)?;
    validate_with_references(&pool, &form).await?;

    let record = sqlx::query_as::<_, ExpenseReport>(
        r#"
        INSERT INTO expense_reports (user_id, pic_id, activity, amount, report_date)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(perms.user_id)
    .bind(form.pic_id)
    .bind(form.activity.trim())
    .bind(&form.amount)
    .bind(form.report_date)
    .fetch_one(&pool)
    .await
    .map_err(|e| ApiResponse::internal("Failed to create expense report", e))?;

    created(&pool, &policy, &perms, record).await
}

#[utoipa::path(
    put,
    path = "/expense-reports/{id}",
    params(("id" = i32, Path, description = "Expense report ID")),
    request_body = ExpenseReportForm,
    responses(
        (status = 200, description = "Revised and back to pending", body = ApiResponse<SubmissionView<ExpenseReport>>),
        (status = 403, description = "Only the owner of a rejected report or an admin may edit"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Expense Reports",
    security(("bearerAuth" = []))
)]
pub async fn update_expense_report(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
    Json(form): Json<ExpenseReportForm>,
) -> ViewResponse<ExpenseReport> {
    let original = prepare_revision::<ExpenseReport>(&pool, &policy, &perms, id).await?;
    validate_with_references(&pool, &form).await?;

    let mut qb = revision_builder::<ExpenseReport>();
    qb.push("pic_id = ").push_bind(form.pic_id)
        .push(", activity = ").push_bind(form.activity.trim().to_string())
        .push(", amount = ").push_bind(form.amount)
        .push(", report_date = ").push_bind(form.report_date)
        .push(", ");

    finish_revision(&pool, &policy, &perms, qb, &original).await
}

#[utoipa::path(
    post,
    path = "/expense-reports/{id}/approve",
    params(("id" = i32, Path, description = "Expense report ID")),
    responses(
        (status = 200, description = "Approved, or flash message when not pending", body = ApiResponse<SubmissionView<ExpenseReport>>),
        (status = 403, description = "Caller is not a reviewer")
    ),
    tag = "Expense Reports",
    security(("bearerAuth" = []))
)]
pub async fn approve_expense_report(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> ViewResponse<ExpenseReport> {
    submission::transition::<ExpenseReport>(&pool, &policy, &perms, id, Transition::Approve).await
}

#[utoipa::path(
    post,
    path = "/expense-reports/{id}/reject",
    params(("id" = i32, Path, description = "Expense report ID")),
    request_body = RejectPayload,
    responses(
        (status = 200, description = "Rejected, or flash message when not pending", body = ApiResponse<SubmissionView<ExpenseReport>>),
        (status = 403, description = "Caller is not a reviewer"),
        (status = 422, description = "Note missing or too long")
    ),
    tag = "Expense Reports",
    security(("bearerAuth" = []))
)]
pub async fn reject_expense_report(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
    Json(payload): Json<RejectPayload>,
) -> ViewResponse<ExpenseReport> {
    submission::transition::<ExpenseReport>(&pool, &policy, &perms, id, Transition::Reject(payload.note)).await
}

#[utoipa::path(
    delete,
    path = "/expense-reports/{id}",
    params(("id" = i32, Path, description = "Expense report ID")),
    responses(
        (status = 200, description = "Expense report and its attachment deleted"),
        (status = 403, description = "Only admins may delete"),
        (status = 404, description = "Expense report not found")
    ),
    tag = "Expense Reports",
    security(("bearerAuth" = []))
)]
pub async fn delete_expense_report(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    submission::destroy::<ExpenseReport>(&pool, &policy, &perms, id).await
}

#[utoipa::path(
    post,
    path = "/expense-reports/{id}/attachment",
    params(("id" = i32, Path, description = "Expense report ID")),
    request_body(content_type = "multipart/form-data", description = "Receipts as a PDF in the `file` field"),
    responses(
        (status = 200, description = "Attachment stored", body = ApiResponse<SubmissionView<ExpenseReport>>),
        (status = 403, description = "Caller may not change this attachment"),
        (status = 422, description = "Missing file or not a PDF")
    ),
    tag = "Expense Reports",
    security(("bearerAuth" = []))
)]
pub async fn upload_expense_report_attachment(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> ViewResponse<ExpenseReport> {
    attachment::upload::<ExpenseReport>(&pool, &policy, &perms, id, multipart).await
}

#[utoipa::path(
    get,
    path = "/expense-reports/{id}/attachment",
    params(("id" = i32, Path, description = "Expense report ID")),
    responses(
        (status = 200, description = "The stored PDF", content_type = "application/pdf"),
        (status = 404, description = "No attachment")
    ),
    tag = "Expense Reports",
    security(("bearerAuth" = []))
)]
pub async fn download_expense_report_attachment(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> Result<Response, ApiResponse<()>> {
    attachment::download::<ExpenseReport>(&pool, &policy, &perms, id).await
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_expense_reports,
        get_expense_report,
        create_expense_report,
        update_expense_report,
        approve_expense_report,
        reject_expense_report,
        delete_expense_report,
        upload_expense_report_attachment,
        download_expense_report_attachment,
    ),
    components(schemas(ExpenseReport, ExpenseReportForm)),
    tags(
        (name = "Expense Reports", description = "Activity expense reports")
    )
)]
pub struct ExpenseReportDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn report(amount: &str) -> ExpenseReportForm {
        ExpenseReportForm {
            pic_id: 2,
            activity: "Workshop".into(),
            amount: BigDecimal::from_str(amount).unwrap(),
            report_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        }
    }

    #[test]
    fn amount_must_be_positive_and_activity_present() {
        let form = ExpenseReportForm {
            pic_id: 2,
            activity: "".into(),
            amount: BigDecimal::from_str("0.00").unwrap(),
            report_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        };
        let errors = validate(&form);
        assert!(errors.get("activity").is_some());
        assert!(errors.get("amount").is_some());

        let ok = ExpenseReportForm {
            activity: "Workshop".into(),
            amount: BigDecimal::from_str("350000.00").unwrap(),
            ..form
        };
        assert!(validate(&ok).is_empty());
    }

    #[test]
    fn amount_must_fit_numeric_15_2() {
        assert!(validate(&report("9999999999999.99")).is_empty());
        assert!(validate(&report("12000000000000")).get("amount").is_some());
        assert!(validate(&report("350000.001")).get("amount").is_some());
    }

    #[test]
    fn person_in_charge_must_hold_pic_role() {
        let errors = reference_errors(&report("350000.00"), false);
        assert!(errors.get("pic_id").is_some());
        assert!(reference_errors(&report("350000.00"), true).is_empty());
    }
}
