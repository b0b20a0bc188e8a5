use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::types::Json as SqlJson;
use sqlx::PgPool;

use crate::db::models::inventory_loan::{InventoryLoan, InventoryLoanForm, LoanItem};
use crate::db::models::submission::{RejectPayload, SubmissionView};
use crate::db::queries::submission::{
    self, authorize_create, created, finish_revision, prepare_revision, revision_builder,
    Transition, ViewResponse,
};
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::utils::pagination::{ListParams, Page};
use crate::utils::validation::FieldErrors;
use crate::workflow::policy::SharedPolicy;

fn validate(form: &InventoryLoanForm) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.check(!form.items.is_empty(), "items", "At least one item must be borrowed.");
    for (i, item) in form.items.iter().enumerate() {
        errors.require_text(&format!("items.{}.name", i), &item.name, 255);
        errors.check(
            item.quantity > 0,
            &format!("items.{}.quantity", i),
            "The quantity must be at least 1.",
        );
    }
    errors.require_text("purpose", &form.purpose, 1000);
    errors.check(
        form.return_date >= form.loan_date,
        "return_date",
        "The return date must be on or after the loan date.",
    );
    errors
}

fn normalized_items(items: Vec<LoanItem>) -> SqlJson<Vec<LoanItem>> {
    SqlJson(
        items
            .into_iter()
            .map(|item| LoanItem { name: item.name.trim().to_string(), quantity: item.quantity })
            .collect(),
    )
}

#[utoipa::path(
    get,
    path = "/inventory-loans",
    params(ListParams),
    responses(
        (status = 200, description = "Page of inventory loans visible to the caller", body = ApiResponse<Page<SubmissionView<InventoryLoan>>>),
        (status = 403, description = "Caller may not view inventory loans")
    ),
    tag = "Inventory Loans",
    security(("bearerAuth" = []))
)]
pub async fn list_inventory_loans(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Page<SubmissionView<InventoryLoan>>>, ApiResponse<()>> {
    let page = submission::list::<InventoryLoan>(&pool, &policy, &perms, &params).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Inventory loans retrieved", page))
}

#[utoipa::path(
    get,
    path = "/inventory-loans/{id}",
    params(("id" = i32, Path, description = "Inventory loan ID")),
    responses(
        (status = 200, description = "Inventory loan with action flags", body = ApiResponse<SubmissionView<InventoryLoan>>),
        (status = 403, description = "Not the caller's loan"),
        (status = 404, description = "Inventory loan not found")
    ),
    tag = "Inventory Loans",
    security(("bearerAuth" = []))
)]
pub async fn get_inventory_loan(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> ViewResponse<InventoryLoan> {
    submission::show::<InventoryLoan>(&pool, &policy, &perms, id).await
}

#[utoipa::path(
    post,
    path = "/inventory-loans",
    request_body = InventoryLoanForm,
    responses(
        (status = 201, description = "Inventory loan submitted", body = ApiResponse<SubmissionView<InventoryLoan>>),
        (status = 422, description = "Validation failed")
    ),
    tag = "Inventory Loans",
    security(("bearerAuth" = []))
)]
pub async fn create_inventory_loan(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Json(form): Json<InventoryLoanForm>,
) -> ViewResponse<InventoryLoan> {
    authorize_create::<InventoryLoan>(&policy, &perms)?;
    validate(&form).into_result()?;

    let record = sqlx::query_as::<_, InventoryLoan>(
        r#"
        INSERT INTO inventory_loans (user_id, items, purpose, loan_date, return_date)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(perms.user_id)
    .bind(normalized_items(form.items))
    .bind(form.purpose.trim())
    .bind(form.loan_date)
    .bind(form.return_date)
    .fetch_one(&pool)
    .await
    .map_err(|e| ApiResponse::internal("Failed to create inventory loan", e))?;

    created(&pool, &policy, &perms, record).await
}

#[utoipa::path(
    put,
    path = "/inventory-loans/{id}",
    params(("id" = i32, Path, description = "Inventory loan ID")),
    request_body = InventoryLoanForm,
    responses(
        (status = 200, description = "Revised and back to pending", body = ApiResponse<SubmissionView<InventoryLoan>>),
        (status = 403, description = "Only the owner of a rejected loan or an admin may edit"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Inventory Loans",
    security(("bearerAuth" = []))
)]
pub async fn update_inventory_loan(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
    Json(form): Json<InventoryLoanForm>,
) -> ViewResponse<InventoryLoan> {
    let original = prepare_revision::<InventoryLoan>(&pool, &policy, &perms, id).await?;
    validate(&form).into_result()?;

    let mut qb = revision_builder::<InventoryLoan>();
    qb.push("items = ").push_bind(normalized_items(form.items))
        .push(", purpose = ").push_bind(form.purpose.trim().to_string())
        .push(", loan_date = ").push_bind(form.loan_date)
        .push(", return_date = ").push_bind(form.return_date)
        .push(", ");

    finish_revision(&pool, &policy, &perms, qb, &original).await
}

#[utoipa::path(
    post,
    path = "/inventory-loans/{id}/approve",
    params(("id" = i32, Path, description = "Inventory loan ID")),
    responses(
        (status = 200, description = "Approved, or flash message when not pending", body = ApiResponse<SubmissionView<InventoryLoan>>),
        (status = 403, description = "Caller is not a reviewer")
    ),
    tag = "Inventory Loans",
    security(("bearerAuth" = []))
)]
pub async fn approve_inventory_loan(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> ViewResponse<InventoryLoan> {
    submission::transition::<InventoryLoan>(&pool, &policy, &perms, id, Transition::Approve).await
}

#[utoipa::path(
    post,
    path = "/inventory-loans/{id}/reject",
    params(("id" = i32, Path, description = "Inventory loan ID")),
    request_body = RejectPayload,
    responses(
        (status = 200, description = "Rejected, or flash message when not pending", body = ApiResponse<SubmissionView<InventoryLoan>>),
        (status = 403, description = "Caller is not a reviewer"),
        (status = 422, description = "Note missing or too long")
    ),
    tag = "Inventory Loans",
    security(("bearerAuth" = []))
)]
pub async fn reject_inventory_loan(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
    Json(payload): Json<RejectPayload>,
) -> ViewResponse<InventoryLoan> {
    submission::transition::<InventoryLoan>(&pool, &policy, &perms, id, Transition::Reject(payload.note)).await
}

/// Marks the loan done once the items are back.
#[utoipa::path(
    post,
    path = "/inventory-loans/{id}/complete",
    params(("id" = i32, Path, description = "Inventory loan ID")),
    responses(
        (status = 200, description = "Marked as returned, or flash message when not approved", body = ApiResponse<SubmissionView<InventoryLoan>>),
        (status = 403, description = "Only the borrower or an admin may mark it done")
    ),
    tag = "Inventory Loans",
    security(("bearerAuth" = []))
)]
pub async fn complete_inventory_loan(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> ViewResponse<InventoryLoan> {
    submission::transition::<InventoryLoan>(&pool, &policy, &perms, id, Transition::Complete).await
}

#[utoipa::path(
    delete,
    path = "/inventory-loans/{id}",
    params(("id" = i32, Path, description = "Inventory loan ID")),
    responses(
        (status = 200, description = "Inventory loan deleted"),
        (status = 403, description = "Only admins may delete"),
        (status = 404, description = "Inventory loan not found")
    ),
    tag = "Inventory Loans",
    security(("bearerAuth" = []))
)]
pub async fn delete_inventory_loan(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    submission::destroy::<InventoryLoan>(&pool, &policy, &perms, id).await
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_inventory_loans,
        get_inventory_loan,
        create_inventory_loan,
        update_inventory_loan,
        approve_inventory_loan,
        reject_inventory_loan,
        complete_inventory_loan,
        delete_inventory_loan,
    ),
    components(schemas(InventoryLoan, InventoryLoanForm, LoanItem)),
    tags(
        (name = "Inventory Loans", description = "Borrowing office inventory")
    )
)]
pub struct InventoryLoanDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn form() -> InventoryLoanForm {
        InventoryLoanForm {
            items: vec![LoanItem { name: "Proyektor".into(), quantity: 1 }],
            purpose: "Rapat koordinasi".into(),
            loan_date: date(2),
            return_date: date(3),
        }
    }

    #[test]
    fn accepts_same_day_return() {
        assert!(validate(&InventoryLoanForm { return_date: date(2), ..form() }).is_empty());
    }

    #[test]
    fn return_before_loan_is_invalid() {
        let errors = validate(&InventoryLoanForm { return_date: date(1), ..form() });
        assert!(errors.get("return_date").is_some());
    }

    #[test]
    fn items_are_checked_individually() {
        let errors = validate(&InventoryLoanForm {
            items: vec![
                LoanItem { name: "Laptop".into(), quantity: 2 },
                LoanItem { name: "".into(), quantity: 0 },
            ],
            ..form()
        });
        assert!(errors.get("items.0.name").is_none());
        assert!(errors.get("items.1.name").is_some());
        assert!(errors.get("items.1.quantity").is_some());

        let errors = validate(&InventoryLoanForm { items: vec![], ..form() });
        assert!(errors.get("items").is_some());
    }

    #[test]
    fn item_names_are_trimmed_before_storage() {
        let items = normalized_items(vec![LoanItem { name: "  Kabel HDMI ".into(), quantity: 3 }]);
        assert_eq!(items.0, vec![LoanItem { name: "Kabel HDMI".into(), quantity: 3 }]);
    }
}
