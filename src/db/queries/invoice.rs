use axum::{
    extract::{Extension, Multipart, Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use sqlx::PgPool;

use crate::db::models::invoice::{Invoice, InvoiceForm};
use crate::db::models::submission::{RejectPayload, SubmissionView};
use crate::db::queries::attachment;
use crate::db::queries::submission::{
    self, authorize_create, created, finish_revision, prepare_revision, revision_builder,
    row_exists, Transition, ViewResponse,
};
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::utils::pagination::{ListParams, Page};
use crate::utils::validation::{clean_optional, FieldErrors};
use crate::workflow::policy::SharedPolicy;

fn validate(form: &InvoiceForm) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.require_text("vendor", &form.vendor, 255);
    errors.amount("amount", &form.amount);
    errors.optional_text("description", form.description.as_deref(), 1000);
    errors
}

/// Field checks plus the letter-number reference, which needs the database.
async fn validate_with_references(pool: &PgPool, form: &InvoiceForm) -> Result<(), ApiResponse<()>> {
    let mut errors = validate(form);
    if let Some(letter_id) = form.letter_number_id {
        errors.check(
            row_exists(pool, "letter_numbers", letter_id).await?,
            "letter_number_id",
            "The selected letter number does not exist.",
        );
    }
    errors.into_result()
}

#[utoipa::path(
    get,
    path = "/invoices",
    params(ListParams),
    responses(
        (status = 200, description = "Page of invoices visible to the caller", body = ApiResponse<Page<SubmissionView<Invoice>>>),
        (status = 403, description = "Caller may not view invoices")
    ),
    tag = "Invoices",
    security(("bearerAuth" = []))
)]
pub async fn list_invoices(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Page<SubmissionView<Invoice>>>, ApiResponse<()>> {
    let page = submission::list::<Invoice>(&pool, &policy, &perms, &params).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Invoices retrieved", page))
}

#[utoipa::path(
    get,
    path = "/invoices/{id}",
    params(("id" = i32, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice with its letter number and action flags", body = ApiResponse<SubmissionView<Invoice>>),
        (status = 403, description = "Not the caller's invoice"),
        (status = 404, description = "Invoice not found")
    ),
    tag = "Invoices",
    security(("bearerAuth" = []))
)]
pub async fn get_invoice(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> ViewResponse<Invoice> {
    submission::show::<Invoice>(&pool, &policy, &perms, id).await
}

#[utoipa::path(
    post,
    path = "/invoices",
    request_body = InvoiceForm,
    responses(
        (status = 201, description = "Invoice submitted", body = ApiResponse<SubmissionView<Invoice>>),
        (status = 422, description = "Validation failed")
    ),
    tag = "Invoices",
    security(("bearerAuth" = []))
)]
pub async fn create_invoice(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Json(form): Json<InvoiceForm>,
) -> ViewResponse<Invoice> {
    authorize_create::<Invoice>(&policy, &perms)?;
    validate_with_references(&pool, &form).await?;

    let record = sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices (user_id, vendor, invoice_date, amount, description, letter_number_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(perms.user_id)
    .bind(form.vendor.trim())
    .bind(form.invoice_date)
    .bind(&form.amount)
    .bind(clean_optional(form.description.clone()))
    .bind(form.letter_number_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| ApiResponse::internal("Failed to create invoice", e))?;

    created(&pool, &policy, &perms, record).await
}

#[utoipa::path(
    put,
    path = "/invoices/{id}",
    params(("id" = i32, Path, description = "Invoice ID")),
    request_body = InvoiceForm,
    responses(
        (status = 200, description = "Revised and back to pending", body = ApiResponse<SubmissionView<Invoice>>),
        (status = 403, description = "Only the owner of a rejected invoice or an admin may edit"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Invoices",
    security(("bearerAuth" = []))
)]
pub async fn update_invoice(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
    Json(form): Json<InvoiceForm>,
) -> ViewResponse<Invoice> {
    let original = prepare_revision::<Invoice>(&pool, &policy, &perms, id).await?;
    validate_with_references(&pool, &form).await?;

    let mut qb = revision_builder::<Invoice>();
    qb.push("vendor = ").push_bind(form.vendor.trim().to_string())
        .push(", invoice_date = ").push_bind(form.invoice_date)
        .push(", amount = ").push_bind(form.amount)
        .push(", description = ").push_bind(clean_optional(form.description))
        .push(", letter_number_id = ").push_bind(form.letter_number_id)
        .push(", ");

    finish_revision(&pool, &policy, &perms, qb, &original).await
}

#[utoipa::path(
    post,
    path = "/invoices/{id}/approve",
    params(("id" = i32, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Approved, or flash message when not pending", body = ApiResponse<SubmissionView<Invoice>>),
        (status = 403, description = "Caller is not a reviewer")
    ),
    tag = "Invoices",
    security(("bearerAuth" = []))
)]
pub async fn approve_invoice(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> ViewResponse<Invoice> {
    submission::transition::<Invoice>(&pool, &policy, &perms, id, Transition::Approve).await
}

#[utoipa::path(
    post,
    path = "/invoices/{id}/reject",
    params(("id" = i32, Path, description = "Invoice ID")),
    request_body = RejectPayload,
    responses(
        (status = 200, description = "Rejected, or flash message when not pending", body = ApiResponse<SubmissionView<Invoice>>),
        (status = 403, description = "Caller is not a reviewer"),
        (status = 422, description = "Note missing or too long")
    ),
    tag = "Invoices",
    security(("bearerAuth" = []))
)]
pub async fn reject_invoice(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
    Json(payload): Json<RejectPayload>,
) -> ViewResponse<Invoice> {
    submission::transition::<Invoice>(&pool, &policy, &perms, id, Transition::Reject(payload.note)).await
}

#[utoipa::path(
    delete,
    path = "/invoices/{id}",
    params(("id" = i32, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice and its attachment deleted"),
        (status = 403, description = "Only admins may delete"),
        (status = 404, description = "Invoice not found")
    ),
    tag = "Invoices",
    security(("bearerAuth" = []))
)]
pub async fn delete_invoice(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    submission::destroy::<Invoice>(&pool, &policy, &perms, id).await
}

#[utoipa::path(
    post,
    path = "/invoices/{id}/attachment",
    params(("id" = i32, Path, description = "Invoice ID")),
    request_body(content_type = "multipart/form-data", description = "PDF in the `file` field"),
    responses(
        (status = 200, description = "Attachment stored", body = ApiResponse<SubmissionView<Invoice>>),
        (status = 403, description = "Caller may not change this attachment"),
        (status = 422, description = "Missing file or not a PDF")
    ),
    tag = "Invoices",
    security(("bearerAuth" = []))
)]
pub async fn upload_invoice_attachment(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> ViewResponse<Invoice> {
    attachment::upload::<Invoice>(&pool, &policy, &perms, id, multipart).await
}

#[utoipa::path(
    get,
    path = "/invoices/{id}/attachment",
    params(("id" = i32, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "The stored PDF", content_type = "application/pdf"),
        (status = 404, description = "No attachment")
    ),
    tag = "Invoices",
    security(("bearerAuth" = []))
)]
pub async fn download_invoice_attachment(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> Result<Response, ApiResponse<()>> {
    attachment::download::<Invoice>(&pool, &policy, &perms, id).await
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_invoices,
        get_invoice,
        create_invoice,
        update_invoice,
        approve_invoice,
        reject_invoice,
        delete_invoice,
        upload_invoice_attachment,
        download_invoice_attachment,
    ),
    components(schemas(Invoice, InvoiceForm)),
    tags(
        (name = "Invoices", description = "Vendor invoices filed under a letter number")
    )
)]
pub struct InvoiceDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn form(amount: &str) -> InvoiceForm {
        InvoiceForm {
            vendor: "CV Sumber Makmur".into(),
            invoice_date: NaiveDate::from_ymd_opt(2024, 8, 14).unwrap(),
            amount: BigDecimal::from_str(amount).unwrap(),
            description: None,
            letter_number_id: None,
        }
    }

    #[test]
    fn positive_amount_is_accepted() {
        assert!(validate(&form("0.01")).is_empty());
        assert!(validate(&form("1250000.00")).is_empty());
    }

    #[test]
    fn zero_or_negative_amount_is_rejected() {
        assert!(validate(&form("0")).get("amount").is_some());
        assert!(validate(&form("-5")).get("amount").is_some());
    }

    #[test]
    fn amount_beyond_column_precision_is_rejected() {
        assert!(validate(&form("9999999999999.99")).is_empty());
        assert!(validate(&form("10000000000000")).get("amount").is_some());
        assert!(validate(&form("1250000.125")).get("amount").is_some());
    }

    #[test]
    fn vendor_is_required() {
        let errors = validate(&InvoiceForm { vendor: "   ".into(), ..form("10") });
        assert!(errors.get("vendor").is_some());
    }

    /// Inlines component references so nested properties can be inspected.
    fn expand(doc: &serde_json::Value, schema: &serde_json::Value) -> serde_json::Value {
        match schema {
            serde_json::Value::Object(map) => {
                if let Some(name) = map
                    .get("$ref")
                    .and_then(|r| r.as_str())
                    .and_then(|r| r.strip_prefix("#/components/schemas/"))
                {
                    return expand(doc, &doc["components"]["schemas"][name]);
                }
                map.iter()
                    .map(|(k, v)| (k.clone(), expand(doc, v)))
                    .collect::<serde_json::Map<_, _>>()
                    .into()
            }
            serde_json::Value::Array(items) => items.iter().map(|v| expand(doc, v)).collect(),
            other => other.clone(),
        }
    }

    fn documented_ok_schema(path: &str, method: &str) -> String {
        let doc = serde_json::to_value(InvoiceDoc::openapi()).unwrap();
        let schema =
            &doc["paths"][path][method]["responses"]["200"]["content"]["application/json"]["schema"];
        expand(&doc, schema).to_string()
    }

    #[test]
    fn docs_describe_the_envelope_and_page() {
        let list = documented_ok_schema("/invoices", "get");
        for field in ["status_code", "items", "total_pages", "flags", "letter_number"] {
            assert!(list.contains(field), "list schema lacks {field}: {list}");
        }

        let detail = documented_ok_schema("/invoices/{id}", "get");
        assert!(detail.contains("flags"));
        assert!(!detail.contains("total_pages"));
    }
}
