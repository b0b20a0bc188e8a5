use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::PgPool;

use crate::db::models::letter_number::{LetterNumber, LetterNumberForm};
use crate::db::models::submission::{RejectPayload, SubmissionView};
use crate::db::queries::submission::{
    self, authorize_create, created, finish_revision, prepare_revision, revision_builder,
    Transition, ViewResponse,
};
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::utils::pagination::{ListParams, Page};
use crate::utils::validation::{clean_optional, FieldErrors};
use crate::workflow::policy::SharedPolicy;

fn validate(form: &LetterNumberForm) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.require_text("purpose", &form.purpose, 255);
    errors.require_text("recipient", &form.recipient, 255);
    errors.optional_text("description", form.description.as_deref(), 1000);
    errors
}

#[utoipa::path(
    get,
    path = "/letter-numbers",
    params(ListParams),
    responses(
        (status = 200, description = "Page of letter-number requests with their formatted numbers", body = ApiResponse<Page<SubmissionView<LetterNumber>>>),
        (status = 403, description = "Caller may not view letter numbers")
    ),
    tag = "Letter Numbers",
    security(("bearerAuth" = []))
)]
pub async fn list_letter_numbers(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Page<SubmissionView<LetterNumber>>>, ApiResponse<()>> {
    let page = submission::list::<LetterNumber>(&pool, &policy, &perms, &params).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Letter numbers retrieved", page))
}

#[utoipa::path(
    get,
    path = "/letter-numbers/{id}",
    params(("id" = i32, Path, description = "Letter-number request ID")),
    responses(
        (status = 200, description = "Letter-number request with action flags", body = ApiResponse<SubmissionView<LetterNumber>>),
        (status = 403, description = "Not the caller's request"),
        (status = 404, description = "Letter-number request not found")
    ),
    tag = "Letter Numbers",
    security(("bearerAuth" = []))
)]
pub async fn get_letter_number(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> ViewResponse<LetterNumber> {
    submission::show::<LetterNumber>(&pool, &policy, &perms, id).await
}

#[utoipa::path(
    post,
    path = "/letter-numbers",
    request_body = LetterNumberForm,
    responses(
        (status = 201, description = "Letter number requested", body = ApiResponse<SubmissionView<LetterNumber>>),
        (status = 422, description = "Validation failed")
    ),
    tag = "Letter Numbers",
    security(("bearerAuth" = []))
)]
pub async fn create_letter_number(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Json(form): Json<LetterNumberForm>,
) -> ViewResponse<LetterNumber> {
    authorize_create::<LetterNumber>(&policy, &perms)?;
    validate(&form).into_result()?;

    let record = sqlx::query_as::<_, LetterNumber>(
        r#"
        INSERT INTO letter_numbers (user_id, purpose, recipient, submitted_on, description)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(perms.user_id)
    .bind(form.purpose.trim())
    .bind(form.recipient.trim())
    .bind(form.submitted_on)
    .bind(clean_optional(form.description))
    .fetch_one(&pool)
    .await
    .map_err(|e| ApiResponse::internal("Failed to create letter number", e))?;

    created(&pool, &policy, &perms, record).await
}

#[utoipa::path(
    put,
    path = "/letter-numbers/{id}",
    params(("id" = i32, Path, description = "Letter-number request ID")),
    request_body = LetterNumberForm,
    responses(
        (status = 200, description = "Revised and back to pending", body = ApiResponse<SubmissionView<LetterNumber>>),
        (status = 403, description = "Only the owner of a rejected request or an admin may edit"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Letter Numbers",
    security(("bearerAuth" = []))
)]
pub async fn update_letter_number(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
    Json(form): Json<LetterNumberForm>,
) -> ViewResponse<LetterNumber> {
    let original = prepare_revision::<LetterNumber>(&pool, &policy, &perms, id).await?;
    validate(&form).into_result()?;

    let mut qb = revision_builder::<LetterNumber>();
    qb.push("purpose = ").push_bind(form.purpose.trim().to_string())
        .push(", recipient = ").push_bind(form.recipient.trim().to_string())
        .push(", submitted_on = ").push_bind(form.submitted_on)
        .push(", description = ").push_bind(clean_optional(form.description))
        .push(", ");

    finish_revision(&pool, &policy, &perms, qb, &original).await
}

#[utoipa::path(
    post,
    path = "/letter-numbers/{id}/approve",
    params(("id" = i32, Path, description = "Letter-number request ID")),
    responses(
        (status = 200, description = "Approved, or flash message when not pending", body = ApiResponse<SubmissionView<LetterNumber>>),
        (status = 403, description = "Caller is not a reviewer")
    ),
    tag = "Letter Numbers",
    security(("bearerAuth" = []))
)]
pub async fn approve_letter_number(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> ViewResponse<LetterNumber> {
    submission::transition::<LetterNumber>(&pool, &policy, &perms, id, Transition::Approve).await
}

#[utoipa::path(
    post,
    path = "/letter-numbers/{id}/reject",
    params(("id" = i32, Path, description = "Letter-number request ID")),
    request_body = RejectPayload,
    responses(
        (status = 200, description = "Rejected, or flash message when not pending", body = ApiResponse<SubmissionView<LetterNumber>>),
        (status = 403, description = "Caller is not a reviewer"),
        (status = 422, description = "Note missing or too long")
    ),
    tag = "Letter Numbers",
    security(("bearerAuth" = []))
)]
pub async fn reject_letter_number(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
    Json(payload): Json<RejectPayload>,
) -> ViewResponse<LetterNumber> {
    submission::transition::<LetterNumber>(&pool, &policy, &perms, id, Transition::Reject(payload.note)).await
}

#[utoipa::path(
    delete,
    path = "/letter-numbers/{id}",
    params(("id" = i32, Path, description = "Letter-number request ID")),
    responses(
        (status = 200, description = "Letter-number request deleted"),
        (status = 403, description = "Only admins may delete"),
        (status = 404, description = "Letter-number request not found")
    ),
    tag = "Letter Numbers",
    security(("bearerAuth" = []))
)]
pub async fn delete_letter_number(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    submission::destroy::<LetterNumber>(&pool, &policy, &perms, id).await
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_letter_numbers,
        get_letter_number,
        create_letter_number,
        update_letter_number,
        approve_letter_number,
        reject_letter_number,
        delete_letter_number,
    ),
    components(schemas(LetterNumber, LetterNumberForm)),
    tags(
        (name = "Letter Numbers", description = "Official letter number requests")
    )
)]
pub struct LetterNumberDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn purpose_and_recipient_are_required() {
        let form = LetterNumberForm {
            purpose: "".into(),
            recipient: "\t".into(),
            submitted_on: NaiveDate::from_ymd_opt(2024, 9, 2).unwrap(),
            description: Some("x".repeat(1001)),
        };
        let errors = validate(&form);
        assert!(errors.get("purpose").is_some());
        assert!(errors.get("recipient").is_some());
        assert!(errors.get("description").is_some());
    }
}
