use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::PgPool;

use crate::db::models::atk_request::{AtkRequest, AtkRequestForm};
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

fn validate(form: &AtkRequestForm) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.require_text("item_name", &form.item_name, 255);
    errors.check(form.quantity > 0, "quantity", "The quantity must be at least 1.");
    errors.require_text("unit", &form.unit, 50);
    errors.optional_text("reason", form.reason.as_deref(), 1000);
    errors
}

#[utoipa::path(
    get,
    path = "/atk-requests",
    params(ListParams),
    responses(
        (status = 200, description = "Page of ATK requests visible to the caller", body = ApiResponse<Page<SubmissionView<AtkRequest>>>),
        (status = 403, description = "Caller may not view ATK requests")
    ),
    tag = "ATK Requests",
    security(("bearerAuth" = []))
)]
pub async fn list_atk_requests(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Page<SubmissionView<AtkRequest>>>, ApiResponse<()>> {
    let page = submission::list::<AtkRequest>(&pool, &policy, &perms, &params).await?;
    Ok(ApiResponse::success(StatusCode::OK, "ATK requests retrieved", page))
}

#[utoipa::path(
    get,
    path = "/atk-requests/{id}",
    params(("id" = i32, Path, description = "ATK request ID")),
    responses(
        (status = 200, description = "ATK request with action flags", body = ApiResponse<SubmissionView<AtkRequest>>),
        (status = 403, description = "Not the caller's request"),
        (status = 404, description = "ATK request not found")
    ),
    tag = "ATK Requests",
    security(("bearerAuth" = []))
)]
pub async fn get_atk_request(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> ViewResponse<AtkRequest> {
    submission::show::<AtkRequest>(&pool, &policy, &perms, id).await
}

#[utoipa::path(
    post,
    path = "/atk-requests",
    request_body = AtkRequestForm,
    responses(
        (status = 201, description = "ATK request submitted", body = ApiResponse<SubmissionView<AtkRequest>>),
        (status = 422, description = "Validation failed")
    ),
    tag = "ATK Requests",
    security(("bearerAuth" = []))
)]
pub async fn create_atk_request(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Json(form): Json<AtkRequestForm>,
) -> ViewResponse<AtkRequest> {
    authorize_create::<AtkRequest>(&policy, &perms)?;
    validate(&form).into_result()?;

    let record = sqlx::query_as::<_, AtkRequest>(
        r#"
        INSERT INTO atk_requests (user_id, item_name, quantity, unit, reason, needed_on)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(perms.user_id)
    .bind(form.item_name.trim())
    .bind(form.quantity)
    .bind(form.unit.trim())
    .bind(clean_optional(form.reason))
    .bind(form.needed_on)
    .fetch_one(&pool)
    .await
    .map_err(|e| ApiResponse::internal("Failed to create ATK request", e))?;

    created(&pool, &policy, &perms, record).await
}

#[utoipa::path(
    put,
    path = "/atk-requests/{id}",
    params(("id" = i32, Path, description = "ATK request ID")),
    request_body = AtkRequestForm,
    responses(
        (status = 200, description = "Revised and back to pending", body = ApiResponse<SubmissionView<AtkRequest>>),
        (status = 403, description = "Only the owner of a rejected request or an admin may edit"),
        (status = 422, description = "Validation failed")
    ),
    tag = "ATK Requests",
    security(("bearerAuth" = []))
)]
pub async fn update_atk_request(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
    Json(form): Json<AtkRequestForm>,
) -> ViewResponse<AtkRequest> {
    let original = prepare_revision::<AtkRequest>(&pool, &policy, &perms, id).await?;
    validate(&form).into_result()?;

    let mut qb = revision_builder::<AtkRequest>();
    qb.push("item_name = ").push_bind(form.item_name.trim().to_string())
        .push(", quantity = ").push_bind(form.quantity)
        .push(", unit = ").push_bind(form.unit.trim().to_string())
        .push(", reason = ").push_bind(clean_optional(form.reason))
        .push(", needed_on = ").push_bind(form.needed_on)
        .push(", ");

    finish_revision(&pool, &policy, &perms, qb, &original).await
}

#[utoipa::path(
    post,
    path = "/atk-requests/{id}/approve",
    params(("id" = i32, Path, description = "ATK request ID")),
    responses(
        (status = 200, description = "Approved, or flash message when not pending", body = ApiResponse<SubmissionView<AtkRequest>>),
        (status = 403, description = "Caller is not a reviewer")
    ),
    tag = "ATK Requests",
    security(("bearerAuth" = []))
)]
pub async fn approve_atk_request(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> ViewResponse<AtkRequest> {
    submission::transition::<AtkRequest>(&pool, &policy, &perms, id, Transition::Approve).await
}

#[utoipa::path(
    post,
    path = "/atk-requests/{id}/reject",
    params(("id" = i32, Path, description = "ATK request ID")),
    request_body = RejectPayload,
    responses(
        (status = 200, description = "Rejected, or flash message when not pending", body = ApiResponse<SubmissionView<AtkRequest>>),
        (status = 403, description = "Caller is not a reviewer"),
        (status = 422, description = "Note missing or too long")
    ),
    tag = "ATK Requests",
    security(("bearerAuth" = []))
)]
pub async fn reject_atk_request(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
    Json(payload): Json<RejectPayload>,
) -> ViewResponse<AtkRequest> {
    submission::transition::<AtkRequest>(&pool, &policy, &perms, id, Transition::Reject(payload.note)).await
}

#[utoipa::path(
    post,
    path = "/atk-requests/{id}/complete",
    params(("id" = i32, Path, description = "ATK request ID")),
    responses(
        (status = 200, description = "Marked as done, or flash message when not approved", body = ApiResponse<SubmissionView<AtkRequest>>),
        (status = 403, description = "Only the owner or an admin may mark it done")
    ),
    tag = "ATK Requests",
    security(("bearerAuth" = []))
)]
pub async fn complete_atk_request(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> ViewResponse<AtkRequest> {
    submission::transition::<AtkRequest>(&pool, &policy, &perms, id, Transition::Complete).await
}

#[utoipa::path(
    delete,
    path = "/atk-requests/{id}",
    params(("id" = i32, Path, description = "ATK request ID")),
    responses(
        (status = 200, description = "ATK request deleted"),
        (status = 403, description = "Only admins may delete"),
        (status = 404, description = "ATK request not found")
    ),
    tag = "ATK Requests",
    security(("bearerAuth" = []))
)]
pub async fn delete_atk_request(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    submission::destroy::<AtkRequest>(&pool, &policy, &perms, id).await
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_atk_requests,
        get_atk_request,
        create_atk_request,
        update_atk_request,
        approve_atk_request,
        reject_atk_request,
        complete_atk_request,
        delete_atk_request,
    ),
    components(schemas(AtkRequest, AtkRequestForm, RejectPayload)),
    tags(
        (name = "ATK Requests", description = "Stationery purchase requests")
    )
)]
pub struct AtkRequestDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn form() -> AtkRequestForm {
        AtkRequestForm {
            item_name: "Kertas A4".into(),
            quantity: 5,
            unit: "rim".into(),
            reason: None,
            needed_on: NaiveDate::from_ymd_opt(2024, 10, 1),
        }
    }

    #[test]
    fn accepts_a_complete_form() {
        assert!(validate(&form()).is_empty());
    }

    #[test]
    fn rejects_zero_quantity_and_blank_unit() {
        let errors = validate(&AtkRequestForm { quantity: 0, unit: " ".into(), ..form() });
        assert!(errors.get("quantity").is_some());
        assert!(errors.get("unit").is_some());
        assert!(errors.get("item_name").is_none());
    }
}
