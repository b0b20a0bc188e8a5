use axum::{
    extract::{Extension, Multipart, Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use sqlx::PgPool;

use crate::db::models::assignment_letter::{AssignmentLetter, AssignmentLetterForm};
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

fn validate(form: &AssignmentLetterForm) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.require_text("activity", &form.activity, 255);
    errors.require_text("destination", &form.destination, 255);
    errors.check(
        form.end_date >= form.start_date,
        "end_date",
        "The end date must be on or after the start date.",
    );
    errors
}

/// Field checks plus the person in charge, who must hold the PIC role.
fn reference_errors(form: &AssignmentLetterForm, pic_holds_role: bool) -> FieldErrors {
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
    form: &AssignmentLetterForm,
) -> Result<(), ApiResponse<()>> {
    let pic_holds_role = user_has_role(pool, form.pic_id, Role::Pic).await?;
    reference_errors(form, pic_holds_role).into_result()
}

#[utoipa::path(
    get,
    path = "/assignment-letters",
    params(ListParams),
    responses(
        (status = 200, description = "Page of assignment letters visible to the caller", body = ApiResponse<Page<SubmissionView<AssignmentLetter>>>),
        (status = 403, description = "Caller may not view assignment letters")
    ),
    tag = "Assignment Letters",
    security(("bearerAuth" = []))
)]
pub async fn list_assignment_letters(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Page<SubmissionView<AssignmentLetter>>>, ApiResponse<()>> {
    let page = submission::list::<AssignmentLetter>(&pool, &policy, &perms, &params).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Assignment letters retrieved", page))
}

#[utoipa::path(
    get,
    path = "/assignment-letters/{id}",
    params(("id" = i32, Path, description = "Assignment letter ID")),
    responses(
        (status = 200, description = "Assignment letter with action flags", body = ApiResponse<SubmissionView<AssignmentLetter>>),
        (status = 403, description = "Not the caller's letter"),
        (status = 404, description = "Assignment letter not found")
    ),
    tag = "Assignment Letters",
    security(("bearerAuth" = []))
)]
pub async fn get_assignment_letter(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> ViewResponse<AssignmentLetter> {
    submission::show::<AssignmentLetter>(&pool, &policy, &perms, id).await
}

#[utoipa::path(
    post,
    path = "/assignment-letters",
    request_body = AssignmentLetterForm,
    responses(
        (status = 201, description = "Assignment letter submitted", body = ApiResponse<SubmissionView<AssignmentLetter>>),
        (status = 422, description = "Validation failed")
    ),
    tag = "Assignment Letters",
    security(("bearerAuth" = []))
)]
pub async fn create_assignment_letter(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Json(form): Json<AssignmentLetterForm>,
) -> ViewResponse<AssignmentLetter> {
    authorize_create::<AssignmentLetter>(&policy, &perms)?;
    validate_with_references(&pool, &form).await?;

    let record = sqlx::query_as::<_, AssignmentLetter>(
        r#"
        INSERT INTO assignment_letters (user_id, pic_id, activity, destination, start_date, end_date)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(perms.user_id)
    .bind(form.pic_id)
    .bind(form.activity.trim())
    .bind(form.destination.trim())
    .bind(form.start_date)
    .bind(form.end_date)
    .fetch_one(&pool)
    .await
    .map_err(|e| ApiResponse::internal("Failed to create assignment letter", e))?;

    created(&pool, &policy, &perms, record).await
}

#[utoipa::path(
    put,
    path = "/assignment-letters/{id}",
    params(("id" = i32, Path, description = "Assignment letter ID")),
    request_body = AssignmentLetterForm,
    responses(
        (status = 200, description = "Revised and back to pending", body = ApiResponse<SubmissionView<AssignmentLetter>>),
        (status = 403, description = "Only the owner of a rejected letter or an admin may edit"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Assignment Letters",
    security(("bearerAuth" = []))
)]
pub async fn update_assignment_letter(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
    Json(form): Json<AssignmentLetterForm>,
) -> ViewResponse<AssignmentLetter> {
    let original = prepare_revision::<AssignmentLetter>(&pool, &policy, &perms, id).await?;
    validate_with_references(&pool, &form).await?;

    let mut qb = revision_builder::<AssignmentLetter>();
    qb.push("pic_id = ").push_bind(form.pic_id)
        .push(", activity = ").push_bind(form.activity.trim().to_string())
        .push(", destination = ").push_bind(form.destination.trim().to_string())
        .push(", start_date = ").push_bind(form.start_date)
        .push(", end_date = ").push_bind(form.end_date)
        .push(", ");

    finish_revision(&pool, &policy, &perms, qb, &original).await
}

#[utoipa::path(
    post,
    path = "/assignment-letters/{id}/approve",
    params(("id" = i32, Path, description = "Assignment letter ID")),
    responses(
        (status = 200, description = "Approved, or flash message when not pending", body = ApiResponse<SubmissionView<AssignmentLetter>>),
        (status = 403, description = "Caller is not a reviewer")
    ),
    tag = "Assignment Letters",
    security(("bearerAuth" = []))
)]
pub async fn approve_assignment_letter(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> ViewResponse<AssignmentLetter> {
    submission::transition::<AssignmentLetter>(&pool, &policy, &perms, id, Transition::Approve).await
}

#[utoipa::path(
    post,
    path = "/assignment-letters/{id}/reject",
    params(("id" = i32, Path, description = "Assignment letter ID")),
    request_body = RejectPayload,
    responses(
        (status = 200, description = "Rejected, or flash message when not pending", body = ApiResponse<SubmissionView<AssignmentLetter>>),
        (status = 403, description = "Caller is not a reviewer"),
        (status = 422, description = "Note missing or too long")
    ),
    tag = "Assignment Letters",
    security(("bearerAuth" = []))
)]
pub async fn reject_assignment_letter(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
    Json(payload): Json<RejectPayload>,
) -> ViewResponse<AssignmentLetter> {
    submission::transition::<AssignmentLetter>(&pool, &policy, &perms, id, Transition::Reject(payload.note)).await
}

#[utoipa::path(
    delete,
    path = "/assignment-letters/{id}",
    params(("id" = i32, Path, description = "Assignment letter ID")),
    responses(
        (status = 200, description = "Assignment letter and its attachment deleted"),
        (status = 403, description = "Only admins may delete"),
        (status = 404, description = "Assignment letter not found")
    ),
    tag = "Assignment Letters",
    security(("bearerAuth" = []))
)]
pub async fn delete_assignment_letter(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    submission::destroy::<AssignmentLetter>(&pool, &policy, &perms, id).await
}

#[utoipa::path(
    post,
    path = "/assignment-letters/{id}/attachment",
    params(("id" = i32, Path, description = "Assignment letter ID")),
    request_body(content_type = "multipart/form-data", description = "Signed letter as a PDF in the `file` field"),
    responses(
        (status = 200, description = "Attachment stored", body = ApiResponse<SubmissionView<AssignmentLetter>>),
        (status = 403, description = "Caller may not change this attachment"),
        (status = 422, description = "Missing file or not a PDF")
    ),
    tag = "Assignment Letters",
    security(("bearerAuth" = []))
)]
pub async fn upload_assignment_letter_attachment(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> ViewResponse<AssignmentLetter> {
    attachment::upload::<AssignmentLetter>(&pool, &policy, &perms, id, multipart).await
}

#[utoipa::path(
    get,
    path = "/assignment-letters/{id}/attachment",
    params(("id" = i32, Path, description = "Assignment letter ID")),
    responses(
        (status = 200, description = "The stored PDF", content_type = "application/pdf"),
        (status = 404, description = "No attachment")
    ),
    tag = "Assignment Letters",
    security(("bearerAuth" = []))
)]
pub async fn download_assignment_letter_attachment(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
    Path(id): Path<i32>,
) -> Result<Response, ApiResponse<()>> {
    attachment::download::<AssignmentLetter>(&pool, &policy, &perms, id).await
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_assignment_letters,
        get_assignment_letter,
        create_assignment_letter,
        update_assignment_letter,
        approve_assignment_letter,
        reject_assignment_letter,
        delete_assignment_letter,
        upload_assignment_letter_attachment,
        download_assignment_letter_attachment,
    ),
    components(schemas(AssignmentLetter, AssignmentLetterForm)),
    tags(
        (name = "Assignment Letters", description = "Assignment letters for official travel")
    )
)]
pub struct AssignmentLetterDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn form(start: u32, end: u32) -> AssignmentLetterForm {
        AssignmentLetterForm {
            pic_id: 4,
            activity: "Monitoring".into(),
            destination: "Bandung".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 7, start).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 7, end).unwrap(),
        }
    }

    #[test]
    fn single_day_assignment_is_valid() {
        assert!(validate(&form(9, 9)).is_empty());
    }

    #[test]
    fn end_before_start_is_rejected() {
        let errors = validate(&form(9, 8));
        assert!(errors.get("end_date").is_some());
        assert!(errors.get("start_date").is_none());
    }

    #[test]
    fn person_in_charge_without_pic_role_is_rejected() {
        let errors = reference_errors(&form(9, 10), false);
        assert_eq!(
            errors.get("pic_id"),
            Some("The selected person in charge must be a user with the PIC role.")
        );
        assert!(reference_errors(&form(9, 10), true).is_empty());
    }
}
