use axum::{
    extract::Multipart,
    http::StatusCode,
    response::Response,
};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::models::submission::{Submission, SubmissionKind};
use crate::db::queries::submission::{
    build_view, conflict_with_latest, find_visible, ViewResponse, ALREADY_PROCESSED,
};
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::utils::storage::{looks_like_pdf, remove_stored, store_pdf, stream_pdf};
use crate::utils::validation::FieldErrors;
use crate::workflow::policy::Policy;
use crate::workflow::visibility::may_attach;

/// Stores the multipart `file` field as the record's PDF attachment,
/// replacing any previous one.
pub async fn upload<T: Submission>(
    pool: &PgPool,
    policy: &Policy,
    actor: &UserPermissions,
    id: i32,
    mut multipart: Multipart,
) -> ViewResponse<T> {
    if !T::KIND.supports_attachment() {
        return Err(ApiResponse::not_found(format!(
            "{} records have no attachments",
            T::KIND.label()
        )));
    }
    let record = find_visible::<T>(pool, policy, actor, id).await?;
    if !may_attach(T::KIND, policy, actor, record.owner_id(), record.review().status) {
        return Err(ApiResponse::forbidden(
            "You are not allowed to change the attachment of this request",
        ));
    }

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiResponse::error(
            StatusCode::BAD_REQUEST,
            "Failed to read multipart data",
            Some(serde_json::json!({ "error": e.to_string() })),
        )
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| {
            ApiResponse::error(
                StatusCode::BAD_REQUEST,
                "Failed to read uploaded file",
                Some(serde_json::json!({ "error": e.to_string() })),
            )
        })?;
        upload = Some((content_type, bytes));
        break;
    }

    let mut errors = FieldErrors::new();
    match &upload {
        None => errors.add("file", "The file field is required."),
        Some((content_type, bytes)) => errors.check(
            looks_like_pdf(content_type.as_deref(), bytes),
            "file",
            "The file must be a PDF document.",
        ),
    }
    errors.into_result()?;
    let Some((_, bytes)) = upload else {
        return Err(ApiResponse::internal("Failed to read uploaded file", "missing upload"));
    };

    let root = Config::get().attachment_storage_path.clone();
    let path = store_pdf(&root, T::KIND.resource(), id, &bytes)
        .await
        .map_err(|e| ApiResponse::internal("Failed to store attachment", e))?;
    let path_str = path.to_string_lossy().to_string();

    let updated = sqlx::query_as::<_, T>(&attachment_update_sql(T::KIND))
        .bind(&path_str)
        .bind(id)
        .bind(record.review().status)
        .fetch_optional(pool)
        .await;

    let updated = match updated {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            let _ = remove_stored(&path_str).await;
            return conflict_with_latest(pool, policy, actor, id, ALREADY_PROCESSED).await;
        }
        Err(e) => {
            let _ = remove_stored(&path_str).await;
            return Err(ApiResponse::internal("Failed to record attachment", e));
        }
    };

    if let Some(old) = record.attachment_path() {
        if let Err(e) = remove_stored(old).await {
            warn!("Failed to remove replaced attachment {}: {}", old, e);
        }
    }

    info!("📎 Attachment stored for {} #{} ({} bytes)", T::KIND.label(), id, bytes.len());
    let view = build_view(pool, policy, actor, updated).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Attachment uploaded", view))
}

/// Only lands while the record is still in the status the upload was
/// authorized against.
fn attachment_update_sql(kind: SubmissionKind) -> String {
    format!(
        "UPDATE {} SET attachment_path = $1, updated_at = NOW() \
         WHERE id = $2 AND status = $3 RETURNING *",
        kind.table()
    )
}

/// Streams the stored PDF; `404` when none is recorded or the file is gone.
pub async fn download<T: Submission>(
    pool: &PgPool,
    policy: &Policy,
    actor: &UserPermissions,
    id: i32,
) -> Result<Response, ApiResponse<()>> {
    let record = find_visible::<T>(pool, policy, actor, id).await?;
    let path = record
        .attachment_path()
        .ok_or_else(|| ApiResponse::not_found("No attachment uploaded for this request"))?;

    let download_name = format!("{}-{}.pdf", T::KIND.table(), id);
    stream_pdf(path, &download_name)
        .await
        .map_err(|status| ApiResponse::error(status, "Attachment file not found", None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_update_is_guarded_by_status() {
        let sql = attachment_update_sql(SubmissionKind::Invoice);
        assert!(sql.starts_with("UPDATE invoices SET attachment_path = $1"));
        assert!(sql.contains("WHERE id = $2 AND status = $3 RETURNING *"));
    }
}
