//! Storage and lifecycle plumbing shared by all six submission kinds.
//!
//! Table names come from `SubmissionKind::table()`, never from user input.

use std::collections::HashMap;

use axum::http::StatusCode;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{info, warn};

use crate::db::models::submission::{
    LetterNumberRef, ReviewState, Submission, SubmissionKind, SubmissionStatus, SubmissionView,
};
use crate::db::models::user::Role;
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::utils::letter_number::format_letter_number;
use crate::utils::pagination::{ListParams, Page, PER_PAGE};
use crate::utils::storage::remove_stored;
use crate::workflow::error::WorkflowError;
use crate::workflow::lifecycle::Lifecycle;
use crate::workflow::policy::{Action, Policy};
use crate::workflow::visibility::{action_flags, Scope};

pub type ViewResponse<T> = Result<ApiResponse<SubmissionView<T>>, ApiResponse<()>>;

pub const ALREADY_PROCESSED: &str = "This request was changed by someone else in the meantime.";

pub async fn find<T: Submission>(pool: &PgPool, id: i32) -> Result<T, ApiResponse<()>> {
    let sql = format!("SELECT * FROM {} WHERE id = $1", T::KIND.table());
    sqlx::query_as::<_, T>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| ApiResponse::internal(format!("Failed to load {}", T::KIND.label()), e))?
        .ok_or_else(|| ApiResponse::not_found(format!("{} not found", T::KIND.label())))
}

/// Loads a record the actor is allowed to see: `404` if missing, `403` if not theirs.
pub async fn find_visible<T: Submission>(
    pool: &PgPool,
    policy: &Policy,
    actor: &UserPermissions,
    id: i32,
) -> Result<T, ApiResponse<()>> {
    let record = find::<T>(pool, id).await?;
    let scope = Scope::for_actor(T::KIND, policy, actor);
    if !policy.allows(T::KIND, Action::View, actor) || !scope.includes(record.owner_id()) {
        return Err(ApiResponse::forbidden(format!(
            "You are not allowed to view this {}",
            T::KIND.label().to_lowercase()
        )));
    }
    Ok(record)
}

pub async fn count(
    pool: &PgPool,
    kind: SubmissionKind,
    scope: Scope,
    status: Option<SubmissionStatus>,
) -> Result<i64, sqlx::Error> {
    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT COUNT(*) FROM {} WHERE TRUE", kind.table()));
    scope.push_filter(&mut qb);
    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status);
    }
    qb.build_query_scalar::<i64>().fetch_one(pool).await
}

/// One page of the records the actor may see, newest first.
pub async fn list<T: Submission>(
    pool: &PgPool,
    policy: &Policy,
    actor: &UserPermissions,
    params: &ListParams,
) -> Result<Page<SubmissionView<T>>, ApiResponse<()>> {
    if !policy.allows(T::KIND, Action::View, actor) {
        return Err(ApiResponse::forbidden(format!(
            "You are not allowed to view {} records",
            T::KIND.label().to_lowercase()
        )));
    }
    let scope = Scope::for_actor(T::KIND, policy, actor);

    let total = count(pool, T::KIND, scope, params.status)
        .await
        .map_err(|e| ApiResponse::internal("Failed to count records", e))?;

    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT * FROM {} WHERE TRUE", T::KIND.table()));
    scope.push_filter(&mut qb);
    if let Some(status) = params.status {
        qb.push(" AND status = ").push_bind(status);
    }
    qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(PER_PAGE)
        .push(" OFFSET ")
        .push_bind(params.offset());

    let records = qb
        .build_query_as::<T>()
        .fetch_all(pool)
        .await
        .map_err(|e| ApiResponse::internal(format!("Failed to list {}", T::KIND.label()), e))?;

    let views = build_views(pool, policy, actor, records).await?;
    Ok(Page::new(views, params.page(), total))
}

/// Wraps records with names, derived numbers and the actor's action flags.
pub async fn build_views<T: Submission>(
    pool: &PgPool,
    policy: &Policy,
    actor: &UserPermissions,
    records: Vec<T>,
) -> Result<Vec<SubmissionView<T>>, ApiResponse<()>> {
    let mut user_ids: Vec<i32> = records
        .iter()
        .flat_map(|r| [r.owner_id(), r.review().processed_by])
        .flatten()
        .collect();
    user_ids.sort_unstable();
    user_ids.dedup();

    let names: HashMap<i32, String> = if user_ids.is_empty() {
        HashMap::new()
    } else {
        sqlx::query_as::<_, (i32, String)>("SELECT id, name FROM users WHERE id = ANY($1)")
            .bind(user_ids)
            .fetch_all(pool)
            .await
            .map_err(|e| ApiResponse::internal("Failed to fetch user details", e))?
            .into_iter()
            .collect()
    };

    let letter_ids: Vec<i32> = records.iter().filter_map(|r| r.referenced_letter()).collect();
    let letters: HashMap<i32, String> = if letter_ids.is_empty() {
        HashMap::new()
    } else {
        sqlx::query_as::<_, LetterNumberRef>(
            "SELECT id, purpose, submitted_on FROM letter_numbers WHERE id = ANY($1)",
        )
        .bind(letter_ids)
        .fetch_all(pool)
        .await
        .map_err(|e| ApiResponse::internal("Failed to fetch letter numbers", e))?
        .into_iter()
        .map(|l| (l.id, format_letter_number(l.id, l.submitted_on, &l.purpose)))
        .collect()
    };

    Ok(records
        .into_iter()
        .map(|record| {
            let owner_name = record.owner_id().and_then(|id| names.get(&id).cloned());
            let processor_name = record
                .review()
                .processed_by
                .and_then(|id| names.get(&id).cloned());
            let letter_number = record
                .referenced_letter()
                .and_then(|id| letters.get(&id).cloned());
            let has_attachment = T::KIND
                .supports_attachment()
                .then(|| record.attachment_path().is_some());
            let flags = action_flags(T::KIND, policy, actor, record.owner_id(), record.review().status);

            SubmissionView {
                owner_name,
                processor_name,
                display_number: record.display_number(),
                letter_number,
                has_attachment,
                flags,
                record,
            }
        })
        .collect())
}

pub async fn build_view<T: Submission>(
    pool: &PgPool,
    policy: &Policy,
    actor: &UserPermissions,
    record: T,
) -> Result<SubmissionView<T>, ApiResponse<()>> {
    build_views(pool, policy, actor, vec![record])
        .await?
        .pop()
        .ok_or_else(|| ApiResponse::internal("Failed to build view", "empty result"))
}

pub async fn show<T: Submission>(
    pool: &PgPool,
    policy: &Policy,
    actor: &UserPermissions,
    id: i32,
) -> ViewResponse<T> {
    let record = find_visible::<T>(pool, policy, actor, id).await?;
    let view = build_view(pool, policy, actor, record).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        format!("{} retrieved", T::KIND.label()),
        view,
    ))
}

/// `403` unless the actor may submit this kind.
pub fn authorize_create<T: Submission>(
    policy: &Policy,
    actor: &UserPermissions,
) -> Result<(), ApiResponse<()>> {
    Lifecycle::new(T::KIND, policy, actor)
        .authorize_create()
        .map_err(Into::into)
}

pub async fn created<T: Submission>(
    pool: &PgPool,
    policy: &Policy,
    actor: &UserPermissions,
    record: T,
) -> ViewResponse<T> {
    info!(
        "📝 {} #{} submitted by {}",
        T::KIND.label(),
        record.id(),
        actor.username
    );
    let view = build_view(pool, policy, actor, record).await?;
    Ok(ApiResponse::success(
        StatusCode::CREATED,
        format!("{} submitted", T::KIND.label()),
        view,
    ))
}

/// Writes review columns; `completed_at` only exists on completable tables.
fn push_review_columns(qb: &mut QueryBuilder<'_, Postgres>, kind: SubmissionKind, state: &ReviewState) {
    qb.push("status = ")
        .push_bind(state.status)
        .push(", note = ")
        .push_bind(state.note.clone())
        .push(", processed_by = ")
        .push_bind(state.processed_by)
        .push(", processed_at = ")
        .push_bind(state.processed_at);
    if kind.supports_completion() {
        qb.push(", completed_at = ").push_bind(state.completed_at);
    }
}

/// Starts an `UPDATE` for a revision: caller pushes its own `column = value, ` pairs next.
pub fn revision_builder<'a, T: Submission>() -> QueryBuilder<'a, Postgres> {
    QueryBuilder::new(format!("UPDATE {} SET ", T::KIND.table()))
}

/// Checks the actor may revise the record; returns it for the caller to update.
pub async fn prepare_revision<T: Submission>(
    pool: &PgPool,
    policy: &Policy,
    actor: &UserPermissions,
    id: i32,
) -> Result<T, ApiResponse<()>> {
    let record = find_visible::<T>(pool, policy, actor, id).await?;
    Lifecycle::new(T::KIND, policy, actor)
        .resubmit(record.review(), record.owner_id())
        .map_err(ApiResponse::from)?;
    Ok(record)
}

/// Finishes a revision `UPDATE`: resets the review, guards on the status the
/// record had when it was loaded, and answers with the fresh view.
pub async fn finish_revision<T: Submission>(
    pool: &PgPool,
    policy: &Policy,
    actor: &UserPermissions,
    mut qb: QueryBuilder<'_, Postgres>,
    original: &T,
) -> ViewResponse<T> {
    push_review_columns(&mut qb, T::KIND, &ReviewState::pending());
    qb.push(", updated_at = NOW() WHERE id = ")
        .push_bind(original.id())
        .push(" AND status = ")
        .push_bind(original.review().status)
        .push(" RETURNING *");

    let updated = qb
        .build_query_as::<T>()
        .fetch_optional(pool)
        .await
        .map_err(|e| ApiResponse::internal(format!("Failed to update {}", T::KIND.label()), e))?;

    match updated {
        Some(record) => {
            info!(
                "✏️ {} #{} revised by {} and resubmitted",
                T::KIND.label(),
                record.id(),
                actor.username
            );
            let view = build_view(pool, policy, actor, record).await?;
            Ok(ApiResponse::success(
                StatusCode::OK,
                format!("{} updated and resubmitted", T::KIND.label()),
                view,
            ))
        }
        None => conflict_with_latest(pool, policy, actor, original.id(), ALREADY_PROCESSED).await,
    }
}

#[derive(Debug, Clone)]
pub enum Transition {
    Approve,
    Reject(String),
    Complete,
}

/// Runs one review transition and persists it as a compare-and-set on status.
pub async fn transition<T: Submission>(
    pool: &PgPool,
    policy: &Policy,
    actor: &UserPermissions,
    id: i32,
    transition: Transition,
) -> ViewResponse<T> {
    let record = find::<T>(pool, id).await?;
    let expected = record.review().status;
    let flow = Lifecycle::new(T::KIND, policy, actor);
    let now = Utc::now().naive_utc();

    let next = match &transition {
        Transition::Approve => flow.approve(record.review(), now),
        Transition::Reject(note) => flow.reject(record.review(), note, now),
        Transition::Complete => flow.complete(record.review(), record.owner_id(), now),
    };

    let next = match next {
        Ok(next) => next,
        Err(WorkflowError::Conflict(message)) => {
            let view = build_view(pool, policy, actor, record).await?;
            return Ok(ApiResponse::flash(message, view));
        }
        Err(err) => return Err(err.into()),
    };

    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("UPDATE {} SET ", T::KIND.table()));
    push_review_columns(&mut qb, T::KIND, &next);
    qb.push(", updated_at = NOW() WHERE id = ")
        .push_bind(id)
        .push(" AND status = ")
        .push_bind(expected)
        .push(" RETURNING *");

    let updated = qb
        .build_query_as::<T>()
        .fetch_optional(pool)
        .await
        .map_err(|e| ApiResponse::internal(format!("Failed to update {}", T::KIND.label()), e))?;

    let Some(updated) = updated else {
        return conflict_with_latest(pool, policy, actor, id, ALREADY_PROCESSED).await;
    };

    info!(
        "✅ {} #{} {} by {}",
        T::KIND.label(),
        id,
        updated.review().status.as_str(),
        actor.username
    );
    let view = build_view(pool, policy, actor, updated).await?;
    let message = match transition {
        Transition::Approve => format!("{} approved", T::KIND.label()),
        Transition::Reject(_) => format!("{} rejected", T::KIND.label()),
        Transition::Complete => format!("{} marked as done", T::KIND.label()),
    };
    Ok(ApiResponse::success(StatusCode::OK, message, view))
}

pub async fn conflict_with_latest<T: Submission>(
    pool: &PgPool,
    policy: &Policy,
    actor: &UserPermissions,
    id: i32,
    message: &str,
) -> ViewResponse<T> {
    warn!("{} #{}: concurrent change detected", T::KIND.label(), id);
    let latest = find::<T>(pool, id).await?;
    let view = build_view(pool, policy, actor, latest).await?;
    Ok(ApiResponse::flash(message, view))
}

/// Hard delete, admin only. Removes the stored attachment too.
pub async fn destroy<T: Submission>(
    pool: &PgPool,
    policy: &Policy,
    actor: &UserPermissions,
    id: i32,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    Lifecycle::new(T::KIND, policy, actor)
        .authorize_delete()
        .map_err(ApiResponse::from)?;

    let record = find::<T>(pool, id).await?;
    sqlx::query(&format!("DELETE FROM {} WHERE id = $1", T::KIND.table()))
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| ApiResponse::internal(format!("Failed to delete {}", T::KIND.label()), e))?;

    if let Some(path) = record.attachment_path() {
        if let Err(e) = remove_stored(path).await {
            warn!("Failed to remove attachment {}: {}", path, e);
        }
    }

    info!("🗑️ {} #{} deleted by {}", T::KIND.label(), id, actor.username);
    Ok(ApiResponse::success(
        StatusCode::OK,
        format!("{} deleted", T::KIND.label()),
        (),
    ))
}

/// Whether `id` exists in `table`; used to validate foreign-key fields before writing.
pub async fn row_exists(pool: &PgPool, table: &str, id: i32) -> Result<bool, ApiResponse<()>> {
    sqlx::query_scalar::<_, bool>(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
        table
    ))
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(|e| ApiResponse::internal("Failed to validate reference", e))
}

/// Whether user `id` exists and currently holds `role`.
pub async fn user_has_role(pool: &PgPool, id: i32, role: Role) -> Result<bool, ApiResponse<()>> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM user_roles WHERE user_id = $1 AND role = $2)",
    )
    .bind(id)
    .bind(role)
    .fetch_one(pool)
    .await
    .map_err(|e| ApiResponse::internal("Failed to validate reference", e))
}
