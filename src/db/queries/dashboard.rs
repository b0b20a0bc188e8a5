use std::collections::HashMap;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
};
use sqlx::PgPool;
use utoipa::OpenApi;

use crate::db::models::submission::SubmissionStatus;
use crate::db::queries::submission::count;
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::workflow::dashboard::{assemble, visible_kinds, Dashboard, DashboardWidget, KindCount, QuickLink};
use crate::workflow::policy::SharedPolicy;

/// Per-kind widgets and quick links for the signed-in user.
///
/// Kinds the user may not view are left out entirely; counts cover the
/// user's own records unless their role reviews that kind.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Widgets and quick links", body = ApiResponse<Dashboard>),
        (status = 401, description = "Not signed in")
    ),
    tag = "Dashboard",
    security(("bearerAuth" = []))
)]
pub async fn get_dashboard(
    State(pool): State<PgPool>,
    Extension(perms): Extension<UserPermissions>,
    Extension(policy): Extension<SharedPolicy>,
) -> Result<ApiResponse<Dashboard>, ApiResponse<()>> {
    let mut counts = HashMap::new();
    for (kind, scope) in visible_kinds(&policy, &perms) {
        let total = count(&pool, kind, scope, None)
            .await
            .map_err(|e| ApiResponse::internal("Failed to load dashboard", e))?;
        let pending = count(&pool, kind, scope, Some(SubmissionStatus::Pending))
            .await
            .map_err(|e| ApiResponse::internal("Failed to load dashboard", e))?;
        counts.insert(kind, KindCount { total, pending });
    }

    let dashboard = assemble(&policy, &perms, &counts);
    Ok(ApiResponse::success(StatusCode::OK, "Dashboard retrieved", dashboard))
}

#[derive(OpenApi)]
#[openapi(
    paths(get_dashboard),
    components(schemas(Dashboard, DashboardWidget, QuickLink)),
    tags(
        (name = "Dashboard", description = "Landing page summary")
    )
)]
pub struct DashboardDoc;
