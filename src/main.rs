use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Extension, Router};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod config;
mod db;
mod middleware;
mod utils;
mod workflow;

use crate::api::auth::AuthDoc;
use crate::config::Config;
use crate::db::queries::assignment_letter::AssignmentLetterDoc;
use crate::db::queries::atk_request::AtkRequestDoc;
use crate::db::queries::dashboard::DashboardDoc;
use crate::db::queries::expense_report::ExpenseReportDoc;
use crate::db::queries::inventory_loan::InventoryLoanDoc;
use crate::db::queries::invoice::InvoiceDoc;
use crate::db::queries::letter_number::LetterNumberDoc;
use crate::db::queries::user::{ensure_bootstrap_admin, UserDoc};
use crate::middleware::auth::{create_permission_cache, jwt_middleware, rbac_middleware};
use crate::workflow::policy::Policy;

/// Stdout plus a daily rolling file in `log_dir`. Keep the guard alive for
/// the life of the process or buffered file output is lost.
fn init_tracing(config: &Config) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir).context("Failed to create logs directory")?;

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "office_workflow.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")))
        .with(fmt::layer().with_target(true))
        .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
        .init();

    Ok(guard)
}

fn api_docs() -> utoipa::openapi::OpenApi {
    AuthDoc::openapi()
        .merge_from(UserDoc::openapi())
        .merge_from(DashboardDoc::openapi())
        .merge_from(AtkRequestDoc::openapi())
        .merge_from(InventoryLoanDoc::openapi())
        .merge_from(InvoiceDoc::openapi())
        .merge_from(LetterNumberDoc::openapi())
        .merge_from(AssignmentLetterDoc::openapi())
        .merge_from(ExpenseReportDoc::openapi())
}

fn build_app(pool: PgPool, config: &Config) -> Router {
    let permission_cache = create_permission_cache();
    let policy = Arc::new(Policy::office_defaults());
    let merged_doc = api_docs();

    let public_routes = Router::new().merge(api::auth::auth_routes());

    let private_routes = Router::new()
        .merge(api::auth::secure_auth_routes())
        .merge(api::user::user_routes())
        .merge(api::dashboard::dashboard_routes())
        .merge(api::atk_request::atk_request_routes())
        .merge(api::inventory_loan::inventory_loan_routes())
        .merge(api::invoice::invoice_routes())
        .merge(api::letter_number::letter_number_routes())
        .merge(api::assignment_letter::assignment_letter_routes())
        .merge(api::expense_report::expense_report_routes())
        .route_layer(from_fn_with_state(pool.clone(), rbac_middleware))
        .route_layer(from_fn(jwt_middleware));

    Router::new()
        .merge(api::health::health_routes())
        .merge(public_routes)
        .merge(private_routes)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", merged_doc.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc).path("/rapidoc"))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(Extension(permission_cache))
        .layer(Extension(policy))
        .with_state(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::init()?;
    let _log_guard = init_tracing(&config)?;

    let pool = db::pool::get_db_pool(&config).await?;
    ensure_bootstrap_admin(&pool, &config)
        .await
        .context("Failed to create bootstrap admin")?;
    tokio::fs::create_dir_all(&config.attachment_storage_path)
        .await
        .context("Failed to create attachment storage directory")?;

    let app = build_app(pool.clone(), &config);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let listener = TcpListener::bind(config.server_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server_addr))?;
    info!("🚀 Server running at http://{}", config.server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx.subscribe(), pool))
        .await
        .context("Server encountered an error")?;

    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal(mut shutdown_rx: broadcast::Receiver<()>, pool: PgPool) {
    tokio::select! {
        _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down..."),
        _ = shutdown_rx.recv() => info!("Received shutdown signal."),
    }
    info!("🛠️ Closing database pool...");
    pool.close().await;
    info!("✅ Database pool closed. Server shutting down.");
}
