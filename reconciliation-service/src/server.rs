use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tagging_core::{ObservedMeaning, Scope, WronglyMappedPolicy};

use crate::{
    config::AppConfig,
    pipeline::{PipelineError, Reconciler, RowSetKind, ScopeReport, UnknownRowSet},
    sinks::{csv_export, dashboard, DashboardView, ExportError},
};

#[derive(Clone)]
pub struct AppState {
    cfg: Arc<AppConfig>,
    reconciler: Arc<Reconciler>,
}

impl AppState {
    pub fn new(cfg: AppConfig, reconciler: Reconciler) -> Self {
        Self {
            cfg: Arc::new(cfg),
            reconciler: Arc::new(reconciler),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    UnknownRowSet(#[from] UnknownRowSet),
    #[error("row set '{0}' is not part of this report")]
    RowSetDisabled(RowSetKind),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("reconciliation task failed: {0}")]
    Task(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Pipeline(PipelineError::UnknownScope(_)) => StatusCode::NOT_FOUND,
            Self::UnknownRowSet(_) | Self::RowSetDisabled(_) => StatusCode::NOT_FOUND,
            Self::Pipeline(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Export(_) | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() || status == StatusCode::UNPROCESSABLE_ENTITY {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ScopeSummary {
    dtr: i64,
    observed_meaning: ObservedMeaning,
    policy: WronglyMappedPolicy,
    href: String,
}

#[derive(Serialize)]
struct FeederEntry {
    feeder: i64,
    dtrs: Vec<ScopeSummary>,
}

#[derive(Serialize)]
struct CacheCleared {
    cleared: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/scopes", get(list_scopes))
        .route("/scopes/:feeder/:dtr", get(scope_dashboard))
        .route("/scopes/:feeder/:dtr/report", get(scope_report))
        .route("/scopes/:feeder/:dtr/export/:set", get(export_row_set))
        .route("/cache/invalidate", post(invalidate_cache))
        .with_state(state)
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = state
        .cfg
        .server
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid server.bind_addr: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, scopes = state.cfg.scopes.len(), "dashboard listening");
    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn list_scopes(State(state): State<AppState>) -> Json<Vec<FeederEntry>> {
    let feeders = state
        .cfg
        .feeders()
        .into_iter()
        .map(|(feeder, dtrs)| FeederEntry {
            feeder,
            dtrs: dtrs
                .into_iter()
                .filter_map(|dtr| state.cfg.find(Scope::new(feeder, dtr)))
                .map(|entry| ScopeSummary {
                    dtr: entry.dtr,
                    observed_meaning: entry.observed_meaning,
                    policy: entry.policy,
                    href: format!("/scopes/{}/{}", entry.feeder, entry.dtr),
                })
                .collect(),
        })
        .collect();
    Json(feeders)
}

/// Every request reloads (or re-reads from cache) and reclassifies.
async fn run_report(state: &AppState, scope: Scope) -> Result<ScopeReport, ApiError> {
    metrics::counter!("dashboard_requests_total").increment(1);
    let state = state.clone();
    tokio::task::spawn_blocking(move || state.reconciler.run_scope(&state.cfg, scope))
        .await
        .map_err(|e| ApiError::Task(e.to_string()))?
        .map_err(ApiError::from)
}

async fn scope_dashboard(
    State(state): State<AppState>,
    Path((feeder, dtr)): Path<(i64, i64)>,
) -> Result<Json<DashboardView>, ApiError> {
    let report = run_report(&state, Scope::new(feeder, dtr)).await?;
    Ok(Json(dashboard::render(&report)))
}

async fn scope_report(
    State(state): State<AppState>,
    Path((feeder, dtr)): Path<(i64, i64)>,
) -> Result<Json<ScopeReport>, ApiError> {
    Ok(Json(run_report(&state, Scope::new(feeder, dtr)).await?))
}

async fn export_row_set(
    State(state): State<AppState>,
    Path((feeder, dtr, set)): Path<(i64, i64, String)>,
) -> Result<Response, ApiError> {
    let kind: RowSetKind = set.parse()?;
    let report = run_report(&state, Scope::new(feeder, dtr)).await?;
    let table = report.row_set(kind).ok_or(ApiError::RowSetDisabled(kind))?;
    let body = csv_export::table_to_csv(table)?;
    let file_name = csv_export::file_name(report.scope, kind, report.meaning);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response())
}

async fn invalidate_cache(State(state): State<AppState>) -> Json<CacheCleared> {
    let cleared = state.reconciler.cache().map(|c| c.clear()).unwrap_or(0);
    tracing::info!(cleared, "table cache invalidated");
    Json(CacheCleared { cleared })
}
