use std::sync::Arc;

use anyhow::Result;
use reconciliation_service::{
    config::AppConfig,
    metrics_server, observability,
    pipeline::Reconciler,
    server::{self, AppState},
    sources::TableCache,
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    // Tables stay cached for the life of the process until POST /cache/invalidate.
    let reconciler = Reconciler::from_config(&cfg).with_cache(Arc::new(TableCache::new()));

    server::serve(AppState::new(cfg, reconciler)).await
}
