//! Read-only web dashboard over the persisted prediction report
//!
//! The server loads the report once through [`ReportCache`] and recomputes
//! the filtered view on every request. Nothing is ever written back.

pub mod cache;
pub mod html;
pub mod routes;
pub mod view;

pub use cache::ReportCache;
pub use routes::{router, AppState};
pub use view::{DashboardView, SegmentFilter};

use crate::report::REPORT_FILE;
use crate::viz::{CONFUSION_MATRIX_FILE, ROC_CURVE_FILE};
use anyhow::Context;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Files the dashboard reads and the address it listens on
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub report_path: PathBuf,
    pub confusion_matrix_path: PathBuf,
    pub roc_curve_path: PathBuf,
    pub host: String,
    pub port: u16,
}

impl DashboardConfig {
    /// Expect the training artifacts under `output_dir` with their fixed names
    pub fn from_output_dir(output_dir: impl AsRef<Path>) -> Self {
        let output_dir = output_dir.as_ref();
        Self {
            report_path: output_dir.join(REPORT_FILE),
            confusion_matrix_path: output_dir.join(CONFUSION_MATRIX_FILE),
            roc_curve_path: output_dir.join(ROC_CURVE_FILE),
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

/// Load the report and serve the dashboard until the process is stopped.
///
/// A missing or malformed report is fatal before the listener is bound.
pub async fn serve(config: DashboardConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr()?;

    let cache = Arc::new(ReportCache::new());
    let rows = cache
        .get_or_load(&config.report_path)
        .context("dashboard cannot start without a prediction report")?;
    tracing::info!(rows = rows.len(), path = %config.report_path.display(), "report loaded");

    let app = router(AppState::new(cache, config));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("dashboard listening on http://{}", addr);
    axum::serve(listener, app).await.context("dashboard server failed")?;
    Ok(())
}
