//! Dashboard HTTP handlers

use super::cache::ReportCache;
use super::html::render_page;
use super::view::{DashboardView, SegmentFilter, EXPORT_FILE};
use super::DashboardConfig;
use crate::error::ChurnError;
use crate::viz::segment_pie_svg;
use axum::{
    extract::{RawQuery, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinError;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ReportCache>,
    pub config: Arc<DashboardConfig>,
}

impl AppState {
    pub fn new(cache: Arc<ReportCache>, config: DashboardConfig) -> Self {
        Self {
            cache,
            config: Arc::new(config),
        }
    }
}

/// Handler failure mapped onto an HTTP status
#[derive(Debug)]
pub enum DashboardError {
    BadRequest(String),
    Internal(ChurnError),
    Task(JoinError),
}

impl From<JoinError> for DashboardError {
    fn from(err: JoinError) -> Self {
        DashboardError::Task(err)
    }
}

impl From<ChurnError> for DashboardError {
    fn from(err: ChurnError) -> Self {
        match err {
            ChurnError::Config(message) => DashboardError::BadRequest(message),
            other => DashboardError::Internal(other),
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        match self {
            DashboardError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            DashboardError::Internal(err) => {
                tracing::error!(error = %err, "dashboard request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
            DashboardError::Task(err) => {
                tracing::error!(error = %err, "report loading task failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/download", get(download))
        .route("/images/confusion_matrix.png", get(confusion_matrix_image))
        .route("/images/roc_curve.png", get(roc_curve_image))
        .route("/cache/invalidate", post(invalidate_cache))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A cache miss reads the CSV, so the lookup runs on the blocking pool
async fn current_view(
    state: &AppState,
    query: Option<&str>,
) -> Result<DashboardView, DashboardError> {
    let cache = Arc::clone(&state.cache);
    let path = state.config.report_path.clone();
    let rows = tokio::task::spawn_blocking(move || cache.get_or_load(&path)).await??;
    let filter = SegmentFilter::from_query(query, &rows)?;
    Ok(DashboardView::build(&rows, filter))
}

async fn index(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Html<String>, DashboardError> {
    let view = current_view(&state, query.as_deref()).await?;
    let pie = segment_pie_svg(&view.summary)?;
    Ok(Html(render_page(&view, &pie)))
}

async fn download(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, DashboardError> {
    let view = current_view(&state, query.as_deref()).await?;
    let csv = view.export_csv()?;
    tracing::debug!(rows = view.filtered.len(), "filtered export");

    let disposition = format!("attachment; filename=\"{EXPORT_FILE}\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

async fn confusion_matrix_image(State(state): State<AppState>) -> Result<Response, DashboardError> {
    png_response(&state.config.confusion_matrix_path).await
}

async fn roc_curve_image(State(state): State<AppState>) -> Result<Response, DashboardError> {
    png_response(&state.config.roc_curve_path).await
}

async fn png_response(path: &Path) -> Result<Response, DashboardError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ChurnError::data_load(path, e))?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response())
}

async fn invalidate_cache(State(state): State<AppState>) -> Redirect {
    state.cache.invalidate(&state.config.report_path);
    Redirect::to("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CustomerRecord;
    use crate::report::{report_from_probabilities, write_report};
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    fn setup() -> (TempDir, AppState) {
        let temp_dir = tempdir().unwrap();
        let records: Vec<CustomerRecord> = (0..3)
            .map(|i| CustomerRecord {
                recency: 30.0 * i as f64,
                frequency: 3,
                monetary: 120.0,
                churned: i == 0,
            })
            .collect();
        let config = DashboardConfig::from_output_dir(temp_dir.path());
        write_report(
            &report_from_probabilities(&records, &[0.9, 0.5, 0.1]),
            &config.report_path,
        )
        .unwrap();
        std::fs::write(&config.confusion_matrix_path, b"\x89PNG fake").unwrap();

        let state = AppState::new(Arc::new(ReportCache::new()), config);
        (temp_dir, state)
    }

    async fn get(state: &AppState, uri: &str) -> (StatusCode, Vec<(String, String)>, String) {
        let response = router(state.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, String::from_utf8_lossy(&body).into_owned())
    }

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[tokio::test]
    async fn test_index_renders_all_segments_by_default() {
        let (_dir, state) = setup();
        let (status, _, body) = get(&state, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Showing 3 of 3 customers."));
        assert!(body.contains("<svg"));
    }

    #[tokio::test]
    async fn test_index_applies_filter() {
        let (_dir, state) = setup();
        let (status, _, body) = get(&state, "/?applied=1&segment=Low+Risk").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Showing 1 of 3 customers."));
        assert!(body.contains("CUST1003"));
        assert!(!body.contains("CUST1001"));
    }

    #[tokio::test]
    async fn test_unknown_segment_is_bad_request() {
        let (_dir, state) = setup();
        let (status, _, _) = get(&state, "/?applied=1&segment=Nope").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_filtered_csv() {
        let (_dir, state) = setup();
        let (status, headers, body) = get(&state, "/download?applied=1&segment=High+Risk").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(header(&headers, "content-type"), Some("text/csv"));
        assert_eq!(
            header(&headers, "content-disposition"),
            Some("attachment; filename=\"filtered_predictions.csv\"")
        );
        assert_eq!(body.lines().count(), 2);
        assert!(body.contains("CUST1001"));
    }

    #[tokio::test]
    async fn test_download_with_empty_selection() {
        let (_dir, state) = setup();
        let (status, _, body) = get(&state, "/download?applied=1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_images() {
        let (_dir, state) = setup();

        let (status, headers, _) = get(&state, "/images/confusion_matrix.png").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(header(&headers, "content-type"), Some("image/png"));

        // Only the confusion matrix was written by setup
        let (status, _, _) = get(&state, "/images/roc_curve.png").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_concurrent_first_requests_share_one_load() {
        let (_dir, state) = setup();
        assert!(state.cache.is_empty());

        let (first, second) = tokio::join!(get(&state, "/"), get(&state, "/download"));
        assert_eq!(first.0, StatusCode::OK);
        assert_eq!(second.0, StatusCode::OK);
        assert_eq!(second.2.lines().count(), 4);
        assert_eq!(state.cache.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_reloads_report() {
        let (_dir, state) = setup();
        get(&state, "/").await;
        assert_eq!(state.cache.len(), 1);

        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/cache/invalidate")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(state.cache.is_empty());
    }

    #[tokio::test]
    async fn test_missing_report_is_server_error() {
        let (dir, state) = setup();
        std::fs::remove_file(dir.path().join(crate::report::REPORT_FILE)).unwrap();

        let (status, _, body) = get(&state, "/").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("failed to load data"));
    }
}
