//! ChurnForge: customer churn prediction on RFM features
//!
//! This library trains a random forest on Recency, Frequency and Monetary
//! features, evaluates it on a stratified hold-out set, writes a prediction
//! report with risk segments and retention actions, and serves that report
//! in a read-only dashboard.

pub mod cli;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod split;
pub mod viz;

// Re-export public items for easier access
pub use cli::{Cli, Command};
pub use data::{load_customer_records, CustomerFeatures, CustomerRecord};
pub use error::ChurnError;
pub use evaluate::{classification_report, confusion_matrix, roc_curve, ConfusionMatrix, RocCurve};
pub use model::{ChurnScorer, ForestParams, RandomForest};
pub use pipeline::{run_pipeline, PipelineConfig, PipelineSummary};
pub use report::{build_report, read_report, write_report, ReportRow, Segment, SuggestedAction};
pub use split::{stratified_split, TrainTestSplit};

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, ChurnError>;
