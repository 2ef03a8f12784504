//! Training pipeline: load, split, fit, persist, evaluate, render and report

use crate::data::{churn_rate, load_customer_records, CustomerFeatures, CustomerRecord};
use crate::error::ChurnError;
use crate::evaluate::{confusion_matrix, roc_curve, ClassificationReport, ConfusionMatrix, RocCurve};
use crate::model::{ChurnScorer, ForestParams, RandomForest};
use crate::report::{report_from_probabilities, segment_counts, write_report, ReportRow, Segment, REPORT_FILE};
use crate::split::stratified_split;
use crate::viz::{render_confusion_matrix, render_roc_curve, CONFUSION_MATRIX_FILE, ROC_CURVE_FILE};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Fixed file name of the persisted model
pub const MODEL_FILE: &str = "random_forest_churn.model";

/// Every input and output location plus the training knobs
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub input_path: PathBuf,
    pub model_path: PathBuf,
    pub report_path: PathBuf,
    pub confusion_matrix_path: PathBuf,
    pub roc_curve_path: PathBuf,
    pub test_fraction: f64,
    pub seed: u64,
    pub n_trees: usize,
}

impl PipelineConfig {
    /// Place the standard artifact file names under the given directories
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_dir: impl AsRef<Path>,
        model_dir: impl AsRef<Path>,
    ) -> Self {
        let output_dir = output_dir.as_ref();
        Self {
            input_path: input_path.into(),
            model_path: model_dir.as_ref().join(MODEL_FILE),
            report_path: output_dir.join(REPORT_FILE),
            confusion_matrix_path: output_dir.join(CONFUSION_MATRIX_FILE),
            roc_curve_path: output_dir.join(ROC_CURVE_FILE),
            test_fraction: 0.2,
            seed: 42,
            n_trees: ForestParams::default().n_trees,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_test_fraction(mut self, test_fraction: f64) -> Self {
        self.test_fraction = test_fraction;
        self
    }

    pub fn with_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_trees: self.n_trees,
            seed: self.seed,
            ..ForestParams::default()
        }
    }
}

/// Wall-clock time spent in each pipeline stage
#[derive(Debug, Clone, Default)]
pub struct StageTimings {
    pub load: Duration,
    pub fit: Duration,
    pub evaluate: Duration,
    pub report: Duration,
}

/// Outcome of one training run
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub n_records: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub churn_rate: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub roc: RocCurve,
    pub classification: ClassificationReport,
    pub segment_counts: Vec<(Segment, usize)>,
    pub report: Vec<ReportRow>,
    pub timings: StageTimings,
}

impl PipelineSummary {
    pub fn auc(&self) -> f64 {
        self.roc.auc
    }
}

/// Run the whole training pipeline described by `config`.
///
/// Every artifact (model, two images, report) is recreated from scratch.
/// The first failure aborts the run.
pub fn run_pipeline(config: &PipelineConfig) -> crate::Result<PipelineSummary> {
    let mut timings = StageTimings::default();

    let stage = Instant::now();
    let records = load_customer_records(&config.input_path)?;
    timings.load = stage.elapsed();
    tracing::info!(
        path = %config.input_path.display(),
        rows = records.len(),
        "customer records loaded"
    );

    let split = stratified_split(&records, config.test_fraction, config.seed)?;
    if split.test.is_empty() {
        return Err(ChurnError::Training(format!(
            "test partition is empty ({} records, test fraction {})",
            records.len(),
            config.test_fraction
        )));
    }
    tracing::info!(
        train = split.train.len(),
        test = split.test.len(),
        "stratified split complete"
    );

    let stage = Instant::now();
    let model = RandomForest::fit(&split.train, &config.forest_params())?;
    timings.fit = stage.elapsed();
    tracing::info!(trees = model.n_trees(), "model fitted");

    model.persist(&config.model_path)?;

    let stage = Instant::now();
    let features: Vec<CustomerFeatures> = split.test.iter().map(CustomerRecord::features).collect();
    let scores = model.predict_probabilities(&features);
    let report = report_from_probabilities(&split.test, &scores);
    let true_labels: Vec<usize> = report.iter().map(|r| r.true_label).collect();
    let predicted_labels: Vec<usize> = report.iter().map(|r| r.predicted_label).collect();

    let cm = confusion_matrix(&true_labels, &predicted_labels)?;
    let roc = roc_curve(&true_labels, &scores)?;
    let classification = ClassificationReport::from_confusion_matrix(&cm);
    render_confusion_matrix(&cm, &config.confusion_matrix_path)?;
    render_roc_curve(&roc, &config.roc_curve_path)?;
    timings.evaluate = stage.elapsed();
    tracing::info!(
        accuracy = classification.accuracy,
        auc = roc.auc,
        "evaluation complete"
    );

    let stage = Instant::now();
    write_report(&report, &config.report_path)?;
    timings.report = stage.elapsed();

    Ok(PipelineSummary {
        n_records: records.len(),
        n_train: split.train.len(),
        n_test: split.test.len(),
        churn_rate: churn_rate(&records),
        confusion_matrix: cm,
        roc,
        classification,
        segment_counts: segment_counts(&report),
        report,
        timings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_uses_fixed_file_names() {
        let config = PipelineConfig::new("data/rfm.csv", "out", "models");

        assert_eq!(config.model_path, Path::new("models").join(MODEL_FILE));
        assert_eq!(config.report_path, Path::new("out/model_predictions.csv"));
        assert_eq!(config.confusion_matrix_path, Path::new("out/confusion_matrix.png"));
        assert_eq!(config.roc_curve_path, Path::new("out/roc_curve.png"));
        assert_eq!(config.test_fraction, 0.2);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_config_builders() {
        let config = PipelineConfig::new("in.csv", "out", "models")
            .with_seed(7)
            .with_test_fraction(0.3)
            .with_trees(12);

        let params = config.forest_params();
        assert_eq!(params.seed, 7);
        assert_eq!(params.n_trees, 12);
        assert_eq!(config.test_fraction, 0.3);
    }

    #[test]
    fn test_missing_input_aborts() {
        let config = PipelineConfig::new("missing/input.csv", "out", "models");
        assert!(matches!(
            run_pipeline(&config),
            Err(ChurnError::DataLoad { .. })
        ));
    }
}
