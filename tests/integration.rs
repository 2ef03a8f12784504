//! Integration tests for ChurnForge

use churnforge::data::churn_rate;
use churnforge::report::build_report;
use churnforge::{
    load_customer_records, read_report, run_pipeline, stratified_split, ChurnScorer,
    CustomerFeatures, CustomerRecord, PipelineConfig, RandomForest, Segment,
};
use std::collections::HashSet;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

/// Create a test CSV where long-inactive, low-spend customers churn
fn create_test_csv(n: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Recency,Frequency,Monetary,Churned").unwrap();

    for i in 0..n {
        let recency = (i * 37 % 365) as f64;
        let frequency = 1 + (i * 13 % 25);
        let monetary = 20.0 + (i * 53 % 900) as f64 + 0.5;
        let churned = recency > 180.0 && frequency < 15;
        writeln!(
            file,
            "{},{},{},{}",
            recency,
            frequency,
            monetary,
            u8::from(churned)
        )
        .unwrap();
    }

    file
}

#[test]
fn test_end_to_end_pipeline() {
    let input = create_test_csv(200);
    let work_dir = tempdir().unwrap();
    let config = PipelineConfig::new(
        input.path(),
        work_dir.path().join("output"),
        work_dir.path().join("model"),
    )
    .with_trees(25);

    let summary = run_pipeline(&config).unwrap();

    // Every artifact is written
    assert!(config.model_path.exists());
    assert!(config.report_path.exists());
    assert!(config.confusion_matrix_path.exists());
    assert!(config.roc_curve_path.exists());

    // 20% hold-out, rows in test-set order with sequential IDs
    assert_eq!(summary.n_records, 200);
    assert_eq!(summary.n_test, 40);
    assert_eq!(summary.n_train + summary.n_test, 200);
    let ids: Vec<String> = summary.report.iter().map(|r| r.customer_id.clone()).collect();
    let expected: Vec<String> = (1001..=1040).map(|n| format!("CUST{n}")).collect();
    assert_eq!(ids, expected);

    // Persisted report matches the in-memory one
    let loaded = read_report(&config.report_path).unwrap();
    assert_eq!(loaded, summary.report);

    // Segment and action follow the rounded probability
    for row in &loaded {
        assert_eq!(row.segment, Segment::from_probability(row.churn_probability));
        assert_eq!(row.suggested_action, row.segment.suggested_action());
        assert!((0.0..=1.0).contains(&row.churn_probability));
    }

    let counted: usize = summary.segment_counts.iter().map(|(_, c)| c).sum();
    assert_eq!(counted, summary.n_test);
    assert_eq!(summary.confusion_matrix.total(), summary.n_test);
    assert!(summary.auc() > 0.5);
}

#[test]
fn test_pipeline_is_reproducible() {
    let input = create_test_csv(120);
    let first_dir = tempdir().unwrap();
    let second_dir = tempdir().unwrap();

    let first = run_pipeline(
        &PipelineConfig::new(input.path(), first_dir.path(), first_dir.path()).with_trees(10),
    )
    .unwrap();
    let second = run_pipeline(
        &PipelineConfig::new(input.path(), second_dir.path(), second_dir.path()).with_trees(10),
    )
    .unwrap();

    assert_eq!(first.report, second.report);
}

#[test]
fn test_saved_model_reproduces_report_scores() {
    let input = create_test_csv(150);
    let work_dir = tempdir().unwrap();
    let config =
        PipelineConfig::new(input.path(), work_dir.path(), work_dir.path()).with_trees(10);
    let summary = run_pipeline(&config).unwrap();

    let model = RandomForest::load(&config.model_path).unwrap();
    for row in &summary.report {
        let features = CustomerFeatures::new(row.recency, row.frequency as f64, row.monetary);
        let p = model.predict_probability(&features);
        assert!((p - row.churn_probability).abs() <= 0.005 + 1e-9);
    }
}

#[test]
fn test_stratified_split_on_loaded_data() {
    let input = create_test_csv(300);
    let records = load_customer_records(input.path()).unwrap();
    let full = churn_rate(&records);

    let split = stratified_split(&records, 0.2, 42).unwrap();
    assert!((churn_rate(&split.train) - full).abs() < 0.02);
    assert!((churn_rate(&split.test) - full).abs() < 0.02);
}

/// Scorer with fixed answers keyed by recency
struct FixedScorer;

impl ChurnScorer for FixedScorer {
    fn predict_probability(&self, features: &CustomerFeatures) -> f64 {
        match features.recency as u32 {
            300 => 0.9,
            90 => 0.5,
            _ => 0.1,
        }
    }
}

#[test]
fn test_report_with_custom_scorer() {
    let test_set = [
        CustomerRecord {
            recency: 300.0,
            frequency: 1,
            monetary: 15.0,
            churned: true,
        },
        CustomerRecord {
            recency: 90.0,
            frequency: 4,
            monetary: 180.0,
            churned: false,
        },
        CustomerRecord {
            recency: 5.0,
            frequency: 30,
            monetary: 2400.0,
            churned: false,
        },
    ];
    let rows = build_report(&test_set, &FixedScorer);

    let segments: Vec<Segment> = rows.iter().map(|r| r.segment).collect();
    assert_eq!(
        segments,
        vec![Segment::HighRisk, Segment::MediumRisk, Segment::LowRisk]
    );
    let actions: Vec<String> = rows.iter().map(|r| r.suggested_action.to_string()).collect();
    assert_eq!(
        actions,
        vec![
            "Send 20% voucher",
            "Send retention email",
            "Promote loyalty club"
        ]
    );
    let ids: HashSet<&str> = rows.iter().map(|r| r.customer_id.as_str()).collect();
    assert_eq!(ids, HashSet::from(["CUST1001", "CUST1002", "CUST1003"]));
    assert_eq!(rows[0].customer_id, "CUST1001");
}

#[test]
fn test_error_handling_missing_columns() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Recency,Monetary,Churned").unwrap();
    writeln!(file, "10,100.0,0").unwrap();

    let work_dir = tempdir().unwrap();
    let config = PipelineConfig::new(file.path(), work_dir.path(), work_dir.path());
    let result = run_pipeline(&config);

    assert!(matches!(
        result,
        Err(churnforge::ChurnError::DataLoad { .. })
    ));
    assert!(!config.model_path.exists());
}
