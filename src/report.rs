//! Prediction report: risk segmentation, suggested actions and the report CSV

use crate::data::{float_column, int_column, scan_csv, str_column, CustomerRecord};
use crate::error::ChurnError;
use crate::model::{label_for, ChurnScorer};
use polars::prelude::*;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Fixed file name of the persisted report
pub const REPORT_FILE: &str = "model_predictions.csv";

/// Report columns, in the order they are written
pub const REPORT_COLUMNS: [&str; 9] = [
    "CustomerID",
    "Recency",
    "Frequency",
    "Monetary",
    "TrueLabel",
    "PredictedLabel",
    "ChurnProbability",
    "Segment",
    "SuggestedAction",
];

const HIGH_RISK_ABOVE: f64 = 0.75;
const MEDIUM_RISK_ABOVE: f64 = 0.4;
const FIRST_CUSTOMER_NUMBER: usize = 1001;

/// Risk bucket derived from the churn probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    HighRisk,
    MediumRisk,
    LowRisk,
}

impl Segment {
    /// Every segment, from highest to lowest risk
    pub const ALL: [Segment; 3] = [Segment::HighRisk, Segment::MediumRisk, Segment::LowRisk];

    /// Bucket a probability. Boundaries belong to the lower-risk bucket:
    /// 0.75 is Medium Risk and 0.4 is Low Risk.
    pub fn from_probability(probability: f64) -> Self {
        if probability > HIGH_RISK_ABOVE {
            Segment::HighRisk
        } else if probability > MEDIUM_RISK_ABOVE {
            Segment::MediumRisk
        } else {
            Segment::LowRisk
        }
    }

    pub fn suggested_action(self) -> SuggestedAction {
        match self {
            Segment::HighRisk => SuggestedAction::Voucher,
            Segment::MediumRisk => SuggestedAction::RetentionEmail,
            Segment::LowRisk => SuggestedAction::LoyaltyClub,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Segment::HighRisk => "High Risk",
            Segment::MediumRisk => "Medium Risk",
            Segment::LowRisk => "Low Risk",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Segment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Segment::ALL
            .into_iter()
            .find(|segment| segment.as_str() == s)
            .ok_or_else(|| format!("unknown segment '{s}'"))
    }
}

/// Retention action attached to each segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuggestedAction {
    Voucher,
    RetentionEmail,
    LoyaltyClub,
}

impl SuggestedAction {
    pub const ALL: [SuggestedAction; 3] = [
        SuggestedAction::Voucher,
        SuggestedAction::RetentionEmail,
        SuggestedAction::LoyaltyClub,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SuggestedAction::Voucher => "Send 20% voucher",
            SuggestedAction::RetentionEmail => "Send retention email",
            SuggestedAction::LoyaltyClub => "Promote loyalty club",
        }
    }
}

impl fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuggestedAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SuggestedAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown suggested action '{s}'"))
    }
}

/// Display identifier for the `index`-th test row: `CUST1001`, `CUST1002`, ...
///
/// Only unique within one run; regenerated from row order every time.
pub fn customer_id(index: usize) -> String {
    format!("CUST{}", FIRST_CUSTOMER_NUMBER + index)
}

/// Round a probability to two decimals
pub fn round_probability(probability: f64) -> f64 {
    (probability * 100.0).round() / 100.0
}

/// One scored customer in the prediction report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub customer_id: String,
    pub recency: f64,
    pub frequency: u64,
    pub monetary: f64,
    pub true_label: usize,
    pub predicted_label: usize,
    /// Rounded to two decimals
    pub churn_probability: f64,
    pub segment: Segment,
    pub suggested_action: SuggestedAction,
}

impl ReportRow {
    /// Build a row from a held-out record and its raw churn probability.
    ///
    /// The predicted label uses the raw probability; the segment is taken
    /// from the rounded probability stored in the report.
    pub fn from_prediction(index: usize, record: &CustomerRecord, probability: f64) -> Self {
        let churn_probability = round_probability(probability);
        let segment = Segment::from_probability(churn_probability);

        Self {
            customer_id: customer_id(index),
            recency: record.recency,
            frequency: record.frequency,
            monetary: record.monetary,
            true_label: record.label(),
            predicted_label: label_for(probability),
            churn_probability,
            segment,
            suggested_action: segment.suggested_action(),
        }
    }
}

/// Score the held-out records and build one report row per customer
pub fn build_report<S: ChurnScorer + ?Sized>(test: &[CustomerRecord], scorer: &S) -> Vec<ReportRow> {
    let features: Vec<_> = test.iter().map(CustomerRecord::features).collect();
    report_from_probabilities(test, &scorer.predict_probabilities(&features))
}

/// Assemble report rows, in test-set order, from held-out records and their
/// churn probabilities
pub fn report_from_probabilities(test: &[CustomerRecord], probabilities: &[f64]) -> Vec<ReportRow> {
    test.iter()
        .zip(probabilities)
        .enumerate()
        .map(|(i, (record, &p))| ReportRow::from_prediction(i, record, p))
        .collect()
}

/// Count rows per segment, largest first; segments with no rows are omitted
pub fn segment_counts(rows: &[ReportRow]) -> Vec<(Segment, usize)> {
    let mut counts: Vec<(Segment, usize)> = Segment::ALL
        .into_iter()
        .map(|segment| (segment, rows.iter().filter(|r| r.segment == segment).count()))
        .filter(|(_, count)| *count > 0)
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    counts
}

/// Write the report CSV to `path`, creating parent directories
pub fn write_report(rows: &[ReportRow], path: impl AsRef<Path>) -> crate::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ChurnError::persist(path, e))?;
    }

    let file = File::create(path).map_err(|e| ChurnError::persist(path, e))?;
    let mut writer = BufWriter::new(file);
    write_report_to(rows, &mut writer).map_err(|e| ChurnError::persist(path, e))?;
    writer.flush().map_err(|e| ChurnError::persist(path, e))?;

    tracing::info!(path = %path.display(), rows = rows.len(), "prediction report saved");
    Ok(())
}

/// Write report rows as CSV into any writer (file or in-memory export)
pub fn write_report_to<W: Write>(rows: &[ReportRow], writer: W) -> PolarsResult<()> {
    let mut frame = report_frame(rows)?;
    CsvWriter::new(writer).include_header(true).finish(&mut frame)
}

fn report_frame(rows: &[ReportRow]) -> PolarsResult<DataFrame> {
    df!(
        "CustomerID" => rows.iter().map(|r| r.customer_id.as_str()).collect::<Vec<_>>(),
        "Recency" => rows.iter().map(|r| r.recency).collect::<Vec<_>>(),
        "Frequency" => rows.iter().map(|r| r.frequency as i64).collect::<Vec<_>>(),
        "Monetary" => rows.iter().map(|r| r.monetary).collect::<Vec<_>>(),
        "TrueLabel" => rows.iter().map(|r| r.true_label as i64).collect::<Vec<_>>(),
        "PredictedLabel" => rows.iter().map(|r| r.predicted_label as i64).collect::<Vec<_>>(),
        "ChurnProbability" => rows.iter().map(|r| r.churn_probability).collect::<Vec<_>>(),
        "Segment" => rows.iter().map(|r| r.segment.as_str()).collect::<Vec<_>>(),
        "SuggestedAction" => rows.iter().map(|r| r.suggested_action.as_str()).collect::<Vec<_>>(),
    )
}

/// Read a report CSV written by [`write_report`]
pub fn read_report(path: impl AsRef<Path>) -> crate::Result<Vec<ReportRow>> {
    let path = path.as_ref();
    let df = scan_csv(
        path,
        vec![
            col("CustomerID").cast(DataType::String),
            col("Recency").cast(DataType::Float64),
            col("Frequency").cast(DataType::Int64),
            col("Monetary").cast(DataType::Float64),
            col("TrueLabel").cast(DataType::Int64),
            col("PredictedLabel").cast(DataType::Int64),
            col("ChurnProbability").cast(DataType::Float64),
            col("Segment").cast(DataType::String),
            col("SuggestedAction").cast(DataType::String),
        ],
    )?;

    let ids = str_column(&df, "CustomerID", path)?;
    let recency = float_column(&df, "Recency", path)?;
    let frequency = int_column(&df, "Frequency", path)?;
    let monetary = float_column(&df, "Monetary", path)?;
    let true_labels = int_column(&df, "TrueLabel", path)?;
    let predicted_labels = int_column(&df, "PredictedLabel", path)?;
    let probabilities = float_column(&df, "ChurnProbability", path)?;
    let segments = str_column(&df, "Segment", path)?;
    let actions = str_column(&df, "SuggestedAction", path)?;

    let invalid = |row: usize, message: String| ChurnError::data_load(path, format!("row {row}: {message}"));

    let mut rows = Vec::with_capacity(ids.len());
    for (row, customer_id) in ids.into_iter().enumerate() {
        let frequency = u64::try_from(frequency[row])
            .map_err(|_| invalid(row, format!("negative Frequency {}", frequency[row])))?;
        let true_label = binary_label(true_labels[row]).ok_or_else(|| {
            invalid(row, format!("TrueLabel must be 0 or 1, got {}", true_labels[row]))
        })?;
        let predicted_label = binary_label(predicted_labels[row]).ok_or_else(|| {
            invalid(row, format!("PredictedLabel must be 0 or 1, got {}", predicted_labels[row]))
        })?;
        let segment = segments[row].parse::<Segment>().map_err(|e| invalid(row, e))?;
        let suggested_action = actions[row].parse::<SuggestedAction>().map_err(|e| invalid(row, e))?;

        rows.push(ReportRow {
            customer_id,
            recency: recency[row],
            frequency,
            monetary: monetary[row],
            true_label,
            predicted_label,
            churn_probability: probabilities[row],
            segment,
            suggested_action,
        });
    }

    tracing::debug!(path = %path.display(), rows = rows.len(), "prediction report loaded");
    Ok(rows)
}

fn binary_label(value: i64) -> Option<usize> {
    match value {
        0 => Some(0),
        1 => Some(1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fixture_records() -> Vec<CustomerRecord> {
        vec![
            CustomerRecord {
                recency: 320.0,
                frequency: 1,
                monetary: 19.99,
                churned: true,
            },
            CustomerRecord {
                recency: 95.5,
                frequency: 4,
                monetary: 240.0,
                churned: false,
            },
            CustomerRecord {
                recency: 3.0,
                frequency: 27,
                monetary: 1830.25,
                churned: false,
            },
        ]
    }

    #[test]
    fn test_segment_boundaries() {
        assert_eq!(Segment::from_probability(0.75), Segment::MediumRisk);
        assert_eq!(Segment::from_probability(0.751), Segment::HighRisk);
        assert_eq!(Segment::from_probability(0.4), Segment::LowRisk);
        assert_eq!(Segment::from_probability(0.401), Segment::MediumRisk);
        assert_eq!(Segment::from_probability(0.0), Segment::LowRisk);
        assert_eq!(Segment::from_probability(1.0), Segment::HighRisk);
    }

    #[test]
    fn test_segmentation_is_total() {
        for step in 0..=1000 {
            let p = step as f64 / 1000.0;
            let segment = Segment::from_probability(p);
            assert!(Segment::ALL.contains(&segment));
            assert_eq!(segment.suggested_action(), segment.suggested_action());
        }
    }

    #[test]
    fn test_suggested_actions() {
        assert_eq!(Segment::HighRisk.suggested_action().as_str(), "Send 20% voucher");
        assert_eq!(
            Segment::MediumRisk.suggested_action().as_str(),
            "Send retention email"
        );
        assert_eq!(
            Segment::LowRisk.suggested_action().as_str(),
            "Promote loyalty club"
        );
    }

    #[test]
    fn test_labels_parse_back() {
        for segment in Segment::ALL {
            assert_eq!(segment.to_string().parse::<Segment>(), Ok(segment));
        }
        for action in SuggestedAction::ALL {
            assert_eq!(action.to_string().parse::<SuggestedAction>(), Ok(action));
        }
        assert!("Extreme Risk".parse::<Segment>().is_err());
    }

    #[test]
    fn test_customer_ids_are_sequential_and_unique() {
        let n = 250;
        let ids: Vec<String> = (0..n).map(customer_id).collect();
        let unique: std::collections::HashSet<&String> = ids.iter().collect();

        assert_eq!(unique.len(), n);
        assert_eq!(ids.first().map(String::as_str), Some("CUST1001"));
        assert_eq!(ids.last().map(String::as_str), Some("CUST1250"));
    }

    #[test]
    fn test_report_from_fixture_probabilities() {
        let rows = report_from_probabilities(&fixture_records(), &[0.9, 0.5, 0.1]);

        let segments: Vec<Segment> = rows.iter().map(|r| r.segment).collect();
        assert_eq!(
            segments,
            vec![Segment::HighRisk, Segment::MediumRisk, Segment::LowRisk]
        );

        let actions: Vec<&str> = rows.iter().map(|r| r.suggested_action.as_str()).collect();
        assert_eq!(
            actions,
            vec![
                "Send 20% voucher",
                "Send retention email",
                "Promote loyalty club"
            ]
        );

        let ids: Vec<&str> = rows.iter().map(|r| r.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["CUST1001", "CUST1002", "CUST1003"]);
        assert_eq!(rows[0].true_label, 1);
        assert_eq!(rows[0].predicted_label, 1);
        assert_eq!(rows[1].predicted_label, 1);
        assert_eq!(rows[2].predicted_label, 0);
    }

    #[test]
    fn test_segment_uses_rounded_probability() {
        let rows = report_from_probabilities(&fixture_records()[..1], &[0.753]);
        assert_eq!(rows[0].churn_probability, 0.75);
        assert_eq!(rows[0].segment, Segment::MediumRisk);
    }

    #[test]
    fn test_segment_counts_order() {
        let rows = report_from_probabilities(&fixture_records(), &[0.1, 0.9, 0.2]);
        assert_eq!(
            segment_counts(&rows),
            vec![(Segment::LowRisk, 2), (Segment::HighRisk, 1)]
        );
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let rows = report_from_probabilities(&fixture_records(), &[0.1, 0.5, 0.9]);
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("output").join(REPORT_FILE);

        write_report(&rows, &path).unwrap();
        let loaded = read_report(&path).unwrap();

        assert_eq!(loaded, rows);
    }

    #[test]
    fn test_report_header_order() {
        let rows = report_from_probabilities(&fixture_records(), &[0.1, 0.5, 0.9]);
        let mut buffer = Vec::new();
        write_report_to(&rows, &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, REPORT_COLUMNS.join(","));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_read_missing_report() {
        let result = read_report("no/such/report.csv");
        assert!(matches!(result, Err(ChurnError::DataLoad { .. })));
    }
}
