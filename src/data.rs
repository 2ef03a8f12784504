//! Feature store reader: loads customer RFM records and churn labels using Polars

use crate::error::ChurnError;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::path::Path;

/// Input columns in the order they are fed to the model
pub const FEATURE_COLUMNS: [&str; 3] = ["Recency", "Frequency", "Monetary"];

/// Binary churn label column
pub const LABEL_COLUMN: &str = "Churned";

/// One historical customer with RFM behaviour and the observed churn outcome
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomerRecord {
    /// Days since the last purchase
    pub recency: f64,
    /// Number of purchases
    pub frequency: u64,
    /// Total spend
    pub monetary: f64,
    pub churned: bool,
}

impl CustomerRecord {
    pub fn features(&self) -> CustomerFeatures {
        CustomerFeatures::from_record(self)
    }

    pub fn label(&self) -> usize {
        usize::from(self.churned)
    }
}

/// The three numeric inputs a churn scorer sees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomerFeatures {
    pub recency: f64,
    pub frequency: f64,
    pub monetary: f64,
}

impl CustomerFeatures {
    pub fn new(recency: f64, frequency: f64, monetary: f64) -> Self {
        Self {
            recency,
            frequency,
            monetary,
        }
    }

    pub fn from_record(record: &CustomerRecord) -> Self {
        Self::new(record.recency, record.frequency as f64, record.monetary)
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.recency, self.frequency, self.monetary]
    }
}

/// Load customer records from a CSV file
///
/// # Arguments
/// * `path` - CSV file with at least `Recency, Frequency, Monetary, Churned`
///
/// # Returns
/// * Records in file order. Extra columns are ignored; nothing is filtered.
pub fn load_customer_records(path: impl AsRef<Path>) -> crate::Result<Vec<CustomerRecord>> {
    let path = path.as_ref();

    let df = scan_csv(
        path,
        vec![
            col("Recency").cast(DataType::Float64),
            col("Frequency").cast(DataType::Float64),
            col("Monetary").cast(DataType::Float64),
            col(LABEL_COLUMN).cast(DataType::Float64),
        ],
    )?;

    // Frequency and the label go through f64 so fractional values are
    // rejected here instead of being truncated by the cast
    let recency = float_column(&df, "Recency", path)?;
    let frequency = float_column(&df, "Frequency", path)?;
    let monetary = float_column(&df, "Monetary", path)?;
    let churned = float_column(&df, LABEL_COLUMN, path)?;

    let mut records = Vec::with_capacity(recency.len());
    for (row, (((r, f), m), c)) in recency
        .into_iter()
        .zip(frequency)
        .zip(monetary)
        .zip(churned)
        .enumerate()
    {
        let frequency = purchase_count(f).ok_or_else(|| {
            ChurnError::data_load(
                path,
                format!("row {row}: Frequency must be a non-negative whole number, got {f}"),
            )
        })?;
        let churned = churn_flag(c).ok_or_else(|| {
            ChurnError::data_load(
                path,
                format!("row {row}: {LABEL_COLUMN} must be 0 or 1, got {c}"),
            )
        })?;

        records.push(CustomerRecord {
            recency: r,
            frequency,
            monetary: m,
            churned,
        });
    }

    tracing::debug!(path = %path.display(), rows = records.len(), "loaded customer records");
    Ok(records)
}

fn purchase_count(value: f64) -> Option<u64> {
    let whole = value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64;
    whole.then_some(value as u64)
}

/// `true`/`false` labels arrive here already cast to 1.0/0.0
fn churn_flag(value: f64) -> Option<bool> {
    if value == 0.0 {
        Some(false)
    } else if value == 1.0 {
        Some(true)
    } else {
        None
    }
}

/// Stack record features into an (n, 3) matrix
pub fn feature_matrix(records: &[CustomerRecord]) -> Array2<f64> {
    Array2::from_shape_fn((records.len(), FEATURE_COLUMNS.len()), |(i, j)| {
        records[i].features().as_array()[j]
    })
}

/// Churn labels as class indices (0 = retained, 1 = churned)
pub fn label_vector(records: &[CustomerRecord]) -> Array1<usize> {
    records.iter().map(CustomerRecord::label).collect()
}

/// Fraction of records labelled as churned; 0 for an empty slice
pub fn churn_rate(records: &[CustomerRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().filter(|r| r.churned).count() as f64 / records.len() as f64
}

/// Scan a CSV file and collect the given column expressions.
///
/// Column types are inferred from every row, so a decimal far down the file
/// cannot clash with an integer type guessed from its head.
/// Missing files, parse failures and absent columns all surface as `DataLoad`.
pub(crate) fn scan_csv(path: &Path, columns: Vec<Expr>) -> crate::Result<DataFrame> {
    if !path.is_file() {
        return Err(ChurnError::data_load(path, "file not found"));
    }

    LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(None)
        .finish()
        .and_then(|frame| frame.select(columns).collect())
        .map_err(|e| ChurnError::data_load(path, e))
}

pub(crate) fn float_column(df: &DataFrame, name: &str, path: &Path) -> crate::Result<Vec<f64>> {
    let values = df
        .column(name)
        .and_then(|series| series.f64())
        .map_err(|e| ChurnError::data_load(path, e))?;

    values
        .into_iter()
        .enumerate()
        .map(|(row, value)| value.ok_or_else(|| missing_value(path, name, row)))
        .collect()
}

pub(crate) fn int_column(df: &DataFrame, name: &str, path: &Path) -> crate::Result<Vec<i64>> {
    let values = df
        .column(name)
        .and_then(|series| series.i64())
        .map_err(|e| ChurnError::data_load(path, e))?;

    values
        .into_iter()
        .enumerate()
        .map(|(row, value)| value.ok_or_else(|| missing_value(path, name, row)))
        .collect()
}

pub(crate) fn str_column(df: &DataFrame, name: &str, path: &Path) -> crate::Result<Vec<String>> {
    let values = df
        .column(name)
        .and_then(|series| series.str())
        .map_err(|e| ChurnError::data_load(path, e))?;

    values
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value
                .map(str::to_string)
                .ok_or_else(|| missing_value(path, name, row))
        })
        .collect()
}

fn missing_value(path: &Path, column: &str, row: usize) -> ChurnError {
    ChurnError::data_load(path, format!("row {row}: missing or invalid value in {column}"))
}
