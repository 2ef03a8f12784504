//! Command-line interface definitions and argument parsing

use crate::dashboard::DashboardConfig;
use crate::data::CustomerFeatures;
use crate::pipeline::PipelineConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Customer churn prediction on RFM features
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train the model and write the model, evaluation plots and report
    Train(TrainArgs),
    /// Serve the prediction report dashboard
    Dashboard(DashboardArgs),
    /// Score a single customer with a saved model
    Predict(PredictArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Path to the input CSV file (Recency, Frequency, Monetary, Churned)
    #[arg(short, long, default_value = "data/rfm_churn_data.csv")]
    pub input: PathBuf,

    /// Directory for the report and evaluation plots
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Directory for the serialized model
    #[arg(short, long, default_value = "model")]
    pub model_dir: PathBuf,

    /// Seed for the split and the forest
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Share of customers held out for evaluation
    #[arg(long, default_value = "0.2")]
    pub test_fraction: f64,

    /// Number of trees in the forest
    #[arg(long, default_value = "100")]
    pub trees: usize,
}

impl TrainArgs {
    pub fn to_config(&self) -> PipelineConfig {
        PipelineConfig::new(&self.input, &self.output_dir, &self.model_dir)
            .with_seed(self.seed)
            .with_test_fraction(self.test_fraction)
            .with_trees(self.trees)
    }
}

#[derive(Args, Debug, Clone)]
pub struct DashboardArgs {
    /// Directory holding the training outputs
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Report CSV (defaults to <output-dir>/model_predictions.csv)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Confusion matrix image (defaults to <output-dir>/confusion_matrix.png)
    #[arg(long)]
    pub confusion_matrix: Option<PathBuf>,

    /// ROC curve image (defaults to <output-dir>/roc_curve.png)
    #[arg(long)]
    pub roc_curve: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8501")]
    pub port: u16,
}

impl DashboardArgs {
    pub fn to_config(&self) -> DashboardConfig {
        let defaults = DashboardConfig::from_output_dir(&self.output_dir);
        DashboardConfig {
            report_path: self.report.clone().unwrap_or(defaults.report_path),
            confusion_matrix_path: self
                .confusion_matrix
                .clone()
                .unwrap_or(defaults.confusion_matrix_path),
            roc_curve_path: self.roc_curve.clone().unwrap_or(defaults.roc_curve_path),
            host: self.host.clone(),
            port: self.port,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// Serialized model written by `train`
    #[arg(short, long, default_value = "model/random_forest_churn.model")]
    pub model: PathBuf,

    /// RFM values as comma-separated string
    /// Example: --rfm "30,10,500.0" for Recency=30, Frequency=10, Monetary=500.0
    #[arg(short, long)]
    pub rfm: String,
}

impl PredictArgs {
    /// Parse RFM values from the rfm string
    /// Expected format: "recency,frequency,monetary"
    pub fn parse_rfm_values(&self) -> anyhow::Result<CustomerFeatures> {
        let parts: Vec<&str> = self.rfm.split(',').collect();
        if parts.len() != 3 {
            anyhow::bail!("RFM values must be in format 'recency,frequency,monetary'");
        }

        let recency: f64 = parts[0]
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid recency value: {}", parts[0]))?;
        let frequency: f64 = parts[1]
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid frequency value: {}", parts[1]))?;
        let monetary: f64 = parts[2]
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid monetary value: {}", parts[2]))?;

        Ok(CustomerFeatures::new(recency, frequency, monetary))
    }
}
