//! ChurnForge: churn prediction and retention segmentation on RFM features
//!
//! This is the main entrypoint that dispatches to training, the dashboard
//! server, or single-customer prediction.

use anyhow::{Context, Result};
use churnforge::cli::{DashboardArgs, PredictArgs, TrainArgs};
use churnforge::{dashboard, run_pipeline, ChurnScorer, Cli, Command, RandomForest, Segment};
use clap::Parser;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::Train(args) => run_training(args, cli.verbose),
        Command::Dashboard(args) => run_dashboard(args),
        Command::Predict(args) => run_prediction_mode(args),
    }
}

/// `RUST_LOG` wins; otherwise `-v` switches from info to debug
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "churnforge=debug,tower_http=debug"
    } else {
        "churnforge=info,tower_http=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .ok();
}

/// Run the full training pipeline
fn run_training(args: &TrainArgs, verbose: bool) -> Result<()> {
    println!("=== Churn Model Training ===\n");

    let config = args.to_config();
    if verbose {
        println!("Input file: {}", config.input_path.display());
        println!("Test fraction: {}", config.test_fraction);
        println!("Seed: {}", config.seed);
        println!("Trees: {}\n", config.n_trees);
    }

    let start_time = Instant::now();
    let summary = run_pipeline(&config).context("training pipeline failed")?;

    println!(
        "✓ Data loaded: {} customers ({:.1}% churned)",
        summary.n_records,
        summary.churn_rate * 100.0
    );
    println!(
        "✓ Split: {} train / {} test (stratified)",
        summary.n_train, summary.n_test
    );
    println!("✓ Model saved to {}", config.model_path.display());
    if verbose {
        println!("  Loading time: {:.2}s", summary.timings.load.as_secs_f64());
        println!("  Fitting time: {:.2}s", summary.timings.fit.as_secs_f64());
        println!("  Evaluation time: {:.2}s", summary.timings.evaluate.as_secs_f64());
    }

    println!("\nClassification Report:\n{}", summary.classification);
    println!("ROC AUC Score: {:.4}", summary.auc());

    println!("\n=== Risk Segments ===");
    for (segment, count) in &summary.segment_counts {
        let percentage = (*count as f64 / summary.n_test as f64) * 100.0;
        println!(
            "{}: {} customers ({:.1}%) -> {}",
            segment,
            count,
            percentage,
            segment.suggested_action()
        );
    }

    let total_time = start_time.elapsed();
    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", total_time.as_secs_f64());
    println!("Confusion matrix saved to: {}", config.confusion_matrix_path.display());
    println!("ROC curve saved to: {}", config.roc_curve_path.display());
    println!("Prediction report saved to: {}", config.report_path.display());

    Ok(())
}

/// Serve the dashboard until interrupted
fn run_dashboard(args: &DashboardArgs) -> Result<()> {
    let config = args.to_config();
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(dashboard::serve(config))
}

/// Run prediction mode for a single customer
fn run_prediction_mode(args: &PredictArgs) -> Result<()> {
    println!("=== Prediction Mode ===");
    let features = args.parse_rfm_values()?;
    println!(
        "Input RFM values: R={}, F={}, M={}",
        features.recency, features.frequency, features.monetary
    );

    let model = RandomForest::load(&args.model)
        .with_context(|| format!("failed to load model from {}", args.model.display()))?;

    let probability = model.predict_probability(&features);
    let segment = Segment::from_probability(churnforge::report::round_probability(probability));

    println!("\n✓ Churn probability: {:.2}", probability);
    println!("  Predicted label: {}", model.predict_label(&features));
    println!("  Segment: {}", segment);
    println!("  Suggested action: {}", segment.suggested_action());
    println!(
        "  Model: {} trees, trained {}",
        model.n_trees(),
        model.trained_at().format("%Y-%m-%d %H:%M UTC")
    );

    Ok(())
}
