//! Churn classifier made of bagged linfa decision trees

use crate::data::{feature_matrix, label_vector, CustomerFeatures, CustomerRecord};
use crate::error::ChurnError;
use chrono::{DateTime, Utc};
use linfa::prelude::*;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Probability at or above which a customer is labelled as churning
pub const DECISION_THRESHOLD: f64 = 0.5;

const MODEL_FORMAT_VERSION: u32 = 1;

/// Anything that can turn RFM features into a churn probability.
///
/// Downstream evaluation and reporting only depend on this trait, so the
/// learner behind it can be swapped freely.
pub trait ChurnScorer {
    /// Probability in [0, 1] that the customer churns
    fn predict_probability(&self, features: &CustomerFeatures) -> f64;

    /// Score a batch of customers, preserving input order
    fn predict_probabilities(&self, batch: &[CustomerFeatures]) -> Vec<f64> {
        batch.iter().map(|f| self.predict_probability(f)).collect()
    }

    /// Hard 0/1 decision at [`DECISION_THRESHOLD`]
    fn predict_label(&self, features: &CustomerFeatures) -> usize {
        label_for(self.predict_probability(features))
    }
}

/// Apply the decision threshold to a probability
pub fn label_for(probability: f64) -> usize {
    usize::from(probability >= DECISION_THRESHOLD)
}

/// Training parameters for [`RandomForest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of bootstrapped trees
    pub n_trees: usize,
    /// Depth limit per tree; `None` grows until leaves are pure
    pub max_depth: Option<usize>,
    /// Seed for bootstrap sampling
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            seed: 42,
        }
    }
}

/// Bagged ensemble of CART trees.
///
/// Each tree is fitted on its own bootstrap sample and may split on every
/// feature; linfa-trees has no per-split feature sampling.
#[derive(Debug, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    trained_at: DateTime<Utc>,
    trees: Vec<DecisionTree<f64, usize>>,
}

/// On-disk wrapper so incompatible model files are rejected on load
#[derive(Serialize, Deserialize)]
struct ModelEnvelope<M> {
    format_version: u32,
    model: M,
}

impl RandomForest {
    /// Fit the forest on labelled records
    ///
    /// # Arguments
    /// * `records` - Training partition
    /// * `params` - Ensemble size, depth limit and seed
    ///
    /// # Returns
    /// * A fitted forest; identical inputs and seed give identical trees
    pub fn fit(records: &[CustomerRecord], params: &ForestParams) -> crate::Result<Self> {
        if params.n_trees == 0 {
            return Err(ChurnError::Config(
                "random forest needs at least one tree".to_string(),
            ));
        }
        if records.is_empty() {
            return Err(ChurnError::Training(
                "cannot fit a model on an empty training set".to_string(),
            ));
        }

        let features = feature_matrix(records);
        let labels = label_vector(records);
        let n_samples = records.len();
        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees {
            let sample: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
            let dataset = Dataset::new(
                features.select(Axis(0), &sample),
                labels.select(Axis(0), &sample),
            );

            let tree = DecisionTree::params()
                .max_depth(params.max_depth)
                .fit(&dataset)
                .map_err(|e| ChurnError::Training(e.to_string()))?;
            trees.push(tree);
        }

        tracing::debug!(
            trees = trees.len(),
            samples = n_samples,
            "random forest fitted"
        );

        Ok(Self {
            params: params.clone(),
            trained_at: Utc::now(),
            trees,
        })
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Fraction of trees voting "churned" for every row of an (n, 3) matrix
    pub fn predict_matrix(&self, features: &Array2<f64>) -> Array1<f64> {
        let mut votes = Array1::<f64>::zeros(features.nrows());
        for tree in &self.trees {
            let predicted: Array1<usize> = tree.predict(features);
            votes
                .iter_mut()
                .zip(predicted.iter())
                .for_each(|(v, &label)| *v += label as f64);
        }
        votes / self.trees.len() as f64
    }

    /// Serialize the model to `path`, creating parent directories.
    ///
    /// The file handle lives only for the duration of this call and is
    /// closed whether or not serialization succeeds.
    pub fn persist(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ChurnError::persist(path, e))?;
        }

        let file = File::create(path).map_err(|e| ChurnError::persist(path, e))?;
        let mut writer = BufWriter::new(file);
        let envelope = ModelEnvelope {
            format_version: MODEL_FORMAT_VERSION,
            model: self,
        };
        serde_json::to_writer(&mut writer, &envelope).map_err(|e| ChurnError::persist(path, e))?;
        writer.flush().map_err(|e| ChurnError::persist(path, e))?;

        tracing::info!(path = %path.display(), "model persisted");
        Ok(())
    }

    /// Read a model written by [`RandomForest::persist`]
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ChurnError::persist(path, e))?;
        let envelope: ModelEnvelope<RandomForest> =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| ChurnError::persist(path, e))?;

        if envelope.format_version != MODEL_FORMAT_VERSION {
            return Err(ChurnError::persist(
                path,
                format!(
                    "unsupported model format version {} (expected {})",
                    envelope.format_version, MODEL_FORMAT_VERSION
                ),
            ));
        }
        if envelope.model.trees.is_empty() {
            return Err(ChurnError::persist(path, "model contains no trees"));
        }

        Ok(envelope.model)
    }
}

impl ChurnScorer for RandomForest {
    fn predict_probability(&self, features: &CustomerFeatures) -> f64 {
        let row = Array2::from_shape_fn((1, 3), |(_, j)| features.as_array()[j]);
        self.predict_matrix(&row)[0]
    }

    fn predict_probabilities(&self, batch: &[CustomerFeatures]) -> Vec<f64> {
        if batch.is_empty() {
            return Vec::new();
        }
        let matrix = Array2::from_shape_fn((batch.len(), 3), |(i, j)| batch[i].as_array()[j]);
        self.predict_matrix(&matrix).to_vec()
    }
}
