//! Stratified train/test partitioning

use crate::data::CustomerRecord;
use crate::error::ChurnError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Train and test partitions, each in a seed-determined shuffled order
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: Vec<CustomerRecord>,
    pub test: Vec<CustomerRecord>,
}

/// Partition records into train/test sets, stratified by the churn label.
///
/// Each class contributes `round(class_count * test_fraction)` rows to the
/// test set, so both partitions keep the class ratio of the input.
///
/// # Arguments
/// * `records` - Full labelled data set
/// * `test_fraction` - Share of rows to hold out, strictly between 0 and 1
/// * `seed` - RNG seed; the same seed always yields the same partitions
pub fn stratified_split(
    records: &[CustomerRecord],
    test_fraction: f64,
    seed: u64,
) -> crate::Result<TrainTestSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ChurnError::Config(format!(
            "test fraction must be between 0 and 1 (exclusive), got {test_fraction}"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(records.len());
    let mut test = Vec::new();

    for churned in [false, true] {
        let mut class: Vec<CustomerRecord> = records
            .iter()
            .filter(|r| r.churned == churned)
            .copied()
            .collect();
        class.shuffle(&mut rng);

        let n_test = (class.len() as f64 * test_fraction).round() as usize;
        let held_out = class.split_off(class.len() - n_test);
        test.extend(held_out);
        train.extend(class);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    tracing::debug!(
        train = train.len(),
        test = test.len(),
        seed,
        "stratified split complete"
    );

    Ok(TrainTestSplit { train, test })
}
