//! Seeded train/test split.
//!
//! Each record draws one uniform number from a `StdRng` seeded with the run's
//! seed and goes to training when the draw is below the training ratio. The
//! same seed over the same input order always gives the same split.

use crate::encode::RatingRecord;
use crate::error::{PipelineError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const RATIO_EPSILON: f64 = 1e-6;

/// Expected share of records in each subset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    pub training: f64,
    pub testing: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            training: 0.8,
            testing: 0.2,
        }
    }
}

impl SplitRatios {
    pub fn new(training: f64, testing: f64) -> Self {
        Self { training, testing }
    }

    /// Ratios with `testing = 1 - training`
    pub fn from_train_ratio(training: f64) -> Self {
        Self::new(training, 1.0 - training)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("training", self.training), ("testing", self.testing)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::Config(format!(
                    "{name} ratio must be within [0, 1], got {value}"
                )));
            }
        }
        let sum = self.training + self.testing;
        if (sum - 1.0).abs() > RATIO_EPSILON {
            return Err(PipelineError::Config(format!(
                "split ratios must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Disjoint training and testing subsets
#[derive(Debug, Clone, Default, Serialize)]
pub struct Partition {
    pub training: Vec<RatingRecord>,
    pub testing: Vec<RatingRecord>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.training.len() + self.testing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct DatasetPartitioner;

impl DatasetPartitioner {
    #[instrument(skip(records), fields(records = records.len()))]
    pub fn partition(
        records: &[RatingRecord],
        ratios: SplitRatios,
        seed: u64,
    ) -> Result<Partition> {
        ratios.validate()?;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut partition = Partition::default();
        for record in records {
            if rng.random::<f64>() < ratios.training {
                partition.training.push(*record);
            } else {
                partition.testing.push(*record);
            }
        }

        debug!(
            training = partition.training.len(),
            testing = partition.testing.len(),
            "Partitioned records"
        );
        Ok(partition)
    }
}
