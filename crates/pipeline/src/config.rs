//! Pipeline configuration.
//!
//! Every field has a default, and a JSON file may name any subset of them:
//!
//! ```json
//! { "top_n": 10, "rank": 20, "implicit_alpha": 40.0 }
//! ```

use crate::error::{PipelineError, Result};
use crate::partition::SplitRatios;
use crate::trainer::TrainerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Pairs seen this many times or fewer are dropped
    pub min_interaction_count: u32,
    pub num_rating_buckets: usize,
    /// Share of records used for training; the rest are held out
    pub train_ratio: f64,
    pub top_n: usize,
    pub rank: usize,
    pub max_iterations: usize,
    pub regularization_parameter: f64,
    pub implicit_alpha: f64,
    pub nonnegative: bool,
    /// Seeds both the partition and the solver
    pub random_seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_interaction_count: 5,
            num_rating_buckets: 5,
            train_ratio: 0.8,
            top_n: 5,
            rank: 10,
            max_iterations: 10,
            regularization_parameter: 0.1,
            implicit_alpha: 1.0,
            nonnegative: false,
            random_seed: 42,
        }
    }
}

impl PipelineConfig {
    /// Load a (possibly partial) configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json_str(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn with_min_interaction_count(mut self, count: u32) -> Self {
        self.min_interaction_count = count;
        self
    }

    pub fn with_num_rating_buckets(mut self, buckets: usize) -> Self {
        self.num_rating_buckets = buckets;
        self
    }

    pub fn with_train_ratio(mut self, ratio: f64) -> Self {
        self.train_ratio = ratio;
        self
    }

    pub fn with_top_n(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }

    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn with_regularization_parameter(mut self, lambda: f64) -> Self {
        self.regularization_parameter = lambda;
        self
    }

    pub fn with_implicit_alpha(mut self, alpha: f64) -> Self {
        self.implicit_alpha = alpha;
        self
    }

    pub fn with_nonnegative(mut self, nonnegative: bool) -> Self {
        self.nonnegative = nonnegative;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn split_ratios(&self) -> SplitRatios {
        SplitRatios::from_train_ratio(self.train_ratio)
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            rank: self.rank,
            max_iterations: self.max_iterations,
            regularization: self.regularization_parameter,
            alpha: self.implicit_alpha,
            nonnegative: self.nonnegative,
            seed: self.random_seed,
        }
    }

    /// Reject settings no stage can run with
    ///
    /// A zero bucket count is reported by the rating encoder instead.
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(PipelineError::Config("top_n must be positive".to_string()));
        }
        if self.rank == 0 {
            return Err(PipelineError::Config("rank must be positive".to_string()));
        }
        if self.max_iterations == 0 {
            return Err(PipelineError::Config(
                "max_iterations must be positive".to_string(),
            ));
        }
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(PipelineError::Config(format!(
                "train_ratio must be strictly between 0 and 1, got {}",
                self.train_ratio
            )));
        }
        for (name, value) in [
            ("regularization_parameter", self.regularization_parameter),
            ("implicit_alpha", self.implicit_alpha),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::Config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}
