//! Hit-rate scoring of held-out interactions.
//!
//! A testing record is a hit when its item appears anywhere in its user's
//! top-N list. Records of users with no list (cold start, absent from
//! training) are left out of both numerator and denominator.

use crate::encode::RatingRecord;
use crate::error::{PipelineError, Result};
use crate::prediction::PredictionMatrix;
use crate::recommend::TopNRecommendations;
use crate::trainer::{FactorModel, FeedbackMode};
use serde::Serialize;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationResult {
    /// `100 * hits / considered`, in `[0, 100]`
    pub accuracy: f64,
    pub hits: usize,
    /// Testing records whose user has a top-N list
    pub considered: usize,
    /// Testing records skipped because their user has no list
    pub excluded_cold_start: usize,
}

pub struct Evaluator;

impl Evaluator {
    #[instrument(skip_all, fields(testing = testing.len(), users = top_n.len()))]
    pub fn evaluate(
        testing: &[RatingRecord],
        top_n: &TopNRecommendations,
    ) -> Result<EvaluationResult> {
        let mut hits = 0;
        let mut considered = 0;
        for record in testing.iter().filter(|r| top_n.contains_user(r.user)) {
            considered += 1;
            if top_n.contains(record.user, record.item) {
                hits += 1;
            }
        }

        if considered == 0 {
            return Err(PipelineError::Config(format!(
                "none of the {} testing records belong to a user with recommendations",
                testing.len()
            )));
        }

        let result = EvaluationResult {
            accuracy: 100.0 * hits as f64 / considered as f64,
            hits,
            considered,
            excluded_cold_start: testing.len() - considered,
        };
        debug!(?result, "Evaluated top-{} hit rate", top_n.n());
        Ok(result)
    }
}

/// Root mean squared error of predicted scores against the mode's rating
///
/// Only records whose user and item both have factors count. `None` when
/// there are none.
pub fn rmse(testing: &[RatingRecord], model: &FactorModel, mode: FeedbackMode) -> Option<f64> {
    let matrix = PredictionMatrix::build(model);
    let (sum, n) = testing
        .iter()
        .filter_map(|r| {
            let predicted = matrix.score(r.user, r.item)? as f64;
            Some((predicted - r.rating(mode) as f64).powi(2))
        })
        .fold((0.0, 0usize), |(sum, n), err| (sum + err, n + 1));

    (n > 0).then(|| (sum / n as f64).sqrt())
}
