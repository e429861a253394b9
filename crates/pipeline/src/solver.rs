//! [`FactorizationSolver`] backed by the `als-solver` crate.

use crate::error::Result;
use crate::trainer::{FactorTables, FactorizationSolver, LabeledRating, SolverParams};
use als_solver::{AlsParams, AlsSolver, RatingTriple};

/// Alternating least squares, built fresh for each call from [`SolverParams`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AlsBackend;

impl AlsBackend {
    fn als_params(params: &SolverParams) -> AlsParams {
        let base = AlsParams::default()
            .with_rank(params.rank)
            .with_max_iterations(params.max_iterations)
            .with_regularization(params.regularization)
            .with_nonnegative(params.nonnegative)
            .with_seed(params.seed);
        match (params.implicit, params.alpha) {
            (true, Some(alpha)) => base.implicit(alpha),
            (true, None) => base.implicit(AlsParams::default().alpha),
            (false, _) => base,
        }
    }
}

impl FactorizationSolver for AlsBackend {
    fn name(&self) -> &str {
        "als"
    }

    fn factorize(&self, table: &[LabeledRating], params: &SolverParams) -> Result<FactorTables> {
        let triples: Vec<RatingTriple> = table
            .iter()
            .map(|r| RatingTriple::new(r.user, r.item, r.rating))
            .collect();

        let factors = AlsSolver::new(Self::als_params(params)).solve(&triples)?;
        Ok(FactorTables {
            user_factors: factors.user_factors,
            item_factors: factors.item_factors,
        })
    }
}
