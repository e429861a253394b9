//! Factor-model training.
//!
//! The crate does not factorize anything itself. [`FactorizationSolver`] is
//! the seam to an external solver: it receives a labeled table of
//! (user, item, rating) plus hyperparameters and returns one factor vector
//! per user and item. [`FactorModelTrainer`] chooses the rating column for a
//! [`FeedbackMode`], calls the solver and checks what comes back.
//!
//! The solver is the only stage allowed to be non-deterministic.

use crate::encode::RatingRecord;
use crate::error::{PipelineError, Result};
use crate::identity::{ItemIndex, UserIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{info, instrument};

/// Which rating signal a model is trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackMode {
    /// Quantile-bucketed counts, fitted by least squares
    Explicit,
    /// Log-scaled counts, fitted as confidence-weighted preferences
    Implicit,
}

impl FeedbackMode {
    pub const ALL: [FeedbackMode; 2] = [FeedbackMode::Explicit, FeedbackMode::Implicit];
}

impl fmt::Display for FeedbackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackMode::Explicit => write!(f, "explicit"),
            FeedbackMode::Implicit => write!(f, "implicit"),
        }
    }
}

/// One row of the table handed to a solver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledRating {
    pub user: UserIndex,
    pub item: ItemIndex,
    pub rating: f32,
}

/// Hyperparameters as a solver sees them
#[derive(Debug, Clone, PartialEq)]
pub struct SolverParams {
    pub rank: usize,
    pub max_iterations: usize,
    pub regularization: f64,
    pub nonnegative: bool,
    pub implicit: bool,
    /// Only set for implicit feedback
    pub alpha: Option<f64>,
    pub seed: u64,
}

/// Factor tables returned by a solver, keyed by index
#[derive(Debug, Clone, Default)]
pub struct FactorTables {
    pub user_factors: Vec<(UserIndex, Vec<f32>)>,
    pub item_factors: Vec<(ItemIndex, Vec<f32>)>,
}

/// An external matrix-factorization solver
///
/// `Send + Sync` so one solver can back several concurrent runs.
pub trait FactorizationSolver: Send + Sync {
    /// Returns the name of this solver (for logging)
    fn name(&self) -> &str;

    fn factorize(&self, table: &[LabeledRating], params: &SolverParams) -> Result<FactorTables>;
}

/// Training hyperparameters shared by both modes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub rank: usize,
    pub max_iterations: usize,
    pub regularization: f64,
    /// Confidence slope, only passed to the solver in implicit mode
    pub alpha: f64,
    pub nonnegative: bool,
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            rank: 10,
            max_iterations: 10,
            regularization: 0.1,
            alpha: 1.0,
            nonnegative: false,
            seed: 42,
        }
    }
}

impl TrainerConfig {
    fn solver_params(&self, mode: FeedbackMode) -> SolverParams {
        let implicit = mode == FeedbackMode::Implicit;
        SolverParams {
            rank: self.rank,
            max_iterations: self.max_iterations,
            regularization: self.regularization,
            nonnegative: self.nonnegative,
            implicit,
            alpha: implicit.then_some(self.alpha),
            seed: self.seed,
        }
    }
}

/// Trained user and item factors for one feedback mode
///
/// Immutable once built; only the trainer constructs one.
#[derive(Debug, Clone)]
pub struct FactorModel {
    mode: FeedbackMode,
    rank: usize,
    user_factors: BTreeMap<UserIndex, Vec<f32>>,
    item_factors: BTreeMap<ItemIndex, Vec<f32>>,
}

impl FactorModel {
    pub fn mode(&self) -> FeedbackMode {
        self.mode
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn user_vector(&self, user: UserIndex) -> Option<&[f32]> {
        self.user_factors.get(&user).map(Vec::as_slice)
    }

    pub fn item_vector(&self, item: ItemIndex) -> Option<&[f32]> {
        self.item_factors.get(&item).map(Vec::as_slice)
    }

    /// Users with a factor vector, ascending
    pub fn users(&self) -> impl Iterator<Item = UserIndex> + '_ {
        self.user_factors.keys().copied()
    }

    /// Item vectors in ascending item order
    pub fn items(&self) -> impl Iterator<Item = (ItemIndex, &[f32])> + '_ {
        self.item_factors.iter().map(|(&i, v)| (i, v.as_slice()))
    }

    pub fn num_users(&self) -> usize {
        self.user_factors.len()
    }

    pub fn num_items(&self) -> usize {
        self.item_factors.len()
    }
}

/// Adapter between rating records and a [`FactorizationSolver`]
pub struct FactorModelTrainer<S> {
    solver: S,
}

impl<S: FactorizationSolver> FactorModelTrainer<S> {
    pub fn new(solver: S) -> Self {
        Self { solver }
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Train a model on `training` using the rating column for `mode`
    #[instrument(
        skip(self, training, config),
        fields(solver = self.solver.name(), records = training.len())
    )]
    pub fn train(
        &self,
        training: &[RatingRecord],
        mode: FeedbackMode,
        config: &TrainerConfig,
    ) -> Result<FactorModel> {
        if training.is_empty() {
            return Err(PipelineError::Training(format!(
                "no training records for the {mode} model"
            )));
        }

        let table: Vec<LabeledRating> = training
            .iter()
            .map(|r| LabeledRating {
                user: r.user,
                item: r.item,
                rating: r.rating(mode),
            })
            .collect();

        let params = config.solver_params(mode);
        let tables = self.solver.factorize(&table, &params)?;

        let users: BTreeSet<UserIndex> = training.iter().map(|r| r.user).collect();
        let items: BTreeSet<ItemIndex> = training.iter().map(|r| r.item).collect();
        let user_factors = check_factors("user", tables.user_factors, &users, config.rank)?;
        let item_factors = check_factors("item", tables.item_factors, &items, config.rank)?;

        info!(
            %mode,
            users = user_factors.len(),
            items = item_factors.len(),
            "Trained factor model"
        );

        Ok(FactorModel {
            mode,
            rank: config.rank,
            user_factors,
            item_factors,
        })
    }
}

/// Solver output must cover exactly the trained indices with `rank`-length vectors
fn check_factors(
    side: &str,
    factors: Vec<(u32, Vec<f32>)>,
    expected: &BTreeSet<u32>,
    rank: usize,
) -> Result<BTreeMap<u32, Vec<f32>>> {
    let mut table = BTreeMap::new();
    for (index, vector) in factors {
        if !expected.contains(&index) {
            return Err(PipelineError::Training(format!(
                "solver returned a factor for {side} {index} which is not in the training set"
            )));
        }
        if vector.len() != rank {
            return Err(PipelineError::Training(format!(
                "{side} {index} has a factor of length {} (rank is {rank})",
                vector.len()
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::Training(format!(
                "{side} {index} has a non-finite factor"
            )));
        }
        if table.insert(index, vector).is_some() {
            return Err(PipelineError::Training(format!(
                "solver returned two factors for {side} {index}"
            )));
        }
    }

    if let Some(missing) = expected.iter().find(|i| !table.contains_key(i)) {
        return Err(PipelineError::Training(format!(
            "solver returned no factor for {side} {missing}"
        )));
    }
    Ok(table)
}
