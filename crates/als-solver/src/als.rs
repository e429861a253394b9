//! Alternating least squares for explicit and implicit feedback.
//!
//! ## Algorithm
//! Holding one factor matrix fixed, every row of the other has a closed-form
//! least-squares solution. The solver alternates users then items for
//! `max_iterations` sweeps.
//!
//! - Explicit: each user row solves
//!   `(Σ y yᵀ + λ·n_u·I) x = Σ r·y` over the items the user rated.
//! - Implicit: every pair is observed with preference `p` (1 if rated, else 0)
//!   and confidence `c = 1 + α·|r|` (1 if unrated), giving
//!   `(YᵀY + Σ (c − 1) y yᵀ + λ·n_u·I) x = Σ c·p·y`. `YᵀY` is computed once per
//!   sweep, so unrated pairs cost nothing.
//!
//! Rows are independent within a sweep and are solved in parallel; results
//! are collected in row order, so a fixed seed gives a fixed factorization.

use crate::error::{Result, Side, SolverError};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Dense integer identifier of a user or item
pub type Index = u32;

/// One observed (user, item, rating) cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingTriple {
    pub user: Index,
    pub item: Index,
    pub rating: f32,
}

impl RatingTriple {
    pub fn new(user: Index, item: Index, rating: f32) -> Self {
        Self { user, item, rating }
    }
}

/// ALS hyperparameters
#[derive(Debug, Clone, PartialEq)]
pub struct AlsParams {
    /// Number of latent factors
    pub rank: usize,
    /// Number of user+item sweeps
    pub max_iterations: usize,
    /// λ, scaled per row by its number of ratings
    pub regularization: f64,
    /// Solve the implicit-feedback objective instead of plain least squares
    pub implicit: bool,
    /// Confidence slope, only read in implicit mode
    pub alpha: f64,
    /// Clamp every solved vector to be non-negative
    pub nonnegative: bool,
    /// Seed for the initial factors
    pub seed: u64,
}

impl Default for AlsParams {
    fn default() -> Self {
        Self {
            rank: 10,
            max_iterations: 10,
            regularization: 0.1,
            implicit: false,
            alpha: 1.0,
            nonnegative: false,
            seed: 42,
        }
    }
}

impl AlsParams {
    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_regularization(mut self, regularization: f64) -> Self {
        self.regularization = regularization;
        self
    }

    /// Switch to implicit feedback with the given confidence slope
    pub fn implicit(mut self, alpha: f64) -> Self {
        self.implicit = true;
        self.alpha = alpha;
        self
    }

    pub fn with_nonnegative(mut self, nonnegative: bool) -> Self {
        self.nonnegative = nonnegative;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.rank == 0 {
            return Err(SolverError::InvalidParameter("rank must be positive".to_string()));
        }
        if self.max_iterations == 0 {
            return Err(SolverError::InvalidParameter(
                "max_iterations must be positive".to_string(),
            ));
        }
        if !self.regularization.is_finite() || self.regularization < 0.0 {
            return Err(SolverError::InvalidParameter(format!(
                "regularization must be a non-negative number, got {}",
                self.regularization
            )));
        }
        if self.implicit && (!self.alpha.is_finite() || self.alpha < 0.0) {
            return Err(SolverError::InvalidParameter(format!(
                "alpha must be a non-negative number, got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// Output of a factorization: one vector of length `rank` per id
#[derive(Debug, Clone)]
pub struct AlsFactors {
    pub rank: usize,
    /// Sorted by user id
    pub user_factors: Vec<(Index, Vec<f32>)>,
    /// Sorted by item id
    pub item_factors: Vec<(Index, Vec<f32>)>,
    pub iterations: usize,
    /// Mean objective over observed cells after the last sweep
    pub final_loss: f64,
}

/// One side of the rating matrix in row-major sparse form
struct Axis {
    ids: Vec<Index>,
    /// Per row: (position on the other axis, rating)
    rows: Vec<Vec<(usize, f64)>>,
}

impl Axis {
    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Alternating least squares solver
#[derive(Debug, Clone)]
pub struct AlsSolver {
    params: AlsParams,
}

impl AlsSolver {
    pub fn new(params: AlsParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &AlsParams {
        &self.params
    }

    /// Factorize the given ratings
    #[instrument(
        skip(self, ratings),
        fields(ratings = ratings.len(), implicit = self.params.implicit)
    )]
    pub fn solve(&self, ratings: &[RatingTriple]) -> Result<AlsFactors> {
        self.params.validate()?;
        if ratings.is_empty() {
            return Err(SolverError::EmptyInput);
        }
        if let Some(bad) = ratings.iter().find(|r| !r.rating.is_finite()) {
            return Err(SolverError::InvalidParameter(format!(
                "rating for user {} item {} is not finite",
                bad.user, bad.item
            )));
        }

        let (users, items) = build_axes(ratings);
        let k = self.params.rank;

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut user_factors = random_init(users.len(), k, &mut rng);
        let mut item_factors = random_init(items.len(), k, &mut rng);

        let mut loss = f64::NAN;
        for iteration in 0..self.params.max_iterations {
            user_factors = self.solve_side(&users, &item_factors, Side::User)?;
            item_factors = self.solve_side(&items, &user_factors, Side::Item)?;

            loss = self.loss(&users, &user_factors, &items, &item_factors);
            if !loss.is_finite() {
                return Err(SolverError::Diverged { iteration, loss });
            }
            debug!(iteration, loss, "ALS sweep complete");
        }

        info!(
            users = users.len(),
            items = items.len(),
            loss,
            "ALS finished after {} iterations",
            self.params.max_iterations
        );

        Ok(AlsFactors {
            rank: k,
            user_factors: export(&users.ids, &user_factors),
            item_factors: export(&items.ids, &item_factors),
            iterations: self.params.max_iterations,
            final_loss: loss,
        })
    }

    /// Re-solve every row of `axis` against the fixed factors of the other side
    fn solve_side(&self, axis: &Axis, fixed: &Array2<f64>, side: Side) -> Result<Array2<f64>> {
        let k = self.params.rank;
        let implicit = self.params.implicit;
        let alpha = self.params.alpha;
        let lambda = self.params.regularization;
        let nonnegative = self.params.nonnegative;

        let gram = implicit.then(|| fixed.t().dot(fixed));

        let solved: Vec<Array1<f64>> = axis
            .rows
            .par_iter()
            .enumerate()
            .map(|(row, entries)| {
                let mut a = match &gram {
                    Some(g) => g.clone(),
                    None => Array2::zeros((k, k)),
                };
                let mut b = Array1::<f64>::zeros(k);

                for &(other, rating) in entries {
                    let y = fixed.row(other);
                    let (weight, target) = if implicit {
                        let confidence = 1.0 + alpha * rating.abs();
                        let preference = if rating > 0.0 { 1.0 } else { 0.0 };
                        (confidence - 1.0, confidence * preference)
                    } else {
                        (1.0, rating)
                    };

                    for i in 0..k {
                        let yi = y[i];
                        for j in 0..k {
                            a[[i, j]] += weight * yi * y[j];
                        }
                        b[i] += target * yi;
                    }
                }

                let reg = lambda * entries.len() as f64;
                for i in 0..k {
                    a[[i, i]] += reg;
                }

                let mut x = cholesky_solve(&a, &b).ok_or(SolverError::NotPositiveDefinite {
                    side,
                    row: axis.ids[row],
                })?;
                if nonnegative {
                    x.mapv_inplace(|v| v.max(0.0));
                }
                Ok(x)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut out = Array2::<f64>::zeros((axis.len(), k));
        for (i, x) in solved.iter().enumerate() {
            out.row_mut(i).assign(x);
        }
        Ok(out)
    }

    /// Mean regularized objective over the observed cells
    ///
    /// In implicit mode the unobserved cells are left out; this is a
    /// divergence check, not the exact objective.
    fn loss(
        &self,
        users: &Axis,
        user_factors: &Array2<f64>,
        items: &Axis,
        item_factors: &Array2<f64>,
    ) -> f64 {
        let lambda = self.params.regularization;
        let mut error = 0.0;
        let mut observed = 0usize;

        for (u, entries) in users.rows.iter().enumerate() {
            let user_vec = user_factors.row(u);
            for &(i, rating) in entries {
                let score = user_vec.dot(&item_factors.row(i));
                if self.params.implicit {
                    let confidence = 1.0 + self.params.alpha * rating.abs();
                    let preference = if rating > 0.0 { 1.0 } else { 0.0 };
                    error += confidence * (preference - score).powi(2);
                } else {
                    error += (rating - score).powi(2);
                }
                observed += 1;
            }
        }

        let mut penalty = 0.0;
        for (u, entries) in users.rows.iter().enumerate() {
            let v = user_factors.row(u);
            penalty += entries.len() as f64 * v.dot(&v);
        }
        for (i, entries) in items.rows.iter().enumerate() {
            let v = item_factors.row(i);
            penalty += entries.len() as f64 * v.dot(&v);
        }

        (error + lambda * penalty) / observed.max(1) as f64
    }
}

fn build_axes(ratings: &[RatingTriple]) -> (Axis, Axis) {
    let mut user_ids: Vec<Index> = ratings.iter().map(|r| r.user).collect();
    user_ids.sort_unstable();
    user_ids.dedup();

    let mut item_ids: Vec<Index> = ratings.iter().map(|r| r.item).collect();
    item_ids.sort_unstable();
    item_ids.dedup();

    let user_pos: HashMap<Index, usize> =
        user_ids.iter().enumerate().map(|(p, &id)| (id, p)).collect();
    let item_pos: HashMap<Index, usize> =
        item_ids.iter().enumerate().map(|(p, &id)| (id, p)).collect();

    let mut by_user = vec![Vec::new(); user_ids.len()];
    let mut by_item = vec![Vec::new(); item_ids.len()];
    for r in ratings {
        let u = user_pos[&r.user];
        let i = item_pos[&r.item];
        by_user[u].push((i, r.rating as f64));
        by_item[i].push((u, r.rating as f64));
    }

    (
        Axis { ids: user_ids, rows: by_user },
        Axis { ids: item_ids, rows: by_item },
    )
}

fn random_init(rows: usize, rank: usize, rng: &mut StdRng) -> Array2<f64> {
    let scale = 1.0 / (rank as f64).sqrt();
    Array2::from_shape_fn((rows, rank), |_| rng.random::<f64>() * scale)
}

fn export(ids: &[Index], factors: &Array2<f64>) -> Vec<(Index, Vec<f32>)> {
    ids.iter()
        .zip(factors.rows())
        .map(|(&id, row)| (id, row.iter().map(|&v| v as f32).collect()))
        .collect()
}

/// Solve `A x = b` for symmetric positive definite `A` via Cholesky
///
/// Returns `None` when `A` is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if !(diag > 0.0) || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Lᵀ x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    fn factor<'a>(factors: &'a [(Index, Vec<f32>)], id: Index) -> &'a [f32] {
        &factors.iter().find(|(i, _)| *i == id).unwrap().1
    }

    /// Fully observed rank-1 matrix r[u][i] = a[u] * b[i]
    fn rank_one_ratings() -> Vec<RatingTriple> {
        let a = [1.0f32, 2.0, 3.0];
        let b = [1.0f32, 2.0, 0.5];
        let mut ratings = Vec::new();
        for (u, au) in a.iter().enumerate() {
            for (i, bi) in b.iter().enumerate() {
                ratings.push(RatingTriple::new(u as Index + 1, i as Index + 1, au * bi));
            }
        }
        ratings
    }

    #[test]
    fn test_empty_input() {
        let solver = AlsSolver::new(AlsParams::default());
        assert!(matches!(solver.solve(&[]), Err(SolverError::EmptyInput)));
    }

    #[test]
    fn test_invalid_rank() {
        let solver = AlsSolver::new(AlsParams::default().with_rank(0));
        let result = solver.solve(&[RatingTriple::new(1, 1, 1.0)]);
        assert!(matches!(result, Err(SolverError::InvalidParameter(_))));
    }

    #[test]
    fn test_non_finite_rating_rejected() {
        let solver = AlsSolver::new(AlsParams::default());
        let result = solver.solve(&[RatingTriple::new(1, 1, f32::NAN)]);
        assert!(matches!(result, Err(SolverError::InvalidParameter(_))));
    }

    #[test]
    fn test_explicit_reconstructs_rank_one_matrix() {
        let ratings = rank_one_ratings();
        let params = AlsParams::default()
            .with_rank(2)
            .with_max_iterations(30)
            .with_regularization(0.001);
        let factors = AlsSolver::new(params).solve(&ratings).unwrap();

        for r in &ratings {
            let score = dot(
                factor(&factors.user_factors, r.user),
                factor(&factors.item_factors, r.item),
            );
            assert!(
                (score - r.rating).abs() < 0.1,
                "cell ({}, {}) predicted {} expected {}",
                r.user,
                r.item,
                score,
                r.rating
            );
        }
    }

    #[test]
    fn test_factors_keyed_by_input_ids() {
        let ratings = vec![
            RatingTriple::new(20, 7, 1.0),
            RatingTriple::new(10, 3, 2.0),
            RatingTriple::new(10, 7, 1.0),
        ];
        let factors = AlsSolver::new(AlsParams::default().with_rank(3)).solve(&ratings).unwrap();

        let users: Vec<Index> = factors.user_factors.iter().map(|(id, _)| *id).collect();
        let items: Vec<Index> = factors.item_factors.iter().map(|(id, _)| *id).collect();
        assert_eq!(users, vec![10, 20]);
        assert_eq!(items, vec![3, 7]);
        assert!(factors.user_factors.iter().all(|(_, v)| v.len() == 3));
    }

    #[test]
    fn test_same_seed_same_factors() {
        let ratings = rank_one_ratings();
        let params = AlsParams::default().with_rank(2).with_seed(7);
        let first = AlsSolver::new(params.clone()).solve(&ratings).unwrap();
        let second = AlsSolver::new(params).solve(&ratings).unwrap();
        assert_eq!(first.user_factors, second.user_factors);
        assert_eq!(first.item_factors, second.item_factors);
    }

    #[test]
    fn test_nonnegative_factors() {
        let ratings = rank_one_ratings();
        let params = AlsParams::default().with_rank(3).with_nonnegative(true);
        let factors = AlsSolver::new(params).solve(&ratings).unwrap();

        for (_, v) in factors.user_factors.iter().chain(factors.item_factors.iter()) {
            assert!(v.iter().all(|&x| x >= 0.0));
        }
    }

    #[test]
    fn test_implicit_prefers_observed_block() {
        // Two disjoint communities: users 1,2 use items 1,2; users 3,4 use items 3,4
        let mut ratings = Vec::new();
        for (users, items) in [([1, 2], [1, 2]), ([3, 4], [3, 4])] {
            for u in users {
                for i in items {
                    ratings.push(RatingTriple::new(u, i, 2.0));
                }
            }
        }
        let params = AlsParams::default()
            .with_rank(2)
            .with_max_iterations(15)
            .with_regularization(0.01)
            .implicit(10.0);
        let factors = AlsSolver::new(params).solve(&ratings).unwrap();

        let u1 = factor(&factors.user_factors, 1);
        let own = dot(u1, factor(&factors.item_factors, 1));
        let other = dot(u1, factor(&factors.item_factors, 3));
        assert!(own > other, "own block {} should beat other block {}", own, other);
    }

    #[test]
    fn test_cholesky_rejects_indefinite() {
        let a = ndarray::arr2(&[[1.0, 2.0], [2.0, 1.0]]);
        let b = ndarray::arr1(&[1.0, 1.0]);
        assert!(cholesky_solve(&a, &b).is_none());
    }

    #[test]
    fn test_cholesky_solves_spd() {
        let a = ndarray::arr2(&[[4.0, 2.0], [2.0, 3.0]]);
        let b = ndarray::arr1(&[2.0, 1.0]);
        let x = cholesky_solve(&a, &b).unwrap();
        // 4x + 2y = 2, 2x + 3y = 1  =>  x = 0.5, y = 0
        assert!((x[0] - 0.5).abs() < 1e-9);
        assert!(x[1].abs() < 1e-9);
    }
}
