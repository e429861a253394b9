//! # ALS Solver Crate
//!
//! Latent-factor matrix factorization by alternating least squares.
//!
//! The solver takes a table of `(user, item, rating)` cells plus
//! hyperparameters and returns one factor vector per user and per item. It
//! has no knowledge of how ratings were derived; callers decide whether a
//! table is explicit or implicit feedback.
//!
//! ## Example Usage
//!
//! ```ignore
//! use als_solver::{AlsParams, AlsSolver, RatingTriple};
//!
//! let ratings = vec![
//!     RatingTriple::new(1, 1, 3.0),
//!     RatingTriple::new(1, 2, 1.0),
//!     RatingTriple::new(2, 1, 4.0),
//! ];
//!
//! let params = AlsParams::default().with_rank(8).implicit(40.0);
//! let factors = AlsSolver::new(params).solve(&ratings)?;
//! println!("{} user vectors", factors.user_factors.len());
//! ```

pub mod als;
pub mod error;

pub use als::{AlsFactors, AlsParams, AlsSolver, Index, RatingTriple};
pub use error::{Result, Side, SolverError};
