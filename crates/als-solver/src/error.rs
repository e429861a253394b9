use thiserror::Error;

/// Which factor matrix was being solved when a failure occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    User,
    Item,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::User => write!(f, "user"),
            Side::Item => write!(f, "item"),
        }
    }
}

/// Errors reported by the ALS solver
#[derive(Error, Debug)]
pub enum SolverError {
    /// No ratings were supplied
    #[error("Cannot factorize an empty rating table")]
    EmptyInput,

    /// A hyperparameter or rating value is unusable
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The normal equations for one row could not be solved
    #[error("Normal equations for {side} row {row} are not positive definite")]
    NotPositiveDefinite { side: Side, row: u32 },

    /// The objective stopped being finite
    #[error("Solver diverged at iteration {iteration} (loss = {loss})")]
    Diverged { iteration: usize, loss: f64 },
}

pub type Result<T> = std::result::Result<T, SolverError>;
