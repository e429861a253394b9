//! Error categories for the recommendation pipeline.
//!
//! Every stage reports one of four kinds. None of them is transient, so
//! nothing in the pipeline retries; the caller decides whether to run again
//! with different configuration.

use als_solver::SolverError;
use data_loader::DataLoadError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid configuration, or an empty set where a result is required
    #[error("Configuration error: {0}")]
    Config(String),

    /// A value outside the domain of a transform (ln of a non-positive count,
    /// zero buckets)
    #[error("Domain error: {0}")]
    Domain(String),

    /// The factorization solver failed or produced an unusable model
    #[error("Training error: {0}")]
    Training(String),

    /// Malformed or inconsistent input data
    #[error("Data error: {0}")]
    Data(String),
}

impl From<DataLoadError> for PipelineError {
    fn from(err: DataLoadError) -> Self {
        PipelineError::Data(err.to_string())
    }
}

impl From<SolverError> for PipelineError {
    fn from(err: SolverError) -> Self {
        PipelineError::Training(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
