//! Collaborative-filtering pipeline with hit-rate evaluation.
//!
//! This crate provides:
//! - Interaction aggregation and identifier indexing
//! - Explicit (quantile bucket) and implicit (log count) rating signals
//! - A seeded train/test split
//! - A [`FactorizationSolver`] seam with an ALS-backed implementation
//! - Lazy score reconstruction, top-N extraction and hit-rate scoring
//!
//! ## Architecture
//! Data flows strictly forward:
//! 1. `aggregate` collapses raw events into (user, item, count)
//! 2. `IdentityRegistry` maps raw ids to dense indices
//! 3. `RatingEncoder` attaches both rating signals
//! 4. `DatasetPartitioner` splits training from testing
//! 5. `FactorModelTrainer` fits a model through the solver
//! 6. `PredictionMatrix` + `TopNRecommender` rank items per user
//! 7. `Evaluator` scores held-out records against the lists
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{AlsBackend, PipelineConfig, RecommendationPipeline};
//!
//! let config = PipelineConfig::default().with_top_n(10);
//! let pipeline = RecommendationPipeline::new(config, AlsBackend)?;
//! let report = pipeline.run(&events)?;
//!
//! for mode in &report.modes {
//!     println!("{}: {:.2}%", mode.mode, mode.evaluation.accuracy);
//! }
//! ```

pub mod aggregate;
pub mod config;
pub mod encode;
pub mod error;
pub mod evaluate;
pub mod identity;
pub mod orchestrator;
pub mod partition;
pub mod prediction;
pub mod recommend;
pub mod solver;
pub mod trainer;

// Re-export main types
pub use aggregate::{aggregate, Interaction};
pub use config::PipelineConfig;
pub use encode::{bucket_populations, RatingEncoder, RatingRecord};
pub use error::{PipelineError, Result};
pub use evaluate::{rmse, EvaluationResult, Evaluator};
pub use identity::{IdentityRegistry, ItemIndex, UserIndex, INDEX_BASE};
pub use orchestrator::{
    ModeReport, NamedRecommendation, PipelineReport, PreparedData, RecommendationPipeline,
};
pub use partition::{DatasetPartitioner, Partition, SplitRatios};
pub use prediction::PredictionMatrix;
pub use recommend::{ScoredItem, TopNRecommendations, TopNRecommender};
pub use solver::AlsBackend;
pub use trainer::{
    FactorModel, FactorModelTrainer, FactorTables, FactorizationSolver, FeedbackMode,
    LabeledRating, SolverParams, TrainerConfig,
};
