//! # Recommendation Pipeline
//!
//! Runs the stages in order:
//! 1. Aggregate raw events into counts and drop rare pairs
//! 2. Assign user and item indices
//! 3. Derive explicit and implicit ratings
//! 4. Split into training and testing
//! 5. Train a factor model for the requested mode
//! 6. Score and extract top-N lists
//! 7. Evaluate hit rate on the testing split
//!
//! Stages 1-4 do not depend on the feedback mode and run once in
//! [`RecommendationPipeline::prepare`]; both modes then share the same split.

use crate::aggregate::{aggregate, Interaction};
use crate::config::PipelineConfig;
use crate::encode::{bucket_populations, RatingEncoder, RatingRecord};
use crate::error::{PipelineError, Result};
use crate::evaluate::{rmse, EvaluationResult, Evaluator};
use crate::identity::IdentityRegistry;
use crate::partition::{DatasetPartitioner, Partition};
use crate::prediction::PredictionMatrix;
use crate::recommend::TopNRecommender;
use crate::trainer::{FactorModel, FactorModelTrainer, FactorizationSolver, FeedbackMode};
use data_loader::RawEvent;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, instrument};

/// Mode-independent output of stages 1-4
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub events: usize,
    pub users: IdentityRegistry,
    pub items: IdentityRegistry,
    pub interactions: Vec<Interaction>,
    pub records: Vec<RatingRecord>,
    pub partition: Partition,
}

/// Result of training and evaluating one feedback mode
#[derive(Debug, Clone, Serialize)]
pub struct ModeReport {
    pub mode: FeedbackMode,
    pub evaluation: EvaluationResult,
    /// Reconstruction error on testing pairs the model can score
    pub rmse: Option<f64>,
    pub users_with_factors: usize,
    pub items_with_factors: usize,
    pub elapsed_ms: u128,
}

/// Full report of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub config: PipelineConfig,
    pub events: usize,
    pub users: usize,
    pub items: usize,
    pub interactions: usize,
    pub bucket_populations: Vec<usize>,
    pub training_records: usize,
    pub testing_records: usize,
    pub modes: Vec<ModeReport>,
}

/// A recommended item named by its raw identifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedRecommendation {
    pub item_id: String,
    pub score: f32,
}

pub struct RecommendationPipeline<S> {
    config: PipelineConfig,
    encoder: RatingEncoder,
    recommender: TopNRecommender,
    trainer: FactorModelTrainer<S>,
}

impl<S: FactorizationSolver> RecommendationPipeline<S> {
    /// Validate `config` and wire up every stage
    pub fn new(config: PipelineConfig, solver: S) -> Result<Self> {
        config.validate()?;
        let encoder = RatingEncoder::new(config.num_rating_buckets)?;
        let recommender = TopNRecommender::new(config.top_n)?;
        Ok(Self {
            config,
            encoder,
            recommender,
            trainer: FactorModelTrainer::new(solver),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stages 1-4
    #[instrument(skip_all, fields(events = events.len()))]
    pub fn prepare(&self, events: &[RawEvent]) -> Result<PreparedData> {
        let start = Instant::now();

        let interactions = aggregate(events, self.config.min_interaction_count);
        info!(
            "Aggregated {} events into {} interactions (min count {})",
            events.len(),
            interactions.len(),
            self.config.min_interaction_count
        );

        let users = IdentityRegistry::assign(events.iter().map(|e| e.user_id.as_str()));
        let items = IdentityRegistry::assign(events.iter().map(|e| e.item_id.as_str()));
        info!("Indexed {} users and {} items", users.len(), items.len());

        let records = self.encoder.encode(&interactions, &users, &items)?;

        let partition = DatasetPartitioner::partition(
            &records,
            self.config.split_ratios(),
            self.config.random_seed,
        )?;
        info!(
            "Split into {} training and {} testing records",
            partition.training.len(),
            partition.testing.len()
        );

        info!("Prepared data in {:.2?}", start.elapsed());
        Ok(PreparedData {
            events: events.len(),
            users,
            items,
            interactions,
            records,
            partition,
        })
    }

    /// Stage 5 for one mode
    pub fn train(&self, prepared: &PreparedData, mode: FeedbackMode) -> Result<FactorModel> {
        self.trainer
            .train(&prepared.partition.training, mode, &self.config.trainer_config())
    }

    /// Stages 5-7 for one mode
    #[instrument(skip(self, prepared))]
    pub fn run_mode(&self, prepared: &PreparedData, mode: FeedbackMode) -> Result<ModeReport> {
        let start = Instant::now();

        let model = self.train(prepared, mode)?;
        let matrix = PredictionMatrix::build(&model);
        let top_n = self.recommender.recommend(&matrix);
        let evaluation = Evaluator::evaluate(&prepared.partition.testing, &top_n)?;
        let rmse = rmse(&prepared.partition.testing, &model, mode);

        let elapsed = start.elapsed();
        info!(
            %mode,
            accuracy = evaluation.accuracy,
            hits = evaluation.hits,
            considered = evaluation.considered,
            "Evaluated {} model in {:.2?}",
            mode,
            elapsed
        );

        Ok(ModeReport {
            mode,
            evaluation,
            rmse,
            users_with_factors: model.num_users(),
            items_with_factors: model.num_items(),
            elapsed_ms: elapsed.as_millis(),
        })
    }

    /// Prepare once, then train and evaluate each mode in `modes`
    pub fn run_modes(&self, events: &[RawEvent], modes: &[FeedbackMode]) -> Result<PipelineReport> {
        if modes.is_empty() {
            return Err(PipelineError::Config("no feedback mode requested".to_string()));
        }

        let prepared = self.prepare(events)?;
        let modes = modes
            .iter()
            .map(|&mode| self.run_mode(&prepared, mode))
            .collect::<Result<Vec<_>>>()?;

        Ok(PipelineReport {
            config: self.config.clone(),
            events: prepared.events,
            users: prepared.users.len(),
            items: prepared.items.len(),
            interactions: prepared.interactions.len(),
            bucket_populations: bucket_populations(&prepared.records, self.encoder.num_buckets()),
            training_records: prepared.partition.training.len(),
            testing_records: prepared.partition.testing.len(),
            modes,
        })
    }

    /// Both modes, explicit first
    pub fn run(&self, events: &[RawEvent]) -> Result<PipelineReport> {
        self.run_modes(events, &FeedbackMode::ALL)
    }

    /// Top-N items for one user, by raw identifier
    pub fn recommend_for(
        &self,
        prepared: &PreparedData,
        mode: FeedbackMode,
        raw_user: &str,
    ) -> Result<Vec<NamedRecommendation>> {
        let user = prepared
            .users
            .index_of(raw_user)
            .ok_or_else(|| PipelineError::Data(format!("unknown user {raw_user:?}")))?;

        let model = self.train(prepared, mode)?;
        let matrix = PredictionMatrix::build(&model);
        let ranked = self.recommender.recommend_user(&matrix, user).ok_or_else(|| {
            PipelineError::Data(format!(
                "user {raw_user:?} has no training interactions (cold start)"
            ))
        })?;

        ranked
            .into_iter()
            .map(|scored| {
                let item_id = prepared.items.raw_id(scored.item).ok_or_else(|| {
                    PipelineError::Data(format!("no raw id for item index {}", scored.item))
                })?;
                Ok(NamedRecommendation {
                    item_id: item_id.to_string(),
                    score: scored.score,
                })
            })
            .collect()
    }
}
