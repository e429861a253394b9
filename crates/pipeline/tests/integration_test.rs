//! Integration tests for the pipeline.
//!
//! Most tests use a stub solver whose item scores grow with the item index,
//! which makes the expected top-N lists easy to reason about. One test runs
//! the real ALS backend end to end.

use data_loader::RawEvent;
use pipeline::{
    aggregate, AlsBackend, DatasetPartitioner, Evaluator, FactorModelTrainer, FactorTables,
    FactorizationSolver, FeedbackMode, IdentityRegistry, LabeledRating, Partition,
    PipelineConfig, PipelineError, PredictionMatrix, RatingEncoder, RatingRecord,
    RecommendationPipeline, SolverParams, SplitRatios, TopNRecommender, TrainerConfig,
};
use std::collections::BTreeSet;

/// Every user vector is all ones and item `i` is all `i`, so higher item
/// indices always score higher.
struct IndexScoredSolver;

impl FactorizationSolver for IndexScoredSolver {
    fn name(&self) -> &str {
        "index-scored"
    }

    fn factorize(
        &self,
        table: &[LabeledRating],
        params: &SolverParams,
    ) -> pipeline::Result<FactorTables> {
        let users: BTreeSet<u32> = table.iter().map(|r| r.user).collect();
        let items: BTreeSet<u32> = table.iter().map(|r| r.item).collect();
        Ok(FactorTables {
            user_factors: users.into_iter().map(|u| (u, vec![1.0; params.rank])).collect(),
            item_factors: items
                .into_iter()
                .map(|i| (i, vec![i as f32; params.rank]))
                .collect(),
        })
    }
}

fn repeat(user: &str, item: &str, times: usize) -> Vec<RawEvent> {
    (0..times).map(|_| RawEvent::new(user, item)).collect()
}

fn scenario_events() -> Vec<RawEvent> {
    let mut events = repeat("u1", "i1", 7);
    events.extend(repeat("u1", "i2", 10));
    events.extend(repeat("u2", "i1", 8));
    events
}

/// 30 users over 20 items, 6 items each with counts between 6 and 15
fn synthetic_events() -> Vec<RawEvent> {
    let mut events = Vec::new();
    for u in 0..30usize {
        for k in 0..6usize {
            let item = (u + 3 * k) % 20;
            let count = 6 + (u * (k + 1)) % 10;
            events.extend(repeat(&format!("user{u:02}"), &format!("item{item:02}"), count));
        }
    }
    events
}

fn find<'a>(records: &'a [RatingRecord], user: u32, item: u32) -> &'a RatingRecord {
    records.iter().find(|r| r.user == user && r.item == item).unwrap()
}

#[test]
fn test_end_to_end_scenario() {
    let events = scenario_events();

    let interactions = aggregate(&events, 5);
    assert_eq!(interactions.len(), 3, "all three pairs clear min count 5");

    let users = IdentityRegistry::assign(events.iter().map(|e| e.user_id.as_str()));
    let items = IdentityRegistry::assign(events.iter().map(|e| e.item_id.as_str()));
    let (u1, u2) = (users.index_of("u1").unwrap(), users.index_of("u2").unwrap());
    let (i1, i2) = (items.index_of("i1").unwrap(), items.index_of("i2").unwrap());

    let records = RatingEncoder::new(2).unwrap().encode(&interactions, &users, &items).unwrap();
    assert_eq!(find(&records, u1, i1).explicit_rating, 0);
    assert_eq!(find(&records, u2, i1).explicit_rating, 0);
    assert_eq!(find(&records, u1, i2).explicit_rating, 1);

    let config = TrainerConfig {
        rank: 2,
        ..TrainerConfig::default()
    };
    let model = FactorModelTrainer::new(IndexScoredSolver)
        .train(&records, FeedbackMode::Explicit, &config)
        .unwrap();
    let matrix = PredictionMatrix::build(&model);
    assert!(matrix.score(u1, i2).unwrap() > matrix.score(u1, i1).unwrap());

    let top = TopNRecommender::new(1).unwrap().recommend(&matrix);
    assert_eq!(top.items(u1), Some(vec![i2]));

    let testing = vec![*find(&records, u1, i2)];
    let result = Evaluator::evaluate(&testing, &top).unwrap();
    assert_eq!(result.accuracy, 100.0);
    assert_eq!(result.considered, 1);
}

#[test]
fn test_cold_start_user_excluded() {
    let mut events = scenario_events();
    events.extend(repeat("u3", "i2", 9));

    let interactions = aggregate(&events, 5);
    let users = IdentityRegistry::assign(events.iter().map(|e| e.user_id.as_str()));
    let items = IdentityRegistry::assign(events.iter().map(|e| e.item_id.as_str()));
    let records = RatingEncoder::new(2).unwrap().encode(&interactions, &users, &items).unwrap();

    let u1 = users.index_of("u1").unwrap();
    let u3 = users.index_of("u3").unwrap();
    let i2 = items.index_of("i2").unwrap();
    // Hold out (u1, i2) and everything u3 did
    let (training, testing): (Vec<RatingRecord>, Vec<RatingRecord>) = records
        .into_iter()
        .partition(|r| r.user != u3 && !(r.user == u1 && r.item == i2));

    let config = TrainerConfig {
        rank: 1,
        ..TrainerConfig::default()
    };
    let model = FactorModelTrainer::new(IndexScoredSolver)
        .train(&training, FeedbackMode::Implicit, &config)
        .unwrap();
    assert!(model.user_vector(u3).is_none());

    let top = TopNRecommender::new(1)
        .unwrap()
        .recommend(&PredictionMatrix::build(&model));
    let result = Evaluator::evaluate(&testing, &top).unwrap();

    assert_eq!(testing.len(), 2);
    assert_eq!(result.considered, 1, "denominator counts only users with lists");
    assert_eq!(result.excluded_cold_start, 1);
}

#[test]
fn test_prepare_is_deterministic() {
    let pipeline =
        RecommendationPipeline::new(PipelineConfig::default(), IndexScoredSolver).unwrap();
    let events = synthetic_events();

    let a = pipeline.prepare(&events).unwrap();
    let b = pipeline.prepare(&events).unwrap();

    assert_eq!(a.records, b.records);
    assert_eq!(a.partition.training, b.partition.training);
    assert_eq!(a.partition.testing, b.partition.testing);
    assert_eq!(a.partition.len(), a.records.len());
    assert_eq!(a.users.len(), 30);
}

#[test]
fn test_different_seed_changes_partition() {
    let events = synthetic_events();
    let config_a = PipelineConfig::default().with_random_seed(1);
    let config_b = PipelineConfig::default().with_random_seed(2);
    let a = RecommendationPipeline::new(config_a, IndexScoredSolver)
        .unwrap()
        .prepare(&events)
        .unwrap();
    let b = RecommendationPipeline::new(config_b, IndexScoredSolver)
        .unwrap()
        .prepare(&events)
        .unwrap();
    assert_ne!(a.partition.testing, b.partition.testing);
}

#[test]
fn test_partitioner_matches_prepare() {
    let config = PipelineConfig::default();
    let pipeline = RecommendationPipeline::new(config.clone(), IndexScoredSolver).unwrap();
    let prepared = pipeline.prepare(&synthetic_events()).unwrap();

    let direct = DatasetPartitioner::partition(
        &prepared.records,
        SplitRatios::from_train_ratio(config.train_ratio),
        config.random_seed,
    )
    .unwrap();
    assert_eq!(direct.testing, prepared.partition.testing);
}

#[test]
fn test_run_reports_both_modes() {
    let pipeline =
        RecommendationPipeline::new(PipelineConfig::default(), IndexScoredSolver).unwrap();
    let report = pipeline.run(&synthetic_events()).unwrap();

    assert_eq!(report.modes.len(), 2);
    assert_eq!(report.modes[0].mode, FeedbackMode::Explicit);
    assert_eq!(report.modes[1].mode, FeedbackMode::Implicit);
    assert_eq!(report.interactions, 180);
    assert_eq!(report.training_records + report.testing_records, 180);
    assert_eq!(report.bucket_populations, vec![36; 5]);

    for mode in &report.modes {
        assert!((0.0..=100.0).contains(&mode.evaluation.accuracy));
    }
    // The stub ignores ratings, so both modes rank identically
    assert_eq!(report.modes[0].evaluation, report.modes[1].evaluation);
}

#[test]
fn test_recommend_for_named_user() {
    let config = PipelineConfig::default().with_top_n(2);
    let pipeline = RecommendationPipeline::new(config, IndexScoredSolver).unwrap();
    let mut events = scenario_events();
    for item in ["i3", "i4"] {
        events.extend(repeat("u1", item, 6));
    }
    let mut prepared = pipeline.prepare(&events).unwrap();
    prepared.partition = Partition {
        training: prepared.records.clone(),
        testing: Vec::new(),
    };
    let u1 = prepared.users.index_of("u1").unwrap();
    assert!(prepared.partition.training.iter().any(|r| r.user == u1));

    let recs = pipeline
        .recommend_for(&prepared, FeedbackMode::Implicit, "u1")
        .unwrap();
    let names: Vec<&str> = recs.iter().map(|r| r.item_id.as_str()).collect();
    assert_eq!(names, vec!["i4", "i3"]);
    assert!(recs[0].score > recs[1].score);

    let unknown = pipeline.recommend_for(&prepared, FeedbackMode::Implicit, "nobody");
    assert!(matches!(unknown, Err(PipelineError::Data(_))));
}

#[test]
fn test_recommend_for_cold_start_user_is_data_error() {
    let pipeline =
        RecommendationPipeline::new(PipelineConfig::default(), IndexScoredSolver).unwrap();
    let mut events = scenario_events();
    events.extend(repeat("u3", "i2", 9));
    let mut prepared = pipeline.prepare(&events).unwrap();

    let u3 = prepared.users.index_of("u3").unwrap();
    let (training, testing): (Vec<RatingRecord>, Vec<RatingRecord>) = prepared
        .records
        .iter()
        .copied()
        .partition(|r| r.user != u3);
    assert_eq!(testing.len(), 1);
    prepared.partition = Partition { training, testing };

    let result = pipeline.recommend_for(&prepared, FeedbackMode::Explicit, "u3");
    assert!(matches!(result, Err(PipelineError::Data(_))));

    let known = pipeline.recommend_for(&prepared, FeedbackMode::Explicit, "u1");
    assert!(known.is_ok());
}

#[test]
fn test_zero_buckets_rejected_up_front() {
    let config = PipelineConfig::default().with_num_rating_buckets(0);
    let result = RecommendationPipeline::new(config, IndexScoredSolver);
    assert!(matches!(result, Err(PipelineError::Domain(_))));
}

#[test]
fn test_everything_filtered_is_training_error() {
    let config = PipelineConfig::default().with_min_interaction_count(100);
    let pipeline = RecommendationPipeline::new(config, IndexScoredSolver).unwrap();
    let result = pipeline.run(&scenario_events());
    assert!(matches!(result, Err(PipelineError::Training(_))));
}

#[test]
fn test_als_backend_end_to_end() {
    let config = PipelineConfig::default()
        .with_rank(4)
        .with_max_iterations(5)
        .with_implicit_alpha(10.0);
    let pipeline = RecommendationPipeline::new(config, AlsBackend).unwrap();
    let report = pipeline.run(&synthetic_events()).unwrap();

    for mode in &report.modes {
        assert!((0.0..=100.0).contains(&mode.evaluation.accuracy));
        assert!(mode.evaluation.considered > 0);
        assert!(mode.users_with_factors > 0);
        assert!(mode.rmse.is_some_and(f64::is_finite));
    }
}
