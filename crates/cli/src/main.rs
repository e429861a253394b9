use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use data_loader::{parse_events, LogFormat, RawEvent};
use pipeline::{
    AlsBackend, FeedbackMode, NamedRecommendation, PipelineConfig, PipelineReport, PreparedData,
    RecommendationPipeline,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

/// cf-eval - Collaborative filtering with hit-rate evaluation
#[derive(Parser)]
#[command(name = "cf-eval")]
#[command(
    about = "Train latent-factor recommenders on an interaction log and score them",
    long_about = None
)]
struct Cli {
    /// Path to the raw interaction log (user,item[,timestamp] per line)
    #[arg(short, long, global = true, default_value = "data/events.csv")]
    input: PathBuf,

    /// Field separator used in the log
    #[arg(long, global = true, default_value = ",")]
    delimiter: String,

    /// The log has no header line
    #[arg(long, global = true)]
    no_header: bool,

    /// JSON file with pipeline configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Give up if the pipeline runs longer than this
    #[arg(long, global = true, default_value = "600")]
    timeout_secs: u64,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Commands,
}

/// Command-line overrides, applied on top of the config file
#[derive(Args, Debug)]
struct ConfigOverrides {
    /// Drop (user, item) pairs seen this many times or fewer
    #[arg(long, global = true)]
    min_count: Option<u32>,

    /// Number of quantile buckets for explicit ratings
    #[arg(long, global = true)]
    buckets: Option<usize>,

    /// Share of interactions used for training
    #[arg(long, global = true)]
    train_ratio: Option<f64>,

    /// Length of each user's recommendation list
    #[arg(long, global = true)]
    top_n: Option<usize>,

    /// Number of latent factors
    #[arg(long, global = true)]
    rank: Option<usize>,

    /// Solver iterations
    #[arg(long, global = true)]
    max_iterations: Option<usize>,

    /// Regularization parameter
    #[arg(long, global = true)]
    regularization: Option<f64>,

    /// Confidence slope for implicit feedback
    #[arg(long, global = true)]
    alpha: Option<f64>,

    /// Constrain factors to be non-negative (`--nonnegative false` turns it off)
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true")]
    nonnegative: Option<bool>,

    /// Seed for the train/test split and solver initialisation
    #[arg(long, global = true)]
    seed: Option<u64>,
}

impl ConfigOverrides {
    fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(v) = self.min_count {
            config.min_interaction_count = v;
        }
        if let Some(v) = self.buckets {
            config.num_rating_buckets = v;
        }
        if let Some(v) = self.train_ratio {
            config.train_ratio = v;
        }
        if let Some(v) = self.top_n {
            config.top_n = v;
        }
        if let Some(v) = self.rank {
            config.rank = v;
        }
        if let Some(v) = self.max_iterations {
            config.max_iterations = v;
        }
        if let Some(v) = self.regularization {
            config.regularization_parameter = v;
        }
        if let Some(v) = self.alpha {
            config.implicit_alpha = v;
        }
        if let Some(v) = self.nonnegative {
            config.nonnegative = v;
        }
        if let Some(v) = self.seed {
            config.random_seed = v;
        }
        config
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Explicit,
    Implicit,
    Both,
}

impl ModeArg {
    fn modes(self) -> Vec<FeedbackMode> {
        match self {
            ModeArg::Explicit => vec![FeedbackMode::Explicit],
            ModeArg::Implicit => vec![FeedbackMode::Implicit],
            ModeArg::Both => FeedbackMode::ALL.to_vec(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Train, recommend and report the hit rate on held-out interactions
    Evaluate {
        #[arg(long, value_enum, default_value_t = ModeArg::Both)]
        mode: ModeArg,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the top-N items for one user
    Recommend {
        /// Raw user identifier as it appears in the log
        #[arg(long)]
        user: String,

        #[arg(long, value_enum, default_value_t = ModeArg::Implicit)]
        mode: ModeArg,
    },

    /// Summarise the log after aggregation and encoding
    Stats,
}

fn main() -> Result<()> {
    // Logs go to stderr so --json output stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run(cli));
    // A timed-out pipeline keeps its blocking thread; don't wait for it
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;

    let format = LogFormat::default()
        .with_delimiter(cli.delimiter.clone())
        .with_header(!cli.no_header);
    let start = Instant::now();
    let events = parse_events(&cli.input, &format)
        .with_context(|| format!("Failed to load interaction log {}", cli.input.display()))?;
    info!("Loaded {} events in {:?}", events.len(), start.elapsed());

    let deadline = Duration::from_secs(cli.timeout_secs);

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Evaluate { mode, json } => {
            handle_evaluate(config, events, mode, json, deadline).await?
        }
        Commands::Recommend { user, mode } => {
            handle_recommend(config, events, user, mode, deadline).await?
        }
        Commands::Stats => handle_stats(config, events, deadline).await?,
    }

    Ok(())
}

/// Defaults, then the config file, then command-line flags
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let base = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let config = cli.overrides.apply(base);
    config.validate().context("Invalid pipeline configuration")?;
    Ok(config)
}

/// Run a pipeline job on the blocking pool, bounded by `deadline`
async fn run_with_deadline<T, F>(deadline: Duration, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> pipeline::Result<T> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(job);
    let joined = tokio::time::timeout(deadline, task)
        .await
        .map_err(|_| anyhow!("Pipeline did not finish within {:?}", deadline))?;
    let result = joined.context("Pipeline task panicked")?;
    Ok(result?)
}

/// Handle the 'evaluate' command
async fn handle_evaluate(
    config: PipelineConfig,
    events: Vec<RawEvent>,
    mode: ModeArg,
    json: bool,
    deadline: Duration,
) -> Result<()> {
    let modes = mode.modes();
    let report = run_with_deadline(deadline, move || {
        let pipeline = RecommendationPipeline::new(config, AlsBackend)?;
        pipeline.run_modes(&events, &modes)
    })
    .await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Handle the 'recommend' command
async fn handle_recommend(
    config: PipelineConfig,
    events: Vec<RawEvent>,
    user: String,
    mode: ModeArg,
    deadline: Duration,
) -> Result<()> {
    let modes = mode.modes();
    let raw_user = user.clone();
    let lists = run_with_deadline(deadline, move || {
        let pipeline = RecommendationPipeline::new(config, AlsBackend)?;
        let prepared = pipeline.prepare(&events)?;
        modes
            .into_iter()
            .map(|mode| Ok((mode, pipeline.recommend_for(&prepared, mode, &raw_user)?)))
            .collect::<pipeline::Result<Vec<_>>>()
    })
    .await?;

    for (mode, recommendations) in &lists {
        print_recommendations(&user, *mode, recommendations);
    }
    Ok(())
}

/// Counts shown by the 'stats' command
struct LogStats {
    prepared: PreparedData,
    min_count: u32,
    buckets: Vec<usize>,
}

fn log_stats(config: PipelineConfig, events: &[RawEvent]) -> pipeline::Result<LogStats> {
    let pipeline = RecommendationPipeline::new(config, AlsBackend)?;
    let prepared = pipeline.prepare(events)?;
    let buckets =
        pipeline::bucket_populations(&prepared.records, pipeline.config().num_rating_buckets);
    Ok(LogStats {
        prepared,
        min_count: pipeline.config().min_interaction_count,
        buckets,
    })
}

/// Handle the 'stats' command
async fn handle_stats(
    config: PipelineConfig,
    events: Vec<RawEvent>,
    deadline: Duration,
) -> Result<()> {
    let stats = run_with_deadline(deadline, move || log_stats(config, &events)).await?;
    let prepared = &stats.prepared;

    println!("{}", "Interaction log:".bold().blue());
    println!("{}Events: {}", "• ".green(), prepared.events);
    println!("{}Users: {}", "• ".green(), prepared.users.len());
    println!("{}Items: {}", "• ".green(), prepared.items.len());
    println!(
        "{}Pairs above min count {}: {}",
        "• ".cyan(),
        stats.min_count,
        prepared.interactions.len()
    );
    println!(
        "{}Training / testing: {} / {}",
        "• ".cyan(),
        prepared.partition.training.len(),
        prepared.partition.testing.len()
    );
    println!("Explicit rating buckets:");
    for (bucket, count) in stats.buckets.iter().enumerate() {
        println!("  - bucket {}: {} records", bucket, count);
    }
    Ok(())
}

fn print_report(report: &PipelineReport) {
    println!("{}", "Evaluation report:".bold().blue());
    println!(
        "{} events, {} users, {} items, {} pairs ({} training / {} testing)",
        report.events,
        report.users,
        report.items,
        report.interactions,
        report.training_records,
        report.testing_records
    );
    for mode in &report.modes {
        let rmse = mode
            .rmse
            .map(|v| format!("{:.4}", v))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{} top-{} hit rate: {} ({} of {} held-out, {} cold-start excluded), rmse {}, {} ms",
            format!("{:>8}", mode.mode.to_string()).bold(),
            report.config.top_n,
            format!("{:.2}%", mode.evaluation.accuracy).green(),
            mode.evaluation.hits,
            mode.evaluation.considered,
            mode.evaluation.excluded_cold_start,
            rmse,
            mode.elapsed_ms
        );
    }
}

fn print_recommendations(user: &str, mode: FeedbackMode, recommendations: &[NamedRecommendation]) {
    println!(
        "{}",
        format!("Recommendations for {} ({}):", user, mode).bold().blue()
    );
    for (rank, rec) in recommendations.iter().enumerate() {
        println!(
            "{}. {} - Score: {:.3}",
            (rank + 1).to_string().green(),
            rec.item_id,
            rec.score
        );
    }
}
