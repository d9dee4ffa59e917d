//! bagrun CLI - submit a bag of sleeping tasks to a worker pool and report
//! each one as it finishes.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use bagrun_dispatcher::{
    ConsoleReporter, Dispatcher, JsonReporter, LocalBackend, Reporter, RunConfig,
};
use bagrun_worker::{FailOn, RandomSleep, UniformDurations, Workload};

/// bagrun - run a bag of independent tasks and aggregate the results
#[derive(Parser, Debug)]
#[command(name = "bagrun", version)]
#[command(about = "Run a bag of independent tasks on a worker pool", long_about = None)]
struct Cli {
    /// JSON file with a full run configuration; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of tasks to submit
    #[arg(short = 'n', long)]
    tasks: Option<u32>,

    /// Shortest task duration (inclusive)
    #[arg(long)]
    min_sleep: Option<u64>,

    /// Longest task duration (inclusive)
    #[arg(long)]
    max_sleep: Option<u64>,

    /// Seed for reproducible durations
    #[arg(long)]
    seed: Option<u64>,

    /// Length of one duration unit in milliseconds
    #[arg(long)]
    time_unit_ms: Option<u64>,

    /// Fail the task with this index on purpose (repeatable)
    #[arg(long = "fail-task", value_name = "INDEX")]
    fail_tasks: Vec<u32>,

    /// Backend label used in logs
    #[arg(long)]
    label: Option<String>,

    /// Nodes per block
    #[arg(long)]
    nodes_per_block: Option<u32>,

    /// Workers per node
    #[arg(long)]
    workers_per_node: Option<u32>,

    /// Blocks provisioned at start
    #[arg(long)]
    init_blocks: Option<u32>,

    /// Minimum number of blocks
    #[arg(long)]
    min_blocks: Option<u32>,

    /// Maximum number of blocks
    #[arg(long)]
    max_blocks: Option<u32>,

    /// Worker pool lifetime (HH:MM:SS or seconds)
    #[arg(long)]
    walltime: Option<String>,

    /// Command that prepares each worker's runtime
    #[arg(long)]
    worker_init: Option<String>,

    /// Output format for task results
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    /// Load the base configuration and apply flag overrides.
    fn run_config(&self) -> Result<RunConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };

        let batch = &mut config.batch;
        if let Some(n) = self.tasks {
            batch.n_tasks = n;
        }
        if let Some(min) = self.min_sleep {
            batch.min_sleep = min;
        }
        if let Some(max) = self.max_sleep {
            batch.max_sleep = max;
        }
        if self.seed.is_some() {
            batch.seed = self.seed;
        }
        if let Some(ms) = self.time_unit_ms {
            batch.time_unit_ms = ms;
        }
        batch.inject_failures.extend(self.fail_tasks.iter().copied());

        let backend = &mut config.backend;
        if let Some(label) = &self.label {
            backend.label = label.clone();
        }
        if let Some(n) = self.nodes_per_block {
            backend.nodes_per_block = n;
        }
        if let Some(n) = self.workers_per_node {
            backend.workers_per_node = n;
        }
        if let Some(n) = self.init_blocks {
            backend.init_blocks = n;
        }
        if let Some(n) = self.min_blocks {
            backend.min_blocks = n;
        }
        if let Some(n) = self.max_blocks {
            backend.max_blocks = n;
        }
        if let Some(walltime) = &self.walltime {
            backend.walltime = walltime.clone();
        }
        if self.worker_init.is_some() {
            backend.worker_init = self.worker_init.clone();
        }

        config.batch.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing on stderr; stdout carries only the task report
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "bagrun={level},bagrun_worker={level},bagrun_dispatcher={level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    // Load config
    let config = cli.run_config()?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let batch = &config.batch;
    let workload = build_workload(&config);
    let backend = LocalBackend::start_shared(&config.backend, workload)?;

    let reporter: Box<dyn Reporter> = match cli.output {
        OutputFormat::Text => Box::new(ConsoleReporter::stdout()),
        OutputFormat::Json => Box::new(JsonReporter::stdout()),
    };
    let mut dispatcher = Dispatcher::new(backend).with_reporter(reporter);

    info!(
        n_tasks = batch.n_tasks,
        min_sleep = batch.min_sleep,
        max_sleep = batch.max_sleep,
        "Starting batch"
    );
    dispatcher
        .run_batch(batch.n_tasks, batch.min_sleep, batch.max_sleep)
        .await?;

    dispatcher.into_backend();
    Ok(())
}

fn build_workload(config: &RunConfig) -> Arc<dyn Workload> {
    let batch = &config.batch;
    let durations = match batch.seed {
        Some(seed) => UniformDurations::seeded(seed),
        None => UniformDurations::new(),
    };
    let sleep = RandomSleep::new()
        .with_durations(durations)
        .with_time_unit(batch.time_unit());
    debug!(time_unit = ?sleep.time_unit(), seed = ?batch.seed, "Built sleep workload");

    if batch.inject_failures.is_empty() {
        Arc::new(sleep)
    } else {
        Arc::new(FailOn::new(sleep, batch.inject_failures.iter().copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "bagrun",
            "-n",
            "3",
            "--min-sleep",
            "2",
            "--max-sleep",
            "2",
            "--workers-per-node",
            "3",
            "--walltime",
            "00:01:00",
            "--fail-task",
            "1",
        ]);
        let config = cli.run_config().unwrap();

        assert_eq!(config.batch.n_tasks, 3);
        assert_eq!(config.batch.min_sleep, 2);
        assert_eq!(config.batch.max_sleep, 2);
        assert_eq!(config.batch.inject_failures, vec![1]);
        assert_eq!(config.backend.workers_per_node, 3);
        assert_eq!(config.backend.walltime, "00:01:00");
        assert_eq!(config.backend.max_blocks, 1);
    }

    #[test]
    fn test_zero_time_unit_rejected() {
        let cli = Cli::parse_from(["bagrun", "--time-unit-ms", "0"]);
        assert!(cli.run_config().is_err());
    }

    #[test]
    fn test_output_format_parses() {
        let cli = Cli::parse_from(["bagrun", "--output", "json"]);
        assert_eq!(cli.output, OutputFormat::Json);
    }
}
