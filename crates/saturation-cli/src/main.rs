mod cards;
mod demo;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use analyzer::benchmark::{BenchmarkFactory, CardFactory, ExampleFactory, YamlCardSource};
use analyzer::metrics::MetricRegistry;
use analyzer::{
    load_records, write_history_json, write_table_csv, AnalyzerConfig, IdentityPolicy,
    SystemClock, UpdateGate,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply metrics to a CSV of benchmarks and write an enhanced CSV
    Process(ProcessArgs),

    /// Walk through caching, history and staleness on an in-memory benchmark
    Example,

    /// List the registered metrics
    Metrics {
        /// Print as JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the first records of a split dataset-card export
    Cards(cards::CardsArgs),
}

#[derive(clap::Args, Debug)]
struct ProcessArgs {
    /// TOML config file (ANALYZER_* variables and flags override it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input CSV with a `name` column (overrides ANALYZER_INPUT)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output CSV (default: enhanced_<input name> next to the input)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write updatable-metric histories to this JSON file
    #[arg(long)]
    history_out: Option<PathBuf>,

    /// Split YAML dataset-card export; benchmarks become card-backed
    #[arg(long)]
    card_source: Option<PathBuf>,

    /// Identity policy for metric caches and histories: instance | declared
    #[arg(long)]
    identity: Option<IdentityPolicy>,

    /// When to run updatable metrics: always | when_stale
    #[arg(long)]
    update_gate: Option<UpdateGate>,

    /// Refresh each benchmark from its source before running metrics
    #[arg(long, default_value_t = false)]
    refresh: bool,

    /// Comma-separated static metric names
    #[arg(long, value_delimiter = ',')]
    static_metrics: Option<Vec<String>>,

    /// Comma-separated updatable metric names
    #[arg(long, value_delimiter = ',')]
    updatable_metrics: Option<Vec<String>>,
}

impl ProcessArgs {
    /// Defaults → config file → environment → flags
    fn resolve(&self) -> Result<AnalyzerConfig> {
        self.resolve_with(std::env::vars())
    }

    /// Same layering as [`Self::resolve`], reading overrides from `vars`
    fn resolve_with<I, K, V>(&self, vars: I) -> Result<AnalyzerConfig>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = match &self.config {
            Some(path) => AnalyzerConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => AnalyzerConfig::default(),
        };
        config
            .apply_vars(vars)
            .context("Invalid ANALYZER_* environment override")?;

        if let Some(path) = &self.input {
            config.input = Some(path.clone());
        }
        if let Some(path) = &self.output {
            config.output = Some(path.clone());
        }
        if let Some(path) = &self.history_out {
            config.history_output = Some(path.clone());
        }
        if let Some(path) = &self.card_source {
            config.card_source = Some(path.clone());
        }
        if let Some(identity) = self.identity {
            config.identity = identity;
        }
        if let Some(gate) = self.update_gate {
            config.update_gate = gate;
        }
        if let Some(names) = &self.static_metrics {
            config.static_metrics = names.clone();
        }
        if let Some(names) = &self.updatable_metrics {
            config.updatable_metrics = names.clone();
        }
        // Card benchmarks have no data until refreshed
        if self.refresh || config.card_source.is_some() {
            config.refresh_before_run = true;
        }
        Ok(config)
    }
}

fn default_output(input: &Path) -> PathBuf {
    let file_name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "benchmarks.csv".to_string());
    input.with_file_name(format!("enhanced_{file_name}"))
}

fn run_process(args: &ProcessArgs) -> Result<()> {
    execute(args.resolve()?)
}

fn execute(config: AnalyzerConfig) -> Result<()> {
    let input = config
        .input
        .clone()
        .context("No input CSV given (use --input or ANALYZER_INPUT)")?;
    let output = config
        .output
        .clone()
        .unwrap_or_else(|| default_output(&input));

    let registry = MetricRegistry::builtin();
    let processor = config
        .build_processor(&registry, Arc::new(SystemClock))
        .context("Invalid metric configuration")?;

    let records = load_records(&input)
        .with_context(|| format!("Failed to read benchmarks from {}", input.display()))?;

    let factory: Box<dyn BenchmarkFactory> = match &config.card_source {
        Some(path) => {
            info!(source = %path.display(), "Using dataset-card source");
            Box::new(CardFactory::new(Arc::new(YamlCardSource::new(path))))
        }
        None => Box::new(ExampleFactory),
    };

    let result = processor
        .process(&records, factory.as_ref())
        .context("Failed to assemble result table")?;
    write_table_csv(&result.table, &output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if let Some(path) = &config.history_output {
        let snapshots = processor
            .updatable_metrics()
            .iter()
            .map(|metric| metric.snapshot())
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to snapshot metric histories")?;
        write_history_json(&snapshots, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    print!("{}", result.report.format_summary());
    println!("Results saved to {}", output.display());

    if result.report.contract_violations > 0 {
        bail!(
            "{} contract violation(s) during processing; see log for details",
            result.report.contract_violations
        );
    }
    Ok(())
}

fn run_metrics(json: bool) -> Result<()> {
    let available = MetricRegistry::builtin().available();
    if json {
        println!("{}", serde_json::to_string_pretty(&available)?);
        return Ok(());
    }

    println!("{:<18} {:<10} {:>9}  DESCRIPTION", "NAME", "KIND", "FREQ_DAYS");
    for info in available {
        let freq = info
            .update_frequency_days
            .map(|days| days.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<18} {:<10} {:>9}  {}",
            info.name,
            info.kind.to_string(),
            freq,
            info.description
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Process(process) => run_process(&process),
        Command::Example => demo::run(&mut std::io::stdout().lock()),
        Command::Metrics { json } => run_metrics(json),
        Command::Cards(cards) => cards::run(&cards, &mut std::io::stdout().lock()),
    }
}
