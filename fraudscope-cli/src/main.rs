use std::fs::File;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fraudscope::io::{
    load_config, load_model, save_model, write_predictions, write_report, TransactionReader,
};
use fraudscope::{Pipeline, PipelineConfig};

#[derive(Parser)]
#[command(name = "fraudscope")]
#[command(about = "Train, evaluate and apply random forest fraud detectors")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline and print the report
    Run(RunArgs),
    /// Score a transaction file with a saved model
    Predict(PredictArgs),
    /// Print the dataset summary and class distribution
    Describe(DescribeArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Transaction CSV file
    #[arg(long)]
    input: PathBuf,

    /// JSON pipeline configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for every random stage (overrides the configuration)
    #[arg(long)]
    seed: Option<u64>,

    /// Fraction of rows held out for testing
    #[arg(long)]
    test_fraction: Option<f64>,

    /// Number of trees in the baseline forest
    #[arg(long)]
    trees: Option<usize>,

    /// Skip grid search
    #[arg(long)]
    no_tune: bool,

    /// Attribute a few test predictions to their features
    #[arg(long)]
    explain: bool,

    /// Write the final model here
    #[arg(long)]
    model_out: Option<PathBuf>,

    /// Write the report as JSON here
    #[arg(long)]
    report_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// Model written by `run --model-out`
    #[arg(long)]
    model: PathBuf,

    /// Transaction CSV file; the label column may be absent
    #[arg(long)]
    input: PathBuf,

    /// Output CSV (defaults to stdout)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DescribeArgs {
    /// Transaction CSV file
    #[arg(long)]
    input: PathBuf,

    /// JSON pipeline configuration (only the schema is used)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn read_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load configuration {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let mut config = read_config(args.config.as_ref())?;
    if let Some(seed) = args.seed {
        config.forest.seed = seed;
        config.split.seed = seed;
        config.balance.seed = seed;
        config.tuning.seed = seed;
        config.explain.seed = seed;
    }
    if let Some(f) = args.test_fraction {
        config.split.test_fraction = f;
    }
    if let Some(n) = args.trees {
        config.forest.n_trees = n;
    }
    if args.no_tune {
        config.tuning.enabled = false;
    }
    if args.explain {
        config.explain.enabled = true;
    }

    let pipeline = Pipeline::new(config).context("invalid pipeline configuration")?;
    let run = pipeline
        .run_path(&args.input)
        .with_context(|| format!("pipeline failed on {}", args.input.display()))?;
    println!("{}", run.report);

    if let Some(path) = &args.model_out {
        save_model(&run.model, path)
            .with_context(|| format!("failed to save model to {}", path.display()))?;
        info!(path = %path.display(), "model saved");
    }
    if let Some(path) = &args.report_out {
        write_report(&run.report, path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
    }
    Ok(())
}

fn cmd_predict(args: PredictArgs) -> Result<()> {
    let model = load_model(&args.model)
        .with_context(|| format!("failed to load model {}", args.model.display()))?;
    let raw = TransactionReader::new(model.schema.clone())
        .with_optional_label()
        .load(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let predictions = model
        .predict_raw(&raw)
        .with_context(|| format!("failed to score {}", args.input.display()))?;

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_predictions(file, &predictions)?;
        }
        None => write_predictions(io::stdout().lock(), &predictions)?,
    }

    let flagged = predictions.iter().filter(|p| p.probability > 0.5).count();
    info!(rows = predictions.len(), flagged, "scored transactions");
    Ok(())
}

fn cmd_describe(args: DescribeArgs) -> Result<()> {
    let config = read_config(args.config.as_ref())?;
    let raw = TransactionReader::new(config.schema.clone())
        .load(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let (summary, cleaning) = Pipeline::new(config)?.describe(raw)?;

    println!("{summary}");
    println!(
        "{} rows in, {} with missing values",
        cleaning.rows_in, cleaning.rows_dropped
    );
    for (name, count) in &cleaning.missing_per_column {
        if *count > 0 {
            println!("{name:>16} {count:>10} missing");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Predict(args) => cmd_predict(args),
        Command::Describe(args) => cmd_describe(args),
    }
}
