//! gapgen CLI
//!
//! Commands:
//!   generate - Emit tests for the ranked coverage gaps
//!   gaps     - List ranked gaps without generating
//!   coverage - Show what the corpus already covers
//!   schema   - Print a JSON schema (config, report, manifest)
//!   version  - Print the version

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use gapgen::{
    load_contract, load_corpus, GenConfig, Language, Manifest, Overrides, Pipeline, RunOptions,
    RunReport, VERSION,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Contract coverage-gap analysis and prioritized API test generation
#[derive(Parser)]
#[command(name = "gapgen", version)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON output instead of text reports
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ./gapgen.yaml if present)
    #[arg(long, global = true, env = "GAPGEN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    /// Contract file or http(s) URL
    #[arg(long, env = "GAPGEN_CONTRACT")]
    contract: String,

    /// Existing test corpus directory
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Minimum priority score for a gap to be generated
    #[arg(long)]
    threshold: Option<i64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate tests for the ranked gaps
    Generate {
        #[command(flatten)]
        inputs: Inputs,

        /// Output directory
        #[arg(long, default_value = "generated-tests")]
        output: PathBuf,

        /// Maximum enhancement calls
        #[arg(long)]
        budget: Option<usize>,

        /// Target language (java, python, typescript, rust, go, csharp)
        #[arg(long)]
        lang: Option<Language>,

        /// Ask the suggestion service for extra scenarios
        #[arg(long)]
        enhance: bool,

        /// Compute everything but write nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// List ranked gaps
    Gaps {
        #[command(flatten)]
        inputs: Inputs,
    },

    /// Show the coverage model of a corpus
    Coverage {
        #[command(flatten)]
        inputs: Inputs,
    },

    /// Print a JSON schema
    Schema {
        #[arg(value_enum, default_value = "config")]
        kind: SchemaKind,
    },

    /// Print the version
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemaKind {
    Config,
    Report,
    Manifest,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    match cli.command {
        Commands::Generate {
            inputs,
            output,
            budget,
            lang,
            enhance,
            dry_run,
        } => {
            let overrides = Overrides {
                budget,
                threshold: inputs.threshold,
                target: lang,
                enhance,
            };
            let config = load_config(cli.config.as_deref(), &overrides)?;
            cmd_generate(config, inputs, output, dry_run, cli.json).await
        }
        Commands::Gaps { inputs } => {
            let overrides = Overrides {
                threshold: inputs.threshold,
                ..Overrides::default()
            };
            let config = load_config(cli.config.as_deref(), &overrides)?;
            cmd_gaps(config, inputs, cli.json).await
        }
        Commands::Coverage { inputs } => {
            let config = load_config(cli.config.as_deref(), &Overrides::default())?;
            cmd_coverage(config, inputs, cli.json).await
        }
        Commands::Schema { kind } => {
            let schema = match kind {
                SchemaKind::Config => GenConfig::schema(),
                SchemaKind::Report => RunReport::schema(),
                SchemaKind::Manifest => schemars::schema_for!(Manifest),
            };
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(0)
        }
        Commands::Version => {
            println!("gapgen {}", VERSION);
            Ok(0)
        }
    }
}

fn load_config(explicit: Option<&Path>, overrides: &Overrides) -> anyhow::Result<GenConfig> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let mut config = GenConfig::discover(explicit, &cwd).context("loading configuration")?;
    config.apply(overrides);
    Ok(config)
}

async fn cmd_generate(
    config: GenConfig,
    inputs: Inputs,
    output: PathBuf,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<u8> {
    let options = RunOptions {
        contract: inputs.contract,
        corpus: inputs.corpus,
        output,
        dry_run,
    };
    let report = Pipeline::new(config)
        .run(&options)
        .await
        .with_context(|| format!("generating tests from {}", options.contract))?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report.to_report());
    }
    Ok(report.status().exit_code() as u8)
}

async fn cmd_gaps(config: GenConfig, inputs: Inputs, json: bool) -> anyhow::Result<u8> {
    let pipeline = Pipeline::new(config);
    let model = Arc::new(load_contract(&inputs.contract).await?);
    let units = match &inputs.corpus {
        Some(dir) => load_corpus(dir).with_context(|| format!("reading corpus {}", dir.display()))?,
        None => Vec::new(),
    };
    let analysis = pipeline.analyze(model, units).await?;

    if json {
        let value = serde_json::json!({
            "gaps_found": analysis.gaps_found,
            "below_threshold": analysis.below_threshold,
            "ranked": analysis.ranked,
            "warnings": analysis.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", analysis.to_report());
    }
    Ok(if analysis.warnings.is_empty() { 0 } else { 2 })
}

async fn cmd_coverage(config: GenConfig, inputs: Inputs, json: bool) -> anyhow::Result<u8> {
    let corpus = inputs
        .corpus
        .context("coverage needs --corpus <dir>")?;
    let pipeline = Pipeline::new(config);
    let model = Arc::new(load_contract(&inputs.contract).await?);
    let units = load_corpus(&corpus).with_context(|| format!("reading corpus {}", corpus.display()))?;
    let analysis = pipeline.analyze(model, units).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis.coverage)?);
    } else {
        println!("{}", analysis.coverage.to_report());
        for warning in &analysis.warnings {
            eprintln!("⚠ {}", warning);
        }
    }
    Ok(if analysis.warnings.is_empty() { 0 } else { 2 })
}
