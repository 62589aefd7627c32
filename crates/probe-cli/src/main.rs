//! probe - behavioral property testing for LLMs
//!
//! ## Commands
//!
//! - `run`: evaluate properties on a set of inputs against one model
//! - `compare`: run the same suite on two models side by side
//! - `list-properties`: show the registered properties
//! - `list-inputs`: show the test cases an inputs file yields
//! - `init`: write a starter inputs file

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};

use probe_core::metrics::METRICS;
use probe_core::{
    compare_suites, describe, get_property, load_inputs, render_comparison, render_summary,
    write_suite_json, Comparator, ComparatorKind, Property, PropertyOptions, RunnerConfig,
    SuiteResult, SuiteRunner, PROPERTY_NAMES, STARTER_INPUTS,
};
use probe_providers::{get_provider, HttpEmbedder, ProviderConfig};

#[derive(Parser)]
#[command(name = "probe")]
#[command(version = probe_core::VERSION)]
#[command(about = "Behavioral testing framework for LLMs", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run behavioral property tests on an LLM
    Run {
        /// Model as backend[:model], e.g. openai:gpt-4o-mini
        #[arg(short, long)]
        model: String,

        /// Path to inputs file (.txt or .jsonl)
        #[arg(short, long, conflicts_with = "input")]
        inputs: Option<PathBuf>,

        /// Single input text
        #[arg(long)]
        input: Option<String>,

        /// Comma-separated properties
        #[arg(short, long, default_value = "consistency")]
        properties: String,

        #[command(flatten)]
        suite: SuiteArgs,

        /// Export results to a JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare behavioral properties of two models side by side
    Compare {
        #[arg(long)]
        model_a: String,

        #[arg(long)]
        model_b: String,

        /// Path to inputs file (.txt or .jsonl)
        #[arg(short, long)]
        inputs: PathBuf,

        /// Comma-separated properties
        #[arg(short, long, default_value = "consistency,invariance,robustness")]
        properties: String,

        #[command(flatten)]
        suite: SuiteArgs,

        /// Write the comparison as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List all available behavioral properties
    ListProperties,

    /// List all test cases from an inputs file
    ListInputs {
        #[arg(short, long)]
        inputs: PathBuf,
    },

    /// Generate a starter test cases file
    Init {
        #[arg(short, long, default_value = "probe_tests.txt")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Settings shared by `run` and `compare`.
#[derive(Args, Debug, Clone)]
struct SuiteArgs {
    /// Pass threshold (0-1); each property's own default when omitted
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Comparator: embedding, exact or contains
    #[arg(long, default_value = "embedding")]
    comparator: String,

    /// Max concurrent property tests
    #[arg(short, long, env = "PROBE_CONCURRENCY", default_value_t = RunnerConfig::DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Variants per input (paraphrases, entity swaps, typos)
    #[arg(short = 'n', long)]
    variants: Option<usize>,

    /// Seed for typo injection
    #[arg(long, env = "PROBE_SEED")]
    seed: Option<u64>,

    /// OpenAI-compatible embeddings base URL; offline hashing when omitted
    #[arg(long, env = "PROBE_EMBEDDING_URL")]
    embedding_url: Option<String>,

    /// Embedding model name for --embedding-url
    #[arg(long, env = "PROBE_EMBEDDING_MODEL")]
    embedding_model: Option<String>,
}

impl SuiteArgs {
    /// One comparator shared by every property so an embedding model is
    /// loaded once per run.
    fn property_options(&self) -> Result<PropertyOptions> {
        let kind: ComparatorKind = self.comparator.parse()?;
        let loader = match (kind, &self.embedding_url) {
            (ComparatorKind::Embedding, Some(url)) => Some(HttpEmbedder::loader(
                self.embedding_model.clone(),
                ProviderConfig::default().with_base_url(url),
            )),
            _ => None,
        };
        let comparator: Arc<dyn Comparator> = kind.build(loader);
        Ok(PropertyOptions {
            threshold: self.threshold,
            arity: self.variants,
            seed: self.seed,
            comparator_kind: kind,
            comparator: Some(comparator),
        })
    }
}

fn split_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn build_properties(names: &[String], options: &PropertyOptions) -> Result<Vec<Arc<dyn Property>>> {
    if names.is_empty() {
        bail!("no properties given");
    }
    names
        .iter()
        .map(|name| get_property(name, options).map_err(anyhow::Error::from))
        .collect()
}

fn collect_inputs(inputs: Option<&Path>, input: Option<&str>) -> Result<Vec<String>> {
    let items = match (input, inputs) {
        (Some(text), _) => vec![text.to_string()],
        (None, Some(path)) => {
            load_inputs(path).with_context(|| format!("failed to read inputs from {:?}", path))?
        }
        (None, None) => bail!("provide --inputs <file> or --input <text>"),
    };
    if items.is_empty() {
        bail!("no test cases found");
    }
    Ok(items)
}

fn suite_failed(suite: &SuiteResult) -> bool {
    suite.failed() > 0 || suite.errors() > 0
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    probe_core::telemetry::init_tracing(cli.json, level);

    let outcome = match cli.command {
        Commands::Run {
            model,
            inputs,
            input,
            properties,
            suite,
            output,
        } => {
            cmd_run(
                &model,
                inputs.as_deref(),
                input.as_deref(),
                &properties,
                &suite,
                output.as_deref(),
            )
            .await
        }
        Commands::Compare {
            model_a,
            model_b,
            inputs,
            properties,
            suite,
            output,
        } => cmd_compare(&model_a, &model_b, &inputs, &properties, &suite, output.as_deref()).await,
        Commands::ListProperties => cmd_list_properties(),
        Commands::ListInputs { inputs } => cmd_list_inputs(&inputs),
        Commands::Init { output, force } => cmd_init(&output, force),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when any result failed or errored.
async fn cmd_run(
    model: &str,
    inputs: Option<&Path>,
    input: Option<&str>,
    properties: &str,
    args: &SuiteArgs,
    output: Option<&Path>,
) -> Result<bool> {
    let items = collect_inputs(inputs, input)?;
    let names = split_names(properties);
    let props = build_properties(&names, &args.property_options()?)?;
    let provider = get_provider(model, &ProviderConfig::default())
        .with_context(|| format!("failed to set up provider {model}"))?;

    println!("\nprobe v{}", probe_core::VERSION);
    println!("  Model: {model}");
    println!("  Inputs: {} test cases", items.len());
    println!("  Properties: {}", names.join(", "));
    match args.threshold {
        Some(t) => println!("  Threshold: {t}\n"),
        None => println!("  Threshold: per-property default\n"),
    }

    let runner = SuiteRunner::new(RunnerConfig {
        concurrency: args.concurrency,
    });
    let suite = runner.run(provider, &items, &props).await;
    METRICS.flush();

    print!("{}", render_summary(&suite));
    if let Some(path) = output {
        write_suite_json(path, &suite).with_context(|| format!("failed to write {:?}", path))?;
        println!("Results exported to {}", path.display());
    }
    Ok(!suite_failed(&suite))
}

async fn cmd_compare(
    model_a: &str,
    model_b: &str,
    inputs: &Path,
    properties: &str,
    args: &SuiteArgs,
    output: Option<&Path>,
) -> Result<bool> {
    let items = collect_inputs(Some(inputs), None)?;
    let names = split_names(properties);
    let options = args.property_options()?;
    let runner = SuiteRunner::new(RunnerConfig {
        concurrency: args.concurrency,
    });

    println!("\nprobe compare");
    println!("  Model A: {model_a}");
    println!("  Model B: {model_b}\n");

    let mut suites = Vec::with_capacity(2);
    for model in [model_a, model_b] {
        let provider = get_provider(model, &ProviderConfig::default())
            .with_context(|| format!("failed to set up provider {model}"))?;
        // Fresh properties per model so both see the same typo stream.
        let props = build_properties(&names, &options)?;
        info!(model = %model, "testing model");
        suites.push(runner.run(provider, &items, &props).await);
    }
    METRICS.flush();

    // Compare on result names (negation → negation_coherence).
    let result_names: Vec<&'static str> = build_properties(&names, &options)?
        .iter()
        .map(|p| p.name())
        .collect();
    let threshold = args.threshold.unwrap_or(0.8);
    let comparison = compare_suites(&suites[0], &suites[1], &result_names, threshold);

    print!("{}", render_comparison(&comparison));
    if let Some(path) = output {
        let content = serde_json::to_string_pretty(&comparison).context("serialize comparison")?;
        std::fs::write(path, content).with_context(|| format!("failed to write {:?}", path))?;
        println!("Comparison exported to {}", path.display());
    }
    Ok(true)
}

fn cmd_list_properties() -> Result<bool> {
    println!("\nAvailable Properties:\n");
    for name in PROPERTY_NAMES {
        println!("  {name} - {}", describe(name)?);
    }
    println!();
    Ok(true)
}

fn cmd_list_inputs(inputs: &Path) -> Result<bool> {
    let items =
        load_inputs(inputs).with_context(|| format!("failed to read inputs from {:?}", inputs))?;
    println!("\nTest Cases ({})\n", inputs.display());
    println!("  {:>4}  {:<70} {:>6}", "#", "INPUT", "LENGTH");
    for (i, item) in items.iter().enumerate() {
        println!("  {:>4}  {:<70} {:>6}", i + 1, item, item.chars().count());
    }
    println!("\n  {} total test cases\n", items.len());
    Ok(true)
}

fn cmd_init(output: &Path, force: bool) -> Result<bool> {
    if output.exists() && !force {
        bail!(
            "file {:?} already exists; pass --force to overwrite",
            output
        );
    }
    std::fs::write(output, STARTER_INPUTS)
        .with_context(|| format!("failed to write {:?}", output))?;

    println!("\nCreated {}", output.display());
    println!("   Edit it to add your own test cases, then run:\n");
    println!(
        "   probe run --model ollama:llama3.2 --inputs {} -p consistency\n",
        output.display()
    );
    Ok(true)
}
