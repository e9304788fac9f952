#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use itertools::Itertools;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use caseolap::config::{DEFAULT_TOP_N, RunConfig};
use caseolap::export::{ExportOptions, export_run};
use caseolap::io::load_inputs;
use caseolap::{ExecutionMode, ScoringRun, score_corpus};

#[derive(Parser)]
#[command(
    name = "caseolap",
    about = "CaseOLAP scoring of entity-category associations",
    long_about = "Computes popularity, distinctiveness and combined CaseOLAP scores for every \
                 entity in every category of a categorized, entity-annotated publication corpus."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a corpus and write the score tables
    #[command(about = "Compute CaseOLAP scores (outputs: popularity.tsv, distinctiveness.tsv, caseolap.tsv)")]
    Score(ScoreArgs),

    /// Display version information
    #[command(about = "Display version information")]
    Version,
}

#[derive(Args)]
struct ScoreArgs {
    /// Run configuration file (.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Comma-separated category names, in output column order
    #[arg(
        long,
        value_delimiter = ',',
        conflicts_with = "config",
        requires_all = ["category_publications", "mentions"]
    )]
    categories: Vec<String>,

    /// JSON file mapping each category to its publication identifiers
    #[arg(long, value_name = "PATH", conflicts_with = "config")]
    category_publications: Option<PathBuf>,

    /// Publication mention counts (nested JSON or long-format TSV)
    #[arg(long, value_name = "PATH", conflicts_with = "config")]
    mentions: Option<PathBuf>,

    /// Output directory; overrides the configuration
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Process categories on all cores
    #[arg(long)]
    parallel: bool,

    /// Replace existing output files
    #[arg(long)]
    force: bool,

    /// Number of top entities per category to report
    #[arg(long, value_name = "N")]
    top_n: Option<usize>,
}

/// A fully resolved score invocation, whichever way it was specified.
struct ScorePlan {
    categories: Vec<String>,
    category_publications: PathBuf,
    mentions: PathBuf,
    output: PathBuf,
    mode: ExecutionMode,
    top_n: usize,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Score(args)) => run_score(args),
        Some(Commands::Version) => {
            println!("caseolap {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => {
            Cli::command().print_help().expect("print help");
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn resolve_plan(args: &ScoreArgs) -> Result<ScorePlan, Box<dyn std::error::Error>> {
    let mut plan = match &args.config {
        Some(path) => {
            let config = RunConfig::load(path)?;
            ScorePlan {
                mode: config.execution_mode(),
                top_n: config.top_n,
                categories: config.categories,
                category_publications: config.input.category_publications,
                mentions: config.input.publication_mentions,
                output: config.output.directory,
            }
        }
        None => {
            let (Some(category_publications), Some(mentions)) =
                (&args.category_publications, &args.mentions)
            else {
                return Err(
                    "Either --config or --categories with --category-publications and --mentions is required."
                        .into(),
                );
            };
            if args.categories.is_empty() {
                return Err("--categories must name at least one category.".into());
            }
            ScorePlan {
                categories: args.categories.clone(),
                category_publications: category_publications.clone(),
                mentions: mentions.clone(),
                output: PathBuf::from("result"),
                mode: ExecutionMode::Sequential,
                top_n: DEFAULT_TOP_N,
            }
        }
    };

    if let Some(output) = &args.output {
        plan.output = output.clone();
    }
    if args.parallel {
        plan.mode = ExecutionMode::Parallel;
    }
    if let Some(top_n) = args.top_n {
        if top_n == 0 {
            return Err("--top-n must be at least 1.".into());
        }
        plan.top_n = top_n;
    }
    Ok(plan)
}

fn run_score(args: ScoreArgs) -> Result<(), Box<dyn std::error::Error>> {
    let overall_start = Instant::now();
    let plan = resolve_plan(&args)?;

    let inputs = load_inputs(
        plan.categories.clone(),
        &plan.category_publications,
        &plan.mentions,
    )?;
    let run = score_corpus(&inputs, plan.mode)?;

    let options = ExportOptions {
        overwrite: args.force,
        top_n: plan.top_n,
    };
    let written = export_run(&run, &plan.output, &options)?;

    print_top_entities(&run, plan.top_n);
    println!(
        "Wrote {} files to {} in {:.2?}",
        written.len(),
        plan.output.display(),
        overall_start.elapsed()
    );
    Ok(())
}

fn print_top_entities(run: &ScoringRun, top_n: usize) {
    for category in run.scores.categories().names() {
        let ranked = run
            .scores
            .top_entities(category, top_n)
            .unwrap_or_default();
        if ranked.is_empty() {
            println!("{category}: no scored entities");
            continue;
        }
        println!(
            "{category}: {}",
            ranked
                .iter()
                .map(|r| format!("{} ({:.4})", r.entity, r.score))
                .join(", ")
        );
    }
}
