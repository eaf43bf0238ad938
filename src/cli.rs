//! Command line entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::classification::{AxiomExtractor, ClassificationPipeline, ClassifierResults};
use crate::config::Config;
use crate::errors::Error;
use crate::reasoner::TermFactory;
use crate::store::{InMemorySemanticStore, TerminologySnapshot};
use crate::{logger, Result};

#[derive(Parser)]
#[command(name = "termclass", about = "Classify concept definitions", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output (also respects NO_COLOR env var)
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a terminology snapshot, classify it and write inferred definitions
    Classify {
        /// Terminology snapshot in JSON
        #[arg(long, short = 's')]
        snapshot: PathBuf,

        /// Worker threads for the per-concept stages (defaults to all cores)
        #[arg(long, short = 'w')]
        workers: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check that every stated definition in a snapshot can be classified
    Validate {
        /// Terminology snapshot in JSON
        #[arg(long, short = 's')]
        snapshot: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    path.map_or_else(|| Ok(Config::default()), Config::from_file)
}

/// Parses the command line and runs the selected command.
///
/// # Errors
///
/// Returns the first error of the command.
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.no_color || std::env::var_os("NO_COLOR").is_some() {
        colored::control::set_override(false);
    }

    let mut config = load_config(cli.config.as_deref())?;
    logger::init(&config.logger)?;

    match cli.command {
        Commands::Classify {
            snapshot,
            workers,
            json,
        } => {
            if workers.is_some() {
                config.classifier.worker_threads = workers;
            }
            let results = classify(&config, &snapshot).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&results);
            }
        }
        Commands::Validate { snapshot } => validate(&snapshot)?,
    }
    Ok(())
}

async fn classify(config: &Config, snapshot: &Path) -> Result<ClassifierResults> {
    let snapshot = TerminologySnapshot::from_file(snapshot)?;
    let store = Arc::new(InMemorySemanticStore::new());
    let settings = &config.classifier;
    snapshot.load_into(store.as_ref(), &settings.patterns, &settings.stamp)?;

    let pipeline = ClassificationPipeline::from_settings(store, settings.clone())?;
    let cancellation = pipeline.cancellation_token();
    let results = tokio::select! {
        results = pipeline.run() => results?,
        _ = tokio::signal::ctrl_c() => {
            cancellation.cancel();
            return Err(Error::Message("classification interrupted".to_string()));
        }
    };
    Ok(results)
}

fn print_results(results: &ClassifierResults) {
    println!(
        "{} {} concepts with `{}` ({} axioms)",
        "classified".green().bold(),
        results.classified.len(),
        results.classifier,
        results.axiom_count
    );
    println!(
        "{} {} inferred definitions",
        "changed".cyan().bold(),
        results.changed.len()
    );
    for set in &results.equivalence_sets {
        let members = set.iter().map(ToString::to_string).collect::<Vec<_>>();
        println!("{} {}", "equivalent".cyan().bold(), members.join(" = "));
    }
    if results.integrity_errors > 0 {
        println!(
            "{} {} concepts skipped",
            "integrity:".red().bold(),
            results.integrity_errors
        );
    }
    for alert in &results.alerts {
        println!("{} {alert}", "alert:".yellow().bold());
    }
    println!(
        "{} transaction {} at {}",
        "committed".green().bold(),
        results.commit.transaction,
        results.commit.time
    );
}

fn validate(path: &Path) -> Result<()> {
    let snapshot = TerminologySnapshot::from_file(path)?;
    let factory = TermFactory::new();
    let extractor = AxiomExtractor::new(&factory);
    let mut failures = 0_usize;

    for concept in snapshot.concepts.iter().filter(|c| !c.stated.is_empty()) {
        let problems = match TerminologySnapshot::build_definition(&concept.stated) {
            Ok(expression) => {
                let mut problems = expression
                    .validate()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>();
                if problems.is_empty() {
                    if let Err(err) = extractor.extract(concept.nid, &expression) {
                        problems.push(err.to_string());
                    }
                }
                problems
            }
            Err(err) => vec![err.to_string()],
        };
        for problem in &problems {
            println!("{} concept {}: {problem}", "invalid".red().bold(), concept.nid);
        }
        failures += usize::from(!problems.is_empty());
    }

    if failures > 0 {
        return Err(Error::Message(format!(
            "{failures} of {} concepts have invalid definitions",
            snapshot.concepts.len()
        )));
    }
    println!(
        "{} {} concepts",
        "valid".green().bold(),
        snapshot.concepts.len()
    );
    Ok(())
}
