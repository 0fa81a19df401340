//! # Agentic Docs CLI (`adocs`)
//!
//! ## Usage
//!
//! ```bash
//! adocs --config ./adocs.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `adocs index` | Extract symbols and print them |
//! | `adocs generate` | Document every changed or new symbol |
//! | `adocs tools list` | List the tools available to the reasoning loop |
//! | `adocs tools run <name> <input>` | Invoke one tool and print its observation |
//!
//! Logging goes to stderr and is filtered with `RUST_LOG`. Progress also
//! goes to stderr; stdout carries only command output.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use agentic_docs::config::{self, Config};
use agentic_docs::indexer::SymbolIndexer;
use agentic_docs::orchestrator::{self, shutdown_on, Orchestrator, RunSummary};
use agentic_docs::progress::{ProgressEvent, ProgressMode, ProgressReporter};
use agentic_docs::tools::ToolRegistry;

const DEFAULT_CONFIG: &str = "./adocs.toml";

/// Agentic Docs: retrieval-augmented API documentation for Python sources.
#[derive(Parser)]
#[command(name = "adocs", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When the default file is absent, built-in defaults are used.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Progress output on stderr: `off`, `human` or `json`.
    /// Defaults to `human` on a terminal and `off` otherwise.
    #[arg(long, global = true, value_parser = ["off", "human", "json"])]
    progress: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract symbols from the source tree and print them.
    Index {
        /// Print one JSON object per symbol instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Generate documentation sections.
    Generate {
        /// Skip symbols whose section hash matches the current source.
        #[arg(long)]
        changed_only: bool,

        /// Index and list what would be generated, without embedding,
        /// model calls or writes.
        #[arg(long)]
        dry_run: bool,

        /// Analyze through the tool-using reasoning loop.
        #[arg(long)]
        agentic: bool,

        /// Override `generation.workers`.
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Inspect and exercise the reasoning-loop tools.
    Tools {
        #[command(subcommand)]
        action: ToolsAction,
    },
}

#[derive(Subcommand)]
enum ToolsAction {
    /// List registered tools and their descriptions.
    List,
    /// Invoke one tool with a single string input.
    Run { name: String, input: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("agentic_docs=info,adocs=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let allow_missing = cli.config == Path::new(DEFAULT_CONFIG);
    let mut cfg = config::load_or_default(&cli.config, allow_missing)?;

    let progress: Arc<dyn ProgressReporter> = Arc::from(progress_mode(cli.progress.as_deref()).reporter());

    match cli.command {
        Commands::Index { json } => run_index(&cfg, json, progress.as_ref()).await?,
        Commands::Generate {
            changed_only,
            dry_run,
            agentic,
            workers,
        } => {
            cfg.generation.changed_only |= changed_only;
            cfg.generation.agentic |= agentic;
            if let Some(workers) = workers {
                cfg.generation.workers = workers;
            }
            cfg.validate()?;

            if dry_run {
                run_dry(&cfg).await?;
            } else {
                let orchestrator = Orchestrator::new(cfg, progress).await?;
                let summary = orchestrator
                    .run_until(shutdown_on(tokio::signal::ctrl_c()))
                    .await?;
                print_summary(&summary);
            }
        }
        Commands::Tools { action } => {
            let registry = ToolRegistry::with_builtins(&cfg.paths.root);
            match action {
                ToolsAction::List => {
                    for (name, description) in registry.describe() {
                        println!("{:<16} {}", name, description);
                    }
                }
                ToolsAction::Run { name, input } => {
                    let outcome = registry.invoke(&name, &input).await;
                    if outcome.is_error() {
                        bail!("{}", outcome.observation());
                    }
                    println!("{}", outcome.observation());
                }
            }
        }
    }

    Ok(())
}

fn progress_mode(flag: Option<&str>) -> ProgressMode {
    match flag {
        Some("off") => ProgressMode::Off,
        Some("human") => ProgressMode::Human,
        Some("json") => ProgressMode::Json,
        _ => ProgressMode::default_for_tty(),
    }
}

async fn run_index(cfg: &Config, json: bool, progress: &dyn ProgressReporter) -> Result<()> {
    let indexer_cfg = cfg.clone();
    let output =
        tokio::task::spawn_blocking(move || SymbolIndexer::from_config(&indexer_cfg)?.index()).await??;

    progress.report(ProgressEvent::Indexed {
        files: output.report.files_indexed,
        skipped: output.report.files_skipped,
        symbols: output.symbols.len(),
    });

    for symbol in &output.symbols {
        if json {
            println!("{}", serde_json::to_string(symbol)?);
        } else {
            println!(
                "{:<8} {:<48} {}:{}-{}",
                symbol.kind.as_str(), symbol.symbol_id, symbol.file, symbol.start, symbol.end
            );
        }
    }
    Ok(())
}

async fn run_dry(cfg: &Config) -> Result<()> {
    let plan = orchestrator::plan(cfg).await?;
    for symbol in &plan.candidates {
        println!("{:<8} {}", symbol.kind.as_str(), symbol.symbol_id);
    }
    println!(
        "dry run: {} files ({} skipped), {} symbols, {} to generate, {} unchanged",
        plan.index.report.files_indexed,
        plan.index.report.files_skipped,
        plan.index.symbols.len(),
        plan.candidates.len(),
        plan.unchanged
    );
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{} files ({} skipped), {} symbols, {} candidates",
        summary.files_indexed, summary.files_skipped, summary.symbols, summary.candidates
    );
    println!(
        "created {}, appended {}, replaced {}, unchanged {}, failed {}{}",
        summary.created,
        summary.appended,
        summary.replaced,
        summary.unchanged,
        summary.failed,
        if summary.interrupted { " (interrupted)" } else { "" }
    );
}
