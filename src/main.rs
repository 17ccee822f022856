//! nodezator-rs - command line entry point
//!
//! Runs, checks and inspects node documents without the editor.

use anyhow::{Context, Result};
use clap::Parser;
use nodezator_rs::{
    config::{app_data_dir, AppState, Settings},
    document::{DocumentStore, SwapChoice, SwapResolver},
    execution::{ExecutionEngine, ExecutionPlanner, NodeStatus, SkipReason},
    iter_errors, iter_stdout, NodeId, NodeLibrary, NodePackRef,
};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Load a document and execute it
    Run {
        document: PathBuf,

        /// Node id to execute along with its dependencies; repeatable
        #[clap(long = "trigger", value_name = "ID")]
        triggers: Vec<u32>,

        /// Print the full report as JSON
        #[clap(long)]
        json: bool,
    },
    /// Load a document and print its execution plan
    Check { document: PathBuf },
    /// Load node packs and list the scripts they provide
    Packs {
        #[clap(required = true)]
        dirs: Vec<PathBuf>,
    },
}

/// Asks on the terminal which version of a document to keep
struct StdinSwapResolver;

impl SwapResolver for StdinSwapResolver {
    fn resolve(&self, original: &Path, swap: &Path) -> SwapChoice {
        eprint!(
            "{} has unsaved changes in {}.\nLoad [o]riginal or [s]wap? ",
            original.display(),
            swap.display()
        );
        let _ = std::io::stderr().flush();

        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return SwapChoice::Original;
        }
        match answer.trim().to_lowercase().as_str() {
            "s" | "swap" => SwapChoice::Swap,
            _ => SwapChoice::Original,
        }
    }
}

/// Returns the file writer guard, which must live until exit
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let (file_layer, guard) = match app_data_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir.join("logs"), "nodezator-rs.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,nodezator_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let _guard = init_logging();

    let settings = Settings::load_or_default();
    let mut library = NodeLibrary::with_settings(&settings);
    let store = DocumentStore::new(settings.persistence.clone());

    match args.cmd {
        Command::Run {
            document,
            triggers,
            json,
        } => {
            let graph = store
                .open(&document, &mut library, &StdinSwapResolver)
                .with_context(|| format!("Failed to open {}", document.display()))?;
            remember(&document);

            let triggers: Vec<NodeId> = triggers.into_iter().map(NodeId).collect();
            let engine = ExecutionEngine::new(settings.execution.clone());
            let report = engine.execute(&graph, Some(&triggers))?;
            store.close(&document)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for line in iter_stdout(&report) {
                    println!("{}", line);
                }
                for (id, status) in &report.results {
                    let label = graph.node(*id).map(|n| n.label()).unwrap_or_default();
                    println!("{:>6}  {:<24} {}", id.to_string(), label, status_text(status));
                }
                for error in iter_errors(&report) {
                    eprintln!("{}", error);
                    for frame in &error.traceback {
                        eprintln!("    {}", frame);
                    }
                }
                println!(
                    "{} ({} nodes, {}us)",
                    report.aggregate,
                    report.results.len(),
                    report.duration_us
                );
            }

            Ok(if report.is_passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Check { document } => {
            let graph = store
                .load(&document, &mut library)
                .with_context(|| format!("Failed to load {}", document.display()))?;
            let plan = ExecutionPlanner::plan(&graph, None)?;

            for (step, id) in plan.order.iter().enumerate() {
                let label = graph.node(*id).map(|n| n.label()).unwrap_or_default();
                println!("{:>4}. {:>6}  {}", step + 1, id.to_string(), label);
            }
            println!(
                "{} of {} nodes planned from {} triggers",
                plan.stats.planned_nodes, plan.stats.total_nodes, plan.stats.trigger_count
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Packs { dirs } => {
            for dir in dirs {
                let scripts = library
                    .load_pack(&NodePackRef::Local(dir.clone()))
                    .with_context(|| format!("Failed to load node pack {}", dir.display()))?;
                println!("{} ({} scripts)", dir.display(), scripts.len());
                for id in scripts {
                    println!("  {}", id);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn status_text(status: &NodeStatus) -> String {
    match status {
        NodeStatus::Passed => "executed".to_string(),
        NodeStatus::Errored => "errored".to_string(),
        NodeStatus::Skipped(SkipReason::UpstreamFailed { node }) => {
            format!("skipped, {} did not pass", node)
        }
        NodeStatus::Skipped(SkipReason::Cancelled) => "skipped, cancelled".to_string(),
    }
}

fn remember(document: &Path) {
    let mut state = AppState::load_or_default();
    state.add_recent_file(document);
    if let Err(e) = state.save() {
        tracing::warn!("Failed to update recent files: {}", e);
    }
}
