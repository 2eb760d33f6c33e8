use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rootsense::{Rootsense, init_logging, insert_document};
use rootsense_application::{ReiOutcome, RunStatus};
use rootsense_domain::Collection;

#[derive(Parser)]
#[command(name = "rootsense", about = "System monitoring pipeline and resource efficiency scoring")]
struct Cli {
    /// Config file (defaults to $HOME/.rootsense/config.yaml)
    #[arg(long, global = true, env = "ROOTSENSE_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch every configured worker once and wait for the bounded ones
    Run,
    /// Compute and store the resource efficiency index
    Rei,
    /// Render the performance summary and send it to every channel
    Notify,
    /// Print the performance summary without sending it
    Summary,
    /// Insert a JSON document into a collection
    Insert {
        /// system_stats, predictions, root_cause or rei
        collection: Collection,

        /// Read the document from a file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let app = match Rootsense::load(cli.config) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("rootsense: {err:#}");
            return ExitCode::from(2);
        }
    };
    if let Err(err) = init_logging(&app.config.logging) {
        eprintln!("rootsense: {err:#}");
    }

    match execute(&app, cli.command).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn execute(app: &Rootsense, command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Run => {
            let mut orchestrator = app.orchestrator()?;
            let report = match orchestrator.run_once().await {
                Ok(report) => report,
                Err(err) => {
                    tracing::error!(error = %err, "invalid pipeline configuration");
                    return Ok(ExitCode::from(2));
                }
            };
            for failure in &report.service_failures {
                tracing::warn!(service = %failure.name, reason = %failure.reason, "service skipped");
            }
            match report.status() {
                RunStatus::AllSucceeded => Ok(ExitCode::SUCCESS),
                RunStatus::Failed(workers) => {
                    tracing::error!(?workers, "pipeline run had failures");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Rei => {
            match app.rei_engine()?.run().await? {
                ReiOutcome::Persisted {
                    record,
                    computation,
                } => {
                    for ratio in &computation.ratios {
                        println!(
                            "{}: actual {} / predicted {} = {:.2}% ({})",
                            ratio.metric,
                            ratio.actual,
                            ratio.predicted,
                            ratio.ratio,
                            ratio.insight()
                        );
                    }
                    println!(
                        "Overall REI: {:.2}% ({})",
                        record.overall_score, record.overall_insight
                    );
                }
                ReiOutcome::InsufficientData { .. } => {
                    println!("Insufficient data to calculate REI.");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Notify => {
            app.notifier()?.run().await.into_result()?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Summary => {
            let summary = app.notifier()?.collect().await;
            println!("{}", summary.render());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Insert { collection, file } => {
            let raw = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => {
                    let mut raw = String::new();
                    std::io::stdin()
                        .read_to_string(&mut raw)
                        .context("failed to read document from stdin")?;
                    raw
                }
            };
            let store = app.store()?;
            let id = insert_document(store.as_ref(), collection, &raw).await?;
            println!("{id}");
            Ok(ExitCode::SUCCESS)
        }
    }
}
