//! Top-level CLI parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;

pub mod health;
pub mod run;

#[derive(Parser, Debug)]
#[command(
    name = "biotools-annotate",
    about = "Enrich and score Pub2Tools candidates with a local LLM, and emit bio.tools-ready payloads",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config.yaml (default: ./config.yaml, or $BIOTOOLS_ANNOTATE_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the enrichment and scoring pipeline
    #[command(after_help = "\
EXAMPLES:
  biotools-annotate run --input out/pub2tools/to_biotools.json
  biotools-annotate run --from-date 7d --limit 50 --model llama3.2
  biotools-annotate run --input candidates.json --offline --dry-run
  biotools-annotate run --resume-from-enriched --min-score 0.5")]
    Run(run::RunArgs),
    /// Check Ollama and Europe PMC connectivity
    Health,
    /// Show version
    Version,
}

fn version_output() -> String {
    format!("biotools-annotate {}", env!("CARGO_PKG_VERSION"))
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Parse arguments, dispatch, and return the process exit code:
/// 0 success, 2 schema-invalid payload, 3 unhandled pipeline error.
pub async fn run_cli() -> i32 {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return 3;
        }
    };
    init_tracing(&config);

    match cli.command {
        Commands::Run(args) => {
            let cancel = CancellationToken::new();
            let signal_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Cancellation requested; draining workers");
                    signal_token.cancel();
                }
            });

            match crate::pipeline::execute_run(&config, args.into_options(), cancel).await {
                Ok(summary) if summary.invalid_entries > 0 => {
                    error!(
                        invalid = summary.invalid_entries,
                        "Payload validation failed; see the .invalid.json report"
                    );
                    2
                }
                Ok(_) => 0,
                Err(err) => {
                    error!(error = %err, "Pipeline run failed");
                    3
                }
            }
        }
        Commands::Health => {
            let report = health::check_all(&config).await;
            println!("{}", report.to_markdown());
            if report.all_healthy() { 0 } else { 1 }
        }
        Commands::Version => {
            println!("{}", version_output());
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::parse_from([
            "biotools-annotate",
            "run",
            "--input",
            "candidates.json",
            "--from-date",
            "7d",
            "--min-score",
            "0.5",
            "--limit",
            "10",
            "--offline",
            "--dry-run",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(
            args.input.as_deref(),
            Some(std::path::Path::new("candidates.json"))
        );
        assert_eq!(args.min_score, Some(0.5));
        assert_eq!(args.limit, Some(10));
        assert!(args.offline);
        assert!(args.dry_run);
    }
}
