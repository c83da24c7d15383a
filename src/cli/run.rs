//! `run` subcommand flags.

use std::path::PathBuf;

use clap::Args;

use crate::pipeline::RunOptions;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Pub2Tools JSON export to process instead of invoking Pub2Tools
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Window start: ISO date or relative (7d, 2w, 12h)
    #[arg(long = "from-date", alias = "since")]
    pub from_date: Option<String>,
    /// Window end: ISO date or relative (defaults to now)
    #[arg(long = "to-date")]
    pub to_date: Option<String>,

    /// Combined acceptance threshold; overrides both configured minimums
    #[arg(long = "min-score")]
    pub min_score: Option<f64>,

    /// Process at most N candidates
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Write reports but skip the payload files
    #[arg(long)]
    pub dry_run: bool,

    /// Skip Pub2Tools, scraping, Europe PMC and the LLM (heuristic scoring)
    #[arg(long)]
    pub offline: bool,

    /// Reload the enriched-candidate cache and skip scraping/enrichment
    #[arg(long = "resume-from-enriched")]
    pub resume_from_enriched: bool,

    /// Payload output path
    #[arg(short, long, default_value = "out/exports/biotools_payload.json")]
    pub output: PathBuf,

    /// Decision report path (the CSV lands next to it)
    #[arg(short, long, default_value = "out/reports/assessment.jsonl")]
    pub report: PathBuf,

    /// Enriched-candidate cache path
    #[arg(long = "enriched-cache", default_value = "out/cache/enriched_candidates.json.gz")]
    pub enriched_cache: PathBuf,

    /// Ollama model name (default from config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Scoring worker pool size (default from config)
    #[arg(short, long)]
    pub concurrency: Option<usize>,
}

impl RunArgs {
    pub fn into_options(self) -> RunOptions {
        RunOptions {
            from_date: self.from_date,
            to_date: self.to_date,
            limit: self.limit,
            dry_run: self.dry_run,
            offline: self.offline,
            resume_from_enriched: self.resume_from_enriched,
            input: self.input,
            output: self.output,
            report: self.report,
            enriched_cache: self.enriched_cache,
            model: self.model,
            concurrency: self.concurrency,
            min_score: self.min_score,
        }
    }
}
