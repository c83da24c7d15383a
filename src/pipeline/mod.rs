//! Pipeline orchestration: gather, dedup, enrich, score, output.
//!
//! Scraping/enrichment and scoring each run across a bounded worker pool of
//! `ollama.concurrency` tasks. Per-candidate state is owned by exactly one
//! worker; the caches inside the enricher are the only shared mutable state.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::assess::heuristic::heuristic_scores;
use crate::assess::scorer::Scorer;
use crate::config::Config;
use crate::enrich::europe_pmc::Enricher;
use crate::enrich::scraper::HomepageScraper;
use crate::entities::candidate::Candidate;
use crate::entities::score::{Decision, ScoreRecord, include_candidate};
use crate::entities::tool_entry::{InvalidEntry, ToolEntry, UploadPayload, build_entry};
use crate::error::AnnotateError;
use crate::ingest;
use crate::report;
use crate::utils::dates::parse_since;

pub const INPUT_ENV: &str = "BIOTOOLS_ANNOTATE_INPUT";

/// Options resolved from CLI flags; unset fields fall back to the config.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub limit: Option<usize>,
    pub dry_run: bool,
    pub offline: bool,
    pub resume_from_enriched: bool,
    pub input: Option<PathBuf>,
    pub output: PathBuf,
    pub report: PathBuf,
    pub enriched_cache: PathBuf,
    pub model: Option<String>,
    pub concurrency: Option<usize>,
    pub min_score: Option<f64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            from_date: None,
            to_date: None,
            limit: None,
            dry_run: false,
            offline: false,
            resume_from_enriched: false,
            input: None,
            output: PathBuf::from("out/exports/biotools_payload.json"),
            report: PathBuf::from("out/reports/assessment.jsonl"),
            enriched_cache: PathBuf::from("out/cache/enriched_candidates.json.gz"),
            model: None,
            concurrency: None,
            min_score: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub scored: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub llm_fallbacks: usize,
    pub health_fallback: bool,
    pub invalid_entries: usize,
}

/// Execute a full pipeline run. Partial results are flushed even when the
/// cancellation token fires mid-run.
pub async fn execute_run(
    config: &Config,
    options: RunOptions,
    cancel: CancellationToken,
) -> Result<RunSummary, AnnotateError> {
    let concurrency = options
        .concurrency
        .unwrap_or(config.ollama.concurrency)
        .max(1);
    let (min_bio, min_documentation) = match options.min_score {
        Some(combined) => (combined, combined),
        None => config.pipeline.thresholds(),
    };
    let dry_run = options.dry_run || config.pipeline.dry_run;
    let resume_from_enriched =
        options.resume_from_enriched || config.pipeline.resume_from_enriched;

    info!("[Step 1/5] GATHER - Pub2Tools candidates or cached input");
    let mut candidates =
        gather_candidates(config, &options, resume_from_enriched).await;

    info!(
        "[Step 2/5] DEDUP - filtering {} candidates",
        candidates.len()
    );
    let since = match options.from_date.as_deref() {
        Some(value) => Some(parse_since(value)?),
        None => None,
    };
    candidates = ingest::filter_and_normalize(candidates, since);
    info!(kept = candidates.len(), "DEDUP complete");

    if !candidates.is_empty()
        && !resume_from_enriched
        && let Err(err) = ingest::save_enriched_cache(&candidates, &options.enriched_cache)
    {
        warn!(error = %err, "Failed to write enriched cache");
    }

    if let Some(limit) = options.limit.or(config.pipeline.limit) {
        candidates.truncate(limit);
        info!(remaining = candidates.len(), "LIMIT applied");
    }

    info!("[Step 3/5] ENRICH - homepage and publication evidence");
    if !options.offline && !resume_from_enriched && !candidates.is_empty() {
        candidates = enrich_candidates(config, candidates, concurrency, &cancel).await?;
    } else if !candidates.is_empty() {
        let reason = if options.offline { "offline mode" } else { "cache reuse" };
        info!("ENRICH skipped - {reason}");
    }

    info!(
        "[Step 4/5] SCORE - {} candidates at concurrency {}",
        candidates.len(),
        concurrency
    );
    let scored = score_candidates(
        config,
        &options,
        candidates,
        concurrency,
        min_bio,
        min_documentation,
        &cancel,
    )
    .await?;

    let mut summary = RunSummary {
        scored: scored.decisions.len(),
        accepted: scored.accepted.len(),
        rejected: scored.decisions.len().saturating_sub(scored.accepted.len()),
        llm_fallbacks: scored.llm_fallbacks,
        health_fallback: scored.health_fallback,
        invalid_entries: 0,
    };
    info!(
        scored = summary.scored,
        accepted = summary.accepted,
        rejected = summary.rejected,
        llm_fallbacks = summary.llm_fallbacks,
        llm_health_fail = summary.health_fallback,
        "SUMMARY"
    );

    info!("[Step 5/5] OUTPUT - reports and bio.tools payload");
    report::write_jsonl(&options.report, &scored.decisions)?;
    let report_csv = options.report.with_extension("csv");
    report::write_csv(&report_csv, &scored.decisions)?;
    info!(report = %options.report.display(), csv = %report_csv.display(), "Reports written");

    let mut valid_entries: Vec<ToolEntry> = Vec::new();
    let mut invalid_entries: Vec<InvalidEntry> = Vec::new();
    for (candidate, scores, homepage) in &scored.accepted {
        let entry = build_entry(candidate, scores, homepage);
        let errors = entry.validate();
        if errors.is_empty() {
            valid_entries.push(entry);
        } else {
            invalid_entries.push(InvalidEntry {
                entry,
                error: errors.join("; "),
            });
        }
    }
    summary.invalid_entries = invalid_entries.len();

    if !dry_run {
        let payload = UploadPayload {
            version: config
                .pipeline
                .payload_version
                .clone()
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            entries: valid_entries,
        };
        report::write_payload(&options.output, &payload)?;
        info!(payload = %options.output.display(), entries = payload.entries.len(), "Payload written");
    }

    if !invalid_entries.is_empty() {
        let invalid_path = report::invalid_path(&options.output);
        report::write_invalid(&invalid_path, &invalid_entries)?;
        warn!(
            count = invalid_entries.len(),
            path = %invalid_path.display(),
            "Payload validation failed for some entries"
        );
    }

    Ok(summary)
}

async fn gather_candidates(
    config: &Config,
    options: &RunOptions,
    resume_from_enriched: bool,
) -> Vec<Candidate> {
    if resume_from_enriched {
        match ingest::load_enriched_cache(&options.enriched_cache) {
            Ok(candidates) => {
                info!(
                    count = candidates.len(),
                    cache = %options.enriched_cache.display(),
                    "Resumed from enriched cache"
                );
                return candidates;
            }
            Err(err) => {
                warn!(error = %err, "Enriched cache resume failed; falling back to fresh ingestion");
            }
        }
    }

    let input = options
        .input
        .clone()
        .or_else(|| config.pipeline.input_path.clone())
        .or_else(|| std::env::var(INPUT_ENV).ok().map(PathBuf::from));
    if let Some(path) = input {
        let candidates = ingest::load_candidates(&path);
        info!(count = candidates.len(), input = %path.display(), "Loaded candidates from input file");
        return candidates;
    }

    if options.offline {
        info!("Offline mode without input file; no candidates to process");
        return Vec::new();
    }

    let from = options
        .from_date
        .clone()
        .unwrap_or_else(|| config.pipeline.from_date.clone());
    let to = options
        .to_date
        .clone()
        .or_else(|| config.pipeline.to_date.clone());
    let from_dt = match parse_since(&from) {
        Ok(dt) => dt,
        Err(err) => {
            warn!(from = %from, error = %err, "Unparseable date window; skipping Pub2Tools fetch");
            return Vec::new();
        }
    };
    let to_dt = to
        .as_deref()
        .and_then(|value| parse_since(value).ok())
        .unwrap_or_else(time::OffsetDateTime::now_utc);

    match ingest::pub2tools::fetch_via_cli(
        &config.pub2tools,
        from_dt,
        to_dt,
        &PathBuf::from("out/pub2tools"),
    )
    .await
    {
        Ok(candidates) => {
            info!(count = candidates.len(), "Fetched candidates via Pub2Tools");
            candidates
        }
        Err(err) => {
            warn!(error = %err, "Pub2Tools fetch failed");
            Vec::new()
        }
    }
}

/// Scrape homepages and pull Europe PMC evidence, one worker per candidate.
async fn enrich_candidates(
    config: &Config,
    candidates: Vec<Candidate>,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Candidate>, AnnotateError> {
    let scraper = if config.enrichment.homepage.enabled {
        Some(Arc::new(HomepageScraper::new(
            config.enrichment.homepage.clone(),
        )?))
    } else {
        None
    };
    let enricher = if config.enrichment.europe_pmc.enabled {
        Some(Arc::new(Enricher::new(
            config.enrichment.europe_pmc.clone(),
        )?))
    } else {
        None
    };

    let total = candidates.len();
    let enriched: Vec<Candidate> = stream::iter(candidates)
        .map(|mut candidate| {
            let scraper = scraper.clone();
            let enricher = enricher.clone();
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return candidate;
                }
                if let Some(scraper) = &scraper {
                    scraper.scrape(&mut candidate).await;
                }
                if cancel.is_cancelled() {
                    return candidate;
                }
                if let Some(enricher) = &enricher {
                    enricher.enrich(&mut candidate).await;
                }
                candidate
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let scraped = enriched
        .iter()
        .filter(|c| c.homepage_scraped == Some(true))
        .count();
    info!(scraped, total, "ENRICH complete");
    Ok(enriched)
}

struct ScoredBatch {
    decisions: Vec<Decision>,
    accepted: Vec<(Candidate, ScoreRecord, String)>,
    llm_fallbacks: usize,
    health_fallback: bool,
}

async fn score_candidates(
    config: &Config,
    options: &RunOptions,
    candidates: Vec<Candidate>,
    concurrency: usize,
    min_bio: f64,
    min_documentation: f64,
    cancel: &CancellationToken,
) -> Result<ScoredBatch, AnnotateError> {
    let mut use_llm = !options.offline && !candidates.is_empty();
    let mut health_fallback = false;

    let scorer = if use_llm {
        let scorer = Arc::new(Scorer::new(config, options.model.clone())?);
        if let Err(err) = scorer.client().ping().await {
            warn!(
                error = %err,
                "LLM health check failed. Using heuristic scoring for this run; \
                 consider --offline if repeating."
            );
            use_llm = false;
            health_fallback = true;
        }
        Some(scorer)
    } else {
        None
    };
    let scorer = scorer.filter(|_| use_llm);

    let llm_fallbacks = Arc::new(AtomicUsize::new(0));
    let results: Vec<(Decision, Candidate, String, bool)> = stream::iter(candidates)
        .map(|candidate| {
            let scorer = scorer.clone();
            let fallbacks = Arc::clone(&llm_fallbacks);
            let cancel = cancel.clone();
            async move {
                score_one(candidate, scorer, fallbacks, cancel, min_bio, min_documentation).await
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut decisions = Vec::with_capacity(results.len());
    let mut accepted = Vec::new();
    for (decision, candidate, homepage, include) in results {
        if include {
            accepted.push((candidate, decision.scores.clone(), homepage));
        }
        decisions.push(decision);
    }

    Ok(ScoredBatch {
        decisions,
        accepted,
        llm_fallbacks: llm_fallbacks.load(Ordering::Relaxed),
        health_fallback,
    })
}

async fn score_one(
    mut candidate: Candidate,
    scorer: Option<Arc<Scorer>>,
    fallbacks: Arc<AtomicUsize>,
    cancel: CancellationToken,
    min_bio: f64,
    min_documentation: f64,
) -> (Decision, Candidate, String, bool) {
    let homepage = candidate.selected_homepage();
    if candidate.publication_ids.is_empty() {
        candidate.publication_ids = candidate.publication_identifiers();
    }

    let scores = match (&scorer, cancel.is_cancelled()) {
        (Some(scorer), false) => match scorer.score_candidate(&candidate).await {
            Ok(scores) => scores,
            Err(err) => {
                fallbacks.fetch_add(1, Ordering::Relaxed);
                warn!(
                    title = candidate.display_title(),
                    error = %err,
                    "LLM scoring failed; using heuristic backup"
                );
                heuristic_scores(&candidate)
            }
        },
        _ => heuristic_scores(&candidate),
    };

    let include = include_candidate(&scores, min_bio, min_documentation, !homepage.is_empty());
    let decision = Decision {
        id: candidate.candidate_id(),
        title: candidate.display_title().to_string(),
        homepage: homepage.clone(),
        publication_ids: candidate.publication_ids.clone(),
        scores,
        include,
    };
    (decision, candidate, homepage, include)
}
