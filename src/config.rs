//! YAML configuration with per-field defaults.
//!
//! Every section tolerates missing keys; an absent or unreadable file yields
//! the built-in defaults so the pipeline can run from a bare checkout.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AnnotateError;

pub const CONFIG_ENV: &str = "BIOTOOLS_ANNOTATE_CONFIG";

const DEFAULT_USER_AGENT: &str = concat!(
    "biotools-annotate/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/ELIXIR-Belgium/biotools-annotate)"
);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub enrichment: EnrichmentConfig,
    pub pipeline: PipelineConfig,
    pub pub2tools: Pub2ToolsConfig,
    pub logging: LoggingConfig,
    /// Scoring prompt template; substituted with substring-only placeholder
    /// replacement so literal braces in the rubric survive untouched.
    pub scoring_prompt_template: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
    /// Schema-repair retries on top of the first attempt; clamped to >= 0.
    pub schema_retries: i64,
    pub concurrency: usize,
    pub temperature: f64,
    pub top_p: f64,
    pub seed: Option<i64>,
    /// Per-generate-call timeout in seconds.
    pub timeout: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            schema_retries: 1,
            concurrency: 8,
            temperature: 0.05,
            top_p: 1.0,
            seed: None,
            timeout: 300,
        }
    }
}

impl OllamaConfig {
    pub fn schema_retries(&self) -> u32 {
        self.schema_retries.max(0) as u32
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub homepage: HomepageConfig,
    pub europe_pmc: EuropePmcConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HomepageConfig {
    pub enabled: bool,
    /// Scrape timeout in seconds, applied per request (root page and frames).
    pub timeout: u64,
    pub user_agent: String,
    /// Reject bodies larger than this many bytes.
    pub max_bytes: usize,
    /// Total frame fetch budget across the whole frame tree.
    pub max_frames: usize,
    pub max_frame_depth: usize,
}

impl Default for HomepageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: 8,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_bytes: 2_000_000,
            max_frames: 5,
            max_frame_depth: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EuropePmcConfig {
    pub enabled: bool,
    pub include_full_text: bool,
    pub max_publications: usize,
    pub max_full_text_chars: usize,
    pub timeout: u64,
}

impl Default for EuropePmcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_full_text: true,
            max_publications: 1,
            max_full_text_chars: 4000,
            timeout: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub min_bio_score: f64,
    pub min_documentation_score: f64,
    /// Legacy combined threshold; when set it overrides both minimums.
    pub min_score: Option<f64>,
    pub limit: Option<usize>,
    pub dry_run: bool,
    pub resume_from_enriched: bool,
    pub input_path: Option<PathBuf>,
    pub from_date: String,
    pub to_date: Option<String>,
    pub payload_version: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_bio_score: 0.6,
            min_documentation_score: 0.6,
            min_score: None,
            limit: None,
            dry_run: false,
            resume_from_enriched: false,
            input_path: None,
            from_date: "7d".to_string(),
            to_date: None,
            payload_version: None,
        }
    }
}

impl PipelineConfig {
    /// Effective thresholds: the legacy `min_score` overrides both.
    pub fn thresholds(&self) -> (f64, f64) {
        match self.min_score {
            Some(combined) => (combined, combined),
            None => (self.min_bio_score, self.min_documentation_score),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Pub2ToolsConfig {
    /// Command line used to invoke Pub2Tools (e.g. `java -jar pub2tools.jar`).
    pub p2t_cli: Option<String>,
    pub edam_owl: String,
    pub idf: String,
    pub idf_stemmed: String,
    pub custom_restriction: Option<String>,
    pub disable_tool_restriction: bool,
    pub timeout: u64,
    pub retry_limit: u32,
    pub fetcher_threads: u32,
}

impl Default for Pub2ToolsConfig {
    fn default() -> Self {
        Self {
            p2t_cli: None,
            edam_owl: "http://edamontology.org/EDAM.owl".to_string(),
            idf: "https://github.com/edamontology/edammap/raw/master/doc/biotools.idf".to_string(),
            idf_stemmed:
                "https://github.com/edamontology/edammap/raw/master/doc/biotools.stemmed.idf"
                    .to_string(),
            custom_restriction: Some("SRC:MED OR SRC:PMC".to_string()),
            disable_tool_restriction: true,
            timeout: 6000,
            retry_limit: 0,
            fetcher_threads: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Append-only request/response log for every model call.
    pub llm_log: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            llm_log: PathBuf::from("out/logs/ollama.log"),
        }
    }
}

impl Config {
    /// Load from an explicit path, the `BIOTOOLS_ANNOTATE_CONFIG` env var, or
    /// `./config.yaml`. A missing file is fine; a present-but-invalid file is
    /// a hard configuration error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, AnnotateError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("config.yaml"));

        let config = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_yaml::from_str::<Config>(&contents).map_err(|err| {
                AnnotateError::Config(format!("{}: {err}", path.display()))
            })?,
            Err(_) => Config::default(),
        };

        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(AnnotateError::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }

    /// Collect human-readable validation errors; empty on success.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if Url::parse(&self.ollama.host).is_err() {
            errors.push(format!("Invalid Ollama host URL: {}", self.ollama.host));
        }
        if self.ollama.concurrency == 0 {
            errors.push("Invalid concurrency value: 0 (must be positive)".to_string());
        }
        if self.ollama.concurrency > 32 {
            errors.push(format!(
                "Concurrency value {} may be too high (recommended: <=32)",
                self.ollama.concurrency
            ));
        }
        if self.enrichment.homepage.timeout == 0 {
            errors.push("Invalid timeout for homepage: 0 (must be positive)".to_string());
        }
        if self.enrichment.europe_pmc.timeout == 0 {
            errors.push("Invalid timeout for europe_pmc: 0 (must be positive)".to_string());
        }
        for (label, value) in [
            ("min_bio_score", self.pipeline.min_bio_score),
            (
                "min_documentation_score",
                self.pipeline.min_documentation_score,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("{label} must lie in [0, 1], got {value}"));
            }
        }

        errors
    }

    pub fn prompt_template(&self) -> &str {
        self.scoring_prompt_template
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_PROMPT_TEMPLATE)
    }
}

/// Default scoring rubric prompt. Placeholders are replaced by literal
/// substring substitution; all other braces (e.g. the `{0, 0.5, 1}` value
/// set) are part of the prompt text.
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"You are evaluating whether a software resource is worth getting registered in bio.tools, the registry for software resources in the life sciences.

Available material:

Title: {title}
Description: {description}
Homepage: {homepage}
Homepage status: {homepage_status}
Homepage error: {homepage_error}
Documentation links: {documentation}
Documentation keywords found on homepage: {documentation_keywords}
Repository: {repository}
Found keywords: {tags}
Published: {published_at}
Publication abstract: {publication_abstract}
Publication full text: {publication_full_text}
Known publication identifiers: {publication_ids}

Note: The documentation keywords and found keywords listed above were automatically mined from the homepage, papers, and other reference material. Treat the keywords as secondary hints, use the abstract/full_text as primary evidence when they contain concrete statements, and always cite the specific source (abstract, full_text, keyword) when referenced. When both abstract and full_text are present, prefer full_text > abstract > homepage/documentation > repository > keyword hints.

Decision context: Downstream acceptance requires the averaged bio score and the averaged documentation score to meet or exceed 0.5. Your scoring should therefore reject (keep scores below 0.5) any resource that fails the gating checklist or lacks solid evidence in either rubric group.

Gating checklist (apply before scoring):

Life-science scope — if the material does not clearly describe a life-science or biomedical purpose, set bio_subscores A1-A5 = 0, documentation_subscores B1-B5 = 0, confidence_score <= 0.2, and begin the rationale with "Rejected as bio.tools candidate because domain is non-bio".

Usable software deliverable — if the resource is only a dataset, publication, benchmark, ontology/specification, tutorial/course, or otherwise lacks a runnable interface (CLI with usage, installable package, container, web/desktop app, API, or executable workflow with steps), set A1-A5 = 0, B1-B5 = 0, confidence_score <= 0.2, and state "Rejected ... because no usable software deliverable".

Operational access & documentation — if the homepage status is >= 400, homepage_error is non-empty, or no explicit documentation artifacts are present, set all B-subscores to 0, mark each missing item as "insufficient evidence", and cap confidence_score at 0.3.

Task:
Assuming the resource passes the relevant gates, score every subcriterion using exactly one of {0, 0.5, 1}. Use only the provided material; do not invent facts or URLs. Award >=0.5 only when you can point to a specific artifact; award 1.0 only when there is corroboration from at least two distinct artifacts/sources.

Bio score rubric
A1 Biological intent stated (explicit life-science task/domain).
A2 Operations on biological data described.
A3 Software with biological data I/O (concrete datatypes/formats or endpoints named).
A4 Modality explicitly classifiable (database portal, desktop application, web application, web API, web service, SPARQL endpoint, command-line tool, workbench, suite, plug-in, workflow, library).
A5 Evidence of bio use (real-data examples or peer-reviewed/benchmark citation).

Documentation score rubric (subcriteria only; no overall score here)
B1 Documentation completeness — presence of a user-oriented guide or Usage:/--help.
B2 Installation pathways — package managers or containers or reproducible environment files.
B3 Reproducibility aids — versioned releases/tags/changelog/DOI and/or explicit commands or test data.
B4 Maintenance signal — recent release/commit, active issues/roadmap/news.
B5 Onboarding & support — FAQ/troubleshooting/contact/community/contributing.

Selection/normalization rules:

- Treat unreachable homepages (status >= 400 or any homepage_error text) as missing documentation and score every documentation subcriterion 0.
- Normalize publication identifiers to prefixes: DOI:..., PMID:..., PMCID:... and remove duplicates (case-insensitive).
- For any subcriterion scored 0 due to missing evidence, mention "insufficient evidence: <item>" in the rationale.

Do NOT compute aggregate scores; only fill the provided fields.
Do not output any value outside [0.0, 1.0].
Always emit every field in the output JSON exactly once.
Keep field names like `bio_subscores` and `documentation_subscores` exactly as spelled.
Emit ONLY the fields in the schema below. Use "" for unknown strings and [] if no publication identifiers are found. Do not output booleans/strings instead of numbers.

JSON schema describing the required output:
{json_schema}

Before replying, validate your draft against this schema. If the JSON does not pass validation, fix it and revalidate until it does. Output only the validated JSON; never include commentary or surrounding text.

Output: respond ONLY with a single JSON object shaped as:
{
"tool_name": "<derived display name>",
"homepage": "<best homepage URL>",
"publication_ids": ["DOI:...", "PMID:...", "PMCID:..."],
"bio_subscores": {"A1": <0|0.5|1>, "A2": <0|0.5|1>, "A3": <0|0.5|1>, "A4": <0|0.5|1>, "A5": <0|0.5|1>},
"documentation_subscores": {"B1": <0|0.5|1>, "B2": <0|0.5|1>, "B3": <0|0.5|1>, "B4": <0|0.5|1>, "B5": <0|0.5|1>},
"confidence_score": <0-1 numeric confidence>,
"concise_description": "<1-2 sentence rewritten summary>",
"rationale": "<2-5 sentences citing specific evidence for both score groups>"
}"#;
