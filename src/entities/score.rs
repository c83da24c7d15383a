//! Score records and per-candidate decisions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Retry diagnostics attached to every scored candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelParams {
    pub attempts: u32,
    pub schema_errors: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub prompt_augmented: bool,
}

/// Normalized scoring result, produced exactly once per candidate and never
/// mutated afterwards. The heuristic fallback emits the same shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub tool_name: String,
    pub homepage: String,
    pub publication_ids: Vec<String>,
    pub bio_subscores: BTreeMap<String, f64>,
    pub documentation_subscores: BTreeMap<String, f64>,
    pub bio_score: f64,
    pub documentation_score: f64,
    /// Unweighted documentation mean, kept only when it differs from the
    /// weighted score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation_score_raw: Option<f64>,
    pub confidence_score: f64,
    pub concise_description: String,
    pub rationale: String,
    pub model: String,
    pub model_params: ModelParams,
    pub origin_types: Vec<String>,
}

/// One decision-report row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub title: String,
    pub homepage: String,
    pub publication_ids: Vec<String>,
    pub scores: ScoreRecord,
    pub include: bool,
}

/// Inclusion predicate: both thresholds met and a homepage present.
pub fn include_candidate(
    scores: &ScoreRecord,
    min_bio: f64,
    min_documentation: f64,
    has_homepage: bool,
) -> bool {
    scores.bio_score >= min_bio
        && scores.documentation_score >= min_documentation
        && has_homepage
}
