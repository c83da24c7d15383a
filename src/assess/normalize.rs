//! Coercion and aggregation of validated model responses.
//!
//! The model occasionally returns numbers as strings, subscores as
//! comma-separated lists, or JSON-encoded containers; everything funnels
//! through this layer so downstream code only ever sees a `ScoreRecord`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::entities::candidate::Candidate;
use crate::entities::score::{ModelParams, ScoreRecord};
use crate::enrich::is_probable_publication_url;

const BIO_KEYS: [&str; 5] = ["A1", "A2", "A3", "A4", "A5"];
const DOC_KEYS: [&str; 5] = ["B1", "B2", "B3", "B4", "B5"];

const BIO_RESPONSE_KEYS: [&str; 3] = ["bio_subscores", "bio_subcriteria", "bio_components"];
const DOC_RESPONSE_KEYS: [&str; 3] = [
    "documentation_subscores",
    "documentation_subcriteria",
    "documentation_components",
];

const DOC_WEIGHTS: [(&str, f64); 5] = [
    ("B1", 2.0),
    ("B2", 1.0),
    ("B3", 1.0),
    ("B4", 1.0),
    ("B5", 2.0),
];

pub fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 1.0)
}

/// Number, or a string that parses as one after trimming.
pub fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Build the full score record from a schema-valid response.
pub fn normalize_response(
    response: &Value,
    candidate: &Candidate,
    model: &str,
    model_params: ModelParams,
    origin_types: Vec<String>,
) -> ScoreRecord {
    let (bio_score, bio_breakdown) = score_from_response(response, &BIO_RESPONSE_KEYS, &BIO_KEYS);
    let (doc_raw, doc_breakdown, doc_present) =
        doc_score_from_response(response, &DOC_RESPONSE_KEYS, &DOC_KEYS);
    let documentation_score = if doc_present {
        weighted_documentation_score(&doc_breakdown)
    } else {
        clamp_score(doc_raw)
    };

    ScoreRecord {
        tool_name: tool_name(response, candidate),
        homepage: scored_homepage(response, candidate),
        publication_ids: publication_ids(response, candidate),
        bio_subscores: bio_breakdown,
        documentation_subscores: doc_breakdown,
        bio_score,
        documentation_score,
        documentation_score_raw: (doc_raw != documentation_score).then_some(doc_raw),
        confidence_score: clamp_score(
            response
                .get("confidence_score")
                .and_then(coerce_float)
                .unwrap_or(0.0),
        ),
        concise_description: string_field(response, "concise_description"),
        rationale: string_field(response, "rationale"),
        model: model.to_string(),
        model_params,
        origin_types,
    }
}

fn string_field(response: &Value, field: &str) -> String {
    response
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn tool_name(response: &Value, candidate: &Candidate) -> String {
    let from_response = string_field(response, "tool_name");
    if !from_response.is_empty() {
        return from_response;
    }
    candidate
        .title
        .clone()
        .or_else(|| candidate.name.clone())
        .unwrap_or_default()
}

/// Scoring output homepage: the model's value wins unless it is empty or a
/// probable publication URL, in which case the candidate's own non-publication
/// homepage is used. The result is never a publication URL.
fn scored_homepage(response: &Value, candidate: &Candidate) -> String {
    let from_response = response
        .get("homepage")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("");
    if !from_response.is_empty() && !is_probable_publication_url(from_response) {
        return from_response.to_string();
    }
    candidate_scoring_homepage(candidate)
}

/// The candidate's best non-publication homepage.
pub fn candidate_scoring_homepage(candidate: &Candidate) -> String {
    if let Some(homepage) = candidate.homepage.as_deref() {
        let homepage = homepage.trim();
        if !homepage.is_empty() && !is_probable_publication_url(homepage) {
            return homepage.to_string();
        }
    }
    for url in &candidate.urls {
        let url = crate::entities::candidate::normalize_url(url);
        if url.is_empty() || is_probable_publication_url(&url) {
            continue;
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return url;
        }
    }
    String::new()
}

fn publication_ids(response: &Value, candidate: &Candidate) -> Vec<String> {
    let mut ids: Vec<String> = match response.get("publication_ids") {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            }
        }
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    if ids.is_empty() {
        ids = candidate
            .publication_ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
    }
    ids
}

/// Containers arrive as objects, lists, or strings holding either JSON or a
/// `1,0.5,0` style list.
fn coerce_subscore_container(raw: &Value) -> Option<Value> {
    match raw {
        Value::Null => None,
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            if text.starts_with('{') || text.starts_with('[') {
                return serde_json::from_str(text).ok();
            }
            let normalized = text.replace(';', ",");
            let parts: Vec<&str> = normalized
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            if parts.len() < 2 {
                return None;
            }
            let floats: Vec<f64> = parts
                .iter()
                .filter_map(|p| p.parse::<f64>().ok())
                .collect();
            (floats.len() == parts.len()).then(|| {
                Value::Array(floats.into_iter().map(|f| serde_json::json!(f)).collect())
            })
        }
        other => Some(other.clone()),
    }
}

enum Subscores {
    Map(Vec<(String, f64)>),
    List(Vec<f64>),
}

fn normalize_subscores(raw: &Value) -> Option<Subscores> {
    let container = coerce_subscore_container(raw)?;
    match container {
        Value::Object(map) => {
            let entries: Vec<(String, f64)> = map
                .iter()
                .filter_map(|(key, value)| coerce_float(value).map(|num| (key.clone(), num)))
                .collect();
            (!entries.is_empty()).then_some(Subscores::Map(entries))
        }
        Value::Array(items) => {
            let values: Vec<f64> = items.iter().filter_map(coerce_float).collect();
            (!values.is_empty()).then_some(Subscores::List(values))
        }
        _ => None,
    }
}

/// Canonical keys first (missing ones default to 0.0), then any extra
/// coercible keys from a map container.
fn canonicalize(subscores: &Subscores, canonical: &[&str]) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();
    match subscores {
        Subscores::Map(entries) => {
            for key in canonical {
                let value = entries
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| *v)
                    .unwrap_or(0.0);
                out.insert((*key).to_string(), value);
            }
            for (key, value) in entries {
                out.entry(key.clone()).or_insert(*value);
            }
        }
        Subscores::List(values) => {
            for (idx, key) in canonical.iter().enumerate() {
                out.insert((*key).to_string(), values.get(idx).copied().unwrap_or(0.0));
            }
        }
    }
    out
}

fn zeroed(canonical: &[&str]) -> BTreeMap<String, f64> {
    canonical
        .iter()
        .map(|key| ((*key).to_string(), 0.0))
        .collect()
}

fn mean(breakdown: &BTreeMap<String, f64>) -> f64 {
    if breakdown.is_empty() {
        return 0.0;
    }
    breakdown.values().sum::<f64>() / breakdown.len() as f64
}

/// Find the first usable subscore container among the accepted response keys
/// and return (clamped mean, canonical breakdown).
fn score_from_response(
    response: &Value,
    response_keys: &[&str],
    canonical: &[&str],
) -> (f64, BTreeMap<String, f64>) {
    let (score, breakdown, _) = doc_score_from_response(response, response_keys, canonical);
    (clamp_score(score), breakdown)
}

fn doc_score_from_response(
    response: &Value,
    response_keys: &[&str],
    canonical: &[&str],
) -> (f64, BTreeMap<String, f64>, bool) {
    for key in response_keys {
        let Some(raw) = response.get(*key) else {
            continue;
        };
        let Some(normalized) = normalize_subscores(raw) else {
            continue;
        };
        let breakdown = canonicalize(&normalized, canonical);
        return (clamp_score(mean(&breakdown)), breakdown, true);
    }
    (0.0, zeroed(canonical), false)
}

/// Weighted documentation mean: B1 and B5 carry double weight, total 7.
pub fn weighted_documentation_score(breakdown: &BTreeMap<String, f64>) -> f64 {
    let denominator: f64 = DOC_WEIGHTS.iter().map(|(_, w)| w).sum();
    let numerator: f64 = DOC_WEIGHTS
        .iter()
        .map(|(key, weight)| clamp_score(breakdown.get(*key).copied().unwrap_or(0.0)) * weight)
        .sum();
    clamp_score(numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate() -> Candidate {
        serde_json::from_value(json!({
            "title": "SpecTool",
            "homepage": "https://tool.example",
            "urls": ["https://doi.org/10.1000/x", "https://alt.example"],
            "publication_ids": ["pmid:12345"]
        }))
        .unwrap()
    }

    fn record_for(response: Value) -> ScoreRecord {
        normalize_response(
            &response,
            &candidate(),
            "llama3.2",
            ModelParams {
                attempts: 1,
                ..ModelParams::default()
            },
            vec!["title".to_string()],
        )
    }

    #[test]
    fn coerce_float_accepts_numeric_strings() {
        assert_eq!(coerce_float(&json!(0.5)), Some(0.5));
        assert_eq!(coerce_float(&json!(" 0.5 ")), Some(0.5));
        assert_eq!(coerce_float(&json!("half")), None);
        assert_eq!(coerce_float(&json!(null)), None);
    }

    #[test]
    fn documentation_weighting_matches_the_rubric() {
        // {B1:1, B5:1} -> (2 + 2) / 7
        let breakdown: BTreeMap<String, f64> = [
            ("B1".to_string(), 1.0),
            ("B2".to_string(), 0.0),
            ("B3".to_string(), 0.0),
            ("B4".to_string(), 0.0),
            ("B5".to_string(), 1.0),
        ]
        .into();
        let score = weighted_documentation_score(&breakdown);
        assert!((score - 4.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn subscores_coerce_from_strings_and_lists() {
        let record = record_for(json!({
            "bio_subscores": {"A1": "1", "A2": "0.5", "A3": 0, "A4": 0, "A5": 0},
            "documentation_subscores": "1,0.5,0,0,1",
            "confidence_score": "0.7",
            "tool_name": "X",
            "homepage": "",
            "publication_ids": [],
            "concise_description": "",
            "rationale": ""
        }));
        assert_eq!(record.bio_subscores["A1"], 1.0);
        assert_eq!(record.bio_subscores["A2"], 0.5);
        assert_eq!(record.documentation_subscores["B1"], 1.0);
        assert_eq!(record.documentation_subscores["B5"], 1.0);
        assert_eq!(record.confidence_score, 0.7);
        // bio mean = 1.5 / 5
        assert!((record.bio_score - 0.3).abs() < 1e-9);
        // weighted doc = (2 + 0.5 + 2) / 7
        assert!((record.documentation_score - 4.5 / 7.0).abs() < 1e-9);
        assert!(record.documentation_score_raw.is_some());
    }

    #[test]
    fn missing_subscores_default_to_zero() {
        let record = record_for(json!({"tool_name": "X"}));
        assert_eq!(record.bio_score, 0.0);
        assert_eq!(record.documentation_score, 0.0);
        assert_eq!(record.bio_subscores.len(), 5);
        assert!(record.bio_subscores.values().all(|v| *v == 0.0));
    }

    #[test]
    fn homepage_prefers_model_but_never_a_publication_url() {
        let record = record_for(json!({"homepage": "https://model.example"}));
        assert_eq!(record.homepage, "https://model.example");

        let record = record_for(json!({"homepage": "https://doi.org/10.1000/y"}));
        assert_eq!(record.homepage, "https://tool.example");

        let mut filtered = candidate();
        filtered.homepage = Some("https://doi.org/10.1000/z".to_string());
        let record = normalize_response(
            &json!({"homepage": ""}),
            &filtered,
            "m",
            ModelParams::default(),
            Vec::new(),
        );
        assert_eq!(record.homepage, "https://alt.example");
    }

    #[test]
    fn publication_ids_fall_back_to_candidate() {
        let record = record_for(json!({"publication_ids": []}));
        assert_eq!(record.publication_ids, vec!["pmid:12345"]);

        let record = record_for(json!({"publication_ids": ["DOI:10.1/z", "  "]}));
        assert_eq!(record.publication_ids, vec!["DOI:10.1/z"]);
    }

    #[test]
    fn confidence_is_clamped() {
        let record = record_for(json!({"confidence_score": 7.0}));
        assert_eq!(record.confidence_score, 1.0);
        let record = record_for(json!({"confidence_score": -1.0}));
        assert_eq!(record.confidence_score, 0.0);
    }
}
