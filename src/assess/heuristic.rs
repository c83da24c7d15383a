//! Deterministic fallback scoring, used when the model endpoint is down or a
//! candidate exhausts its schema retries.

use std::collections::BTreeMap;

use crate::assess::normalize::clamp_score;
use crate::entities::candidate::{Candidate, primary_homepage};
use crate::entities::score::{ModelParams, ScoreRecord};
use crate::utils::text::truncate_chars;

pub const HEURISTIC_MODEL: &str = "heuristic";
pub const HEURISTIC_RATIONALE: &str = "heuristic pre-LLM scoring";

const BIO_TITLE_KEYWORDS: [&str; 3] = ["gene", "genom", "bio"];
const BIO_TAGS: [&str; 4] = ["genomics", "bioinformatics", "proteomics", "metabolomics"];

/// Score a candidate without the model. Bio evidence comes from title and
/// tag keywords, documentation evidence from homepage presence; the output
/// carries the full Score-record shape so downstream code is oblivious.
pub fn heuristic_scores(candidate: &Candidate) -> ScoreRecord {
    let title = candidate.display_title().to_lowercase();
    let tags: Vec<String> = candidate.tags.iter().map(|t| t.to_lowercase()).collect();

    let bio_keyword_hit = BIO_TITLE_KEYWORDS
        .iter()
        .any(|keyword| title.contains(keyword))
        || BIO_TAGS.iter().any(|tag| tags.iter().any(|t| t == tag));
    let bio_score = if bio_keyword_hit { 0.8 } else { 0.4 };
    let documentation_score = if primary_homepage(&candidate.urls).is_some() {
        0.8
    } else {
        0.1
    };

    ScoreRecord {
        tool_name: candidate.display_title().to_string(),
        homepage: candidate.selected_homepage(),
        publication_ids: candidate.publication_ids.clone(),
        bio_subscores: zeroed(&["A1", "A2", "A3", "A4", "A5"]),
        documentation_subscores: zeroed(&["B1", "B2", "B3", "B4", "B5"]),
        bio_score: clamp_score(bio_score),
        documentation_score: clamp_score(documentation_score),
        documentation_score_raw: None,
        confidence_score: 0.0,
        concise_description: truncate_chars(
            candidate.description.as_deref().unwrap_or("").trim(),
            280,
        ),
        rationale: HEURISTIC_RATIONALE.to_string(),
        model: HEURISTIC_MODEL.to_string(),
        model_params: ModelParams::default(),
        origin_types: Vec::new(),
    }
}

fn zeroed(keys: &[&str]) -> BTreeMap<String, f64> {
    keys.iter().map(|key| ((*key).to_string(), 0.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assess::schema::validate_response;
    use serde_json::json;

    fn candidate(value: serde_json::Value) -> Candidate {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn bio_keywords_raise_the_bio_score() {
        let scored = heuristic_scores(&candidate(json!({"title": "GenomeAligner"})));
        assert_eq!(scored.bio_score, 0.8);

        let scored = heuristic_scores(&candidate(json!({
            "title": "Aligner",
            "tags": ["Proteomics"]
        })));
        assert_eq!(scored.bio_score, 0.8);

        let scored = heuristic_scores(&candidate(json!({"title": "ImageViewer"})));
        assert_eq!(scored.bio_score, 0.4);
    }

    #[test]
    fn documentation_score_follows_homepage_presence() {
        let scored = heuristic_scores(&candidate(json!({
            "title": "t",
            "urls": ["https://tool.example"]
        })));
        assert_eq!(scored.documentation_score, 0.8);

        let scored = heuristic_scores(&candidate(json!({"title": "t"})));
        assert_eq!(scored.documentation_score, 0.1);
    }

    #[test]
    fn description_is_truncated_to_280_chars() {
        let long = "d".repeat(400);
        let scored = heuristic_scores(&candidate(json!({"title": "t", "description": long})));
        assert_eq!(scored.concise_description.len(), 280);
    }

    #[test]
    fn heuristic_output_satisfies_the_response_validator() {
        let scored = heuristic_scores(&candidate(json!({
            "title": "GenomeAligner",
            "urls": ["https://tool.example"],
            "publication_ids": ["pmid:12345"]
        })));
        let as_response = json!({
            "tool_name": scored.tool_name,
            "homepage": scored.homepage,
            "publication_ids": scored.publication_ids,
            "bio_subscores": scored.bio_subscores,
            "documentation_subscores": scored.documentation_subscores,
            "confidence_score": scored.confidence_score,
            "concise_description": scored.concise_description,
            "rationale": scored.rationale,
        });
        assert!(validate_response(&as_response).is_empty());
        assert_eq!(scored.model, "heuristic");
    }
}
