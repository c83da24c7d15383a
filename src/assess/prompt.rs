//! Scoring prompt assembly.
//!
//! Placeholder substitution is substring-only: each recognized `{field}`
//! token is replaced literally, and every other brace in the template (the
//! `{0, 0.5, 1}` value set, the JSON example) passes through untouched.

use crate::entities::candidate::Candidate;

/// JSON schema describing the required scoring response; embedded into the
/// prompt via the `{json_schema}` placeholder.
pub const JSON_RESPONSE_SCHEMA: &str = r#"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "type": "object",
  "required": [
    "tool_name",
    "homepage",
    "publication_ids",
    "bio_subscores",
    "documentation_subscores",
    "confidence_score",
    "concise_description",
    "rationale"
  ],
  "additionalProperties": false,
  "properties": {
    "tool_name": {"type": "string"},
    "homepage": {"type": "string"},
    "publication_ids": {
      "type": "array",
      "items": {"type": "string"}
    },
    "bio_subscores": {
      "type": "object",
      "required": ["A1", "A2", "A3", "A4", "A5"],
      "properties": {
        "A1": {"type": "number"},
        "A2": {"type": "number"},
        "A3": {"type": "number"},
        "A4": {"type": "number"},
        "A5": {"type": "number"}
      },
      "additionalProperties": {"type": "number"}
    },
    "documentation_subscores": {
      "type": "object",
      "required": ["B1", "B2", "B3", "B4", "B5"],
      "properties": {
        "B1": {"type": "number"},
        "B2": {"type": "number"},
        "B3": {"type": "number"},
        "B4": {"type": "number"},
        "B5": {"type": "number"}
      },
      "additionalProperties": {"type": "number"}
    },
    "confidence_score": {
      "type": "number",
      "minimum": 0,
      "maximum": 1
    },
    "concise_description": {"type": "string"},
    "rationale": {"type": "string"}
  }
}"#;

pub struct PromptBuilder {
    template: String,
}

impl PromptBuilder {
    pub fn new(template: String) -> Self {
        Self { template }
    }

    /// Render the scoring prompt for a candidate.
    pub fn build(&self, candidate: &Candidate) -> String {
        let documentation = candidate
            .documentation
            .iter()
            .map(|doc| doc.url.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let keywords = if candidate.documentation_keywords.is_empty() {
            "None".to_string()
        } else {
            candidate.documentation_keywords.join(", ")
        };
        let full_text = candidate
            .publication_full_text
            .as_deref()
            .or(candidate.publication_full_text_url.as_deref())
            .unwrap_or("");

        let fields: &[(&str, String)] = &[
            ("title", candidate.title.clone().unwrap_or_default()),
            (
                "description",
                candidate.description.clone().unwrap_or_default(),
            ),
            ("homepage", candidate.homepage.clone().unwrap_or_default()),
            (
                "homepage_status",
                candidate
                    .homepage_status
                    .as_ref()
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
            ),
            (
                "homepage_error",
                candidate.homepage_error.clone().unwrap_or_default(),
            ),
            ("documentation", documentation),
            ("documentation_keywords", keywords),
            (
                "repository",
                candidate.repository.clone().unwrap_or_default(),
            ),
            ("tags", candidate.tags.join(", ")),
            (
                "published_at",
                candidate.published_at.clone().unwrap_or_default(),
            ),
            (
                "publication_abstract",
                candidate.publication_abstract.clone().unwrap_or_default(),
            ),
            ("publication_full_text", full_text.to_string()),
            ("publication_ids", candidate.publication_ids.join(", ")),
            ("json_schema", JSON_RESPONSE_SCHEMA.to_string()),
        ];

        fill_template(&self.template, fields)
    }

    /// Base prompt plus the fixed repair preface and the prior attempt's
    /// validation errors.
    pub fn augment(base_prompt: &str, errors: &[String]) -> String {
        let bullet_list = errors
            .iter()
            .map(|error| format!("- {error}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "{base_prompt}\n\n\
             The previous response did not validate against the JSON schema because:\n\
             {bullet_list}\n\
             Respond again with a corrected JSON object that satisfies every rule."
        )
    }

    /// Provenance labels for the fields that actually fed the prompt, in a
    /// fixed order.
    pub fn origin_types(candidate: &Candidate) -> Vec<String> {
        let entries: &[(&str, bool)] = &[
            ("title", has_text(candidate.title.as_deref())),
            ("description", has_text(candidate.description.as_deref())),
            ("homepage", has_text(candidate.homepage.as_deref())),
            ("documentation", !candidate.documentation.is_empty()),
            ("repository", has_text(candidate.repository.as_deref())),
            ("tags", candidate.tags.iter().any(|t| !t.trim().is_empty())),
            ("publication", has_text(candidate.published_at.as_deref())),
            (
                "publication_abstract",
                has_text(candidate.publication_abstract.as_deref()),
            ),
            (
                "publication_full_text",
                has_text(candidate.publication_full_text.as_deref()),
            ),
            (
                "publication_full_text_url",
                has_text(candidate.publication_full_text_url.as_deref()),
            ),
            (
                "publication_ids",
                candidate.publication_ids.iter().any(|p| !p.trim().is_empty()),
            ),
        ];
        entries
            .iter()
            .filter(|(_, present)| *present)
            .map(|(label, _)| (*label).to_string())
            .collect()
    }
}

fn has_text(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Replace each `{key}` occurrence literally; unknown braces are preserved.
fn fill_template(template: &str, fields: &[(&str, String)]) -> String {
    let mut result = template.to_string();
    for (key, value) in fields {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate() -> Candidate {
        serde_json::from_value(json!({
            "title": "SpecTool",
            "description": "Aligns reads",
            "homepage": "https://tool.example",
            "homepage_status": 200,
            "tags": ["genomics"],
            "documentation": [{"url": "https://tool.example/docs"}],
            "documentation_keywords": ["docs", "install"],
            "publication_ids": ["pmid:12345"],
            "publication_abstract": "An abstract."
        }))
        .unwrap()
    }

    #[test]
    fn fill_preserves_unrecognized_braces() {
        let out = fill_template(
            "score in {0, 0.5, 1} for {title}",
            &[("title", "X".to_string())],
        );
        assert_eq!(out, "score in {0, 0.5, 1} for X");
    }

    #[test]
    fn build_substitutes_candidate_fields() {
        let builder = PromptBuilder::new(
            "T={title} S={homepage_status} D={documentation} K={documentation_keywords} \
             F={publication_full_text} I={publication_ids}"
                .to_string(),
        );
        let prompt = builder.build(&candidate());
        assert!(prompt.contains("T=SpecTool"));
        assert!(prompt.contains("S=200"));
        assert!(prompt.contains("D=https://tool.example/docs"));
        assert!(prompt.contains("K=docs, install"));
        assert!(prompt.contains("I=pmid:12345"));
    }

    #[test]
    fn full_text_placeholder_falls_back_to_url() {
        let mut c = candidate();
        c.publication_full_text = None;
        c.publication_full_text_url = Some("https://pmc.example/full".to_string());
        let builder = PromptBuilder::new("F={publication_full_text}".to_string());
        assert_eq!(builder.build(&c), "F=https://pmc.example/full");
    }

    #[test]
    fn keywords_placeholder_defaults_to_none() {
        let mut c = candidate();
        c.documentation_keywords.clear();
        let builder = PromptBuilder::new("K={documentation_keywords}".to_string());
        assert_eq!(builder.build(&c), "K=None");
    }

    #[test]
    fn augment_lists_errors_as_bullets() {
        let augmented = PromptBuilder::augment(
            "BASE",
            &["missing field 'tool_name'".to_string(), "bad B5".to_string()],
        );
        assert!(augmented.starts_with("BASE\n\n"));
        assert!(augmented.contains("did not validate against the JSON schema because:"));
        assert!(augmented.contains("- missing field 'tool_name'"));
        assert!(augmented.contains("- bad B5"));
        assert!(augmented.ends_with("satisfies every rule."));
    }

    #[test]
    fn origin_types_lists_present_fields_in_order() {
        let origins = PromptBuilder::origin_types(&candidate());
        assert_eq!(
            origins,
            vec![
                "title",
                "description",
                "homepage",
                "documentation",
                "tags",
                "publication_abstract",
                "publication_ids"
            ]
        );
    }
}
