//! bio.tools entry assembly and schema validation.
//!
//! Accepted candidates become registry entries: the three required fields
//! come from the score record (with candidate fallbacks), everything else is
//! carried through from the original Pub2Tools record, restricted to the
//! known bio.tools field set.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::entities::candidate::Candidate;
use crate::entities::score::ScoreRecord;

/// Optional bio.tools fields an entry may carry besides the required three.
pub const OPTIONAL_ENTRY_FIELDS: &[&str] = &[
    "biotoolsID",
    "biotoolsCURIE",
    "version",
    "otherID",
    "toolType",
    "topic",
    "operatingSystem",
    "language",
    "function",
    "link",
    "download",
    "documentation",
    "publication",
    "credit",
    "collectionID",
    "maturity",
    "cost",
    "accessibility",
    "elixirNode",
    "elixirCommunity",
    "relation",
];

const PUBLICATION_KEYS: &[&str] = &["pmcid", "pmid", "doi", "type", "note", "version"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEntry {
    pub name: String,
    pub description: String,
    pub homepage: String,
    #[serde(flatten, default)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPayload {
    pub version: String,
    pub entries: Vec<ToolEntry>,
}

/// An entry that failed schema validation, kept for the invalid report.
#[derive(Debug, Clone, Serialize)]
pub struct InvalidEntry {
    pub entry: ToolEntry,
    pub error: String,
}

impl ToolEntry {
    /// Human-readable schema errors; empty when the entry is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (label, value) in [
            ("name", &self.name),
            ("description", &self.description),
            ("homepage", &self.homepage),
        ] {
            if value.trim().is_empty() {
                errors.push(format!("field '{label}' must be a non-empty string"));
            }
        }

        if let Some(publications) = self.fields.get("publication") {
            match publications.as_array() {
                Some(items) => {
                    for (idx, item) in items.iter().enumerate() {
                        let Some(map) = item.as_object() else {
                            errors.push(format!("publication[{idx}] must be an object"));
                            continue;
                        };
                        for key in map.keys() {
                            if !PUBLICATION_KEYS.contains(&key.as_str()) {
                                errors.push(format!(
                                    "publication[{idx}] has unknown key '{key}'"
                                ));
                            }
                        }
                    }
                }
                None => errors.push("field 'publication' must be a list".to_string()),
            }
        }

        if let Some(documentation) = self.fields.get("documentation") {
            match documentation.as_array() {
                Some(items) => {
                    for (idx, item) in items.iter().enumerate() {
                        let url = item.get("url").and_then(Value::as_str).unwrap_or("");
                        if url.trim().is_empty() {
                            errors.push(format!(
                                "documentation[{idx}] must carry a non-empty 'url'"
                            ));
                        }
                        if let Some(types) = item.get("type")
                            && !types.is_array()
                        {
                            errors.push(format!(
                                "documentation[{idx}].type must be a list of strings"
                            ));
                        }
                    }
                }
                None => errors.push("field 'documentation' must be a list".to_string()),
            }
        }

        if let Some(topics) = self.fields.get("topic")
            && let Some(items) = topics.as_array()
        {
            for (idx, item) in items.iter().enumerate() {
                if item.get("term").and_then(Value::as_str).is_none() {
                    errors.push(format!("topic[{idx}] must carry a 'term'"));
                }
            }
        }

        errors
    }
}

/// Build the registry entry for an accepted candidate.
pub fn build_entry(
    candidate: &Candidate,
    scores: &ScoreRecord,
    selected_homepage: &str,
) -> ToolEntry {
    let name = non_empty(&scores.tool_name)
        .or_else(|| candidate.title.as_deref().and_then(non_empty_ref))
        .or_else(|| candidate.name.as_deref().and_then(non_empty_ref))
        .unwrap_or_else(|| "Unnamed Tool".to_string());

    let description = non_empty(&scores.concise_description)
        .or_else(|| candidate.description.as_deref().and_then(non_empty_ref))
        .unwrap_or_else(|| "Candidate tool from Pub2Tools".to_string());

    let homepage = resolve_homepage(candidate, scores, selected_homepage);

    let mut fields = carry_through_fields(candidate);

    let publication_ids = if scores.publication_ids.is_empty() {
        candidate.publication_ids.clone()
    } else {
        scores.publication_ids.clone()
    };
    if let Some(publication) = merge_publications(&candidate.publication, &publication_ids) {
        fields.insert("publication".to_string(), Value::Array(publication));
    } else {
        fields.remove("publication");
    }

    if !candidate.documentation.is_empty() {
        let docs: Vec<Value> = candidate
            .documentation
            .iter()
            .map(|doc| {
                let mut out = Map::new();
                out.insert("url".to_string(), json!(doc.url));
                let types = doc
                    .types
                    .clone()
                    .unwrap_or_else(|| vec!["Documentation".to_string()]);
                out.insert("type".to_string(), json!(types));
                for (key, value) in &doc.extra {
                    out.insert(key.clone(), value.clone());
                }
                Value::Object(out)
            })
            .collect();
        fields.insert("documentation".to_string(), Value::Array(docs));
    }

    if !homepage.is_empty() {
        let link = ensure_homepage_link(fields.get("link"), &homepage);
        fields.insert("link".to_string(), Value::Array(link));
    }

    ToolEntry {
        name,
        description,
        homepage,
        fields,
    }
}

fn carry_through_fields(candidate: &Candidate) -> Map<String, Value> {
    let mut fields = Map::new();
    for key in OPTIONAL_ENTRY_FIELDS {
        let value = match *key {
            "topic" => candidate.topic.clone(),
            "function" => candidate.function.clone(),
            "publication" if !candidate.publication.is_empty() => {
                Some(Value::Array(candidate.publication.clone()))
            }
            "publication" => None,
            _ => candidate.extra.get(*key).cloned(),
        };
        if let Some(value) = value
            && !value.is_null()
        {
            fields.insert((*key).to_string(), value);
        }
    }
    fields
}

fn resolve_homepage(candidate: &Candidate, scores: &ScoreRecord, selected: &str) -> String {
    for source in [
        scores.homepage.as_str(),
        selected,
        candidate.homepage.as_deref().unwrap_or(""),
    ] {
        let trimmed = source.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    for url in &candidate.urls {
        let url = url.trim();
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
    }
    String::new()
}

/// Normalize existing publication records to lowercase whitelisted keys, then
/// fold in scored `kind:value` identifier strings not already present.
fn merge_publications(existing: &[Value], identifiers: &[String]) -> Option<Vec<Value>> {
    let mut publications: Vec<Value> = Vec::new();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

    for record in existing {
        let Some(map) = record.as_object() else {
            continue;
        };
        let mut normalized = Map::new();
        for (key, value) in map {
            let key = key.to_lowercase();
            if PUBLICATION_KEYS.contains(&key.as_str()) && !value.is_null() {
                normalized.insert(key, value.clone());
            }
        }
        if normalized.is_empty() {
            continue;
        }
        for key in ["pmcid", "pmid", "doi"] {
            if let Some(value) = normalized.get(key).and_then(Value::as_str) {
                seen.insert(format!("{key}:{value}").to_lowercase());
            }
        }
        publications.push(Value::Object(normalized));
    }

    for identifier in identifiers {
        let Some((kind, value)) = identifier.split_once(':') else {
            continue;
        };
        let kind = kind.to_lowercase();
        if !["pmcid", "pmid", "doi"].contains(&kind.as_str()) || value.is_empty() {
            continue;
        }
        let tag = format!("{kind}:{value}").to_lowercase();
        if seen.insert(tag) {
            let mut record = Map::new();
            record.insert(kind, json!(value));
            publications.push(Value::Object(record));
        }
    }

    (!publications.is_empty()).then_some(publications)
}

fn ensure_homepage_link(links: Option<&Value>, homepage: &str) -> Vec<Value> {
    let mut out: Vec<Value> = links
        .and_then(Value::as_array)
        .map(|items| items.iter().filter(|v| v.is_object()).cloned().collect())
        .unwrap_or_default();
    let already_present = out
        .iter()
        .any(|entry| entry.get("url").and_then(Value::as_str) == Some(homepage));
    if !already_present {
        out.push(json!({"url": homepage, "type": ["Homepage"]}));
    }
    out
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn non_empty_ref(value: &str) -> Option<String> {
    non_empty(value)
}
