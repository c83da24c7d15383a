//! Candidate tool records as emitted by Pub2Tools.
//!
//! Pub2Tools exports are loosely shaped: urls and tags may hold non-strings,
//! `homepage` may be a string, an object or a list, and legacy status keys
//! come in several spellings. Deserialization is therefore lenient for those
//! fields, and everything not modeled here is carried through `extra` so the
//! payload builder can hand original registry fields back untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::utils::text::truncate_error;

/// Homepage fetch outcome: an HTTP status code, or one of the closed set of
/// failure labels assigned by the scraper.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HomepageStatus {
    Code(u16),
    Label(String),
}

impl HomepageStatus {
    pub fn as_code(&self) -> Option<u16> {
        match self {
            Self::Code(code) => Some(*code),
            Self::Label(_) => None,
        }
    }
}

impl std::fmt::Display for HomepageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

impl<'de> Deserialize<'de> for HomepageStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(coerce_status(&value).unwrap_or(HomepageStatus::Label(String::new())))
    }
}

fn coerce_status(value: &Value) -> Option<HomepageStatus> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|i| u16::try_from(i).ok())
            .map(HomepageStatus::Code),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<u16>() {
                Ok(code) => Some(HomepageStatus::Code(code)),
                Err(_) => Some(HomepageStatus::Label(trimmed.to_string())),
            }
        }
        Value::Bool(b) => Some(HomepageStatus::Code(u16::from(*b))),
        _ => None,
    }
}

/// One documentation link; scraped entries get `type: ["Documentation"]`,
/// entries carried in from Pub2Tools keep whatever extra keys they had.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocLink {
    pub url: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
    #[serde(flatten, default)]
    pub extra: Map<String, Value>,
}

impl DocLink {
    pub fn scraped(url: String) -> Self {
        Self {
            url,
            types: Some(vec!["Documentation".to_string()]),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Candidate {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "de_opt_string")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "de_opt_string")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "de_opt_string")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "de_homepage")]
    pub homepage: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "de_string_seq")]
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "de_string_seq")]
    pub tags: Vec<String>,

    // EDAM annotations; kept verbatim for the payload, mined for tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub publication: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "de_string_seq")]
    pub publication_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "de_opt_string")]
    pub published_at: Option<String>,

    // Scrape artifacts.
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "de_doc_links")]
    pub documentation: Vec<DocLink>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "de_opt_string")]
    pub repository: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "de_string_seq")]
    pub documentation_keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage_status: Option<HomepageStatus>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "de_opt_string")]
    pub homepage_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage_scraped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "de_opt_string")]
    pub homepage_filtered_url: Option<String>,

    // Literature artifacts.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "de_opt_string")]
    pub publication_abstract: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "de_opt_string")]
    pub publication_full_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "de_opt_string")]
    pub publication_full_text_url: Option<String>,

    /// Everything else from the Pub2Tools export, carried through verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Candidate {
    /// Title with `name` fallback, trimmed; empty when neither is usable.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(self.name.as_deref())
            .unwrap_or("")
    }

    /// Stable identifier for report keying; Pub2Tools exports use several
    /// spellings.
    pub fn candidate_id(&self) -> String {
        for key in ["id", "tool_id", "biotools_id", "biotoolsID", "identifier"] {
            if let Some(value) = self.extra.get(key)
                && let Some(text) = value_to_string(value)
            {
                return text;
            }
        }
        String::new()
    }

    /// Homepage selected for scoring: the explicit homepage when present,
    /// otherwise the first http(s) URL among the alternates.
    pub fn selected_homepage(&self) -> String {
        self.homepage
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .or_else(|| primary_homepage(&self.urls))
            .unwrap_or_default()
    }

    /// All candidate homepage URLs in preference order (explicit homepage
    /// first, then alternates), http(s)-only and deduplicated.
    pub fn homepage_candidates(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut urls = Vec::new();
        let mut add = |raw: &str| {
            let url = normalize_url(raw);
            if (url.starts_with("http://") || url.starts_with("https://"))
                && seen.insert(url.clone())
            {
                urls.push(url);
            }
        };
        if let Some(home) = self.homepage.as_deref() {
            add(home);
        }
        for url in &self.urls {
            add(url);
        }
        urls
    }

    /// `kind:value` identifier strings extracted from the publication
    /// records, in pmcid -> pmid -> doi priority per record, first-seen
    /// deduplicated.
    pub fn publication_identifiers(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for pub_record in &self.publication {
            let Some(map) = pub_record.as_object() else {
                continue;
            };
            let lower: Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone()))
                .collect();
            for key in ["pmcid", "pmid", "doi"] {
                if let Some(value) = lower.get(key).and_then(value_to_string) {
                    let tag = format!("{key}:{value}");
                    if seen.insert(tag.to_lowercase()) {
                        out.push(tag);
                    }
                }
            }
        }
        out
    }

    /// Extend `publication_ids` preserving order; uniqueness is
    /// case-insensitive, output casing is first-seen.
    pub fn extend_publication_ids<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen: std::collections::HashSet<String> = self
            .publication_ids
            .iter()
            .map(|id| id.to_lowercase())
            .collect();
        for id in ids {
            let id = id.trim().to_string();
            if !id.is_empty() && seen.insert(id.to_lowercase()) {
                self.publication_ids.push(id);
            }
        }
    }

    /// Merge EDAM `term`/`label`/`name` strings from the ontology fields and
    /// every function I/O port into `tags`, first-seen order, lowercase
    /// uniqueness.
    pub fn merge_edam_tags(&mut self) {
        let mut seen: std::collections::HashSet<String> = self
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .collect();
        let mut tags: Vec<String> = self
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let mut add = |term: String| {
            let key = term.to_lowercase();
            if !seen.contains(&key) {
                seen.insert(key);
                tags.push(term);
            }
        };

        for field in [&self.topic, &self.data, &self.operation, &self.format] {
            if let Some(value) = field {
                for term in collect_terms(value) {
                    add(term);
                }
            }
        }

        if let Some(functions) = self.function.as_ref().and_then(Value::as_array) {
            for func in functions {
                let Some(func) = func.as_object() else {
                    continue;
                };
                if let Some(op) = func.get("operation") {
                    for term in collect_terms(op) {
                        add(term);
                    }
                }
                for port_key in ["input", "output"] {
                    let Some(ports) = func.get(port_key).and_then(Value::as_array) else {
                        continue;
                    };
                    for port in ports {
                        let Some(port) = port.as_object() else {
                            continue;
                        };
                        for field in ["data", "format"] {
                            if let Some(value) = port.get(field) {
                                for term in collect_terms(value) {
                                    add(term);
                                }
                            }
                        }
                    }
                }
            }
        }

        self.tags = tags;
    }

    /// Pull homepage telemetry out of the legacy key spellings Pub2Tools has
    /// used over time, coercing numeric-string statuses to codes.
    pub fn normalize_homepage_metadata(&mut self) {
        if self.homepage_status.is_none() {
            for key in [
                "homepageStatus",
                "homepage_status_code",
                "homepageStatusCode",
                "urlStatus",
                "url_status",
                "urlStatusCode",
                "status_code",
                "statusCode",
            ] {
                if let Some(value) = self.extra.get(key)
                    && let Some(status) = coerce_status(value)
                {
                    self.homepage_status = Some(status);
                    break;
                }
            }
        }
        if self.homepage_error.is_none() {
            for key in [
                "homepageError",
                "urlError",
                "homepage_error_message",
                "homepageMessage",
                "url_error",
            ] {
                if let Some(text) = self.extra.get(key).and_then(value_to_string) {
                    self.homepage_error = Some(truncate_error(&text, 140));
                    break;
                }
            }
        }
        if self.homepage_filtered_url.is_none() {
            for key in ["homepageFilteredUrl", "homepage_filteredUrl", "urlFiltered"] {
                if let Some(text) = self.extra.get(key).and_then(value_to_string) {
                    self.homepage_filtered_url = Some(text);
                    break;
                }
            }
        }
    }

    /// Merge scraped documentation URLs, keeping existing entries first and
    /// preserving first-seen URL uniqueness.
    pub fn merge_documentation<I>(&mut self, new_urls: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen: std::collections::HashSet<String> = self
            .documentation
            .iter()
            .map(|doc| doc.url.clone())
            .collect();
        for url in new_urls {
            let url = url.trim().to_string();
            if !url.is_empty() && seen.insert(url.clone()) {
                self.documentation.push(DocLink::scraped(url));
            }
        }
    }
}

/// Rewrite protocol-relative URLs and trim whitespace.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    if let Some(rest) = trimmed.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        trimmed.to_string()
    }
}

/// First alternate URL with an http(s) scheme, after normalization.
pub fn primary_homepage(urls: &[String]) -> Option<String> {
    urls.iter()
        .map(|u| normalize_url(u))
        .find(|u| u.starts_with("http://") || u.starts_with("https://"))
}

fn collect_terms(value: &Value) -> Vec<String> {
    let mut terms = Vec::new();
    match value {
        Value::Object(map) => {
            for key in ["term", "label", "name"] {
                if let Some(term) = map.get(key).and_then(Value::as_str) {
                    let term = term.trim();
                    if !term.is_empty() {
                        terms.push(term.to_string());
                        break;
                    }
                }
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() {
                terms.push(s.to_string());
            }
        }
        Value::Array(items) => {
            for item in items {
                terms.extend(collect_terms(item));
            }
        }
        _ => {}
    }
    terms
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn de_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_string))
}

fn de_string_seq<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.iter().filter_map(value_to_string).collect(),
        Some(other) => value_to_string(&other).into_iter().collect(),
        None => Vec::new(),
    })
}

fn homepage_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(_) => value_to_string(value),
        Value::Object(map) => ["url", "link", "href"]
            .iter()
            .find_map(|key| map.get(*key).and_then(value_to_string)),
        Value::Array(items) => items.iter().find_map(homepage_from_value),
        _ => None,
    }
}

fn de_homepage<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(homepage_from_value))
}

fn de_doc_links<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<DocLink>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    let items = match value {
        Some(Value::Array(items)) => items,
        Some(other) => vec![other],
        None => Vec::new(),
    };

    let mut seen = std::collections::HashSet::new();
    let mut docs = Vec::new();
    for item in items {
        let doc = match item {
            Value::String(url) => {
                let url = url.trim().to_string();
                if url.is_empty() {
                    continue;
                }
                DocLink {
                    url,
                    types: None,
                    extra: Map::new(),
                }
            }
            Value::Object(map) => {
                let Some(url) = map.get("url").and_then(value_to_string) else {
                    continue;
                };
                let types = match map.get("type") {
                    Some(Value::Array(items)) => {
                        Some(items.iter().filter_map(value_to_string).collect())
                    }
                    Some(Value::String(s)) => Some(vec![s.clone()]),
                    _ => None,
                };
                let extra = map
                    .into_iter()
                    .filter(|(k, _)| k.as_str() != "url" && k.as_str() != "type")
                    .collect();
                DocLink { url, types, extra }
            }
            _ => continue,
        };
        if seen.insert(doc.url.clone()) {
            docs.push(doc);
        }
    }
    Ok(docs)
}
