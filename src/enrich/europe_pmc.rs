//! Europe PMC enrichment: attach publication abstracts and full text to
//! candidates.
//!
//! Lookup results are cached per run, keyed by `kind:identifier` (case
//! folded), so candidates sharing a publication cost one search call. The
//! caches live on the `Enricher` itself; `reset_caches` exists for tests.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, MutexGuard};

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::config::EuropePmcConfig;
use crate::entities::candidate::Candidate;
use crate::error::AnnotateError;
use crate::sources::europepmc::EuropePmcClient;
use crate::utils::text::{dedupe_preserve_order, normalize_whitespace};

static XML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

/// One cached search hit, reduced to the fields the pipeline consumes.
#[derive(Debug, Clone)]
pub struct PublicationRecord {
    pub abstract_text: Option<String>,
    pub pmcid: Option<String>,
    pub pmid: Option<String>,
    pub doi: Option<String>,
    pub full_text_urls: Vec<String>,
}

pub struct Enricher {
    client: EuropePmcClient,
    config: EuropePmcConfig,
    search_cache: Mutex<HashMap<String, PublicationRecord>>,
    full_text_cache: Mutex<HashMap<String, String>>,
}

impl Enricher {
    pub fn new(config: EuropePmcConfig) -> Result<Self, AnnotateError> {
        let client = EuropePmcClient::new(config.timeout)?;
        Ok(Self::with_client(config, client))
    }

    /// Enricher pinned to an explicit Europe PMC base URL.
    pub fn with_base(config: EuropePmcConfig, base: String) -> Result<Self, AnnotateError> {
        let client = EuropePmcClient::with_base(base, config.timeout)?;
        Ok(Self::with_client(config, client))
    }

    fn with_client(config: EuropePmcConfig, client: EuropePmcClient) -> Self {
        Self {
            client,
            config,
            search_cache: Mutex::new(HashMap::new()),
            full_text_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Drop all cached lookups.
    pub fn reset_caches(&self) {
        lock(&self.search_cache).clear();
        lock(&self.full_text_cache).clear();
    }

    /// Attach `publication_abstract`, `publication_full_text` (or its URL
    /// fallback) and extend `publication_ids`. Lookup failures are no-ops.
    pub async fn enrich(&self, candidate: &mut Candidate) {
        if !self.config.enabled || candidate.publication.is_empty() {
            return;
        }

        let max_publications = self.config.max_publications.max(1);
        let mut abstracts: Vec<String> = Vec::new();
        let mut full_texts: Vec<String> = Vec::new();
        let mut full_text_urls: Vec<String> = Vec::new();
        let mut collected_ids: Vec<String> = Vec::new();

        let publications: Vec<Value> = candidate
            .publication
            .iter()
            .filter(|p| p.is_object())
            .take(max_publications)
            .cloned()
            .collect();

        for publication in &publications {
            let identifiers = select_identifiers(publication);
            if identifiers.is_empty() {
                continue;
            }

            let mut record = None;
            for (value, kind) in &identifiers {
                record = self.fetch_record(value, kind).await;
                if record.is_some() {
                    break;
                }
            }
            let Some(record) = record else {
                continue;
            };

            collect_identifier_strings(&record, &mut collected_ids);
            let queried_pmcid = identifiers
                .iter()
                .find(|(_, kind)| *kind == "pmcid")
                .map(|(value, _)| value.clone());
            if let Some(pmcid) = &queried_pmcid {
                push_identifier(&mut collected_ids, "pmcid", pmcid);
            }

            if let Some(abstract_text) = record
                .abstract_text
                .as_deref()
                .filter(|a| !a.trim().is_empty())
            {
                abstracts.push(abstract_text.to_string());
            }

            if self.config.include_full_text {
                let pmcid = record.pmcid.clone().or(queried_pmcid);
                let full_text = match pmcid {
                    Some(pmcid) => self.fetch_full_text(&pmcid).await,
                    None => None,
                };
                match full_text {
                    Some(text) => full_texts.push(text),
                    None => full_text_urls.extend(record.full_text_urls.clone()),
                }
            }
        }

        if !abstracts.is_empty() {
            candidate.publication_abstract = Some(dedupe_preserve_order(abstracts).join("\n\n"));
        }
        if !full_texts.is_empty() {
            candidate.publication_full_text = Some(dedupe_preserve_order(full_texts).join("\n\n"));
        } else if self.config.include_full_text
            && candidate.publication_full_text.is_none()
            && let Some(url) = full_text_urls.into_iter().next()
        {
            candidate.publication_full_text_url = Some(url);
        }

        candidate.extend_publication_ids(collected_ids);
    }

    /// One cached lookup per identifier; the typed field query falls back to
    /// an `EXT_ID` query before giving up.
    async fn fetch_record(&self, identifier: &str, kind: &str) -> Option<PublicationRecord> {
        let cache_key = format!("{kind}:{identifier}").to_lowercase();
        if let Some(record) = lock(&self.search_cache).get(&cache_key) {
            return Some(record.clone());
        }

        let field = kind.to_uppercase();
        let value = if field == "PMCID" {
            identifier.to_uppercase()
        } else {
            identifier.to_string()
        };

        let queries = [(field, value), ("EXT_ID".to_string(), identifier.to_string())];
        for (field, value) in &queries {
            match self.client.search(field, value).await {
                Ok(resp) => {
                    if let Some(hit) = resp.into_first() {
                        let record = PublicationRecord {
                            abstract_text: hit.abstract_text.clone(),
                            pmcid: hit.pmcid.clone(),
                            pmid: hit.pmid.clone(),
                            doi: hit.doi.clone(),
                            full_text_urls: hit.full_text_urls(),
                        };
                        lock(&self.search_cache).insert(cache_key, record.clone());
                        return Some(record);
                    }
                }
                Err(err) => {
                    debug!(field = %field, value = %value, error = %err, "Europe PMC query failed");
                }
            }
        }
        None
    }

    /// Fetch, flatten and truncate the full-text XML for a PMC id, cached by
    /// upper-cased identifier.
    async fn fetch_full_text(&self, pmcid: &str) -> Option<String> {
        let cache_key = pmcid.trim().to_uppercase();
        if cache_key.is_empty() {
            return None;
        }
        if let Some(text) = lock(&self.full_text_cache).get(&cache_key) {
            return Some(text.clone());
        }

        let xml = match self.client.full_text_xml(&cache_key).await {
            Ok(Some(xml)) => xml,
            Ok(None) => return None,
            Err(err) => {
                debug!(pmcid = %cache_key, error = %err, "Europe PMC full text fetch failed");
                return None;
            }
        };

        let text = xml_to_text(&xml);
        let cleaned: String = normalize_whitespace(&text)
            .chars()
            .take(self.config.max_full_text_chars)
            .collect();
        let cleaned = cleaned.trim().to_string();
        if cleaned.is_empty() {
            return None;
        }
        lock(&self.full_text_cache).insert(cache_key, cleaned.clone());
        Some(cleaned)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Identifier extraction in pmcid -> pmid -> doi priority, tolerating the
/// key spellings Pub2Tools uses.
fn select_identifiers(publication: &Value) -> Vec<(String, &'static str)> {
    let Some(map) = publication.as_object() else {
        return Vec::new();
    };
    let lower: HashMap<String, &Value> = map
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect();

    let mut identifiers = Vec::new();
    let mut push = |value: Option<&&Value>, kind: &'static str| {
        if let Some(text) = value.and_then(|v| v.as_str()) {
            let text = text.trim();
            if !text.is_empty() {
                identifiers.push((text.to_string(), kind));
            }
        }
    };
    push(lower.get("pmcid").or(lower.get("pmc_id")), "pmcid");
    push(lower.get("pmid").or(lower.get("pm")), "pmid");
    push(lower.get("doi"), "doi");
    identifiers
}

fn collect_identifier_strings(record: &PublicationRecord, collected: &mut Vec<String>) {
    for (value, kind) in [
        (&record.pmcid, "pmcid"),
        (&record.pmid, "pmid"),
        (&record.doi, "doi"),
    ] {
        if let Some(value) = value {
            push_identifier(collected, kind, value);
        }
    }
}

fn push_identifier(collected: &mut Vec<String>, kind: &str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    let tag = format!("{kind}:{value}");
    if !collected
        .iter()
        .any(|existing| existing.eq_ignore_ascii_case(&tag))
    {
        collected.push(tag);
    }
}

fn xml_to_text(xml: &str) -> String {
    XML_TAG.replace_all(xml, " ").into_owned()
}
