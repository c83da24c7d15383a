//! Candidate ingestion: Pub2Tools exports, dedup, and the enriched cache.

use std::io::{Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::warn;

use crate::entities::candidate::Candidate;
use crate::error::AnnotateError;
use crate::utils::dates::parse_published_at;
use crate::utils::text::normalize_text;

pub mod pub2tools;

/// Load candidates from a Pub2Tools JSON export: a bare array or an object
/// wrapping the array under `list`. Non-object rows and malformed files are
/// skipped, never fatal.
pub fn load_candidates(path: &Path) -> Vec<Candidate> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Candidate input not readable");
            return Vec::new();
        }
    };
    let parsed: Value = match serde_json::from_str(&contents) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Candidate input is not valid JSON");
            return Vec::new();
        }
    };
    candidates_from_value(parsed)
}

/// Parse candidates out of an already-loaded JSON document.
pub fn candidates_from_value(value: Value) -> Vec<Candidate> {
    let rows = match value {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("list") {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    rows.into_iter()
        .filter(|row| row.is_object())
        .filter_map(|row| match serde_json::from_value::<Candidate>(row) {
            Ok(mut candidate) => {
                candidate.merge_edam_tags();
                candidate.normalize_homepage_metadata();
                Some(candidate)
            }
            Err(err) => {
                warn!(error = %err, "Skipping malformed candidate record");
                None
            }
        })
        .collect()
}

/// Drop empty-title records, apply the optional date window, and deduplicate
/// by `(normalized title, primary homepage)`, keeping the first occurrence.
pub fn filter_and_normalize(
    candidates: Vec<Candidate>,
    since: Option<OffsetDateTime>,
) -> Vec<Candidate> {
    let mut seen: std::collections::HashSet<(String, String)> = std::collections::HashSet::new();
    let mut out = Vec::new();

    for candidate in candidates {
        let title = candidate.display_title().trim().to_string();
        if title.is_empty() {
            continue;
        }
        if let Some(since) = since
            && let Some(published) = candidate
                .published_at
                .as_deref()
                .and_then(parse_published_at)
            && published < since
        {
            continue;
        }
        let key = (
            normalize_text(&title),
            normalize_text(&candidate.selected_homepage()),
        );
        if seen.insert(key) {
            out.push(candidate);
        }
    }
    out
}

/// Save the enriched candidate list gzip-compressed so later runs can resume
/// without re-scraping.
pub fn save_enriched_cache(candidates: &[Candidate], path: &Path) -> Result<(), AnnotateError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    let body = serde_json::to_vec(candidates)?;
    encoder.write_all(&body)?;
    encoder.finish()?;
    Ok(())
}

pub fn load_enriched_cache(path: &Path) -> Result<Vec<Candidate>, AnnotateError> {
    let file = std::fs::File::open(path)?;
    let mut decoder = GzDecoder::new(file);
    let mut body = String::new();
    decoder.read_to_string(&mut body)?;
    let parsed: Value = serde_json::from_str(&body)?;
    match parsed {
        Value::Array(_) => Ok(candidates_from_value(parsed)),
        _ => Err(AnnotateError::InvalidArgument(
            "Enriched cache is not a list of candidates".to_string(),
        )),
    }
}
