//! Output artifacts: decision JSONL, tabular CSV, payload JSON and the
//! invalid-entry report. All writes happen after the worker pool drains.

use std::path::Path;

use crate::entities::score::Decision;
use crate::entities::tool_entry::{InvalidEntry, UploadPayload};
use crate::error::AnnotateError;

fn ensure_parent(path: &Path) -> Result<(), AnnotateError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// One decision object per line.
pub fn write_jsonl(path: &Path, rows: &[Decision]) -> Result<(), AnnotateError> {
    ensure_parent(path)?;
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    std::fs::write(path, out)?;
    Ok(())
}

const CSV_COLUMNS: [&str; 22] = [
    "id",
    "title",
    "tool_name",
    "homepage",
    "publication_ids",
    "include",
    "bio_score",
    "bio_A1",
    "bio_A2",
    "bio_A3",
    "bio_A4",
    "bio_A5",
    "documentation_score",
    "doc_B1",
    "doc_B2",
    "doc_B3",
    "doc_B4",
    "doc_B5",
    "concise_description",
    "rationale",
    "model",
    "origin_types",
];

/// Fixed-column CSV with per-subscore columns.
pub fn write_csv(path: &Path, rows: &[Decision]) -> Result<(), AnnotateError> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)
        .map_err(|err| AnnotateError::InvalidArgument(format!("CSV open failed: {err}")))?;
    writer
        .write_record(CSV_COLUMNS)
        .map_err(|err| AnnotateError::InvalidArgument(format!("CSV write failed: {err}")))?;

    for row in rows {
        let scores = &row.scores;
        let subscore = |map: &std::collections::BTreeMap<String, f64>, key: &str| {
            map.get(key).map(|v| format_score(*v)).unwrap_or_default()
        };
        let record = [
            row.id.clone(),
            row.title.clone(),
            scores.tool_name.clone(),
            row.homepage.clone(),
            row.publication_ids.join(", "),
            row.include.to_string(),
            format_score(scores.bio_score),
            subscore(&scores.bio_subscores, "A1"),
            subscore(&scores.bio_subscores, "A2"),
            subscore(&scores.bio_subscores, "A3"),
            subscore(&scores.bio_subscores, "A4"),
            subscore(&scores.bio_subscores, "A5"),
            format_score(scores.documentation_score),
            subscore(&scores.documentation_subscores, "B1"),
            subscore(&scores.documentation_subscores, "B2"),
            subscore(&scores.documentation_subscores, "B3"),
            subscore(&scores.documentation_subscores, "B4"),
            subscore(&scores.documentation_subscores, "B5"),
            scores.concise_description.clone(),
            scores.rationale.clone(),
            scores.model.clone(),
            scores.origin_types.join(", "),
        ];
        writer
            .write_record(&record)
            .map_err(|err| AnnotateError::InvalidArgument(format!("CSV write failed: {err}")))?;
    }
    writer
        .flush()
        .map_err(AnnotateError::Io)?;
    Ok(())
}

fn format_score(value: f64) -> String {
    // Integral scores print without a trailing ".0" so the CSV stays stable
    // across serializers.
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Registry payload: `{"version": ..., "entries": [...]}`.
pub fn write_payload(path: &Path, payload: &UploadPayload) -> Result<(), AnnotateError> {
    ensure_parent(path)?;
    std::fs::write(path, serde_json::to_string_pretty(payload)?)?;
    Ok(())
}

/// `<payload>.invalid.json`, written only when validation rejected entries.
pub fn write_invalid(path: &Path, invalid: &[InvalidEntry]) -> Result<(), AnnotateError> {
    ensure_parent(path)?;
    std::fs::write(path, serde_json::to_string_pretty(invalid)?)?;
    Ok(())
}

/// Sibling path with the `.invalid.json` suffix.
pub fn invalid_path(output: &Path) -> std::path::PathBuf {
    output.with_extension("invalid.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::score::ScoreRecord;
    use std::collections::BTreeMap;

    fn decision() -> Decision {
        let mut bio = BTreeMap::new();
        for (key, value) in [("A1", 1.0), ("A2", 0.5), ("A3", 0.0), ("A4", 1.0), ("A5", 1.0)] {
            bio.insert(key.to_string(), value);
        }
        let mut doc = BTreeMap::new();
        for key in ["B1", "B2", "B3", "B4", "B5"] {
            doc.insert(key.to_string(), 1.0);
        }
        Decision {
            id: "t1".to_string(),
            title: "SpecTool".to_string(),
            homepage: "https://tool.example".to_string(),
            publication_ids: vec!["pmid:12345".to_string()],
            scores: ScoreRecord {
                tool_name: "SpecTool".to_string(),
                homepage: "https://tool.example".to_string(),
                bio_subscores: bio,
                documentation_subscores: doc,
                bio_score: 0.7,
                documentation_score: 1.0,
                model: "llama3.2".to_string(),
                origin_types: vec!["title".to_string(), "homepage".to_string()],
                ..ScoreRecord::default()
            },
            include: true,
        }
    }

    #[test]
    fn jsonl_has_one_object_per_line() {
        let path = std::env::temp_dir().join(format!("annotate-jsonl-{}.jsonl", std::process::id()));
        write_jsonl(&path, &[decision(), decision()]).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["include"], serde_json::json!(true));
        assert_eq!(parsed["scores"]["bio_score"], serde_json::json!(0.7));
    }

    #[test]
    fn csv_has_fixed_columns_and_subscores() {
        let path = std::env::temp_dir().join(format!("annotate-csv-{}.csv", std::process::id()));
        write_csv(&path, &[decision()]).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        let mut lines = contents.lines();
        let header = lines.next().unwrap();
        assert_eq!(header.split(',').count(), CSV_COLUMNS.len());
        assert!(header.contains("bio_A1"));
        assert!(header.contains("doc_B5"));
        assert!(header.contains("origin_types"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("t1,SpecTool,"));
        assert!(row.contains("0.5"));
        assert!(row.contains("llama3.2"));
    }

    #[test]
    fn invalid_path_appends_suffix() {
        let path = invalid_path(Path::new("out/exports/biotools_payload.json"));
        assert!(path.to_string_lossy().ends_with("biotools_payload.invalid.json"));
    }
}
