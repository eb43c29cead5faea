//! Corpus loader.
//!
//! Reads the knowledge-base files from the corpus directory into a flat,
//! ordered list of [`SourceUnit`]s:
//!
//! | Category | Files | One unit per |
//! |----------|-------|--------------|
//! | Paginated document | `corpus.document` (PDF) | page |
//! | Structured records | `corpus.record_files` (JSON) | record (or the whole file for a single object) |
//! | Free text | `corpus.text_files` + `corpus.extra_text_globs` | file |
//!
//! Each unit is tagged with the file name it came from. Absent files are
//! skipped quietly. A file that cannot be read or parsed is reported as
//! [`AshaError::SourceUnavailable`] in the log and left out; it never stops
//! the remaining files from loading.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::error::AshaError;
use crate::models::SourceUnit;
use crate::samples;

/// Load every recognized corpus file under `config.root`.
///
/// Seeds missing sample files first when `config.seed_samples` is set.
/// Units come out in a stable order: document pages, then record files in
/// configured order, then named text files, then other matching text files
/// sorted by name.
pub fn load_corpus(config: &CorpusConfig) -> Vec<SourceUnit> {
    let root = &config.root;
    if config.seed_samples {
        samples::seed_missing(root);
    }

    let mut units = Vec::new();

    let pdf_path = root.join(&config.document);
    if pdf_path.exists() {
        match load_pdf(&pdf_path, &config.document) {
            Ok(pages) => {
                tracing::info!(file = %config.document, pages = pages.len(), "loaded document");
                units.extend(pages);
            }
            Err(e) => report_unavailable(&e),
        }
    } else {
        tracing::debug!(file = %config.document, "document not present, skipping");
    }

    for name in &config.record_files {
        let path = root.join(name);
        if !path.exists() {
            tracing::debug!(file = %name, "record file not present, skipping");
            continue;
        }
        match load_records(&path, name) {
            Ok(records) => {
                tracing::info!(file = %name, records = records.len(), "loaded records");
                units.extend(records);
            }
            Err(e) => report_unavailable(&e),
        }
    }

    for name in text_file_names(config) {
        let path = root.join(&name);
        if !path.exists() {
            tracing::debug!(file = %name, "text file not present, skipping");
            continue;
        }
        match load_text(&path, &name) {
            Ok(unit) => {
                tracing::info!(file = %name, "loaded text file");
                units.extend(unit);
            }
            Err(e) => report_unavailable(&e),
        }
    }

    tracing::info!(units = units.len(), "corpus loaded");
    units
}

fn report_unavailable(err: &AshaError) {
    tracing::error!(error = %err, "excluding corpus file");
}

/// Named text files in configured order, followed by any other file in the
/// corpus root matching `extra_text_globs`, sorted by name.
fn text_file_names(config: &CorpusConfig) -> Vec<String> {
    let mut names = config.text_files.clone();

    let globs = match build_globset(&config.extra_text_globs) {
        Ok(g) => g,
        Err(e) => {
            tracing::warn!(error = %e, "invalid corpus.extra_text_globs, ignoring");
            return names;
        }
    };

    let mut extra: Vec<String> = WalkDir::new(&config.root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| globs.is_match(name) && !names.contains(name))
        .collect();
    extra.sort();

    names.extend(extra);
    names
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn unavailable(path: &Path, reason: impl ToString) -> AshaError {
    AshaError::SourceUnavailable {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// One unit per PDF page; blank pages are dropped.
///
/// pdf-extract panics on some malformed documents (e.g. a page using a font
/// missing from its resources); that is reported like any other parse
/// failure.
pub fn load_pdf(path: &Path, origin: &str) -> Result<Vec<SourceUnit>, AshaError> {
    let bytes = std::fs::read(path).map_err(|e| unavailable(path, e))?;
    let pages = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(&bytes)
    }))
    .map_err(|payload| {
        unavailable(
            path,
            format!("PDF extraction panicked: {}", panic_message(payload.as_ref())),
        )
    })?
    .map_err(|e| unavailable(path, format!("PDF extraction failed: {}", e)))?;

    Ok(pages
        .into_iter()
        .filter(|page| !page.trim().is_empty())
        .map(|page| SourceUnit::new(page, origin))
        .collect())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Parse a record file into its JSON records.
///
/// A top-level array yields its elements; a single object yields itself.
/// Any other top-level value is rejected.
pub fn read_records(path: &Path) -> Result<Vec<Value>, AshaError> {
    let content = std::fs::read_to_string(path).map_err(|e| unavailable(path, e))?;
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| unavailable(path, format!("invalid JSON: {}", e)))?;

    match value {
        Value::Array(items) => Ok(items),
        obj @ Value::Object(_) => Ok(vec![obj]),
        other => Err(unavailable(
            path,
            format!("expected a record or a list of records, found {}", json_kind(&other)),
        )),
    }
}

/// One unit per record, text being the canonical serialization of the
/// record. Non-object entries in a record list are skipped with a warning.
pub fn load_records(path: &Path, origin: &str) -> Result<Vec<SourceUnit>, AshaError> {
    let records = read_records(path)?;
    let mut units = Vec::with_capacity(records.len());

    for (i, record) in records.iter().enumerate() {
        if !record.is_object() {
            tracing::warn!(
                file = %origin,
                index = i,
                kind = json_kind(record),
                "skipping malformed record"
            );
            continue;
        }
        units.push(SourceUnit::new(canonical_json(record), origin));
    }
    Ok(units)
}

/// The whole file as a single unit; `None` for a blank file.
pub fn load_text(path: &Path, origin: &str) -> Result<Option<SourceUnit>, AshaError> {
    let text = std::fs::read_to_string(path).map_err(|e| unavailable(path, e))?;
    if text.trim().is_empty() {
        tracing::debug!(file = %origin, "text file is blank, skipping");
        return Ok(None);
    }
    Ok(Some(SourceUnit::new(text, origin)))
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config_for(root: &Path) -> CorpusConfig {
        CorpusConfig {
            root: root.to_path_buf(),
            seed_samples: false,
            ..CorpusConfig::default()
        }
    }

    #[test]
    fn test_empty_dir_without_seeding_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_corpus(&config_for(dir.path())).is_empty());
    }

    #[test]
    fn test_seeding_gives_non_empty_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_for(dir.path());
        cfg.seed_samples = true;
        let units = load_corpus(&cfg);
        assert!(!units.is_empty());
        assert!(units.iter().any(|u| u.origin == "job_listings.json"));
        assert!(units.iter().any(|u| u.origin == "women_empowerment.txt"));
    }

    #[test]
    fn test_record_list_and_single_object() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("job_listings.json"),
            r#"[{"title": "Software Developer", "company": "TechWomen Inc."}, {"title": "Content Writer"}]"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("governmentschemes.json"),
            r#"{"name": "Stand Up India"}"#,
        )
        .unwrap();

        let units = load_corpus(&config_for(dir.path()));
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].origin, "governmentschemes.json");
        assert_eq!(units[0].text, r#"{"name":"Stand Up India"}"#);
        assert_eq!(
            units[1].text,
            r#"{"company":"TechWomen Inc.","title":"Software Developer"}"#
        );
        assert_eq!(units[2].origin, "job_listings.json");
    }

    #[test]
    fn test_malformed_file_does_not_abort_loading() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("job_listings.json"), "{ not json").unwrap();
        fs::write(dir.path().join("scheme.pdf"), b"definitely not a pdf").unwrap();
        fs::write(dir.path().join("careers_for_women.txt"), "Nursing and teaching").unwrap();

        let units = load_corpus(&config_for(dir.path()));
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].origin, "careers_for_women.txt");
    }

    /// A one-page PDF whose content stream uses `/F1` while the page's
    /// resources define no fonts.
    fn pdf_with_undefined_font() -> Vec<u8> {
        let content = "BT /F1 12 Tf (Hello) Tj ET";
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >> /Contents 4 0 R >>"
                .to_string(),
            format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
        ];

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref_at = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for off in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_at
            )
            .as_bytes(),
        );
        pdf
    }

    #[test]
    fn test_pdf_with_undefined_font_is_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let pdf_path = dir.path().join("scheme.pdf");
        fs::write(&pdf_path, pdf_with_undefined_font()).unwrap();
        fs::write(dir.path().join("careers_for_women.txt"), "Nursing and teaching").unwrap();

        let err = load_pdf(&pdf_path, "scheme.pdf").unwrap_err();
        assert!(matches!(err, AshaError::SourceUnavailable { .. }));

        let units = load_corpus(&config_for(dir.path()));
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].origin, "careers_for_women.txt");
    }

    #[test]
    fn test_non_object_records_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("community_events.json");
        fs::write(&path, r#"[{"title": "Workshop"}, 42, "loose", null]"#).unwrap();
        let units = load_records(&path, "community_events.json").unwrap();
        assert_eq!(units.len(), 1);
    }

    #[test]
    fn test_scalar_record_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("governmentschemes.json");
        fs::write(&path, "\"just a string\"").unwrap();
        let err = read_records(&path).unwrap_err();
        assert!(matches!(err, AshaError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_extra_text_files_follow_named_ones() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("zeta.txt"), "zeta notes").unwrap();
        fs::write(dir.path().join("alpha.txt"), "alpha notes").unwrap();
        fs::write(dir.path().join("women_empowerment.txt"), "Mahila E-Haat").unwrap();
        fs::write(dir.path().join("blank.txt"), "   \n").unwrap();
        fs::write(dir.path().join("notes.md"), "not picked up").unwrap();

        let units = load_corpus(&config_for(dir.path()));
        let origins: Vec<&str> = units.iter().map(|u| u.origin.as_str()).collect();
        assert_eq!(origins, vec!["women_empowerment.txt", "alpha.txt", "zeta.txt"]);
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let v: Value = serde_json::from_str(r#"{"b": {"z": 1, "a": [ {"y": 2, "x": 1} ]}, "a": true}"#)
            .unwrap();
        assert_eq!(canonical_json(&v), r#"{"a":true,"b":{"a":[{"x":1,"y":2}],"z":1}}"#);
    }
}
