use crate::error::{ReportError, Result};
use crate::report::ReportDefinition;
use log::{info, warn};
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub bytes: usize,
    pub top_level_entries: usize,
    pub sections: Vec<String>,
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| ReportError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse<T: serde::de::DeserializeOwned>(path: &Path, text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|source| ReportError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a saved backend response.
///
/// The payload is not checked against any report shape here; a payload that
/// fits no report simply tabulates to empty tables later.
pub fn load_payload<P: AsRef<Path>>(path: P) -> Result<(Value, LoadReport)> {
    let path = path.as_ref();
    let text = read(path)?;
    let payload: Value = parse(path, &text)?;
    let (top_level_entries, sections) = match &payload {
        Value::Array(items) => (items.len(), Vec::new()),
        Value::Object(obj) => (obj.len(), obj.keys().cloned().collect()),
        _ => {
            warn!("payload in {} is a bare scalar", path.display());
            (0, Vec::new())
        }
    };
    info!(
        "loaded {} bytes from {} ({} top-level entries)",
        text.len(),
        path.display(),
        top_level_entries
    );
    Ok((
        payload,
        LoadReport {
            bytes: text.len(),
            top_level_entries,
            sections,
        },
    ))
}

static NO_SECTION: Value = Value::Null;

/// The part of a combined payload meant for one report.
///
/// A payload is combined when any of its top-level keys names one of
/// `reports`. A combined payload yields the value under `report`, or null
/// when that section is absent. Any other payload is handed over whole.
pub fn section<'a, S: AsRef<str>>(
    payload: &'a Value,
    report: &str,
    reports: &[S],
) -> &'a Value {
    let Some(obj) = payload.as_object() else {
        return payload;
    };
    if !reports.iter().any(|r| obj.contains_key(r.as_ref())) {
        return payload;
    }
    match obj.get(report) {
        Some(v) => v,
        None => {
            warn!("payload has no '{}' section", report);
            &NO_SECTION
        }
    }
}

/// Read and validate a JSON array of report definitions.
pub fn load_definitions<P: AsRef<Path>>(path: P) -> Result<Vec<ReportDefinition>> {
    let path = path.as_ref();
    let defs: Vec<ReportDefinition> = parse(path, &read(path)?)?;
    for def in &defs {
        def.validate()?;
    }
    info!("loaded {} report definitions from {}", defs.len(), path.display());
    Ok(defs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn temp_file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn payload_sections_are_listed() {
        let f = temp_file(r#"{"chemical_usage": [], "pilot_payments": {}}"#);
        let (payload, report) = load_payload(f.path()).unwrap();
        assert_eq!(report.top_level_entries, 2);
        assert_eq!(report.sections, vec!["chemical_usage", "pilot_payments"]);
        let reports = ["chemical_usage", "pilot_payments"];
        assert_eq!(section(&payload, "chemical_usage", &reports), &json!([]));
    }

    #[test]
    fn missing_section_of_combined_payload_is_null() {
        let payload = json!({"field_coverage": {"data": [{"plantation": "X"}]}});
        let reports: Vec<String> = crate::catalog::builtin().into_iter().map(|d| d.name).collect();
        let part = section(&payload, "pilot_payments", &reports);
        assert_eq!(part, &Value::Null);

        let out = crate::report::run_report(&crate::catalog::pilot_payments(), part);
        assert!(out.rows.is_empty());
    }

    #[test]
    fn single_report_payload_is_passed_whole() {
        let payload = json!({"Ana": {"2025-02-21": {"total_pay": 100}}});
        assert_eq!(section(&payload, "pilot_payments", &["pilot_payments"]), &payload);
        let flat = json!([{"pilot_name": "Ana"}]);
        assert_eq!(section(&flat, "pilot_performance", &["pilot_performance"]), &flat);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_payload("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ReportError::Read { .. }));
    }

    #[test]
    fn broken_json_is_a_parse_error() {
        let f = temp_file("[1, 2");
        assert!(matches!(load_payload(f.path()), Err(ReportError::Parse { .. })));
    }

    #[test]
    fn definitions_are_validated() {
        let f = temp_file(r#"[{"name": "r", "group_by": ["a"], "subtotal_by": ["b"]}]"#);
        assert!(matches!(
            load_definitions(f.path()),
            Err(ReportError::Definition { .. })
        ));

        let f = temp_file(r#"[{"name": "r", "group_by": ["a"], "measures": ["x"]}]"#);
        let defs = load_definitions(f.path()).unwrap();
        assert_eq!(defs[0].measures, vec!["x"]);
    }
}
