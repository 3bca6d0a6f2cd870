//! The Tabulator: groups flattened records and sums their measures.
use crate::derived::DerivedMeasure;
use crate::flatten::Flattener;
use crate::types::{AggregatedRow, GroupKey};
use crate::util::{key_text, to_safe_number};
use log::debug;
use serde_json::Value;
use std::collections::HashMap;

/// Group records by `group_key_fields` and sum `measure_fields` per group.
///
/// Rows come back in first-seen-key order. A group key field a record does
/// not carry counts as `"N/A"`; a measure it does not carry (or carries as
/// something non-numeric) counts as zero. A malformed payload yields no rows.
pub fn tabulate<F>(
    payload: &Value,
    group_key_fields: &[String],
    measure_fields: &[String],
    flattener: &F,
) -> Vec<AggregatedRow>
where
    F: Flattener + ?Sized,
{
    let measure_fields = dedup(measure_fields.iter().cloned());
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut rows: Vec<AggregatedRow> = Vec::new();
    let mut records = 0usize;

    for rec in flattener.flatten(payload) {
        records += 1;
        let key = GroupKey(
            group_key_fields
                .iter()
                .map(|f| key_text(rec.get(f)))
                .collect(),
        );
        let slot = match index.get(&key) {
            Some(&i) => i,
            None => {
                let i = rows.len();
                rows.push(AggregatedRow::new(i, group_key_fields, &key, &measure_fields));
                index.insert(key, i);
                i
            }
        };
        let row = &mut rows[slot];
        for (m, field) in measure_fields.iter().enumerate() {
            row.add(m, to_safe_number(rec.get(field)));
        }
    }

    debug!(
        "tabulated {} records into {} rows (group by [{}])",
        records,
        rows.len(),
        group_key_fields.join(", ")
    );
    rows
}

fn dedup<I: IntoIterator<Item = String>>(fields: I) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for f in fields {
        if !out.contains(&f) {
            out.push(f);
        }
    }
    out
}

/// Builder form of [`tabulate`], carrying a report's grouping as data.
///
/// ```
/// use agri_report::flatten::FlatRecords;
/// use agri_report::tabulate::Tabulator;
/// use serde_json::json;
///
/// let payload = json!([
///     {"pilot_name": "Ana", "field_area": 4},
///     {"pilot_name": "Ana", "field_area": "2.5"},
/// ]);
/// let rows = Tabulator::new()
///     .group_by(["pilot_name"])
///     .measures(["field_area"])
///     .run(&payload, &FlatRecords);
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].measure("field_area"), Some(6.5));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Tabulator {
    group_by: Vec<String>,
    measures: Vec<String>,
    derived: Vec<DerivedMeasure>,
}

impl Tabulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn measures<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.measures = dedup(fields.into_iter().map(Into::into));
        self
    }

    /// Add a ratio column computed on every row once summing is done.
    pub fn derive(mut self, measure: DerivedMeasure) -> Self {
        self.derived.push(measure);
        self
    }

    pub fn group_fields(&self) -> &[String] {
        &self.group_by
    }

    pub fn measure_fields(&self) -> &[String] {
        &self.measures
    }

    pub fn run<F>(&self, payload: &Value, flattener: &F) -> Vec<AggregatedRow>
    where
        F: Flattener + ?Sized,
    {
        let mut rows = tabulate(payload, &self.group_by, &self.measures, flattener);
        for d in &self.derived {
            for row in &mut rows {
                d.apply_to_row(row);
            }
        }
        rows
    }
}
