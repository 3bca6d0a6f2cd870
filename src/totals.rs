//! Column sums over the visible rows.
//!
//! Totals are always recomputed from the rows they are given, so a footer
//! follows whatever the filters currently show.
use crate::types::{AggregatedRow, FieldValue, GroupKey, TotalsRow};
use crate::util::{format_number, MISSING_KEY};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;
use std::collections::HashMap;

fn zeroed(measure_fields: &[String]) -> TotalsRow {
    TotalsRow {
        rows: 0,
        measures: measure_fields.iter().map(|m| (m.clone(), 0.0)).collect(),
    }
}

fn accumulate(totals: &mut TotalsRow, row: &AggregatedRow) {
    totals.rows += 1;
    for (name, sum) in &mut totals.measures {
        *sum += row.measure_or_zero(name);
    }
}

/// Grand total of each measure across `rows`. Rows lacking a measure
/// contribute zero to it.
pub fn compute_totals(rows: &[AggregatedRow], measure_fields: &[String]) -> TotalsRow {
    let mut totals = zeroed(measure_fields);
    for row in rows {
        accumulate(&mut totals, row);
    }
    totals
}

fn subgroup_text(row: &AggregatedRow, field: &str) -> String {
    match row.field(field) {
        Some(FieldValue::Key(s)) => s.to_string(),
        Some(FieldValue::Measure(m)) => format_number(m, 2),
        None => MISSING_KEY.to_string(),
    }
}

/// Subtotals keyed by a subgroup key, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subtotals {
    pub fields: Vec<String>,
    groups: Vec<(GroupKey, TotalsRow)>,
    index: HashMap<GroupKey, usize>,
}

impl Subtotals {
    pub fn get(&self, key: &GroupKey) -> Option<&TotalsRow> {
        self.index.get(key).map(|&i| &self.groups[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &TotalsRow)> {
        self.groups.iter().map(|(k, t)| (k, t))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&GroupKey, &mut TotalsRow)> {
        self.groups.iter_mut().map(|(k, t)| (&*k, t))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Sum of the subtotals themselves; equals the grand total of the rows
    /// they were computed from.
    pub fn combined(&self, measure_fields: &[String]) -> TotalsRow {
        let mut totals = zeroed(measure_fields);
        for (_, sub) in &self.groups {
            totals.rows += sub.rows;
            for (name, sum) in &mut totals.measures {
                *sum += sub.get_or_zero(name);
            }
        }
        totals
    }
}

struct SubtotalEntry<'a> {
    fields: &'a [String],
    key: &'a GroupKey,
    totals: &'a TotalsRow,
}

impl Serialize for SubtotalEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (field, value) in self.fields.iter().zip(self.key.parts()) {
            map.serialize_entry(field, value)?;
        }
        map.serialize_entry("rows", &self.totals.rows)?;
        for (k, v) in &self.totals.measures {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl Serialize for Subtotals {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.groups.len()))?;
        for (key, totals) in &self.groups {
            seq.serialize_element(&SubtotalEntry {
                fields: &self.fields,
                key,
                totals,
            })?;
        }
        seq.end()
    }
}

/// Per-subgroup sums, e.g. pilots within a team. Every row lands in exactly
/// one subgroup.
pub fn compute_group_subtotals(
    rows: &[AggregatedRow],
    subgroup_key_fields: &[String],
    measure_fields: &[String],
) -> Subtotals {
    let mut out = Subtotals {
        fields: subgroup_key_fields.to_vec(),
        ..Subtotals::default()
    };
    for row in rows {
        let key = GroupKey(
            subgroup_key_fields
                .iter()
                .map(|f| subgroup_text(row, f))
                .collect(),
        );
        let slot = match out.index.get(&key) {
            Some(&i) => i,
            None => {
                let i = out.groups.len();
                out.groups.push((key.clone(), zeroed(measure_fields)));
                out.index.insert(key, i);
                i
            }
        };
        accumulate(&mut out.groups[slot].1, row);
    }
    out
}
