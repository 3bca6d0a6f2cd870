//! Post-aggregation filtering and sorting.
//!
//! A [`FilterSpec`] is plain, serializable data: what a dashboard keeps in
//! dropdowns and toggles becomes a list of [`Predicate`]s. Predicates are
//! combined with AND; an inactive one (a dropdown left on "All") is skipped,
//! and so is one naming a field no row carries.
use crate::types::{AggregatedRow, FieldValue};
use crate::util::{parse_date_safe, parse_f64_safe};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Dropdown value meaning "do not filter on this field".
pub const ALL_OPTION: &str = "All";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Keep rows whose field equals `value`. Inactive when `value` is unset
    /// or [`ALL_OPTION`].
    Equals {
        field: String,
        #[serde(default)]
        value: Option<String>,
    },
    /// Keep rows whose field is strictly greater than `threshold`.
    GreaterThan { field: String, threshold: f64 },
    /// Keep rows whose field is at least `min`.
    AtLeast { field: String, min: f64 },
    /// Hide rows whose field is exactly zero.
    NonZero { field: String },
    /// Keep rows whose date field lies in `[from, to]`. Either bound may be
    /// left open; with both open the predicate is inactive.
    DateBetween {
        field: String,
        #[serde(default)]
        from: Option<NaiveDate>,
        #[serde(default)]
        to: Option<NaiveDate>,
    },
}

fn numeric(value: FieldValue<'_>) -> f64 {
    match value {
        FieldValue::Measure(m) => m,
        FieldValue::Key(s) => parse_f64_safe(Some(s)).unwrap_or(0.0),
    }
}

impl Predicate {
    pub fn equals(field: &str, value: &str) -> Self {
        Predicate::Equals {
            field: field.to_string(),
            value: Some(value.to_string()),
        }
    }

    pub fn non_zero(field: &str) -> Self {
        Predicate::NonZero {
            field: field.to_string(),
        }
    }

    pub fn greater_than(field: &str, threshold: f64) -> Self {
        Predicate::GreaterThan {
            field: field.to_string(),
            threshold,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Predicate::Equals { field, .. }
            | Predicate::GreaterThan { field, .. }
            | Predicate::AtLeast { field, .. }
            | Predicate::NonZero { field }
            | Predicate::DateBetween { field, .. } => field,
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            Predicate::Equals { value, .. } => match value {
                None => false,
                Some(v) => !v.trim().eq_ignore_ascii_case(ALL_OPTION),
            },
            Predicate::DateBetween { from, to, .. } => from.is_some() || to.is_some(),
            _ => true,
        }
    }

    /// Whether `row` passes. A row lacking the field passes.
    pub fn matches(&self, row: &AggregatedRow) -> bool {
        let Some(value) = row.field(self.field()) else {
            return true;
        };
        match self {
            Predicate::Equals { value: None, .. } => true,
            Predicate::Equals {
                value: Some(expected),
                ..
            } => match value {
                FieldValue::Key(s) => s == expected.trim(),
                FieldValue::Measure(m) => parse_f64_safe(Some(expected.as_str())) == Some(m),
            },
            Predicate::GreaterThan { threshold, .. } => numeric(value) > *threshold,
            Predicate::AtLeast { min, .. } => numeric(value) >= *min,
            Predicate::NonZero { .. } => numeric(value) != 0.0,
            Predicate::DateBetween { from, to, .. } => {
                let FieldValue::Key(s) = value else {
                    return false;
                };
                match parse_date_safe(Some(s)) {
                    Some(d) => from.map_or(true, |f| d >= f) && to.map_or(true, |t| d <= t),
                    None => false,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSpec {
    pub predicates: Vec<Predicate>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Replace the value of the first `equals` predicate on `field`, adding
    /// one when there is none. This is what a dropdown change does.
    pub fn select(&mut self, field: &str, choice: &str) {
        let slot = self.predicates.iter_mut().find_map(|p| match p {
            Predicate::Equals { field: f, value } if f.as_str() == field => Some(value),
            _ => None,
        });
        match slot {
            Some(value) => *value = Some(choice.to_string()),
            None => self.predicates.push(Predicate::equals(field, choice)),
        }
    }

    pub fn active(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.iter().filter(|p| p.is_active())
    }
}

/// Keep the rows that pass every active predicate, in their current order.
pub fn apply_filters(rows: &[AggregatedRow], spec: &FilterSpec) -> Vec<AggregatedRow> {
    let predicates: Vec<&Predicate> = spec
        .active()
        .filter(|p| {
            let known = rows.iter().any(|r| r.field(p.field()).is_some());
            if !known {
                debug!("skipping filter on unknown field '{}'", p.field());
            }
            known
        })
        .collect();
    let kept: Vec<AggregatedRow> = rows
        .iter()
        .filter(|r| predicates.iter().all(|p| p.matches(r)))
        .cloned()
        .collect();
    debug!(
        "filters kept {} of {} rows ({} active predicates)",
        kept.len(),
        rows.len(),
        predicates.len()
    );
    kept
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
    /// Back to first-seen (tabulation) order.
    #[default]
    Unsorted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: &str, direction: SortDirection) -> Self {
        Self {
            field: field.to_string(),
            direction,
        }
    }
}

#[derive(Debug, PartialEq)]
enum SortKey<'a> {
    Number(f64),
    Text(&'a str),
}

fn sort_key<'a>(row: &'a AggregatedRow, field: &str) -> Option<SortKey<'a>> {
    match row.field(field)? {
        FieldValue::Measure(m) => Some(SortKey::Number(m)),
        // `YYYY-MM-DD` dates order correctly as text.
        FieldValue::Key(s) => Some(match parse_f64_safe(Some(s)) {
            Some(n) => SortKey::Number(n),
            None => SortKey::Text(s),
        }),
    }
}

fn compare_keys(a: &Option<SortKey<'_>>, b: &Option<SortKey<'_>>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(SortKey::Number(x)), Some(SortKey::Number(y))) => x.total_cmp(y),
        (Some(SortKey::Number(_)), Some(SortKey::Text(_))) => Ordering::Less,
        (Some(SortKey::Text(_)), Some(SortKey::Number(_))) => Ordering::Greater,
        (Some(SortKey::Text(x)), Some(SortKey::Text(y))) => x.cmp(y),
    }
}

/// Stable sort on `field`. Rows with equal keys keep their relative order;
/// rows lacking the field sort before those that have it.
pub fn apply_sort(
    mut rows: Vec<AggregatedRow>,
    field: &str,
    direction: SortDirection,
) -> Vec<AggregatedRow> {
    match direction {
        SortDirection::Unsorted => rows.sort_by_key(|r| r.seq),
        _ if !rows.iter().any(|r| r.field(field).is_some()) => {
            debug!("skipping sort on unknown field '{}'", field);
        }
        SortDirection::Ascending => {
            rows.sort_by(|a, b| compare_keys(&sort_key(a, field), &sort_key(b, field)))
        }
        SortDirection::Descending => {
            rows.sort_by(|a, b| compare_keys(&sort_key(b, field), &sort_key(a, field)))
        }
    }
    rows
}
