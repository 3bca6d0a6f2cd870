use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One flattened unit of backend data before grouping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.set(field, value);
        self
    }

    /// Copy every scalar (non-array, non-object) field of `obj` into the
    /// record. Later merges win over earlier ones.
    pub fn merge_scalars(&mut self, obj: &Map<String, Value>) {
        for (k, v) in obj {
            if !v.is_array() && !v.is_object() {
                self.fields.insert(k.clone(), v.clone());
            }
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Ordered tuple of field values identifying an output row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey(pub Vec<String>);

impl GroupKey {
    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" / "))
    }
}

/// A value read off a row by field name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Key(&'a str),
    Measure(f64),
}

/// One grouped, summed output row.
///
/// `seq` is the position at which the row's key was first seen; it lets a
/// sort be undone without keeping the original vector around.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRow {
    pub seq: usize,
    pub keys: Vec<(String, String)>,
    pub measures: Vec<(String, f64)>,
}

impl AggregatedRow {
    pub fn new(
        seq: usize,
        key_fields: &[String],
        key: &GroupKey,
        measure_fields: &[String],
    ) -> Self {
        Self {
            seq,
            keys: key_fields.iter().cloned().zip(key.0.iter().cloned()).collect(),
            measures: measure_fields.iter().map(|m| (m.clone(), 0.0)).collect(),
        }
    }

    pub fn group_key(&self) -> GroupKey {
        GroupKey(self.keys.iter().map(|(_, v)| v.clone()).collect())
    }

    pub fn key(&self, field: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|(k, _)| k == field)
            .map(|(_, v)| v.as_str())
    }

    pub fn measure(&self, field: &str) -> Option<f64> {
        self.measures.iter().find(|(k, _)| k == field).map(|(_, v)| *v)
    }

    /// Measure value, or `0.0` when the row does not carry it.
    pub fn measure_or_zero(&self, field: &str) -> f64 {
        self.measure(field).unwrap_or(0.0)
    }

    pub fn field(&self, field: &str) -> Option<FieldValue<'_>> {
        self.key(field)
            .map(FieldValue::Key)
            .or_else(|| self.measure(field).map(FieldValue::Measure))
    }

    pub(crate) fn add(&mut self, idx: usize, amount: f64) {
        self.measures[idx].1 += amount;
    }

    /// Set a measure, appending it when the row does not have it yet.
    pub fn set_measure(&mut self, field: &str, value: f64) {
        match self.measures.iter_mut().find(|(k, _)| k == field) {
            Some(slot) => slot.1 = value,
            None => self.measures.push((field.to_string(), value)),
        }
    }
}

impl Serialize for AggregatedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.keys.len() + self.measures.len()))?;
        for (k, v) in &self.keys {
            map.serialize_entry(k, v)?;
        }
        for (k, v) in &self.measures {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Synthetic row holding column sums. It has no group key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TotalsRow {
    pub rows: usize,
    pub measures: Vec<(String, f64)>,
}

impl TotalsRow {
    pub fn get(&self, field: &str) -> Option<f64> {
        self.measures.iter().find(|(k, _)| k == field).map(|(_, v)| *v)
    }

    pub fn get_or_zero(&self, field: &str) -> f64 {
        self.get(field).unwrap_or(0.0)
    }

    pub fn set(&mut self, field: &str, value: f64) {
        match self.measures.iter_mut().find(|(k, _)| k == field) {
            Some(slot) => slot.1 = value,
            None => self.measures.push((field.to_string(), value)),
        }
    }
}

impl Serialize for TotalsRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.measures.len() + 1))?;
        map.serialize_entry("rows", &self.rows)?;
        for (k, v) in &self.measures {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
