//! Payload flatteners.
//!
//! The backend delivers each report in its own shape. A [`Flattener`] turns
//! one already-deserialized payload into a lazy stream of [`RawRecord`]s.
//! Flatteners are pure: calling one twice on the same payload yields the
//! same records, and a payload that does not match the expected shape yields
//! nothing rather than an error.
use crate::types::RawRecord;
use crate::util::normalize_date;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field every flattener normalises to `YYYY-MM-DD`.
pub const DATE_FIELD: &str = "date";

pub trait Flattener {
    fn flatten<'a>(&'a self, payload: &'a Value) -> Box<dyn Iterator<Item = RawRecord> + 'a>;
}

/// Per-report flatten functions written as plain closures.
impl<F> Flattener for F
where
    F: Fn(&Value) -> Vec<RawRecord>,
{
    fn flatten<'a>(&'a self, payload: &'a Value) -> Box<dyn Iterator<Item = RawRecord> + 'a> {
        Box::new(self(payload).into_iter())
    }
}

fn normalize_date_field(rec: &mut RawRecord) {
    if let Some(Value::String(s)) = rec.get(DATE_FIELD) {
        let normalized = normalize_date(s);
        rec.set(DATE_FIELD, Value::String(normalized));
    }
}

fn finish(mut rec: RawRecord) -> RawRecord {
    normalize_date_field(&mut rec);
    rec
}

/// Top-level array of a payload, also accepting a `{"data": [...]}` envelope.
fn top_level(payload: &Value) -> &[Value] {
    match payload {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("data") {
            Some(Value::Array(items)) => items,
            _ => &[],
        },
        _ => &[],
    }
}

/// Array of objects or a single object, as a slice.
fn as_entries(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        Value::Object(_) => std::slice::from_ref(value),
        _ => &[],
    }
}

// ============================================================================
// FLAT RECORDS
// ============================================================================

/// A plain array of record objects. Non-object entries are skipped.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FlatRecords;

impl Flattener for FlatRecords {
    fn flatten<'a>(&'a self, payload: &'a Value) -> Box<dyn Iterator<Item = RawRecord> + 'a> {
        Box::new(top_level(payload).iter().filter_map(Value::as_object).map(|obj| {
            let mut rec = RawRecord::new();
            rec.merge_scalars(obj);
            finish(rec)
        }))
    }
}

// ============================================================================
// DATED PAIRS
// ============================================================================

/// An activity sub-object of a dated entry, e.g. `spray` shown as `Spray`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub key: String,
    pub label: String,
}

impl Activity {
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
        }
    }
}

/// `[[date, [entry, ...]], ...]`, or the alternating form
/// `[date, [entry, ...], date, [entry, ...]]`.
///
/// Each entry yields one record per activity object it carries, with the
/// activity label stored under `type_field`. When `activities` is empty,
/// every object-valued field of an entry counts as an activity and its
/// label is the capitalised key.
///
/// Entry fields named in `once_fields` are carried only by the entry's first
/// activity record, so an entry-level measure is counted once per entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatedPairs {
    pub activities: Vec<Activity>,
    pub type_field: String,
    pub once_fields: Vec<String>,
}

impl Default for DatedPairs {
    fn default() -> Self {
        Self {
            activities: Vec::new(),
            type_field: "type".to_string(),
            once_fields: Vec::new(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl DatedPairs {
    pub fn with_activities(activities: Vec<Activity>) -> Self {
        Self {
            activities,
            ..Self::default()
        }
    }

    pub fn once_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.once_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Split the payload into `(date, entries)` groups, skipping anything
    /// that is neither a pair nor a date followed by its entries.
    fn groups(payload: &Value) -> Vec<(&str, &[Value])> {
        let items = top_level(payload);
        let mut out = Vec::new();
        let mut i = 0;
        while i < items.len() {
            match &items[i] {
                Value::Array(pair) if pair.len() == 2 => {
                    if let Value::String(date) = &pair[0] {
                        out.push((date.as_str(), as_entries(&pair[1])));
                    }
                    i += 1;
                }
                Value::String(date) => match items.get(i + 1) {
                    Some(next) if next.is_array() || next.is_object() => {
                        out.push((date.as_str(), as_entries(next)));
                        i += 2;
                    }
                    _ => i += 1,
                },
                _ => i += 1,
            }
        }
        out
    }

    fn expand(&self, date: &str, entry: &Map<String, Value>) -> Vec<RawRecord> {
        let mut base = RawRecord::new().with(DATE_FIELD, Value::String(date.to_string()));
        base.merge_scalars(entry);

        let present: Vec<(String, &Map<String, Value>)> = if self.activities.is_empty() {
            entry
                .iter()
                .filter_map(|(k, v)| v.as_object().map(|obj| (capitalize(k), obj)))
                .collect()
        } else {
            self.activities
                .iter()
                .filter_map(|a| {
                    entry
                        .get(&a.key)
                        .and_then(Value::as_object)
                        .map(|obj| (a.label.clone(), obj))
                })
                .collect()
        };

        if present.is_empty() {
            return vec![finish(base)];
        }
        present
            .into_iter()
            .enumerate()
            .map(|(i, (label, obj))| {
                let mut rec = base.clone();
                if i > 0 {
                    for f in &self.once_fields {
                        rec.remove(f);
                    }
                }
                rec.set(self.type_field.clone(), Value::String(label));
                rec.merge_scalars(obj);
                finish(rec)
            })
            .collect()
    }
}

impl Flattener for DatedPairs {
    fn flatten<'a>(&'a self, payload: &'a Value) -> Box<dyn Iterator<Item = RawRecord> + 'a> {
        Box::new(Self::groups(payload).into_iter().flat_map(move |(date, entries)| {
            entries
                .iter()
                .filter_map(Value::as_object)
                .flat_map(move |entry| self.expand(date, entry))
        }))
    }
}

// ============================================================================
// PLAN TREE
// ============================================================================

/// `[plan{..., fields: [field{..., tasks: [task{...}]}]}]`.
///
/// One record per task with plan, field and task scalars merged (the inner
/// level wins on name clashes). A field without tasks and a plan without
/// fields each still produce one record.
///
/// Parent fields named in `once_fields` (a field's area, say) are carried
/// only by the first record under that parent, so summing them over tasks
/// counts them once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanTree {
    pub children: String,
    pub leaves: String,
    pub once_fields: Vec<String>,
}

impl Default for PlanTree {
    fn default() -> Self {
        Self {
            children: "fields".to_string(),
            leaves: "tasks".to_string(),
            once_fields: Vec::new(),
        }
    }
}

impl PlanTree {
    fn repeat(&self, parent: &RawRecord) -> RawRecord {
        let mut rec = parent.clone();
        for f in &self.once_fields {
            rec.remove(f);
        }
        rec
    }

    fn expand(&self, plan: &Map<String, Value>) -> Vec<RawRecord> {
        let mut base = RawRecord::new();
        base.merge_scalars(plan);

        let fields: Vec<&Map<String, Value>> = plan
            .get(&self.children)
            .map(as_entries)
            .unwrap_or(&[])
            .iter()
            .filter_map(Value::as_object)
            .collect();
        if fields.is_empty() {
            return vec![finish(base)];
        }

        let mut out = Vec::new();
        for (fi, field) in fields.into_iter().enumerate() {
            let mut field_rec = if fi == 0 { base.clone() } else { self.repeat(&base) };
            field_rec.merge_scalars(field);
            let tasks: Vec<&Map<String, Value>> = field
                .get(&self.leaves)
                .map(as_entries)
                .unwrap_or(&[])
                .iter()
                .filter_map(Value::as_object)
                .collect();
            if tasks.is_empty() {
                out.push(finish(field_rec));
                continue;
            }
            for (ti, task) in tasks.into_iter().enumerate() {
                let mut rec = if ti == 0 { field_rec.clone() } else { self.repeat(&field_rec) };
                rec.merge_scalars(task);
                out.push(finish(rec));
            }
        }
        out
    }
}

impl Flattener for PlanTree {
    fn flatten<'a>(&'a self, payload: &'a Value) -> Box<dyn Iterator<Item = RawRecord> + 'a> {
        Box::new(
            top_level(payload)
                .iter()
                .filter_map(Value::as_object)
                .flat_map(move |plan| self.expand(plan)),
        )
    }
}

// ============================================================================
// PILOT DAYS
// ============================================================================

/// Per-pilot per-day records, either keyed
/// `{pilot: {"YYYY-MM-DD": {...}}}` or listed
/// `[{pilot_name, days: [{date, ...}]}]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotDays {
    pub pilot_field: String,
    pub days_key: String,
}

impl Default for PilotDays {
    fn default() -> Self {
        Self {
            pilot_field: "pilot_name".to_string(),
            days_key: "days".to_string(),
        }
    }
}

impl PilotDays {
    fn keyed(&self, pilot: &str, days: &Value) -> Vec<RawRecord> {
        let Some(days) = days.as_object() else {
            return Vec::new();
        };
        days.iter()
            .map(|(date, day)| {
                let mut rec = RawRecord::new()
                    .with(self.pilot_field.clone(), Value::String(pilot.to_string()))
                    .with(DATE_FIELD, Value::String(date.clone()));
                if let Some(obj) = day.as_object() {
                    rec.merge_scalars(obj);
                }
                finish(rec)
            })
            .collect()
    }

    fn listed(&self, pilot: &Map<String, Value>) -> Vec<RawRecord> {
        let mut base = RawRecord::new();
        base.merge_scalars(pilot);
        pilot
            .get(&self.days_key)
            .map(as_entries)
            .unwrap_or(&[])
            .iter()
            .filter_map(Value::as_object)
            .map(|day| {
                let mut rec = base.clone();
                rec.merge_scalars(day);
                finish(rec)
            })
            .collect()
    }
}

impl Flattener for PilotDays {
    fn flatten<'a>(&'a self, payload: &'a Value) -> Box<dyn Iterator<Item = RawRecord> + 'a> {
        match payload {
            Value::Object(obj) if !obj.contains_key("data") => Box::new(
                obj.iter()
                    .flat_map(move |(pilot, days)| self.keyed(pilot, days)),
            ),
            _ => Box::new(
                top_level(payload)
                    .iter()
                    .filter_map(Value::as_object)
                    .flat_map(move |pilot| self.listed(pilot)),
            ),
        }
    }
}

// ============================================================================
// SHAPE SELECTOR
// ============================================================================

/// Payload shape named in a report definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayloadShape {
    Flat,
    DatedPairs(DatedPairs),
    PlanTree(PlanTree),
    PilotDays(PilotDays),
}

impl Default for PayloadShape {
    fn default() -> Self {
        PayloadShape::Flat
    }
}

impl Flattener for PayloadShape {
    fn flatten<'a>(&'a self, payload: &'a Value) -> Box<dyn Iterator<Item = RawRecord> + 'a> {
        match self {
            PayloadShape::Flat => FlatRecords.flatten(payload),
            PayloadShape::DatedPairs(f) => f.flatten(payload),
            PayloadShape::PlanTree(f) => f.flatten(payload),
            PayloadShape::PilotDays(f) => f.flatten(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collect<F: Flattener>(f: &F, payload: &Value) -> Vec<RawRecord> {
        f.flatten(payload).collect()
    }

    #[test]
    fn flat_records_skip_non_objects_and_normalise_dates() {
        let payload = json!([
            {"date": "2025-02-21T10:00:00Z", "pilot_name": "Ana", "field_area": 3},
            "garbage",
            {"date": "2025-02-22", "pilot_name": "Ben"}
        ]);
        let recs = collect(&FlatRecords, &payload);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].get("date"), Some(&json!("2025-02-21")));
        assert_eq!(recs[1].get("pilot_name"), Some(&json!("Ben")));
    }

    #[test]
    fn flat_records_accept_data_envelope() {
        let payload = json!({"data": [{"a": 1}]});
        assert_eq!(collect(&FlatRecords, &payload).len(), 1);
    }

    #[test]
    fn malformed_payloads_flatten_to_nothing() {
        for payload in [json!(null), json!(42), json!("x"), json!({"rows": 1})] {
            assert!(collect(&FlatRecords, &payload).is_empty());
            assert!(collect(&DatedPairs::default(), &payload).is_empty());
            assert!(collect(&PlanTree::default(), &payload).is_empty());
        }
        assert!(collect(&PilotDays::default(), &json!(null)).is_empty());
    }

    #[test]
    fn dated_pairs_emit_one_record_per_activity() {
        let payload = json!([
            ["2025-02-21", [
                {"plantation": "X", "spray": {"plan_size": 10, "field_area": 5},
                 "spread": {"plan_size": 2, "field_area": 1}}
            ]]
        ]);
        let f = DatedPairs::with_activities(vec![
            Activity::new("spray", "Spray"),
            Activity::new("spread", "Spread"),
        ]);
        let recs = collect(&f, &payload);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].get("type"), Some(&json!("Spray")));
        assert_eq!(recs[0].get("plan_size"), Some(&json!(10)));
        assert_eq!(recs[1].get("type"), Some(&json!("Spread")));
        assert_eq!(recs[1].get("plantation"), Some(&json!("X")));
    }

    #[test]
    fn dated_pairs_once_fields_stay_on_first_activity() {
        let payload = json!([
            ["2025-02-21", [
                {"plantation": "X", "plan_size": 10,
                 "spray": {"field_area": 5}, "spread": {"field_area": 1}}
            ]]
        ]);
        let f = DatedPairs::with_activities(vec![
            Activity::new("spray", "Spray"),
            Activity::new("spread", "Spread"),
        ])
        .once_fields(["plan_size"]);
        let recs = collect(&f, &payload);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].get("plan_size"), Some(&json!(10)));
        assert!(recs[1].get("plan_size").is_none());
        assert_eq!(recs[1].get("plantation"), Some(&json!("X")));
    }

    #[test]
    fn dated_pairs_accept_alternating_form_and_autodetect() {
        let payload = json!([
            "2025-02-21", [{"plantation": "X", "spray": {"field_area": 5}}],
            "2025-02-22", {"plantation": "Y"}
        ]);
        let recs = collect(&DatedPairs::default(), &payload);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].get("type"), Some(&json!("Spray")));
        assert_eq!(recs[1].get("date"), Some(&json!("2025-02-22")));
        assert!(recs[1].get("type").is_none());
    }

    #[test]
    fn plan_tree_keeps_childless_levels() {
        let payload = json!([
            {"plan_id": 1, "fields": [
                {"field_name": "F1", "field_area": 10, "tasks": [
                    {"date": "2025-02-21", "assigned_area": 4},
                    {"date": "2025-02-22", "assigned_area": 3}
                ]},
                {"field_name": "F2", "field_area": 6}
            ]},
            {"plan_id": 2}
        ]);
        let recs = collect(&PlanTree::default(), &payload);
        assert_eq!(recs.len(), 4);
        assert_eq!(recs[0].get("field_name"), Some(&json!("F1")));
        assert_eq!(recs[1].get("assigned_area"), Some(&json!(3)));
        assert!(recs[2].get("assigned_area").is_none());
        assert_eq!(recs[3].get("plan_id"), Some(&json!(2)));
    }

    #[test]
    fn plan_tree_once_fields_are_not_repeated() {
        let payload = json!([
            {"plantation": "X", "fields": [
                {"field_name": "F1", "field_area": 10, "tasks": [
                    {"assigned_area": 4},
                    {"assigned_area": 3}
                ]}
            ]}
        ]);
        let f = PlanTree {
            once_fields: vec!["field_area".to_string()],
            ..PlanTree::default()
        };
        let recs = collect(&f, &payload);
        assert_eq!(recs[0].get("field_area"), Some(&json!(10)));
        assert!(recs[1].get("field_area").is_none());
        assert_eq!(recs[1].get("field_name"), Some(&json!("F1")));
    }

    #[test]
    fn pilot_days_both_forms() {
        let keyed = json!({"Ana": {"2025-02-21": {"amount": 100}, "2025-02-22": {"amount": 50}}});
        let recs = collect(&PilotDays::default(), &keyed);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].get("pilot_name"), Some(&json!("Ana")));
        assert_eq!(recs[1].get("date"), Some(&json!("2025-02-22")));

        let listed = json!([{"pilot_name": "Ben", "days": [{"date": "2025-02-21", "amount": 7}]}]);
        let recs = collect(&PilotDays::default(), &listed);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].get("amount"), Some(&json!(7)));
    }

    #[test]
    fn closures_are_flatteners() {
        let f = |payload: &Value| -> Vec<RawRecord> {
            vec![RawRecord::new().with("n", payload.clone())]
        };
        let recs = collect(&f, &json!(3));
        assert_eq!(recs[0].get("n"), Some(&json!(3)));
    }

    #[test]
    fn flattening_is_restartable() {
        let payload = json!([["2025-02-21", [{"plantation": "X", "spray": {"plan_size": 1}}]]]);
        let f = DatedPairs::default();
        assert_eq!(collect(&f, &payload), collect(&f, &payload));
    }

    #[test]
    fn shape_deserializes_from_config() {
        let shape: PayloadShape =
            serde_json::from_value(json!({"kind": "plan_tree", "leaves": "jobs"})).unwrap();
        match shape {
            PayloadShape::PlanTree(t) => {
                assert_eq!(t.children, "fields");
                assert_eq!(t.leaves, "jobs");
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }
}
