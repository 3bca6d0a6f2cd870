//! Report definitions and the tabulate → filter → sort → totals pipeline.
use crate::derived::DerivedMeasure;
use crate::error::{ReportError, Result};
use crate::filters::{apply_filters, apply_sort, FilterSpec, SortSpec};
use crate::flatten::PayloadShape;
use crate::output::Column;
use crate::tabulate::Tabulator;
use crate::totals::{compute_group_subtotals, compute_totals, Subtotals};
use crate::types::{AggregatedRow, TotalsRow};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything that distinguishes one report from another, as plain data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDefinition {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub shape: PayloadShape,
    pub group_by: Vec<String>,
    #[serde(default)]
    pub measures: Vec<String>,
    #[serde(default)]
    pub derived: Vec<DerivedMeasure>,
    #[serde(default)]
    pub filters: FilterSpec,
    #[serde(default)]
    pub sort: Option<SortSpec>,
    #[serde(default)]
    pub subtotal_by: Vec<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl ReportDefinition {
    pub fn new<I, S>(name: &str, group_by: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            title: String::new(),
            shape: PayloadShape::default(),
            group_by: group_by.into_iter().map(Into::into).collect(),
            measures: Vec::new(),
            derived: Vec::new(),
            filters: FilterSpec::default(),
            sort: None,
            subtotal_by: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn shape(mut self, shape: PayloadShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn measures<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.measures = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn derive(mut self, measure: DerivedMeasure) -> Self {
        self.derived.push(measure);
        self
    }

    pub fn filters(mut self, filters: FilterSpec) -> Self {
        self.filters = filters;
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn subtotal_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subtotal_by = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    pub fn tabulator(&self) -> Tabulator {
        self.derived.iter().cloned().fold(
            Tabulator::new()
                .group_by(self.group_by.iter().cloned())
                .measures(self.measures.iter().cloned()),
            Tabulator::derive,
        )
    }

    /// Reject definitions that cannot mean anything, before any payload is
    /// seen. Data problems are never reported here.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| ReportError::Definition {
            name: self.name.clone(),
            reason,
        };
        if self.name.trim().is_empty() {
            return Err(fail("name is empty".to_string()));
        }
        let mut known: Vec<&str> = self.measures.iter().map(String::as_str).collect();
        for d in &self.derived {
            for input in [&d.numerator, &d.denominator] {
                if !known.contains(&input.as_str()) {
                    return Err(fail(format!(
                        "derived measure '{}' reads unknown measure '{}'",
                        d.name, input
                    )));
                }
            }
            known.push(&d.name);
        }
        if let Some(f) = self.subtotal_by.iter().find(|f| !self.group_by.contains(f)) {
            return Err(fail(format!("subtotal field '{}' is not a group field", f)));
        }
        Ok(())
    }
}

/// Final hand-off data: ordered rows, optional subtotals, one totals row.
#[derive(Debug, Clone, Serialize)]
pub struct ReportOutput {
    pub name: String,
    pub title: String,
    pub rows: Vec<AggregatedRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtotals: Option<Subtotals>,
    pub totals: TotalsRow,
}

/// A tabulated report whose filters and sort can change without
/// re-tabulating the payload.
#[derive(Debug, Clone)]
pub struct Report<'d> {
    definition: &'d ReportDefinition,
    rows: Vec<AggregatedRow>,
}

impl<'d> Report<'d> {
    pub fn tabulate(definition: &'d ReportDefinition, payload: &Value) -> Self {
        let rows = definition.tabulator().run(payload, &definition.shape);
        Self { definition, rows }
    }

    /// Rows in first-seen order, before any filter.
    pub fn rows(&self) -> &[AggregatedRow] {
        &self.rows
    }

    /// Filter, sort and total the tabulated rows. Totals and subtotals are
    /// computed from the rows that survive `filters`.
    pub fn view(&self, filters: &FilterSpec, sort: Option<&SortSpec>) -> ReportOutput {
        let def = self.definition;
        let mut rows = apply_filters(&self.rows, filters);
        if let Some(s) = sort {
            rows = apply_sort(rows, &s.field, s.direction);
        }

        let mut totals = compute_totals(&rows, &def.measures);
        for d in &def.derived {
            d.apply_to_totals(&mut totals);
        }

        let subtotals = (!def.subtotal_by.is_empty()).then(|| {
            let mut subs = compute_group_subtotals(&rows, &def.subtotal_by, &def.measures);
            for (_, sub) in subs.iter_mut() {
                for d in &def.derived {
                    d.apply_to_totals(sub);
                }
            }
            subs
        });

        info!(
            "report '{}': {} of {} rows visible",
            def.name,
            rows.len(),
            self.rows.len()
        );
        ReportOutput {
            name: def.name.clone(),
            title: def.title.clone(),
            rows,
            subtotals,
            totals,
        }
    }
}

/// Run a report end to end with its configured filters and sort.
pub fn run_report(definition: &ReportDefinition, payload: &Value) -> ReportOutput {
    Report::tabulate(definition, payload).view(&definition.filters, definition.sort.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{Predicate, SortDirection};
    use crate::flatten::{Activity, DatedPairs};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn spray_report() -> ReportDefinition {
        ReportDefinition::new("chemical_usage", ["date", "plantation", "type"])
            .shape(PayloadShape::DatedPairs(DatedPairs::with_activities(vec![
                Activity::new("spray", "Spray"),
            ])))
            .measures(["plan_size", "field_area"])
    }

    #[test]
    fn pipeline_applies_filters_before_totals() {
        let payload = json!([
            ["2025-02-21", [{"plantation": "X", "spray": {"plan_size": 10, "field_area": 5}}]],
            ["2025-02-22", [{"plantation": "Y", "spray": {"plan_size": 8, "field_area": 0}}]]
        ]);
        let def = spray_report().filters(FilterSpec::new().with(Predicate::non_zero("field_area")));
        let out = run_report(&def, &payload);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.totals.get("plan_size"), Some(10.0));
        assert_eq!(out.totals.rows, 1);
    }

    #[test]
    fn changing_a_dropdown_recomputes_the_footer() {
        let payload = json!([
            ["2025-02-21", [
                {"plantation": "X", "spray": {"plan_size": 10, "field_area": 5}},
                {"plantation": "Y", "spray": {"plan_size": 3, "field_area": 2}}
            ]]
        ]);
        let def = spray_report();
        let report = Report::tabulate(&def, &payload);
        let mut filters = FilterSpec::new().with(Predicate::equals("plantation", "All"));
        assert_eq!(report.view(&filters, None).totals.get("field_area"), Some(7.0));
        filters.select("plantation", "Y");
        let out = report.view(&filters, None);
        assert_eq!(out.totals.get("field_area"), Some(2.0));
        assert_eq!(report.rows().len(), 2);
    }

    #[test]
    fn subtotals_get_derived_ratios() {
        let payload = json!([
            {"team": "North", "pilot": "Ana", "assigned": 5, "area": 10},
            {"team": "North", "pilot": "Ben", "assigned": 5, "area": 0},
            {"team": "South", "pilot": "Cleo", "assigned": 0, "area": 0}
        ]);
        let def = ReportDefinition::new("coverage", ["team", "pilot"])
            .measures(["assigned", "area"])
            .derive(DerivedMeasure::percentage("assigned_pct", "assigned", "area"))
            .subtotal_by(["team"])
            .sort(SortSpec::new("assigned", SortDirection::Descending));
        let out = run_report(&def, &payload);
        let subs = out.subtotals.unwrap();
        let pcts: Vec<f64> = subs.iter().map(|(_, t)| t.get_or_zero("assigned_pct")).collect();
        assert_eq!(pcts, vec![100.0, 0.0]);
        assert_eq!(out.totals.get("assigned_pct"), Some(100.0));
        assert_eq!(out.rows[1].measure("assigned_pct"), Some(0.0));
    }

    #[test]
    fn validation_catches_dangling_references() {
        let bad = ReportDefinition::new("r", ["a"])
            .measures(["x"])
            .derive(DerivedMeasure::ratio("q", "x", "y"));
        assert!(matches!(bad.validate(), Err(ReportError::Definition { .. })));

        let bad = ReportDefinition::new("r", ["a"]).subtotal_by(["b"]);
        assert!(bad.validate().is_err());

        let ok = ReportDefinition::new("r", ["a", "b"])
            .measures(["x", "y"])
            .derive(DerivedMeasure::ratio("q", "x", "y"))
            .derive(DerivedMeasure::ratio("q2", "q", "y"))
            .subtotal_by(["a"]);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn definition_reads_from_json() {
        let def: ReportDefinition = serde_json::from_value(json!({
            "name": "cancellations",
            "shape": {"kind": "flat"},
            "group_by": ["date", "reason"],
            "measures": ["cancelled_area"],
            "filters": [{"op": "non_zero", "field": "cancelled_area"}],
            "sort": {"field": "date", "direction": "ascending"}
        }))
        .unwrap();
        assert!(def.validate().is_ok());
        assert_eq!(def.filters.predicates.len(), 1);
        assert_eq!(def.sort.unwrap().direction, SortDirection::Ascending);
    }
}
