//! The dashboard's built-in reports.
//!
//! Each report differs from the others only in data: payload shape, group
//! fields, measures, filters and columns.
use crate::derived::DerivedMeasure;
use crate::filters::{FilterSpec, Predicate, SortDirection, SortSpec};
use crate::flatten::{Activity, DatedPairs, PayloadShape, PilotDays, PlanTree};
use crate::output::Column;
use crate::report::ReportDefinition;

/// Spray/spread volumes per day and plantation.
pub fn chemical_usage() -> ReportDefinition {
    ReportDefinition::new("chemical_usage", ["date", "plantation", "type"])
        .titled("Chemical Usage by Plantation")
        .shape(PayloadShape::DatedPairs(DatedPairs::with_activities(vec![
            Activity::new("spray", "Spray"),
            Activity::new("spread", "Spread"),
        ])
        .once_fields(["plan_size"])))
        .measures(["plan_size", "field_area", "chemical_volume"])
        .filters(FilterSpec::new().with(Predicate::Equals {
            field: "plantation".to_string(),
            value: None,
        }))
        .columns(vec![
            Column::new("date", "Date"),
            Column::new("plantation", "Plantation"),
            Column::new("type", "Type"),
            Column::new("plan_size", "Plan Size (ha)"),
            Column::new("field_area", "Sprayed Area (ha)"),
            Column::new("chemical_volume", "Chemical (L)"),
        ])
}

/// Assigned versus planned area for each field of each plan.
pub fn field_coverage() -> ReportDefinition {
    ReportDefinition::new("field_coverage", ["plantation", "field_name"])
        .titled("Field Coverage")
        .shape(PayloadShape::PlanTree(PlanTree {
            once_fields: vec!["field_area".to_string()],
            ..PlanTree::default()
        }))
        .measures(["field_area", "assigned_area"])
        .derive(DerivedMeasure::percentage(
            "assigned_percentage",
            "assigned_area",
            "field_area",
        ))
        .filters(FilterSpec::new().with(Predicate::greater_than("field_area", 0.0)))
        .subtotal_by(["plantation"])
        .columns(vec![
            Column::new("plantation", "Plantation"),
            Column::new("field_name", "Field"),
            Column::new("field_area", "Field Area (ha)"),
            Column::new("assigned_area", "Assigned (ha)"),
            Column::new("assigned_percentage", "Assigned %"),
        ])
}

/// Daily pay per pilot, subtotalled per pilot.
pub fn pilot_payments() -> ReportDefinition {
    ReportDefinition::new("pilot_payments", ["pilot_name", "date"])
        .titled("Pilot Payments")
        .shape(PayloadShape::PilotDays(PilotDays::default()))
        .measures(["sprayed_area", "base_pay", "bonus", "total_pay"])
        .subtotal_by(["pilot_name"])
        .columns(vec![
            Column::new("pilot_name", "Pilot"),
            Column::new("date", "Date"),
            Column::new("sprayed_area", "Area (ha)"),
            Column::new("base_pay", "Base"),
            Column::new("bonus", "Bonus"),
            Column::new("total_pay", "Total"),
        ])
}

/// Area flown per pilot, best first.
pub fn pilot_performance() -> ReportDefinition {
    ReportDefinition::new("pilot_performance", ["pilot_name"])
        .titled("Pilot Performance")
        .measures(["field_area", "flights", "flight_minutes"])
        .derive(DerivedMeasure::ratio("area_per_flight", "field_area", "flights"))
        .sort(SortSpec::new("field_area", SortDirection::Descending))
        .columns(vec![
            Column::new("pilot_name", "Pilot"),
            Column::new("field_area", "Area (ha)"),
            Column::new("flights", "Flights").decimals(0),
            Column::new("flight_minutes", "Minutes").decimals(0),
            Column::new("area_per_flight", "ha / Flight"),
        ])
}

/// Cancelled work per day, plantation and reason. Days without any
/// cancelled area are hidden.
pub fn cancellations() -> ReportDefinition {
    ReportDefinition::new("cancellations", ["date", "plantation", "reason"])
        .titled("Cancellations")
        .measures(["cancelled_area", "cancelled_tasks"])
        .filters(FilterSpec::new().with(Predicate::non_zero("cancelled_area")))
        .sort(SortSpec::new("date", SortDirection::Ascending))
        .columns(vec![
            Column::new("date", "Date"),
            Column::new("plantation", "Plantation"),
            Column::new("reason", "Reason"),
            Column::new("cancelled_area", "Cancelled (ha)"),
            Column::new("cancelled_tasks", "Tasks").decimals(0),
        ])
}

pub fn builtin() -> Vec<ReportDefinition> {
    vec![
        chemical_usage(),
        field_coverage(),
        pilot_payments(),
        pilot_performance(),
        cancellations(),
    ]
}

pub fn find(name: &str) -> Option<ReportDefinition> {
    builtin().into_iter().find(|d| d.name == name)
}
