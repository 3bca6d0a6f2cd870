use agri_report::filters::{apply_filters, FilterSpec, Predicate};
use agri_report::flatten::FlatRecords;
use agri_report::tabulate::tabulate;
use agri_report::totals::{compute_group_subtotals, compute_totals};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashMap;

fn names(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

// Integer-valued measures keep f64 sums exact, so equality checks are safe.
fn records() -> impl Strategy<Value = Vec<(u8, u8, i32, i32)>> {
    prop::collection::vec((0u8..4, 0u8..3, -500i32..500, 0i32..1000), 0..60)
}

fn payload(recs: &[(u8, u8, i32, i32)]) -> Value {
    Value::Array(
        recs.iter()
            .map(|(team, pilot, area, paid)| {
                json!({
                    "team": format!("T{team}"),
                    "pilot_name": format!("P{pilot}"),
                    "field_area": area,
                    "amount": paid.to_string(),
                })
            })
            .collect(),
    )
}

proptest! {
    #[test]
    fn group_sums_equal_record_sums(recs in records()) {
        let rows = tabulate(
            &payload(&recs),
            &names(&["team", "pilot_name"]),
            &names(&["field_area", "amount"]),
            &FlatRecords,
        );
        let mut expected: HashMap<(String, String), (f64, f64)> = HashMap::new();
        for (team, pilot, area, paid) in &recs {
            let e = expected
                .entry((format!("T{team}"), format!("P{pilot}")))
                .or_insert((0.0, 0.0));
            e.0 += f64::from(*area);
            e.1 += f64::from(*paid);
        }
        prop_assert_eq!(rows.len(), expected.len());
        for row in &rows {
            let key = (
                row.key("team").unwrap().to_string(),
                row.key("pilot_name").unwrap().to_string(),
            );
            let (area, paid) = expected[&key];
            prop_assert_eq!(row.measure("field_area"), Some(area));
            prop_assert_eq!(row.measure("amount"), Some(paid));
        }
    }

    #[test]
    fn subtotals_round_trip_after_filtering(recs in records(), hide_zero in any::<bool>()) {
        let measures = names(&["field_area", "amount"]);
        let rows = tabulate(&payload(&recs), &names(&["team", "pilot_name"]), &measures, &FlatRecords);
        let spec = if hide_zero {
            FilterSpec::new().with(Predicate::non_zero("field_area"))
        } else {
            FilterSpec::new()
        };
        let visible = apply_filters(&rows, &spec);
        let subs = compute_group_subtotals(&visible, &names(&["team"]), &measures);
        prop_assert_eq!(subs.combined(&measures), compute_totals(&visible, &measures));
    }

    #[test]
    fn tabulation_is_deterministic(recs in records()) {
        let p = payload(&recs);
        let key = names(&["team"]);
        let measures = names(&["field_area"]);
        prop_assert_eq!(
            tabulate(&p, &key, &measures, &FlatRecords),
            tabulate(&p, &key, &measures, &FlatRecords)
        );
    }
}
