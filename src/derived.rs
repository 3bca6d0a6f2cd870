use crate::types::{AggregatedRow, TotalsRow};
use crate::util::safe_ratio;
use serde::{Deserialize, Serialize};

fn default_scale() -> f64 {
    1.0
}

/// A ratio column computed from two summed measures.
///
/// On totals it is the ratio of the summed columns, never a sum of the
/// per-row ratios. A zero denominator gives `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMeasure {
    pub name: String,
    pub numerator: String,
    pub denominator: String,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

impl DerivedMeasure {
    pub fn ratio(name: &str, numerator: &str, denominator: &str) -> Self {
        Self {
            name: name.to_string(),
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
            scale: 1.0,
        }
    }

    /// `numerator / denominator * 100`.
    pub fn percentage(name: &str, numerator: &str, denominator: &str) -> Self {
        Self {
            scale: 100.0,
            ..Self::ratio(name, numerator, denominator)
        }
    }

    pub fn evaluate(&self, numerator: f64, denominator: f64) -> f64 {
        safe_ratio(numerator, denominator, self.scale)
    }

    pub fn apply_to_row(&self, row: &mut AggregatedRow) {
        let value = self.evaluate(
            row.measure_or_zero(&self.numerator),
            row.measure_or_zero(&self.denominator),
        );
        row.set_measure(&self.name, value);
    }

    pub fn apply_to_totals(&self, totals: &mut TotalsRow) {
        let value = self.evaluate(
            totals.get_or_zero(&self.numerator),
            totals.get_or_zero(&self.denominator),
        );
        totals.set(&self.name, value);
    }
}
