//! Report aggregation engine for the drone-operations dashboard.
//!
//! A report is one pass through:
//! - `flatten`: backend payload → flat records
//! - `tabulate`: records → grouped rows with summed measures
//! - `filters`: dropdown/threshold predicates and stable sorting
//! - `totals`: grand totals and per-subgroup subtotals
//! - `output`: flat string tables for CSV/JSON/markdown sinks
//!
//! `report` wires the stages together from a serializable
//! [`ReportDefinition`](report::ReportDefinition); `catalog` holds the
//! dashboard's own reports.
pub mod catalog;
pub mod derived;
pub mod error;
pub mod fetch;
pub mod filters;
pub mod flatten;
pub mod loader;
pub mod output;
pub mod report;
pub mod tabulate;
pub mod totals;
pub mod types;
pub mod util;

pub use error::{ReportError, Result};
pub use filters::{apply_filters, apply_sort, FilterSpec, Predicate, SortDirection, SortSpec};
pub use flatten::{Flattener, PayloadShape};
pub use report::{run_report, Report, ReportDefinition, ReportOutput};
pub use tabulate::{tabulate, Tabulator};
pub use totals::{compute_group_subtotals, compute_totals, Subtotals};
pub use types::{AggregatedRow, GroupKey, RawRecord, TotalsRow};
pub use util::to_safe_number;
