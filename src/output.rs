use crate::error::Result;
use crate::report::{ReportDefinition, ReportOutput};
use crate::types::{AggregatedRow, FieldValue, TotalsRow};
use crate::util::format_number;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tabled::{builder::Builder, settings::Style};

fn default_decimals() -> usize {
    2
}

/// One exported column: which row field it shows and under what header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub field: String,
    pub header: String,
    #[serde(default = "default_decimals")]
    pub decimals: usize,
}

impl Column {
    pub fn new(field: &str, header: &str) -> Self {
        Self {
            field: field.to_string(),
            header: header.to_string(),
            decimals: default_decimals(),
        }
    }

    pub fn decimals(mut self, decimals: usize) -> Self {
        self.decimals = decimals;
        self
    }
}

/// Columns of a report: the configured ones, or every group field, measure
/// and derived measure under its own name.
pub fn column_manifest(def: &ReportDefinition) -> Vec<Column> {
    if !def.columns.is_empty() {
        return def.columns.clone();
    }
    def.group_by
        .iter()
        .chain(&def.measures)
        .chain(def.derived.iter().map(|d| &d.name))
        .map(|f| Column::new(f, f))
        .collect()
}

/// A flat table of display strings for spreadsheet/PDF sinks.
///
/// Rows keep the exact order of the report output; the last row is the
/// totals row. Nothing is re-aggregated here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn cell(row: &AggregatedRow, col: &Column) -> String {
    match row.field(&col.field) {
        Some(FieldValue::Key(s)) => s.to_string(),
        Some(FieldValue::Measure(m)) => format_number(m, col.decimals),
        None => String::new(),
    }
}

fn totals_cells(totals: &TotalsRow, columns: &[Column]) -> Vec<String> {
    columns
        .iter()
        .enumerate()
        .map(|(i, col)| match totals.get(&col.field) {
            Some(v) => format_number(v, col.decimals),
            None if i == 0 => "Total".to_string(),
            None => String::new(),
        })
        .collect()
}

impl ExportTable {
    pub fn build(output: &ReportOutput, columns: &[Column]) -> Self {
        let headers = columns.iter().map(|c| c.header.clone()).collect();
        let mut rows: Vec<Vec<String>> = output
            .rows
            .iter()
            .map(|r| columns.iter().map(|c| cell(r, c)).collect())
            .collect();
        if !columns.is_empty() {
            rows.push(totals_cells(&output.totals, columns));
        }
        Self { headers, rows }
    }

    /// Markdown rendering of the header and the first `max_rows` rows.
    pub fn to_markdown(&self, max_rows: usize) -> String {
        let mut builder = Builder::default();
        builder.push_record(self.headers.clone());
        for r in self.rows.iter().take(max_rows) {
            builder.push_record(r.clone());
        }
        builder.build().with(Style::markdown()).to_string()
    }
}

pub fn write_csv<P: AsRef<Path>>(path: P, table: &ExportTable) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path.as_ref())?;
    wtr.write_record(&table.headers)?;
    for r in &table.rows {
        wtr.write_record(r)?;
    }
    wtr.flush()?;
    debug!("wrote {} rows to {}", table.rows.len(), path.as_ref().display());
    Ok(())
}

pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn preview_table(table: &ExportTable, max_rows: usize) {
    if table.rows.is_empty() {
        println!("(no rows)\n");
        return;
    }
    println!("{}\n", table.to_markdown(max_rows));
    if table.rows.len() > max_rows {
        println!("... {} more rows\n", table.rows.len() - max_rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::PayloadShape;
    use crate::report::run_report;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn output() -> (ReportDefinition, ReportOutput) {
        let def = ReportDefinition::new("payments", ["pilot_name"])
            .shape(PayloadShape::Flat)
            .measures(["amount"]);
        let payload = json!([
            {"pilot_name": "Ben", "amount": 1200.75},
            {"pilot_name": "Ana", "amount": 300}
        ]);
        let out = run_report(&def, &payload);
        (def, out)
    }

    #[test]
    fn rows_keep_order_and_end_with_totals() {
        let (def, out) = output();
        let table = ExportTable::build(&out, &column_manifest(&def));
        assert_eq!(table.headers, vec!["pilot_name", "amount"]);
        assert_eq!(
            table.rows,
            vec![
                vec!["Ben".to_string(), "1,200.75".to_string()],
                vec!["Ana".to_string(), "300.00".to_string()],
                vec!["Total".to_string(), "1,500.75".to_string()],
            ]
        );
    }

    #[test]
    fn configured_columns_pick_headers_and_precision() {
        let (_, out) = output();
        let cols = vec![
            Column::new("pilot_name", "Pilot"),
            Column::new("amount", "Paid (MYR)").decimals(0),
            Column::new("bonus", "Bonus"),
        ];
        let table = ExportTable::build(&out, &cols);
        assert_eq!(table.headers, vec!["Pilot", "Paid (MYR)", "Bonus"]);
        assert_eq!(table.rows[0], vec!["Ben", "1,201", ""]);
    }

    #[test]
    fn csv_sink_writes_header_and_rows() {
        let (def, out) = output();
        let table = ExportTable::build(&out, &column_manifest(&def));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payments.csv");
        write_csv(&path, &table).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "pilot_name,amount\nBen,\"1,200.75\"\nAna,300.00\nTotal,\"1,500.75\"\n"
        );
    }

    #[test]
    fn json_sink_serializes_output() {
        let (_, out) = output();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payments.json");
        write_json(&path, &out).unwrap();
        let back: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back["rows"][0]["pilot_name"], json!("Ben"));
        assert_eq!(back["totals"]["amount"], json!(1500.75));
        assert!(back.get("subtotals").is_none());
    }

    #[test]
    fn markdown_preview_truncates() {
        let (def, out) = output();
        let table = ExportTable::build(&out, &column_manifest(&def));
        let md = table.to_markdown(1);
        assert!(md.contains("Ben"));
        assert!(!md.contains("Ana"));
    }
}
