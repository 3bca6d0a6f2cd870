// Entry point and high-level CLI flow.
//
// - Option [1] loads a saved backend payload (JSON) and prints what it holds.
// - Option [2] runs every report over the payload, writes one CSV per report
//   plus a JSON summary of the totals, and previews each table.
// - After generating reports, the user can go back to the menu or exit.
//
// Usage: agri_report [payload.json] [reports.json]
// Without a reports file the built-in catalog is used.
use agri_report::fetch::LatestPayload;
use agri_report::output::{self, ExportTable};
use agri_report::report::{run_report, ReportDefinition};
use agri_report::{catalog, loader, util};
use log::{error, info};
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::io::{self, Write};
use std::path::Path;

// The newest payload. Loading again replaces it; a load that finishes after
// a newer one has started is dropped.
static APP_STATE: Lazy<LatestPayload<Value>> = Lazy::new(LatestPayload::new);

const DEFAULT_PAYLOAD: &str = "report_payload.json";
const DEFAULT_DEFINITIONS: &str = "reports.json";

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Ask the user whether to go back to the menu after generating reports.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Report Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        io::stdin().read_line(&mut buf).ok();
        match buf.trim().to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Handle option [1]: load the payload file.
fn handle_load(path: &str) {
    let ticket = APP_STATE.begin();
    match loader::load_payload(path) {
        Ok((payload, load_report)) => {
            println!(
                "Loaded {} ({} bytes, {} top-level entries)",
                path,
                util::format_int(load_report.bytes),
                util::format_int(load_report.top_level_entries)
            );
            if !load_report.sections.is_empty() {
                println!("Sections: {}", load_report.sections.join(", "));
            }
            println!();
            if !APP_STATE.complete(ticket, payload) {
                println!("A newer load is in progress; this one was discarded.\n");
            }
        }
        Err(e) => {
            error!("load failed: {}", e);
            eprintln!("Failed to load file: {}\n", e);
        }
    }
}

fn definitions(path: &str) -> Vec<ReportDefinition> {
    if !Path::new(path).exists() {
        info!("{} not found, using built-in reports", path);
        return catalog::builtin();
    }
    match loader::load_definitions(path) {
        Ok(defs) => defs,
        Err(e) => {
            eprintln!("Failed to load report definitions: {}", e);
            eprintln!("Falling back to built-in reports.\n");
            catalog::builtin()
        }
    }
}

/// Handle option [2]: run every report and write its outputs.
fn handle_generate_reports(definitions_path: &str) {
    let Some(payload) = APP_STATE.get() else {
        println!("Error: No data loaded. Please load the payload file first (option 1).\n");
        return;
    };

    println!("Generating reports...\n");
    let mut summary = Map::new();
    let defs = definitions(definitions_path);
    let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
    for (no, def) in defs.iter().enumerate() {
        let out = run_report(def, loader::section(&payload, &def.name, &names));
        let table = ExportTable::build(&out, &output::column_manifest(def));
        let file = format!("{}.csv", def.name);
        if let Err(e) = output::write_csv(&file, &table) {
            eprintln!("Write error: {}", e);
        }

        let title = if def.title.is_empty() { &def.name } else { &def.title };
        println!("Report {}: {}\n", no + 1, title);
        output::preview_table(&table, 5);
        println!("(Full table exported to {})\n", file);

        match serde_json::to_value(&out.totals) {
            Ok(totals) => {
                summary.insert(def.name.clone(), totals);
            }
            Err(e) => eprintln!("Summary error: {}", e),
        }
    }

    if let Err(e) = output::write_json("summary.json", &summary) {
        eprintln!("Write error: {}", e);
    }
    println!("Totals saved to summary.json\n");
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    let payload_path = args.get(1).map(String::as_str).unwrap_or(DEFAULT_PAYLOAD);
    let definitions_path = args.get(2).map(String::as_str).unwrap_or(DEFAULT_DEFINITIONS);

    loop {
        println!("Select Option:");
        println!("[1] Load the payload");
        println!("[2] Generate Reports\n");
        match read_choice().as_str() {
            "1" => handle_load(payload_path),
            "2" => {
                println!();
                handle_generate_reports(definitions_path);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => println!("Invalid choice. Please enter 1 or 2.\n"),
        }
    }
}
