//! Report retrieval by ID.
//!
//! Reads a stored landing report from the JSON file store and prints a
//! short header followed by the full document.

use anyhow::{bail, Result};

use crate::document::Node;
use crate::store::ReportStore;

/// Core get function returning the stored document.
pub fn get_report(store: &ReportStore, id: &str) -> Result<Node> {
    match store.load(id)? {
        Some(doc) => Ok(doc),
        None => bail!("report not found: {}", id),
    }
}

/// CLI entry point — loads the report and prints it to stdout.
pub fn run_get(store: &ReportStore, id: &str) -> Result<()> {
    let doc = get_report(store, id)?;

    println!("--- Landing Report {} ---", id);
    if let Some(kind) = doc.get("type_of_landing_report") {
        print_line("type", kind.attr("name").unwrap_or(&kind.display_value()));
    }
    if let Some(status) = doc.get("status") {
        print_line("status", status.attr("desc").unwrap_or(&status.display_value()));
    }
    if let Some(header) = doc.get("header") {
        if let Some(vessel) = header.get("vessel") {
            print_line("vessel", vessel.attr("name").unwrap_or(&vessel.display_value()));
        }
        if let Some(port) = header.get("port_of_landing") {
            print_line("port", port.attr("name").unwrap_or(&port.display_value()));
        }
        if let Some(landed) = header.get("date_of_landing").and_then(Node::text) {
            print_line("landed", landed);
        }
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

fn print_line(label: &str, value: &str) {
    if !value.is_empty() {
        println!("{}: {}", label, value);
    }
}
