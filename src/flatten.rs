//! Flattening documents into tabular rows.
//!
//! A landing report document projects to exactly one [`ReportRow`] plus
//! zero or more [`LineItemRow`]s and [`StatAreaRow`]s. The rows carry
//! the handful of scalar fields the browse and mirror layers filter on;
//! the full document rides along separately (`raw_json` in the mirror)
//! so nothing is lost.
//!
//! eLandings wraps most coded fields as `<field name="...">code</field>`
//! and emits sub-collections as repeated elements, which normalize to a
//! single node when a report has exactly one — [`Node::items`] smooths
//! that over.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::document::Node;

/// Flat parent row for one landing report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub id: i64,
    pub report_type: String,
    pub report_type_name: String,
    pub status: String,
    pub status_desc: String,
    pub vessel_adfg_number: String,
    pub vessel_name: String,
    pub port_code: String,
    pub port_name: String,
    pub gear_code: String,
    pub gear_name: String,
    pub date_of_landing: Option<String>,
    pub date_fishing_began: Option<String>,
    pub crew_size: Option<i64>,
    pub processor_code: String,
    pub processor_name: String,
    pub fish_ticket_number: String,
    pub data_entry_user: String,
    pub data_entry_date: Option<String>,
    pub last_change_user: String,
    pub last_change_date: Option<String>,
}

/// One catch line item, keyed back to its report.
#[derive(Debug, Clone, Serialize)]
pub struct LineItemRow {
    pub landing_report_id: i64,
    pub item_number: i64,
    pub species_code: String,
    pub species_name: String,
    pub weight: Option<f64>,
    pub condition_code: String,
    pub condition_name: String,
    pub disposition_code: String,
    pub disposition_name: String,
    pub fish_ticket_number: String,
}

/// One statistical-area worksheet entry, keyed back to its report.
#[derive(Debug, Clone, Serialize)]
pub struct StatAreaRow {
    pub landing_report_id: i64,
    pub item_number: i64,
    pub stat_area: String,
    pub fed_area: String,
    pub iphc_area: String,
    pub percent: Option<i64>,
}

/// Project the scalar header fields of a report into a [`ReportRow`].
pub fn flatten_report(document: &Node) -> Result<ReportRow> {
    let id = numeric_id(document).context("report has no numeric landing_report_id")?;

    let header = document.get("header");
    let vessel = header.and_then(|h| h.get("vessel"));
    let port = header.and_then(|h| h.get("port_of_landing"));
    let gear = header.and_then(|h| h.get("gear"));
    let proc_code = header
        .and_then(|h| h.get("proc_code_owner"))
        .and_then(|o| o.get("proc_code"));

    // permit_worksheet repeats for multi-permit landings; the header
    // fish ticket comes from the first one.
    let fish_ticket_number = header
        .and_then(|h| h.get("permit_worksheet"))
        .and_then(|ws| ws.items().first().copied())
        .and_then(|ws| ws.get("fish_ticket_number"))
        .map(Node::display_value)
        .unwrap_or_default();

    let report_type = document.get("type_of_landing_report");
    let status = document.get("status");

    Ok(ReportRow {
        id,
        report_type: value_of(report_type),
        report_type_name: attr_of(report_type, "name"),
        status: value_of(status),
        status_desc: attr_of(status, "desc"),
        vessel_adfg_number: value_of(vessel),
        vessel_name: attr_of(vessel, "name"),
        port_code: value_of(port),
        port_name: attr_of(port, "name"),
        gear_code: value_of(gear),
        gear_name: attr_of(gear, "name"),
        date_of_landing: clean_date(&value_of(header.and_then(|h| h.get("date_of_landing")))),
        date_fishing_began: clean_date(&value_of(
            header.and_then(|h| h.get("date_fishing_began")),
        )),
        crew_size: parse_int(&value_of(header.and_then(|h| h.get("crew_size")))),
        processor_code: value_of(proc_code),
        processor_name: attr_of(proc_code, "processor"),
        fish_ticket_number,
        data_entry_user: document.attr("data_entry_user").unwrap_or_default().to_string(),
        data_entry_date: clean_timestamp(document.attr("data_entry_submit_date")),
        last_change_user: document.attr("last_change_user").unwrap_or_default().to_string(),
        last_change_date: clean_timestamp(document.attr("last_change_date")),
    })
}

/// Extract the line items of a report. A report with a single item (the
/// common case for IFQ landings) yields a one-row vector.
pub fn line_items(document: &Node) -> Vec<LineItemRow> {
    let report_id = numeric_id(document).unwrap_or(0);
    let Some(items) = document.get("line_item") else {
        return Vec::new();
    };

    items
        .items()
        .into_iter()
        .map(|item| {
            let species = item.get("species");
            let condition = item.get("condition_code");
            let disposition = item.get("disposition_code");
            LineItemRow {
                landing_report_id: report_id,
                item_number: parse_int(&value_of(item.get("item_number"))).unwrap_or(0),
                species_code: value_of(species),
                species_name: attr_of(species, "name"),
                weight: parse_float(&value_of(item.get("weight"))),
                condition_code: value_of(condition),
                condition_name: attr_of(condition, "name"),
                disposition_code: value_of(disposition),
                disposition_name: attr_of(disposition, "name"),
                fish_ticket_number: value_of(item.get("fish_ticket_number")),
            }
        })
        .collect()
}

/// Extract the stat-area worksheet rows of a report.
pub fn stat_areas(document: &Node) -> Vec<StatAreaRow> {
    let report_id = numeric_id(document).unwrap_or(0);
    let Some(areas) = document.get("header").and_then(|h| h.get("stat_area_worksheet")) else {
        return Vec::new();
    };

    areas
        .items()
        .into_iter()
        .map(|area| {
            let stat_area = area.get("stat_area");
            StatAreaRow {
                landing_report_id: report_id,
                item_number: parse_int(&value_of(area.get("item_number"))).unwrap_or(0),
                stat_area: value_of(stat_area),
                fed_area: attr_of(stat_area, "fed_area"),
                iphc_area: attr_of(stat_area, "iphc_area"),
                percent: parse_int(&value_of(area.get("percent"))),
            }
        })
        .collect()
}

fn numeric_id(document: &Node) -> Option<i64> {
    document.report_id().and_then(|id| id.parse().ok())
}

fn value_of(node: Option<&Node>) -> String {
    node.map(Node::display_value).unwrap_or_default()
}

fn attr_of(node: Option<&Node>, name: &str) -> String {
    node.and_then(|n| n.attr(name)).unwrap_or_default().to_string()
}

fn parse_int(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

fn parse_float(raw: &str) -> Option<f64> {
    raw.trim().parse().ok()
}

/// Tidy the date formats eLandings emits: `2017-01-02-09:00` (date with
/// a dangling zone) becomes `2017-01-02`, full ISO timestamps pass
/// through, anything else is truncated to the date part.
fn clean_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let bytes = raw.as_bytes();
    if bytes.len() == 16 && bytes[10] == b'-' {
        return Some(raw[..10].to_string());
    }
    if raw.contains('T') {
        return Some(raw.to_string());
    }
    Some(raw.chars().take(10).collect())
}

fn clean_timestamp(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
