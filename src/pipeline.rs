//! File-to-file stages, each reading the previous stage's output under a
//! [`Layout`] root.

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::config::{DetectorConfig, Layout};
use crate::dashboard::Dashboard;
use crate::detector;
use crate::enrich;
use crate::error::{Result, TriageError};
use crate::export::{self, RemediationRecord};
use crate::findings::Finding;
use crate::parser;
use crate::state::{StoredTicket, TicketStore};

fn write_text(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TriageError::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| TriageError::io(path, e))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_text(path, &serde_json::to_string_pretty(value)?)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).map_err(|e| TriageError::io(path, e))?;
    Ok(serde_json::from_str(raw.trim_start_matches('\u{feff}'))?)
}

/// raw/ -> normalized_events.csv. Returns the number of events written.
pub fn ingest(layout: &Layout) -> Result<usize> {
    let events = parser::ingest(&layout.synthetic_events(), &layout.real_events())?;
    let out = layout.normalized_events();
    parser::write_events(&out, &events)?;
    info!("Saved {} normalized events to {}", events.len(), out.display());
    Ok(events.len())
}

/// normalized_events.csv -> findings.json
pub fn detect(layout: &Layout, config: &DetectorConfig) -> Result<Vec<Finding>> {
    let events = parser::load_events(&layout.normalized_events())?;
    let findings = detector::detect(&events, config);
    write_json(&layout.findings(), &findings)?;
    Ok(findings)
}

/// findings.json -> findings_enriched.json + ai_summary.md
pub fn enrich(layout: &Layout, now: NaiveDateTime) -> Result<Vec<Finding>> {
    let findings: Vec<Finding> = read_json(&layout.findings())?;
    let enriched = enrich::enrich_all(&findings);
    write_json(&layout.enriched_findings(), &enriched)?;
    write_text(&layout.summary_report(), &enrich::render_summary(&enriched, now))?;
    Ok(enriched)
}

/// findings_enriched.json -> poam.csv
pub fn export(layout: &Layout, now: NaiveDateTime) -> Result<Vec<RemediationRecord>> {
    let findings: Vec<Finding> = read_json(&layout.enriched_findings())?;
    let records = export::to_records(&findings, now.date());
    export::write_records(&layout.poam(), &records)?;
    Ok(records)
}

/// poam.csv -> tickets/open/
pub fn open_tickets(store: &TicketStore, layout: &Layout, owner: &str) -> Result<Vec<StoredTicket>> {
    let records = export::read_records(&layout.poam())?;
    info!("Loaded POA&M rows: {}", records.len());
    store.create_from_records(&records, owner)
}

/// tickets/ -> DASHBOARD.md
pub fn dashboard(store: &TicketStore, layout: &Layout, now: NaiveDateTime, top_n: usize) -> Result<Dashboard> {
    let tickets = store.load_all()?;
    let dash = Dashboard::build(&tickets, now.date(), top_n);
    write_text(&layout.dashboard(), &dash.render_markdown(now))?;
    Ok(dash)
}

/// detect -> enrich -> export
pub fn run(layout: &Layout, config: &DetectorConfig, now: NaiveDateTime) -> Result<Vec<RemediationRecord>> {
    detect(layout, config)?;
    enrich(layout, now)?;
    export(layout, now)
}
