use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{Result, TriageError};
use crate::findings::Finding;

/// A POA&M line item. One per enriched finding.
#[derive(Debug, Clone, PartialEq)]
pub struct RemediationRecord {
    pub id: String,
    pub date_identified: NaiveDate,
    pub severity: String,
    pub weakness: String,
    pub controls: Vec<String>,
    pub risk_statement: String,
    pub recommended_actions: Vec<String>,
    pub status: String,
    pub notes: String,
}

/// Flat CSV shape of a record.
#[derive(Debug, Serialize, Deserialize)]
struct PoamRow {
    #[serde(alias = "poam_id")]
    id: String,
    date_identified: NaiveDate,
    severity: String,
    weakness_or_deficiency: String,
    #[serde(alias = "nist_800_53_controls")]
    controls: String,
    risk_statement: String,
    recommended_actions: String,
    status: String,
    #[serde(default)]
    notes: String,
}

fn split_list(raw: &str, sep: char) -> Vec<String> {
    raw.split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl From<&RemediationRecord> for PoamRow {
    fn from(r: &RemediationRecord) -> Self {
        PoamRow {
            id: r.id.clone(),
            date_identified: r.date_identified,
            severity: r.severity.clone(),
            weakness_or_deficiency: r.weakness.clone(),
            controls: r.controls.join(", "),
            risk_statement: r.risk_statement.clone(),
            recommended_actions: r.recommended_actions.join(" | "),
            status: r.status.clone(),
            notes: r.notes.clone(),
        }
    }
}

impl From<PoamRow> for RemediationRecord {
    fn from(row: PoamRow) -> Self {
        RemediationRecord {
            id: row.id,
            date_identified: row.date_identified,
            severity: row.severity,
            weakness: row.weakness_or_deficiency,
            controls: split_list(&row.controls, ','),
            risk_statement: row.risk_statement,
            recommended_actions: split_list(&row.recommended_actions, '|'),
            status: row.status,
            notes: row.notes,
        }
    }
}

/// Number findings POAM-001, POAM-002, ... in input order.
pub fn to_records(findings: &[Finding], date_identified: NaiveDate) -> Vec<RemediationRecord> {
    findings
        .iter()
        .enumerate()
        .map(|(i, f)| RemediationRecord {
            id: format!("POAM-{:03}", i + 1),
            date_identified,
            severity: f.severity.to_string(),
            weakness: f.weakness(),
            controls: f.controls.clone(),
            risk_statement: f.risk_statement.clone().unwrap_or_default(),
            recommended_actions: f.recommended_actions.clone(),
            status: "Open".to_string(),
            notes: f.note.clone(),
        })
        .collect()
}

pub fn write_records(path: &Path, records: &[RemediationRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TriageError::io(parent, e))?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(PoamRow::from(record))?;
    }
    writer.flush().map_err(|e| TriageError::io(path, e))?;

    info!("Wrote {} POA&M rows to {}", records.len(), path.display());
    Ok(())
}

pub fn read_records(path: &Path) -> Result<Vec<RemediationRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize::<PoamRow>() {
        records.push(row?.into());
    }
    Ok(records)
}
