//! Read-only rollups over every ticket in every bucket.
//!
//! The bucket a ticket was found in decides whether it is active or closed;
//! the status field inside the document is never consulted here.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;

use crate::findings::severity_rank;
use crate::state::StoredTicket;
use crate::ticket::TicketStatus;

pub const DEFAULT_TOP_N: usize = 10;
const CONTROL_ROLLUP_LINES: usize = 15;

/// The few ticket fields the report lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketLine {
    pub ticket_id: String,
    pub bucket: TicketStatus,
    pub severity: String,
    pub due_date: NaiveDate,
    pub weakness: String,
}

impl From<&StoredTicket> for TicketLine {
    fn from(s: &StoredTicket) -> Self {
        TicketLine {
            ticket_id: s.ticket.ticket_id.clone(),
            bucket: s.bucket,
            severity: s.ticket.severity.clone(),
            due_date: s.ticket.due_date,
            weakness: s.ticket.weakness.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    /// All four buckets, lifecycle order.
    pub by_status: Vec<(TicketStatus, usize)>,
    /// Severity label counts, Critical first, unknown labels last.
    pub by_severity: Vec<(String, usize)>,
    pub overdue: Vec<TicketLine>,
    pub top_active: Vec<TicketLine>,
    /// Control id mention counts, most mentioned first.
    pub control_rollup: Vec<(String, usize)>,
}

impl Dashboard {
    pub fn build(tickets: &[StoredTicket], today: NaiveDate, top_n: usize) -> Self {
        let by_status = TicketStatus::ALL
            .into_iter()
            .map(|status| {
                let count = tickets.iter().filter(|t| t.bucket == status).count();
                (status, count)
            })
            .collect();

        let mut severity_counts: HashMap<String, usize> = HashMap::new();
        for t in tickets {
            *severity_counts.entry(t.ticket.severity.clone()).or_default() += 1;
        }
        let mut by_severity: Vec<(String, usize)> = severity_counts.into_iter().collect();
        by_severity.sort_by(|a, b| {
            severity_rank(&a.0)
                .cmp(&severity_rank(&b.0))
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut overdue: Vec<TicketLine> = tickets
            .iter()
            .filter(|t| t.bucket.is_active() && t.ticket.is_overdue(today))
            .map(TicketLine::from)
            .collect();
        overdue.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.ticket_id.cmp(&b.ticket_id)));

        let mut top_active: Vec<TicketLine> = tickets
            .iter()
            .filter(|t| t.bucket.is_active())
            .map(TicketLine::from)
            .collect();
        top_active.sort_by_key(|t| (severity_rank(&t.severity), t.due_date));
        top_active.truncate(top_n);

        let mut control_counts: HashMap<String, usize> = HashMap::new();
        for t in tickets {
            for control in t.ticket.controls.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
                *control_counts.entry(control.to_string()).or_default() += 1;
            }
        }
        let mut control_rollup: Vec<(String, usize)> = control_counts.into_iter().collect();
        control_rollup.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Dashboard {
            by_status,
            by_severity,
            overdue,
            top_active,
            control_rollup,
        }
    }

    pub fn render_markdown(&self, generated_at: NaiveDateTime) -> String {
        let mut lines = vec![
            "# RMF Ticketing Dashboard".to_string(),
            format!("_Generated: {}_\n", generated_at.format("%Y-%m-%dT%H:%M:%S")),
            "## Status Summary".to_string(),
        ];
        for (status, count) in &self.by_status {
            lines.push(format!("- **{}**: {}", status, count));
        }
        lines.push(String::new());

        lines.push("## Severity Summary".to_string());
        for (severity, count) in &self.by_severity {
            lines.push(format!("- **{}**: {}", severity, count));
        }
        lines.push(String::new());

        lines.push("## Overdue Tickets".to_string());
        if self.overdue.is_empty() {
            lines.push("- None".to_string());
        }
        for t in &self.overdue {
            lines.push(format!(
                "- **{}** ({}) due {} - {}",
                t.ticket_id, t.severity, t.due_date, t.weakness
            ));
        }
        lines.push(String::new());

        lines.push("## Top Active Tickets (by severity then due date)".to_string());
        if self.top_active.is_empty() {
            lines.push("- None".to_string());
        }
        for t in &self.top_active {
            lines.push(format!(
                "- **{}** [{}] ({}) due {} - {}",
                t.ticket_id, t.bucket, t.severity, t.due_date, t.weakness
            ));
        }
        lines.push(String::new());

        lines.push("## NIST 800-53 Control Impact Rollup".to_string());
        for (control, count) in self.control_rollup.iter().take(CONTROL_ROLLUP_LINES) {
            lines.push(format!("- **{}**: {}", control, count));
        }
        lines.push(String::new());

        lines.join("\n")
    }
}
