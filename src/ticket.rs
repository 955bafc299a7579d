use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TriageError;
use crate::export::RemediationRecord;
use crate::findings::sla_days;

/// Lifecycle state. The label doubles as the bucket directory name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    AwaitingValidation,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::AwaitingValidation,
        TicketStatus::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::AwaitingValidation => "awaiting_validation",
            TicketStatus::Closed => "closed",
        }
    }

    /// States reachable in one move. Closed tickets may be reopened.
    pub fn allowed_transitions(self) -> &'static [TicketStatus] {
        match self {
            TicketStatus::Open => &[TicketStatus::InProgress],
            TicketStatus::InProgress => &[TicketStatus::AwaitingValidation, TicketStatus::Open],
            TicketStatus::AwaitingValidation => &[TicketStatus::Closed, TicketStatus::InProgress],
            TicketStatus::Closed => &[TicketStatus::InProgress],
        }
    }

    pub fn can_transition_to(self, to: TicketStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    pub fn is_active(self) -> bool {
        self != TicketStatus::Closed
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| TriageError::InvalidStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEntry {
    pub timestamp: NaiveDateTime,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceEntry {
    pub timestamp: NaiveDateTime,
    pub evidence: String,
}

/// Remediation ticket as persisted in its status bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub status: TicketStatus,
    pub owner: String,
    pub created_date: NaiveDateTime,
    pub due_date: NaiveDate,
    pub severity: String,
    pub weakness: String,
    pub controls: Vec<String>,
    pub risk_statement: String,
    pub recommended_actions: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<EvidenceEntry>,
    #[serde(default)]
    pub comments: Vec<CommentEntry>,
    pub last_updated: NaiveDateTime,
}

/// Ticket timestamps are kept at whole seconds.
pub fn truncate_to_seconds(at: NaiveDateTime) -> NaiveDateTime {
    at.with_nanosecond(0).unwrap_or(at)
}

pub fn format_ticket_id(n: u32) -> String {
    format!("TICKET-{:03}", n)
}

/// Numeric part of "TICKET-NNN".
pub fn ticket_number(ticket_id: &str) -> Option<u32> {
    ticket_id.strip_prefix("TICKET-")?.parse().ok()
}

impl Ticket {
    /// New open ticket; due date follows the severity SLA.
    pub fn from_record(
        record: &RemediationRecord,
        ticket_id: String,
        owner: &str,
        now: NaiveDateTime,
    ) -> Self {
        let now = truncate_to_seconds(now);
        let due_date = now.date() + Duration::days(sla_days(&record.severity));

        Self {
            ticket_id,
            status: TicketStatus::Open,
            owner: owner.to_string(),
            created_date: now,
            due_date,
            severity: record.severity.clone(),
            weakness: record.weakness.clone(),
            controls: record.controls.clone(),
            risk_statement: record.risk_statement.clone(),
            recommended_actions: record.recommended_actions.clone(),
            evidence: Vec::new(),
            comments: Vec::new(),
            last_updated: now,
        }
    }

    pub fn add_comment(&mut self, text: &str, now: NaiveDateTime) {
        let now = truncate_to_seconds(now);
        self.comments.push(CommentEntry {
            timestamp: now,
            comment: text.to_string(),
        });
        self.last_updated = now;
    }

    pub fn add_evidence(&mut self, text: &str, now: NaiveDateTime) {
        let now = truncate_to_seconds(now);
        self.evidence.push(EvidenceEntry {
            timestamp: now,
            evidence: text.to_string(),
        });
        self.last_updated = now;
    }

    /// Apply a lifecycle move, refusing edges outside the transition table.
    pub fn transition(&mut self, to: TicketStatus, now: NaiveDateTime) -> Result<(), TriageError> {
        if !self.status.can_transition_to(to) {
            return Err(TriageError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.last_updated = truncate_to_seconds(now);
        Ok(())
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        today > self.due_date
    }
}
