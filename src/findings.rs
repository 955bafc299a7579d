use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Sort key: Critical first.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
        }
    }

    /// Remediation SLA in days.
    pub fn sla_days(self) -> i64 {
        match self {
            Severity::Critical => 7,
            Severity::High => 14,
            Severity::Medium => 30,
            Severity::Low => 60,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Critical" => Ok(Severity::Critical),
            "High" => Ok(Severity::High),
            "Medium" => Ok(Severity::Medium),
            "Low" => Ok(Severity::Low),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// Sort key for free-form severity labels; unknown labels sort last.
pub fn severity_rank(label: &str) -> u8 {
    label.parse::<Severity>().map(Severity::rank).unwrap_or(99)
}

/// Days allowed to remediate, 30 when the label is not a known severity.
pub fn sla_days(label: &str) -> i64 {
    label.parse::<Severity>().map(Severity::sla_days).unwrap_or(30)
}

/// Which rule produced a finding. Ids read back from disk that this build
/// does not know are kept verbatim in `Other`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleId {
    FailedLoginBurst,
    AccountCreated,
    AddedToAdminGroup,
    AuditLogCleared,
    EncodedPowerShell,
    Other(String),
}

impl RuleId {
    pub fn as_str(&self) -> &str {
        match self {
            RuleId::FailedLoginBurst => "AUTH-001",
            RuleId::AccountCreated => "ACCT-001",
            RuleId::AddedToAdminGroup => "PRIV-001",
            RuleId::AuditLogCleared => "AUD-001",
            RuleId::EncodedPowerShell => "PROC-001",
            RuleId::Other(id) => id,
        }
    }
}

impl From<String> for RuleId {
    fn from(id: String) -> Self {
        match id.as_str() {
            "AUTH-001" => RuleId::FailedLoginBurst,
            "ACCT-001" => RuleId::AccountCreated,
            "PRIV-001" => RuleId::AddedToAdminGroup,
            "AUD-001" => RuleId::AuditLogCleared,
            "PROC-001" => RuleId::EncodedPowerShell,
            _ => RuleId::Other(id),
        }
    }
}

impl From<RuleId> for String {
    fn from(id: RuleId) -> Self {
        match id {
            RuleId::Other(id) => id,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/*
    controls    -- NIST 800-53 ids, order as attached by the rule
    note        -- RMF note carried into the POA&M record
    summary / risk_statement / recommended_actions -- set by enrichment
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: RuleId,
    pub severity: Severity,
    pub title: String,
    pub evidence: Value,

    #[serde(alias = "nist_800_53_controls")]
    pub controls: Vec<String>,

    #[serde(alias = "rmf_note")]
    pub note: String,

    #[serde(default, alias = "ai_summary", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_statement: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommended_actions: Vec<String>,
}

impl Finding {
    pub fn new(
        rule_id: RuleId,
        severity: Severity,
        title: &str,
        evidence: Value,
        controls: &[&str],
        note: &str,
    ) -> Self {
        Self {
            rule_id,
            severity,
            title: title.to_string(),
            evidence,
            controls: controls.iter().map(|c| c.to_string()).collect(),
            note: note.to_string(),
            summary: None,
            risk_statement: None,
            recommended_actions: Vec::new(),
        }
    }

    /// "<rule_id> - <title>", the POA&M weakness text.
    pub fn weakness(&self) -> String {
        format!("{} - {}", self.rule_id, self.title)
    }
}
