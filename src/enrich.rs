//! RMF enrichment: attach a risk statement, recommended actions and a short
//! Markdown summary to each finding. Template text only; no external calls.

use chrono::NaiveDateTime;

use crate::findings::{Finding, RuleId, Severity};

/// Static remediation guidance for one rule.
#[derive(Debug)]
pub struct Playbook {
    pub risk: &'static str,
    pub actions: &'static [&'static str],
}

static AUTH_001: Playbook = Playbook {
    risk: "Repeated authentication failures may indicate credential guessing, increasing the likelihood of unauthorized access if controls (e.g., lockout/MFA) are ineffective.",
    actions: &[
        "Validate whether the source IP is expected (VPN, admin subnet, known jump box).",
        "Check for additional failed logins for the same user across other hosts.",
        "If suspicious: reset credentials, review MFA status, and block IP if appropriate.",
        "Confirm AC-7 lockout policy and alert thresholds are enforced.",
    ],
};

static ACCT_001: Playbook = Playbook {
    risk: "Unauthorized account creation can enable persistence and unauthorized access, undermining account management controls and auditability.",
    actions: &[
        "Confirm account creation authorization (ticket/change record).",
        "Review who initiated creation and from what host.",
        "Check whether the account has been used for interactive logons.",
        "Ensure account provisioning follows AC-2 approval workflow.",
    ],
};

static PRIV_001: Playbook = Playbook {
    risk: "Unapproved elevation to administrative privileges can enable lateral movement and system compromise, violating least privilege expectations.",
    actions: &[
        "Confirm the group membership change is authorized and documented.",
        "Identify the actor who made the change and the originating system.",
        "Review recent activity for the newly-privileged account (logons, processes).",
        "Verify least privilege and remove membership if not required.",
    ],
};

static AUD_001: Playbook = Playbook {
    risk: "Clearing audit logs reduces visibility and may indicate anti-forensic activity, impairing detection, response, and accountability.",
    actions: &[
        "Treat as potential incident: preserve evidence and notify incident response.",
        "Determine which account cleared logs and why; validate authorization.",
        "Check for gaps in audit coverage and whether forwarding/central logging exists.",
        "Verify AU-9 protections (access controls, forwarding, write-once storage).",
    ],
};

static PROC_001: Playbook = Playbook {
    risk: "Obfuscated PowerShell execution may indicate malicious command execution and can facilitate defense evasion, persistence, or payload delivery.",
    actions: &[
        "Decode and review the PowerShell command if possible; look for persistence or payload download.",
        "Correlate process creation with network connections and file writes.",
        "Verify whether script execution policy controls are enforced.",
        "If suspicious: isolate host and initiate incident handling procedures.",
    ],
};

/// Used for any rule id without its own playbook.
pub static GENERIC: Playbook = Playbook {
    risk: "Potential security risk identified; investigate and assess impact.",
    actions: &[
        "Investigate and validate legitimacy.",
        "Document outcome and remediate as appropriate.",
    ],
};

impl RuleId {
    pub fn playbook(&self) -> Option<&'static Playbook> {
        match self {
            RuleId::FailedLoginBurst => Some(&AUTH_001),
            RuleId::AccountCreated => Some(&ACCT_001),
            RuleId::AddedToAdminGroup => Some(&PRIV_001),
            RuleId::AuditLogCleared => Some(&AUD_001),
            RuleId::EncodedPowerShell => Some(&PROC_001),
            RuleId::Other(_) => None,
        }
    }
}

pub fn guidance(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => {
            "Immediate response required; potential compromise or loss of audit integrity."
        }
        Severity::High => "Likely security impact; requires timely investigation and remediation.",
        Severity::Medium => {
            "Suspicious behavior; investigate to confirm legitimacy and tune controls."
        }
        Severity::Low => "Informational; track trends and verify expected behavior.",
    }
}

pub fn summarize(finding: &Finding) -> String {
    format!(
        "**{}**\n\n- **Rule:** {}\n- **Severity:** {} - {}\n- **NIST 800-53 Controls:** {}\n",
        finding.title,
        finding.rule_id,
        finding.severity,
        guidance(finding.severity),
        finding.controls.join(", "),
    )
}

/// Return a copy of `finding` with summary, risk statement and actions set
/// from the rule's playbook. Applying it twice changes nothing.
pub fn enrich(finding: &Finding) -> Finding {
    let playbook = finding.rule_id.playbook().unwrap_or(&GENERIC);

    let mut enriched = finding.clone();
    enriched.summary = Some(summarize(finding));
    enriched.risk_statement = Some(playbook.risk.to_string());
    enriched.recommended_actions = playbook.actions.iter().map(|a| a.to_string()).collect();
    enriched
}

pub fn enrich_all(findings: &[Finding]) -> Vec<Finding> {
    findings.iter().map(enrich).collect()
}

/// Markdown report with one section per enriched finding.
pub fn render_summary(findings: &[Finding], generated_at: NaiveDateTime) -> String {
    let mut lines = vec![
        "# AI-Assisted RMF Findings Summary".to_string(),
        format!("_Generated: {}_\n", generated_at.format("%Y-%m-%dT%H:%M:%S")),
    ];

    for f in findings {
        lines.push(format!("## [{}] {} - {}\n", f.severity, f.rule_id, f.title));
        lines.push(f.summary.clone().unwrap_or_else(|| summarize(f)));
        if let Some(risk) = &f.risk_statement {
            lines.push(format!("**Risk statement (RMF-style):** {}\n", risk));
        }
        lines.push("**Recommended actions:**".to_string());
        for action in &f.recommended_actions {
            lines.push(format!("- {}", action));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn finding(rule_id: RuleId, severity: Severity) -> Finding {
        Finding::new(
            rule_id,
            severity,
            "Audit log cleared",
            json!({}),
            &["AU-9", "AU-6", "IR-4"],
            "note",
        )
    }

    #[test]
    fn test_known_rule_gets_its_playbook() {
        let enriched = enrich(&finding(RuleId::AuditLogCleared, Severity::Critical));
        assert_eq!(enriched.risk_statement.as_deref(), Some(AUD_001.risk));
        assert_eq!(enriched.recommended_actions.len(), 4);
        assert!(enriched.recommended_actions[3].contains("AU-9"));

        let summary = enriched.summary.unwrap();
        assert!(summary.contains("**Rule:** AUD-001"));
        assert!(summary.contains("Immediate response required"));
        assert!(summary.contains("AU-9, AU-6, IR-4"));
    }

    #[test]
    fn test_unknown_rule_falls_back() {
        let enriched = enrich(&finding(RuleId::Other("NET-009".into()), Severity::Low));
        assert_eq!(enriched.risk_statement.as_deref(), Some(GENERIC.risk));
        assert_eq!(
            enriched.recommended_actions,
            vec![
                "Investigate and validate legitimacy.",
                "Document outcome and remediate as appropriate."
            ]
        );
    }

    #[test]
    fn test_enrich_is_idempotent() {
        let once = enrich(&finding(RuleId::FailedLoginBurst, Severity::Medium));
        let twice = enrich(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_render_summary_sections() {
        let findings = enrich_all(&[
            finding(RuleId::AuditLogCleared, Severity::Critical),
            finding(RuleId::EncodedPowerShell, Severity::High),
        ]);
        let at = NaiveDate::from_ymd_opt(2026, 1, 7)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .unwrap();

        let md = render_summary(&findings, at);
        assert!(md.starts_with("# AI-Assisted RMF Findings Summary"));
        assert!(md.contains("_Generated: 2026-01-07T09:30:00_"));
        assert!(md.contains("## [Critical] AUD-001 - Audit log cleared"));
        assert!(md.contains("## [High] PROC-001"));
        assert!(md.contains("- Correlate process creation with network connections and file writes."));
    }
}
