use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::DetectorConfig;
use crate::findings::{Finding, RuleId, Severity};
use crate::parser::Event;

pub const EVENT_LOGON_FAILED: u32 = 4625;
pub const EVENT_ACCOUNT_CREATED: u32 = 4720;
pub const EVENT_ADMIN_GROUP_ADD: u32 = 4732;
pub const EVENT_AUDIT_LOG_CLEARED: u32 = 1102;
pub const EVENT_PROCESS_CREATED: u32 = 4688;

type Identity = (Option<String>, Option<String>);

/// Run every rule in declaration order and concatenate the findings.
pub fn detect(events: &[Event], config: &DetectorConfig) -> Vec<Finding> {
    let mut findings = Vec::new();
    findings.extend(failed_login_burst(events, config));
    findings.extend(admin_account_created(events));
    findings.extend(added_to_admin_group(events));
    findings.extend(audit_log_cleared(events));
    findings.extend(encoded_powershell(events));

    info!("{} findings from {} events", findings.len(), events.len());
    findings
}

/// AUTH-001. One finding per (user, source_address) whose failed logons reach
/// `threshold` inside any forward window `[t, t + window_minutes]`. The first
/// qualifying window wins; later windows for the same pair are not scanned.
pub fn failed_login_burst(events: &[Event], config: &DetectorConfig) -> Vec<Finding> {
    // Pairs in order of first appearance so output is stable.
    let mut order: Vec<Identity> = Vec::new();
    let mut failures: HashMap<Identity, Vec<DateTime<Utc>>> = HashMap::new();

    for event in events {
        if event.event_code != Some(EVENT_LOGON_FAILED) {
            continue;
        }
        let Some(ts) = event.timestamp else {
            debug!("Dropping failed logon without a usable timestamp");
            continue;
        };

        let key = (event.user.clone(), event.source_address.clone());
        failures
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(ts);
    }

    // A window too wide for chrono has no upper bound.
    let window = Duration::try_minutes(config.window_minutes);
    let mut findings = Vec::new();

    for key in order {
        let Some(timestamps) = failures.get_mut(&key) else {
            continue;
        };
        timestamps.sort();

        let burst = timestamps.iter().find_map(|start| {
            let end = window.and_then(|w| start.checked_add_signed(w));
            let count = timestamps
                .iter()
                .filter(|ts| **ts >= *start && end.map_or(true, |end| **ts <= end))
                .count();
            (count >= config.threshold).then_some(count)
        });

        if let Some(count) = burst {
            let (user, ip) = key;
            findings.push(Finding::new(
                RuleId::FailedLoginBurst,
                Severity::Medium,
                "Failed login burst (possible password guessing)",
                json!({
                    "user": user,
                    "ip": ip,
                    "count": count,
                    "window_minutes": config.window_minutes,
                }),
                &["AC-7", "IA-2", "AU-6"],
                "Supports monitoring of authentication anomalies and audit review.",
            ));
        }
    }

    findings
}

fn per_event<F>(events: &[Event], matches: F, build: fn(Value) -> Finding) -> Vec<Finding>
where
    F: Fn(&Event) -> bool,
{
    events
        .iter()
        .filter(|e| matches(e))
        .map(|e| build(json!({ "event": e })))
        .collect()
}

/// ACCT-001.
pub fn admin_account_created(events: &[Event]) -> Vec<Finding> {
    per_event(
        events,
        |e| e.event_code == Some(EVENT_ACCOUNT_CREATED),
        |evidence| {
            Finding::new(
                RuleId::AccountCreated,
                Severity::High,
                "New user account created",
                evidence,
                &["AC-2", "IA-2", "AU-6"],
                "Account creation must be authorized and auditable.",
            )
        },
    )
}

/// PRIV-001.
pub fn added_to_admin_group(events: &[Event]) -> Vec<Finding> {
    per_event(
        events,
        |e| e.event_code == Some(EVENT_ADMIN_GROUP_ADD),
        |evidence| {
            Finding::new(
                RuleId::AddedToAdminGroup,
                Severity::High,
                "User added to Administrators group",
                evidence,
                &["AC-2", "AC-6", "AU-6"],
                "Privilege escalation should follow least privilege principles.",
            )
        },
    )
}

/// AUD-001.
pub fn audit_log_cleared(events: &[Event]) -> Vec<Finding> {
    per_event(
        events,
        |e| e.event_code == Some(EVENT_AUDIT_LOG_CLEARED),
        |evidence| {
            Finding::new(
                RuleId::AuditLogCleared,
                Severity::Critical,
                "Audit log cleared",
                evidence,
                &["AU-9", "AU-6", "IR-4"],
                "Audit integrity loss may indicate anti-forensics activity.",
            )
        },
    )
}

fn is_encoded_powershell(message: &str) -> bool {
    let msg = message.to_lowercase();
    msg.contains("powershell") && (msg.contains(" -enc ") || msg.contains("encodedcommand"))
}

/// PROC-001. Process creation whose command line runs PowerShell with an
/// encoded payload. Events without a message never match.
pub fn encoded_powershell(events: &[Event]) -> Vec<Finding> {
    per_event(
        events,
        |e| {
            e.event_code == Some(EVENT_PROCESS_CREATED)
                && e.message.as_deref().is_some_and(is_encoded_powershell)
        },
        |evidence| {
            Finding::new(
                RuleId::EncodedPowerShell,
                Severity::High,
                "Encoded PowerShell execution detected",
                evidence,
                &["SI-4", "AU-6", "IR-4"],
                "Obfuscated command execution may indicate malicious activity.",
            )
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_timestamp;

    fn failed(user: &str, ip: &str, ts: &str) -> Event {
        Event {
            timestamp: parse_timestamp(ts),
            event_code: Some(EVENT_LOGON_FAILED),
            user: Some(user.to_string()),
            source_address: Some(ip.to_string()),
            ..Event::default()
        }
    }

    fn process(message: Option<&str>) -> Event {
        Event {
            event_code: Some(EVENT_PROCESS_CREATED),
            message: message.map(str::to_string),
            ..Event::default()
        }
    }

    #[test]
    fn test_oversized_window_is_unbounded() {
        let events = vec![
            failed("alice", "10.0.0.5", "2026-01-07T10:00:00Z"),
            failed("alice", "10.0.0.5", "2026-03-07T10:00:00Z"),
            failed("alice", "10.0.0.5", "2027-01-07T10:00:00Z"),
        ];

        for minutes in [200_000_000_000, i64::MAX] {
            let findings = failed_login_burst(&events, &DetectorConfig::new(3, minutes));
            assert_eq!(findings.len(), 1);
            assert_eq!(findings[0].evidence["count"], 3);
        }
    }

    #[test]
    fn test_three_failures_in_five_minutes() {
        let events = vec![
            failed("alice", "10.0.0.5", "2026-01-07T10:00:00Z"),
            failed("alice", "10.0.0.5", "2026-01-07T10:02:00Z"),
            failed("alice", "10.0.0.5", "2026-01-07T10:04:00Z"),
        ];

        let findings = failed_login_burst(&events, &DetectorConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, RuleId::FailedLoginBurst);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[0].evidence["count"], 3);
        assert_eq!(findings[0].evidence["user"], "alice");
        assert_eq!(findings[0].evidence["ip"], "10.0.0.5");
        assert_eq!(findings[0].evidence["window_minutes"], 5);
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let events = vec![
            failed("bob", "10.0.0.9", "2026-01-07T10:00:00Z"),
            failed("bob", "10.0.0.9", "2026-01-07T10:03:00Z"),
            failed("bob", "10.0.0.9", "2026-01-07T10:05:00Z"),
        ];
        assert_eq!(failed_login_burst(&events, &DetectorConfig::default()).len(), 1);

        let spread = vec![
            failed("bob", "10.0.0.9", "2026-01-07T10:00:00Z"),
            failed("bob", "10.0.0.9", "2026-01-07T10:03:00Z"),
            failed("bob", "10.0.0.9", "2026-01-07T10:05:01Z"),
        ];
        assert!(failed_login_burst(&spread, &DetectorConfig::default()).is_empty());
    }

    #[test]
    fn test_at_most_one_finding_per_pair() {
        // Two separate bursts an hour apart for the same pair.
        let mut events = Vec::new();
        for ts in [
            "2026-01-07T10:00:00Z",
            "2026-01-07T10:01:00Z",
            "2026-01-07T10:02:00Z",
            "2026-01-07T11:00:00Z",
            "2026-01-07T11:01:00Z",
            "2026-01-07T11:02:00Z",
            "2026-01-07T11:03:00Z",
        ] {
            events.push(failed("carol", "10.0.0.7", ts));
        }
        events.push(failed("dave", "10.0.0.7", "2026-01-07T10:00:00Z"));

        let findings = failed_login_burst(&events, &DetectorConfig::default());
        assert_eq!(findings.len(), 1);
        // First qualifying window, not the largest one.
        assert_eq!(findings[0].evidence["count"], 3);
    }

    #[test]
    fn test_unsorted_input_and_pair_order() {
        let events = vec![
            failed("erin", "192.0.2.1", "2026-01-07T10:04:00Z"),
            failed("frank", "192.0.2.2", "2026-01-07T09:00:00Z"),
            failed("erin", "192.0.2.1", "2026-01-07T10:00:00Z"),
            failed("frank", "192.0.2.2", "2026-01-07T09:01:00Z"),
            failed("erin", "192.0.2.1", "2026-01-07T10:02:00Z"),
            failed("frank", "192.0.2.2", "2026-01-07T09:02:00Z"),
        ];

        let findings = failed_login_burst(&events, &DetectorConfig::default());
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].evidence["user"], "erin");
        assert_eq!(findings[1].evidence["user"], "frank");
    }

    #[test]
    fn test_untimestamped_failures_are_not_counted() {
        let mut events = vec![
            failed("gina", "10.1.1.1", "2026-01-07T10:00:00Z"),
            failed("gina", "10.1.1.1", "2026-01-07T10:01:00Z"),
        ];
        events.push(failed("gina", "10.1.1.1", "garbage"));
        events.push(failed("gina", "10.1.1.1", ""));

        assert!(failed_login_burst(&events, &DetectorConfig::default()).is_empty());
    }

    #[test]
    fn test_custom_threshold_and_window() {
        let events = vec![
            failed("hank", "10.2.2.2", "2026-01-07T10:00:00Z"),
            failed("hank", "10.2.2.2", "2026-01-07T10:09:00Z"),
        ];
        let config = DetectorConfig::new(2, 10);

        let findings = failed_login_burst(&events, &config);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].evidence["window_minutes"], 10);
    }

    #[test]
    fn test_audit_log_cleared_one_to_one() {
        let events = vec![
            Event::with_code(EVENT_AUDIT_LOG_CLEARED),
            Event::with_code(4624),
            Event::with_code(EVENT_AUDIT_LOG_CLEARED),
        ];

        let findings = audit_log_cleared(&events);
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.severity == Severity::Critical));
        assert_eq!(findings[0].controls, vec!["AU-9", "AU-6", "IR-4"]);
        assert_eq!(findings[0].evidence["event"]["event_code"], 1102);
    }

    #[test]
    fn test_account_and_group_rules() {
        let events = vec![
            Event::with_code(EVENT_ACCOUNT_CREATED),
            Event::with_code(EVENT_ADMIN_GROUP_ADD),
            Event::with_code(EVENT_ADMIN_GROUP_ADD),
        ];

        assert_eq!(admin_account_created(&events).len(), 1);
        let privs = added_to_admin_group(&events);
        assert_eq!(privs.len(), 2);
        assert_eq!(privs[0].controls, vec!["AC-2", "AC-6", "AU-6"]);
    }

    #[test]
    fn test_encoded_powershell_matching() {
        let events = vec![
            process(Some("C:\\Windows\\PowerShell.exe -Enc SQBFAFgA")),
            process(Some("powershell.exe -EncodedCommand SQBFAFgA")),
            process(Some("powershell.exe -File build.ps1")),
            process(Some("cmd.exe /c echo -enc ")),
            process(Some("powershell.exe -enc")),
            process(None),
            Event {
                event_code: Some(4624),
                message: Some("powershell -enc AAAA".to_string()),
                ..Event::default()
            },
        ];

        let findings = encoded_powershell(&events);
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.rule_id == RuleId::EncodedPowerShell));
    }

    #[test]
    fn test_detect_concatenates_in_rule_order() {
        let events = vec![
            process(Some("powershell -enc AAAA")),
            Event::with_code(EVENT_AUDIT_LOG_CLEARED),
            Event::with_code(EVENT_ADMIN_GROUP_ADD),
            Event::with_code(EVENT_ACCOUNT_CREATED),
            failed("ivan", "10.3.3.3", "2026-01-07T10:00:00Z"),
            failed("ivan", "10.3.3.3", "2026-01-07T10:00:30Z"),
            failed("ivan", "10.3.3.3", "2026-01-07T10:01:00Z"),
        ];

        let ids: Vec<String> = detect(&events, &DetectorConfig::default())
            .iter()
            .map(|f| f.rule_id.to_string())
            .collect();
        assert_eq!(ids, vec!["AUTH-001", "ACCT-001", "PRIV-001", "AUD-001", "PROC-001"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(detect(&[], &DetectorConfig::default()).is_empty());
    }
}
