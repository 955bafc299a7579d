use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{Result, TriageError};

/// One normalized log line. Every field is optional; rules that need a
/// missing field simply do not match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub host: Option<String>,

    // If parsing fails, the event will not participate in time-based logic.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, alias = "event_id", deserialize_with = "lenient_code")]
    pub event_code: Option<u32>,

    #[serde(default)]
    pub level: Option<String>,

    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default, alias = "ip")]
    pub source_address: Option<String>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: Option<String>,
}

impl Event {
    pub fn with_code(code: u32) -> Self {
        Self {
            event_code: Some(code),
            ..Self::default()
        }
    }
}

/// Parse the timestamp shapes seen in exports:
///   "2026-01-07T11:48:14Z" / "+02:00" offsets   (RFC 3339)
///   "2026-01-07T11:48:14" or "2026-01-07 11:48:14.123" (naive, taken as UTC)
///   "2026-01-07"                                 (midnight)
///   "/Date(1767786494000)/"                      (PowerShell ConvertTo-Json)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    }

    if let Some(millis) = raw
        .strip_prefix("/Date(")
        .and_then(|rest| rest.strip_suffix(")/"))
        .and_then(|ms| ms.parse::<i64>().ok())
    {
        return DateTime::<Utc>::from_timestamp_millis(millis);
    }

    debug!("Unparseable timestamp {:?}, treating as absent", raw);
    None
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(i64),
    Float(f64),
    Text(String),
}

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Value> = Option::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(value_as_text).and_then(|t| parse_timestamp(&t)))
}

fn lenient_code<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let code = match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Int(n)) => u32::try_from(n).ok(),
        Some(Loose::Float(f)) if f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 => {
            Some(f as u32)
        }
        Some(Loose::Float(_)) => None,
        Some(Loose::Text(s)) => s.trim().parse().ok(),
        None => None,
    };
    Ok(code)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Tags {
    Many(Vec<String>),
    One(String),
    Other(Value),
}

fn lenient_tags<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags = Option::<Tags>::deserialize(deserializer)?.map(|t| match t {
        Tags::Many(list) => list.join(","),
        Tags::One(s) => s,
        Tags::Other(v) => v.to_string(),
    });
    Ok(tags.filter(|s| !s.is_empty()))
}

/// Load the normalized event CSV produced by `ingest`.
pub fn load_events(path: &Path) -> Result<Vec<Event>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut events = Vec::new();

    for (idx, row) in reader.deserialize::<Event>().enumerate() {
        match row {
            Ok(event) => events.push(event),
            Err(e) => warn!("Skipping row {} of {}: {}", idx + 1, path.display(), e),
        }
    }

    info!("Loaded {} events from {}", events.len(), path.display());
    Ok(events)
}

pub fn write_events(path: &Path, events: &[Event]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TriageError::io(parent, e))?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for event in events {
        writer.serialize(event)?;
    }
    writer.flush().map_err(|e| TriageError::io(path, e))?;
    Ok(())
}

fn read_text(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path).map_err(|e| TriageError::io(path, e))?;
    Ok(raw.trim_start_matches('\u{feff}').to_string())
}

/// Synthetic events, one JSON object per line, already in normalized shape.
pub fn read_jsonl(path: &Path) -> Result<Vec<Event>> {
    if !path.exists() {
        warn!("Missing synthetic file: {}", path.display());
        return Ok(Vec::new());
    }

    let content = read_text(path)?;
    let mut events = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim().trim_start_matches('\u{feff}');
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<JsonlEvent>(line) {
            Ok(event) => events.push(event.into()),
            Err(e) => warn!("Skipping line {} of {}: {}", idx + 1, path.display(), e),
        }
    }

    Ok(events)
}

/// A synthetic JSONL line. Scalars of the wrong JSON type are kept as text
/// (numbers) or dropped (anything else) instead of failing the line.
#[derive(Debug, Deserialize)]
struct JsonlEvent {
    #[serde(default)]
    source: Option<Value>,
    #[serde(default)]
    host: Option<Value>,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default, alias = "event_id", deserialize_with = "lenient_code")]
    event_code: Option<u32>,
    #[serde(default)]
    level: Option<Value>,
    #[serde(default)]
    provider: Option<Value>,
    #[serde(default)]
    user: Option<Value>,
    #[serde(default, alias = "ip")]
    source_address: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default, deserialize_with = "lenient_tags")]
    tags: Option<String>,
}

impl From<JsonlEvent> for Event {
    fn from(e: JsonlEvent) -> Self {
        let text = |v: Option<Value>| v.as_ref().and_then(value_as_text);
        Event {
            source: text(e.source),
            host: text(e.host),
            timestamp: text(e.timestamp).and_then(|t| parse_timestamp(&t)),
            event_code: e.event_code,
            level: text(e.level),
            provider: text(e.provider),
            user: text(e.user),
            source_address: text(e.source_address),
            message: text(e.message),
            tags: e.tags,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WindowsEvent {
    // rename keeps the Get-WinEvent export names intact.
    #[serde(rename = "TimeCreated")]
    time_created: Option<Value>,

    #[serde(rename = "Id")]
    id: Option<Value>,

    #[serde(rename = "LevelDisplayName")]
    level: Option<String>,

    #[serde(rename = "ProviderName")]
    provider: Option<String>,

    #[serde(rename = "MachineName")]
    machine: Option<String>,

    #[serde(rename = "Message")]
    message: Option<String>,
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl From<WindowsEvent> for Event {
    fn from(e: WindowsEvent) -> Self {
        let timestamp = e
            .time_created
            .as_ref()
            .and_then(value_as_text)
            .and_then(|t| parse_timestamp(&t));

        let event_code = e
            .id
            .as_ref()
            .and_then(value_as_text)
            .and_then(|id| id.trim().parse().ok());

        Event {
            source: Some("real".to_string()),
            host: Some(e.machine.filter(|m| !m.is_empty()).unwrap_or_else(|| "UNKNOWN".to_string())),
            timestamp,
            event_code,
            level: e.level,
            provider: e.provider,
            user: None,
            source_address: None,
            message: e.message,
            tags: None,
        }
    }
}

/// A Get-WinEvent export converted to JSON: either a single object or an array.
pub fn read_windows_export(path: &Path) -> Result<Vec<Event>> {
    if !path.exists() {
        info!("No real events file found (ok): {}", path.display());
        return Ok(Vec::new());
    }

    let raw = read_text(path)?;
    let data: Value = serde_json::from_str(&raw)?;

    let records = match data {
        Value::Array(items) => items,
        Value::Object(_) => vec![data],
        _ => {
            warn!("Unexpected top-level JSON in {}", path.display());
            Vec::new()
        }
    };

    let mut events = Vec::with_capacity(records.len());
    for record in records {
        let event: WindowsEvent = match serde_json::from_value(record) {
            Ok(e) => e,
            Err(_) => continue,
        };
        events.push(event.into());
    }

    Ok(events)
}

/// Merge synthetic and exported events into one normalized stream.
pub fn ingest(synthetic: &Path, real: &Path) -> Result<Vec<Event>> {
    let mut events = read_jsonl(synthetic)?;
    let real = read_windows_export(real)?;

    info!("Synthetic events: {}", events.len());
    info!("Real events: {}", real.len());

    events.extend(real);
    Ok(events)
}
