//! File-backed ticket buckets.
//!
//! Layout: `<root>/<status>/<ticket_id>.json`. The directory a ticket sits in
//! is its status; the `status` field inside the document is a copy kept for
//! readers of the raw JSON. On every read the two are compared and the
//! directory wins.
//!
//! Writes go to a sibling temp file and are renamed into place. A move first
//! rewrites the document in its current bucket, then renames it into the
//! target bucket, so a ticket is never present in two buckets at once. If the
//! process dies between those two steps the ticket stays in the old bucket
//! with the new status in its body; the next read repairs that in memory and
//! logs a warning.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, TriageError};
use crate::export::RemediationRecord;
use crate::ticket::{format_ticket_id, ticket_number, Ticket, TicketStatus};

pub const CLOSURE_PREFIX: &str = "CLOSURE JUSTIFICATION: ";

/// A ticket together with where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTicket {
    pub bucket: TicketStatus,
    pub path: PathBuf,
    pub ticket: Ticket,
}

/// Outcome of a successful move.
#[derive(Debug, Clone, PartialEq)]
pub struct Relocation {
    pub ticket_id: String,
    pub from: TicketStatus,
    pub to: TicketStatus,
    pub path: PathBuf,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[derive(Debug, Clone)]
pub struct TicketStore {
    root: PathBuf,
    clock: fn() -> NaiveDateTime,
}

impl TicketStore {
    /// Open (and create if needed) the four bucket directories under `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            root: root.into(),
            clock: local_now,
        };
        for status in TicketStatus::ALL {
            let dir = store.bucket_dir(status);
            fs::create_dir_all(&dir).map_err(|e| TriageError::io(&dir, e))?;
        }
        Ok(store)
    }

    /// Replace the wall clock used for created/updated timestamps.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bucket_dir(&self, status: TicketStatus) -> PathBuf {
        self.root.join(status.as_str())
    }

    fn ticket_path(&self, status: TicketStatus, ticket_id: &str) -> PathBuf {
        self.bucket_dir(status).join(format!("{}.json", ticket_id))
    }

    fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    /// Find which bucket holds `ticket_id`.
    pub fn locate(&self, ticket_id: &str) -> Option<(TicketStatus, PathBuf)> {
        // Ids become file names; anything path-like can't be a ticket.
        if ticket_id.is_empty()
            || ticket_id.contains(['/', '\\'])
            || ticket_id.contains("..")
        {
            return None;
        }

        TicketStatus::ALL.into_iter().find_map(|status| {
            let path = self.ticket_path(status, ticket_id);
            path.is_file().then_some((status, path))
        })
    }

    fn read(&self, bucket: TicketStatus, path: &Path) -> Result<Ticket> {
        let raw = fs::read_to_string(path).map_err(|e| TriageError::io(path, e))?;
        let mut ticket: Ticket = serde_json::from_str(raw.trim_start_matches('\u{feff}'))?;

        if ticket.status != bucket {
            warn!(
                "Ticket {} says {} but lives in {}; trusting the bucket",
                ticket.ticket_id, ticket.status, bucket
            );
            ticket.status = bucket;
        }
        Ok(ticket)
    }

    fn write(&self, path: &Path, ticket: &Ticket) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        let content = to_pretty_json(ticket)?;
        fs::write(&tmp, content).map_err(|e| TriageError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| TriageError::io(path, e))?;
        Ok(())
    }

    pub fn load(&self, ticket_id: &str) -> Result<StoredTicket> {
        let (bucket, path) = self
            .locate(ticket_id)
            .ok_or_else(|| TriageError::NotFound(ticket_id.to_string()))?;
        let ticket = self.read(bucket, &path)?;
        Ok(StoredTicket {
            bucket,
            path,
            ticket,
        })
    }

    /// Every ticket in every bucket, bucket order then file name.
    pub fn load_all(&self) -> Result<Vec<StoredTicket>> {
        let mut all = Vec::new();

        for bucket in TicketStatus::ALL {
            let dir = self.bucket_dir(bucket);
            if !dir.is_dir() {
                continue;
            }

            let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
                .map_err(|e| TriageError::io(&dir, e))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            paths.sort();

            for path in paths {
                let ticket = self.read(bucket, &path)?;
                all.push(StoredTicket {
                    bucket,
                    path,
                    ticket,
                });
            }
        }

        debug!("Loaded {} tickets from {}", all.len(), self.root.display());
        Ok(all)
    }

    /// One past the highest TICKET-NNN in any bucket.
    pub fn next_ticket_id(&self) -> Result<String> {
        let mut highest = 0;
        for bucket in TicketStatus::ALL {
            let dir = self.bucket_dir(bucket);
            if !dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&dir).map_err(|e| TriageError::io(&dir, e))? {
                let entry = entry.map_err(|e| TriageError::io(&dir, e))?;
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    if let Some(n) = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .and_then(ticket_number)
                    {
                        highest = highest.max(n);
                    }
                }
            }
        }
        Ok(format_ticket_id(highest + 1))
    }

    /// Open a ticket for `record` in the `open` bucket.
    pub fn create(&self, record: &RemediationRecord, owner: &str) -> Result<StoredTicket> {
        let ticket_id = self.next_ticket_id()?;
        let ticket = Ticket::from_record(record, ticket_id, owner, self.now());
        let path = self.ticket_path(TicketStatus::Open, &ticket.ticket_id);
        self.write(&path, &ticket)?;

        info!(
            "Created ticket {} ({}) due {}",
            ticket.ticket_id, ticket.severity, ticket.due_date
        );
        Ok(StoredTicket {
            bucket: TicketStatus::Open,
            path,
            ticket,
        })
    }

    pub fn create_from_records(
        &self,
        records: &[RemediationRecord],
        owner: &str,
    ) -> Result<Vec<StoredTicket>> {
        records.iter().map(|r| self.create(r, owner)).collect()
    }

    /// Move a ticket along one edge of the lifecycle.
    pub fn move_ticket(&self, ticket_id: &str, to: TicketStatus) -> Result<Relocation> {
        let StoredTicket {
            bucket: from,
            path: old_path,
            mut ticket,
        } = self.load(ticket_id)?;

        ticket.transition(to, self.now())?;

        let new_path = self.ticket_path(to, ticket_id);
        self.write(&old_path, &ticket)?;
        fs::rename(&old_path, &new_path).map_err(|e| TriageError::io(&new_path, e))?;

        info!("Moved {}: {} -> {}", ticket_id, from, to);
        Ok(Relocation {
            ticket_id: ticket_id.to_string(),
            from,
            to,
            path: new_path,
        })
    }

    fn update(&self, ticket_id: &str, apply: impl FnOnce(&mut Ticket)) -> Result<StoredTicket> {
        let mut stored = self.load(ticket_id)?;
        apply(&mut stored.ticket);
        self.write(&stored.path, &stored.ticket)?;
        Ok(stored)
    }

    pub fn add_comment(&self, ticket_id: &str, text: &str) -> Result<StoredTicket> {
        let now = self.now();
        let stored = self.update(ticket_id, |t| t.add_comment(text, now))?;
        info!("Comment added to {} ({})", ticket_id, stored.bucket);
        Ok(stored)
    }

    pub fn add_evidence(&self, ticket_id: &str, text: &str) -> Result<StoredTicket> {
        let now = self.now();
        let stored = self.update(ticket_id, |t| t.add_evidence(text, now))?;
        info!("Evidence added to {} ({})", ticket_id, stored.bucket);
        Ok(stored)
    }

    /// Record the justification, then move to `closed`. Closing follows the
    /// transition table like any other move: only from `awaiting_validation`.
    pub fn close(&self, ticket_id: &str, justification: &str) -> Result<Relocation> {
        self.add_comment(ticket_id, &format!("{}{}", CLOSURE_PREFIX, justification))?;
        self.move_ticket(ticket_id, TicketStatus::Closed)
    }
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
