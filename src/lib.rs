//! Security log triage: rule-based detection over normalized Windows events,
//! RMF-style enrichment, POA&M export and a file-backed ticket lifecycle.
//!
//! ```text
//! events.csv -> detect -> findings -> enrich -> poam.csv -> tickets/<status>/ -> DASHBOARD.md
//! ```

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod detector;
pub mod enrich;
pub mod error;
pub mod export;
pub mod findings;
pub mod parser;
pub mod pipeline;
pub mod state;
pub mod ticket;

pub use config::{DetectorConfig, Layout};
pub use error::{Result, TriageError};
pub use findings::{Finding, RuleId, Severity};
pub use state::TicketStore;
pub use ticket::{Ticket, TicketStatus};
