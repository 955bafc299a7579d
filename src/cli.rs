use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DetectorConfig;
use crate::dashboard::DEFAULT_TOP_N;

#[derive(Parser, Debug)]
#[command(name = "rmf-triage", author, version, about, long_about = None)]
pub struct Cli {
    /// Project root holding data/ and tickets/
    #[arg(long, global = true, env = "RMF_TRIAGE_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Set the logging level (trace, debug, info, warn, error); RUST_LOG wins if set
    #[arg(short, long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge raw synthetic and Windows-exported events into the normalized CSV
    Ingest,
    /// Run the detection rules over the normalized events
    Detect(DetectArgs),
    /// Attach risk statements and recommended actions to findings
    Enrich,
    /// Export enriched findings as POA&M rows
    Export,
    /// Open a ticket for every POA&M row
    Tickets {
        /// Ticket owner
        #[arg(long, default_value = "Cyber Ops")]
        owner: String,
    },
    /// Move a ticket to another status
    Move {
        ticket_id: String,
        /// open | in_progress | awaiting_validation | closed
        status: String,
    },
    /// Append a comment to a ticket
    Comment {
        ticket_id: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Attach evidence (free text or a file path) to a ticket
    Evidence {
        ticket_id: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Close a ticket with a justification
    Close {
        ticket_id: String,
        #[arg(required = true, num_args = 1..)]
        justification: Vec<String>,
    },
    /// Write DASHBOARD.md from the current tickets
    Dashboard {
        /// Number of active tickets to list
        #[arg(long, default_value_t = DEFAULT_TOP_N)]
        top: usize,
    },
    /// Detect, enrich and export in one go
    Pipeline(DetectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
    /// Failed-login burst window, minutes
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(i64).range(1..))]
    pub window_minutes: i64,

    /// Failed logins inside one window that raise AUTH-001
    #[arg(long, default_value_t = 3)]
    pub threshold: usize,
}

impl From<&DetectArgs> for DetectorConfig {
    fn from(args: &DetectArgs) -> Self {
        DetectorConfig::new(args.threshold, args.window_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_move() {
        let cli = Cli::try_parse_from(["rmf-triage", "--root", "/tmp/x", "move", "TICKET-001", "in_progress"]).unwrap();
        assert_eq!(cli.root, PathBuf::from("/tmp/x"));
        match cli.command {
            Commands::Move { ticket_id, status } => {
                assert_eq!(ticket_id, "TICKET-001");
                assert_eq!(status, "in_progress");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_comment_text_is_collected() {
        let cli = Cli::try_parse_from(["rmf-triage", "comment", "TICKET-002", "waiting", "on", "vendor"]).unwrap();
        match cli.command {
            Commands::Comment { text, .. } => assert_eq!(text.join(" "), "waiting on vendor"),
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["rmf-triage", "comment", "TICKET-002"]).is_err());
    }

    #[test]
    fn test_window_minutes_must_be_positive() {
        assert!(Cli::try_parse_from(["rmf-triage", "detect", "--window-minutes", "0"]).is_err());
        assert!(Cli::try_parse_from(["rmf-triage", "pipeline", "--window-minutes", "-5"]).is_err());

        let cli = Cli::try_parse_from(["rmf-triage", "detect", "--window-minutes", "1440"]).unwrap();
        match cli.command {
            Commands::Detect(args) => assert_eq!(args.window_minutes, 1440),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_detect_defaults() {
        let cli = Cli::try_parse_from(["rmf-triage", "detect"]).unwrap();
        match cli.command {
            Commands::Detect(args) => assert_eq!(DetectorConfig::from(&args), DetectorConfig::default()),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
