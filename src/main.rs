use chrono::Local;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use rmf_triage::cli::{Cli, Commands};
use rmf_triage::config::Layout;
use rmf_triage::error::Result;
use rmf_triage::pipeline;
use rmf_triage::state::TicketStore;

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("rmf_triage={}", level))),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn execute(command: Commands, layout: &Layout) -> Result<()> {
    let now = Local::now().naive_local();

    match command {
        Commands::Ingest => {
            let count = pipeline::ingest(layout)?;
            println!("[OK] Saved {} events: {}", count, layout.normalized_events().display());
        }
        Commands::Detect(args) => {
            let findings = pipeline::detect(layout, &(&args).into())?;
            println!("[OK] Findings written: {} -> {}", findings.len(), layout.findings().display());
            for f in &findings {
                println!(
                    "- [{}] {} {} -> Controls: {}",
                    f.severity,
                    f.rule_id,
                    f.title,
                    f.controls.join(", ")
                );
            }
        }
        Commands::Enrich => {
            pipeline::enrich(layout, now)?;
            println!("[OK] Wrote: {}", layout.enriched_findings().display());
            println!("[OK] Wrote: {}", layout.summary_report().display());
        }
        Commands::Export => {
            let records = pipeline::export(layout, now)?;
            println!("[OK] Wrote {} rows: {}", records.len(), layout.poam().display());
        }
        Commands::Tickets { owner } => {
            let store = TicketStore::open(layout.tickets_dir())?;
            for stored in pipeline::open_tickets(&store, layout, &owner)? {
                println!("[OK] Created ticket: {}", stored.path.display());
            }
        }
        Commands::Move { ticket_id, status } => {
            let store = TicketStore::open(layout.tickets_dir())?;
            let moved = store.move_ticket(&ticket_id, status.parse()?)?;
            println!(
                "[OK] Moved {}: {} -> {} ({})",
                moved.ticket_id,
                moved.from,
                moved.to,
                moved.path.display()
            );
        }
        Commands::Comment { ticket_id, text } => {
            let store = TicketStore::open(layout.tickets_dir())?;
            let stored = store.add_comment(&ticket_id, &text.join(" "))?;
            println!(
                "[OK] Comment added to {} ({}): {}",
                ticket_id,
                stored.bucket,
                stored.path.display()
            );
        }
        Commands::Evidence { ticket_id, text } => {
            let store = TicketStore::open(layout.tickets_dir())?;
            let stored = store.add_evidence(&ticket_id, &text.join(" "))?;
            println!(
                "[OK] Evidence added to {} ({}): {}",
                ticket_id,
                stored.bucket,
                stored.path.display()
            );
        }
        Commands::Close {
            ticket_id,
            justification,
        } => {
            let store = TicketStore::open(layout.tickets_dir())?;
            let closed = store.close(&ticket_id, &justification.join(" "))?;
            println!(
                "[OK] Closed {}: {} -> {} ({})",
                closed.ticket_id,
                closed.from,
                closed.to,
                closed.path.display()
            );
        }
        Commands::Dashboard { top } => {
            let store = TicketStore::open(layout.tickets_dir())?;
            pipeline::dashboard(&store, layout, now, top)?;
            println!("[OK] Wrote: {}", layout.dashboard().display());
        }
        Commands::Pipeline(args) => {
            let records = pipeline::run(layout, &(&args).into(), now)?;
            println!("[OK] Pipeline complete: {} POA&M rows", records.len());
            println!("Open: {}", layout.summary_report().display());
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let layout = Layout::new(&cli.root);
    match execute(cli.command, &layout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Every failure kind reports the same way.
            println!("[ERROR] {}", e);
            ExitCode::FAILURE
        }
    }
}
