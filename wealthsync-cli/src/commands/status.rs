use clap::Args;
use serde::Serialize;
use wealthsync_core::{Document, SyncStatus};

use crate::commands::OutputFormat;
use crate::config::Config;
use crate::session::{Session, CATCH_UP_TIMEOUT};

/// Show net worth, goals and sync state
#[derive(Args)]
pub struct StatusCommand {
    /// Wait for the family group's latest data first
    #[arg(long, short)]
    pub refresh: bool,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport<'a> {
    sync_status: &'static str,
    demo: bool,
    #[serde(flatten)]
    document: &'a Document,
}

impl StatusCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::open(config);
        let engine = session.engine();

        if self.refresh && !session.catch_up(CATCH_UP_TIMEOUT).await {
            eprintln!("Warning: family group unreachable; showing the local copy.");
        }
        let status = engine.status();
        let doc = engine.document();

        match self.format {
            OutputFormat::Json => {
                let report = StatusReport {
                    sync_status: status.as_str(),
                    demo: engine.is_demo(),
                    document: &doc,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            OutputFormat::Text => print_summary(&doc, status, engine.is_demo()),
        }
        Ok(())
    }
}

fn print_summary(doc: &Document, status: SyncStatus, demo: bool) {
    let payload = &doc.payload;
    let net_worth = payload.net_worth();

    println!("Net worth:     {:>16.2}", net_worth);
    println!(
        "  Assets:      {:>16.2} ({})",
        payload.total_assets(),
        payload.assets.len()
    );
    println!(
        "  Liabilities: {:>16.2} ({})",
        payload.total_liabilities(),
        payload.liabilities.len()
    );
    println!("Monthly SIP:   {:>16.2}", payload.monthly_contribution);

    if !payload.milestones.is_empty() {
        println!();
        println!("Goals:");
        for milestone in &payload.milestones {
            println!(
                "  {:<24} {:>5.1}% of {:.2}",
                milestone.name,
                milestone.progress(net_worth) * 100.0,
                milestone.target_amount
            );
        }
    }

    if let Some(last) = payload.snapshots.last() {
        println!();
        println!("Last snapshot: {} ({:.2})", last.date, last.net_worth);
    }

    println!();
    match &doc.group_id {
        Some(key) if demo => println!("Family group:  {} (demo mode)", key),
        Some(key) => println!("Family group:  {} ({})", key, status),
        None => println!("Family group:  not shared"),
    }
}
