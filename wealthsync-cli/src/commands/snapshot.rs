use chrono::{Local, NaiveDate};
use clap::Args;
use wealthsync_core::{DocumentUpdate, Snapshot};

use crate::config::Config;
use crate::session::{report, Session};

/// Record net worth for a date
///
/// Without `--net-worth` the current figures are captured. A snapshot
/// replaces any other one on the same date.
#[derive(Args)]
pub struct SnapshotCommand {
    /// Date to record (YYYY-MM-DD, default: today)
    #[arg(long, short)]
    pub date: Option<NaiveDate>,

    /// Net worth to record instead of the current figures
    #[arg(long, short = 'w')]
    pub net_worth: Option<f64>,

    /// Free-form note
    #[arg(long, short)]
    pub note: Option<String>,
}

impl SnapshotCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::open_for_edit(config).await;
        let engine = session.engine();
        let payload = engine.document().payload;
        let date = self.date.unwrap_or_else(|| Local::now().date_naive());

        let snapshots = match self.net_worth {
            Some(net_worth) => {
                let mut snapshot = Snapshot::new(date, net_worth).manual();
                if let Some(note) = &self.note {
                    snapshot = snapshot.with_note(note.clone());
                }
                payload.with_snapshot_entry(snapshot)
            }
            None => payload.with_snapshot(date, self.note.clone()),
        };

        let recorded = self.net_worth.unwrap_or_else(|| payload.net_worth());
        engine.mutate(DocumentUpdate::new().snapshots(snapshots));
        println!("Recorded net worth {:.2} for {}", recorded, date);

        let status = session.settle().await;
        report(&session, status);
        Ok(())
    }
}
