use clap::Args;
use wealthsync_core::DocumentUpdate;

use crate::config::Config;
use crate::session::{report, Session};

/// Show or set the planned monthly contribution
#[derive(Args)]
pub struct ContributionCommand {
    /// New monthly amount; omit to show the current one
    pub amount: Option<f64>,
}

impl ContributionCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::open_for_edit(config).await;
        let engine = session.engine();

        let Some(amount) = self.amount else {
            println!(
                "Monthly contribution: {:.2}",
                engine.document().payload.monthly_contribution
            );
            return Ok(());
        };

        if !amount.is_finite() || amount < 0.0 {
            return Err(format!("Invalid amount '{}'", amount).into());
        }

        engine.mutate(DocumentUpdate::new().monthly_contribution(amount));
        println!("Monthly contribution set to {:.2}", amount);

        let status = session.settle().await;
        report(&session, status);
        Ok(())
    }
}
