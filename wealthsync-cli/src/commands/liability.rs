use clap::{Args, Subcommand};
use wealthsync_core::{DocumentUpdate, Liability, LiabilityType};

use crate::config::Config;
use crate::session::{report, Session};

/// Manage liabilities (loans, credit cards)
#[derive(Args)]
pub struct LiabilityCommand {
    #[command(subcommand)]
    pub command: LiabilitySubcommand,
}

#[derive(Subcommand)]
pub enum LiabilitySubcommand {
    /// Add a liability
    Add {
        /// Name of the liability
        name: String,
        /// Outstanding amount
        value: f64,
        /// Liability type (home-loan, car-loan, education-loan, personal-loan, credit-card, other)
        #[arg(long = "type", short = 't', default_value = "personal-loan")]
        kind: LiabilityType,
        /// Yearly interest rate in percent
        #[arg(long, short)]
        rate: Option<f64>,
    },
    /// Remove a liability by ID or name
    Remove {
        /// Liability ID or name
        liability: String,
    },
    /// List liabilities
    List,
}

impl LiabilityCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::open_for_edit(config).await;
        let engine = session.engine();
        let mut liabilities = engine.document().payload.liabilities;

        match &self.command {
            LiabilitySubcommand::Add {
                name,
                value,
                kind,
                rate,
            } => {
                let mut liability = Liability::new(name.clone(), *value, *kind);
                if let Some(rate) = rate {
                    liability = liability.with_interest_rate(*rate);
                }
                println!("Added {}", liability);
                liabilities.push(liability);
            }
            LiabilitySubcommand::Remove { liability } => {
                let Some(index) = liabilities
                    .iter()
                    .position(|l| l.id == *liability || l.name.eq_ignore_ascii_case(liability))
                else {
                    return Err(format!("Liability '{}' not found", liability).into());
                };
                let removed = liabilities.remove(index);
                println!("Removed {}", removed);
            }
            LiabilitySubcommand::List => {
                if liabilities.is_empty() {
                    println!("No liabilities.");
                    return Ok(());
                }
                for liability in &liabilities {
                    println!("{}  {}", liability.id, liability);
                }
                println!();
                println!("Total: {:.2}", engine.document().payload.total_liabilities());
                return Ok(());
            }
        }

        engine.mutate(DocumentUpdate::new().liabilities(liabilities));
        let status = session.settle().await;
        report(&session, status);
        Ok(())
    }
}
