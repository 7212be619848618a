use clap::{Args, Subcommand};
use wealthsync_core::{Asset, AssetType, DocumentUpdate};

use crate::config::Config;
use crate::session::{report, Session};

/// Manage assets
#[derive(Args)]
pub struct AssetCommand {
    #[command(subcommand)]
    pub command: AssetSubcommand,
}

#[derive(Subcommand)]
pub enum AssetSubcommand {
    /// Add an asset
    Add {
        /// Name of the asset
        name: String,
        /// Current value
        value: f64,
        /// Asset type (cash, mutual-fund, stock, real-estate, gold, fd, epf-ppf, crypto, other)
        #[arg(long = "type", short = 't', default_value = "cash")]
        kind: AssetType,
        /// Expected yearly growth in percent
        #[arg(long, short)]
        growth: Option<f64>,
    },
    /// Remove an asset by ID or name
    Remove {
        /// Asset ID or name
        asset: String,
    },
    /// List assets
    List,
}

impl AssetCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::open_for_edit(config).await;
        let engine = session.engine();
        let mut assets = engine.document().payload.assets;

        match &self.command {
            AssetSubcommand::Add {
                name,
                value,
                kind,
                growth,
            } => {
                let mut asset = Asset::new(name.clone(), *value, *kind);
                if let Some(rate) = growth {
                    asset = asset.with_growth_rate(*rate);
                }
                println!("Added {}", asset);
                assets.push(asset);
            }
            AssetSubcommand::Remove { asset } => {
                let Some(index) = assets
                    .iter()
                    .position(|a| a.id == *asset || a.name.eq_ignore_ascii_case(asset))
                else {
                    return Err(format!("Asset '{}' not found", asset).into());
                };
                let removed = assets.remove(index);
                println!("Removed {}", removed);
            }
            AssetSubcommand::List => {
                if assets.is_empty() {
                    println!("No assets.");
                    return Ok(());
                }
                for asset in &assets {
                    println!("{}  {}", asset.id, asset);
                }
                println!();
                println!("Total: {:.2}", engine.document().payload.total_assets());
                return Ok(());
            }
        }

        engine.mutate(DocumentUpdate::new().assets(assets));
        let status = session.settle().await;
        report(&session, status);
        Ok(())
    }
}
