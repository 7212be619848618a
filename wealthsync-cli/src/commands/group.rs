//! Family group management commands.

use clap::{Args, Subcommand};
use std::time::Duration;

use crate::config::Config;
use crate::session::{report, Session};

/// How long `pull` waits for the group's document to arrive.
const PULL_TIMEOUT: Duration = Duration::from_secs(10);

/// Share the net-worth document with your family
#[derive(Args)]
pub struct GroupCommand {
    #[command(subcommand)]
    pub command: GroupSubcommand,
}

#[derive(Subcommand)]
pub enum GroupSubcommand {
    /// Create a new family group seeded with this device's data
    Create,
    /// Join an existing family group, replacing local data with the group's
    Join {
        /// Family key (e.g. ABCD-1234)
        key: String,
    },
    /// Stop sharing; local data is kept
    Leave,
    /// Discard local changes and take the group's current data
    Pull,
    /// Show the current family group
    Show,
}

impl GroupCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::open(config);

        match &self.command {
            GroupSubcommand::Create => self.create(&session).await,
            GroupSubcommand::Join { key } => self.join(&session, key).await,
            GroupSubcommand::Leave => self.leave(&session),
            GroupSubcommand::Pull => self.pull(&session).await,
            GroupSubcommand::Show => self.show(&session),
        }
    }

    async fn create(&self, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
        let engine = session.engine();
        if let Some(current) = engine.group() {
            println!("Already in family group {}.", current);
            println!("Run 'wealth group leave' first to start a new one.");
            return Ok(());
        }

        let key = engine.create_group().await;

        println!("✓ Family group created!");
        println!();
        println!("Family key: {}", key);
        println!();
        println!("To share with family members, run on their device:");
        println!("  wealth group join {}", key);

        if engine.is_demo() {
            println!();
            println!("Note: no sync server is reachable, so the group only exists on this device.");
        }

        let status = session.settle().await;
        report(session, status);
        Ok(())
    }

    async fn join(&self, session: &Session, key: &str) -> Result<(), Box<dyn std::error::Error>> {
        let engine = session.engine();
        let key = engine.join_group(key).await?;

        println!("✓ Joined family group {}", key);

        let caught_up = session.catch_up(PULL_TIMEOUT).await;
        if engine.is_demo() {
            println!("Demo mode: no sync server is reachable, nothing was downloaded.");
        } else if !caught_up {
            println!("Could not reach the family group; its data will arrive on the next sync.");
        } else if engine.document().logical_clock == 0 {
            println!("The family group has no data yet.");
        } else {
            println!("Downloaded the family's data.");
        }
        Ok(())
    }

    fn leave(&self, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
        let engine = session.engine();
        match engine.group() {
            Some(key) => {
                engine.disconnect();
                println!("Left family group {}. Your data stays on this device.", key);
            }
            None => println!("Not in a family group."),
        }
        Ok(())
    }

    async fn pull(&self, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
        let engine = session.engine();
        if engine.group().is_none() {
            println!("Not in a family group.");
            return Ok(());
        }

        engine.force_pull();
        let caught_up = session.catch_up(PULL_TIMEOUT).await;
        if caught_up && engine.document().logical_clock != 0 {
            println!("✓ Replaced local data with the family group's.");
        } else {
            println!("Nothing received from the family group (status: {}).", engine.status());
            println!("Local data will be replaced as soon as the group's data arrives.");
        }
        Ok(())
    }

    fn show(&self, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
        let engine = session.engine();
        match engine.group() {
            Some(key) => {
                println!("Family key: {}", key);
                println!("Mode:       {}", if engine.is_demo() { "demo" } else { "live" });
            }
            None => {
                println!("Not in a family group.");
                println!();
                println!("Create one with: wealth group create");
            }
        }
        Ok(())
    }
}
