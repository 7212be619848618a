use clap::Args;
use tokio::sync::broadcast::error::RecvError;
use wealthsync_core::SyncEvent;

use crate::config::Config;
use crate::session::Session;

/// Follow sync activity until interrupted
#[derive(Args)]
pub struct WatchCommand {}

impl WatchCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::open(config);
        let engine = session.engine();
        let mut events = engine.events();

        match engine.group() {
            Some(key) => println!("Watching family group {} (Ctrl-C to stop)", key),
            None => println!("Not in a family group; only local changes will show."),
        }
        println!("status: {}", engine.status());

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(SyncEvent::Status(status)) => println!("status: {}", status),
                    Ok(SyncEvent::CaughtUp) => println!("caught up with family group"),
                    Ok(SyncEvent::Document(doc)) => println!(
                        "document: net worth {:.2} (version {})",
                        doc.payload.net_worth(),
                        doc.logical_clock
                    ),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Skipped {} event(s)", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        Ok(())
    }
}
