mod asset;
mod config_cmd;
mod contribution;
mod group;
mod liability;
mod snapshot;
mod status;
mod watch;

pub use asset::AssetCommand;
pub use config_cmd::{ConfigCommand, OutputFormat};
pub use contribution::ContributionCommand;
pub use group::GroupCommand;
pub use liability::LiabilityCommand;
pub use snapshot::SnapshotCommand;
pub use status::StatusCommand;
pub use watch::WatchCommand;
