mod asset;
mod liability;
mod milestone;
mod snapshot;

pub use asset::{Asset, AssetType};
pub use liability::{Liability, LiabilityType};
pub use milestone::Milestone;
pub use snapshot::Snapshot;
