//! The replicated document.
//!
//! A [`Document`] is the whole application state of one family tracker: the
//! payload the user edits, the group it is shared with, and the logical clock
//! used for last-write-wins replication. It is always replaced as a unit;
//! nothing in this crate merges two documents field by field.
//!
//! # Persisted layout
//!
//! Documents serialize to a flat JSON object with camelCase keys:
//!
//! ```text
//! { "familyId": "ABCD-1234" | null,
//!   "assets": [...], "liabilities": [...], "monthlyContribution": 25000.0,
//!   "snapshots": [...], "milestones": [...], "themeColor": "blue",
//!   "lastUpdated": 1718000000000 }
//! ```
//!
//! Deserialization never fails on a well-formed JSON value: every missing or
//! malformed field falls back to its default so that older or partially
//! written documents still load.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::group_key::GroupKey;
use crate::models::{Asset, Liability, Milestone, Snapshot};

/// Monthly investment amount used until the user sets one.
pub const DEFAULT_MONTHLY_CONTRIBUTION: f64 = 25_000.0;

/// Theme colour used until the user picks one.
pub const DEFAULT_THEME_COLOR: &str = "blue";

/// Logical clock value meaning "no authoritative local version".
pub const UNSYNCED_CLOCK: u64 = 0;

/// Application state carried by a document. Opaque to the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub assets: Vec<Asset>,
    pub liabilities: Vec<Liability>,
    pub monthly_contribution: f64,
    pub snapshots: Vec<Snapshot>,
    pub milestones: Vec<Milestone>,
    pub theme_color: String,
}

impl Default for Payload {
    fn default() -> Self {
        Self {
            assets: Vec::new(),
            liabilities: Vec::new(),
            monthly_contribution: DEFAULT_MONTHLY_CONTRIBUTION,
            snapshots: Vec::new(),
            milestones: Milestone::defaults(),
            theme_color: DEFAULT_THEME_COLOR.to_string(),
        }
    }
}

impl Payload {
    pub fn total_assets(&self) -> f64 {
        self.assets.iter().map(|a| a.value).sum()
    }

    pub fn total_liabilities(&self) -> f64 {
        self.liabilities.iter().map(|l| l.value).sum()
    }

    pub fn net_worth(&self) -> f64 {
        self.total_assets() - self.total_liabilities()
    }

    /// Snapshot list with today's net worth recorded for `date`.
    ///
    /// Any existing snapshot for the same date is replaced. The result is
    /// sorted by date so it can be fed straight back through an update.
    pub fn with_snapshot(&self, date: NaiveDate, note: Option<String>) -> Vec<Snapshot> {
        let mut snapshot = Snapshot::new(date, self.net_worth());
        snapshot.note = note;
        self.with_snapshot_entry(snapshot)
    }

    /// Snapshot list with `snapshot` inserted, replacing one on the same date.
    pub fn with_snapshot_entry(&self, snapshot: Snapshot) -> Vec<Snapshot> {
        let mut snapshots: Vec<Snapshot> = self
            .snapshots
            .iter()
            .filter(|s| s.date != snapshot.date)
            .cloned()
            .collect();
        snapshots.push(snapshot);
        snapshots.sort_by(|a, b| a.date.cmp(&b.date));
        snapshots
    }

    fn from_object(obj: &Map<String, Value>) -> Self {
        let defaults = Payload::default();
        Self {
            assets: list(obj, "assets").unwrap_or(defaults.assets),
            liabilities: list(obj, "liabilities").unwrap_or(defaults.liabilities),
            monthly_contribution: obj
                .get("monthlyContribution")
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite())
                .unwrap_or(defaults.monthly_contribution),
            snapshots: list(obj, "snapshots").unwrap_or(defaults.snapshots),
            milestones: list(obj, "milestones").unwrap_or(defaults.milestones),
            theme_color: field(obj, "themeColor").unwrap_or(defaults.theme_color),
        }
    }
}

/// The versioned value replicated between devices.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Group this document is shared with. `None` means local-only.
    #[serde(rename = "familyId")]
    pub group_id: Option<GroupKey>,

    #[serde(flatten)]
    pub payload: Payload,

    /// Wall-clock derived version stamp (milliseconds since the Unix epoch).
    #[serde(rename = "lastUpdated")]
    pub logical_clock: u64,
}

impl Document {
    /// Build a document from an arbitrary JSON value, defaulting every field
    /// that is missing or has the wrong shape.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        Self {
            group_id: obj
                .get("familyId")
                .and_then(Value::as_str)
                .and_then(GroupKey::from_stored),
            payload: Payload::from_object(obj),
            logical_clock: obj.get("lastUpdated").map(clock_value).unwrap_or(0),
        }
    }

    pub fn to_value(&self) -> Value {
        // A Document holds only strings, numbers and lists of plain structs.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn is_shared(&self) -> bool {
        self.group_id.is_some()
    }

    /// True when this device has no authoritative version and must take
    /// whatever the remote store holds.
    pub fn awaiting_remote(&self) -> bool {
        self.logical_clock == UNSYNCED_CLOCK
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// A partial update to a document, as produced by the editing layer.
///
/// Fields left as `None` are untouched. `group_id` is doubly optional:
/// `Some(None)` clears the group (disconnect), `Some(Some(key))` sets it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUpdate {
    pub group_id: Option<Option<GroupKey>>,
    /// Explicit clock, honoured only when the update changes the group.
    pub logical_clock: Option<u64>,
    pub assets: Option<Vec<Asset>>,
    pub liabilities: Option<Vec<Liability>>,
    pub monthly_contribution: Option<f64>,
    pub snapshots: Option<Vec<Snapshot>>,
    pub milestones: Option<Vec<Milestone>>,
    pub theme_color: Option<String>,
}

impl DocumentUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, group_id: Option<GroupKey>) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn logical_clock(mut self, clock: u64) -> Self {
        self.logical_clock = Some(clock);
        self
    }

    pub fn assets(mut self, assets: Vec<Asset>) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn liabilities(mut self, liabilities: Vec<Liability>) -> Self {
        self.liabilities = Some(liabilities);
        self
    }

    pub fn monthly_contribution(mut self, amount: f64) -> Self {
        self.monthly_contribution = Some(amount);
        self
    }

    pub fn snapshots(mut self, snapshots: Vec<Snapshot>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn milestones(mut self, milestones: Vec<Milestone>) -> Self {
        self.milestones = Some(milestones);
        self
    }

    pub fn theme_color(mut self, color: impl Into<String>) -> Self {
        self.theme_color = Some(color.into());
        self
    }

    /// Whether applying this update to `doc` would move it to another group.
    pub fn changes_group(&self, doc: &Document) -> bool {
        matches!(&self.group_id, Some(group) if *group != doc.group_id)
    }

    /// Merge the update's payload and group fields into `doc`.
    ///
    /// The logical clock is left alone; stamping is the engine's job.
    pub fn apply_to(self, doc: &mut Document) {
        if let Some(group_id) = self.group_id {
            doc.group_id = group_id;
        }
        let payload = &mut doc.payload;
        if let Some(assets) = self.assets {
            payload.assets = assets;
        }
        if let Some(liabilities) = self.liabilities {
            payload.liabilities = liabilities;
        }
        if let Some(amount) = self.monthly_contribution {
            payload.monthly_contribution = amount;
        }
        if let Some(snapshots) = self.snapshots {
            payload.snapshots = snapshots;
        }
        if let Some(milestones) = self.milestones {
            payload.milestones = milestones;
        }
        if let Some(color) = self.theme_color {
            payload.theme_color = color;
        }
    }
}

fn field<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str) -> Option<T> {
    obj.get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Decode a list field, dropping entries that do not parse.
fn list<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str) -> Option<Vec<T>> {
    match obj.get(key) {
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
        ),
        _ => None,
    }
}

fn clock_value(value: &Value) -> u64 {
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as u64)
        })
        .unwrap_or(0)
}
