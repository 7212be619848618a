use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A dated record of net worth, either captured from the live figures or
/// entered by hand for a past date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    /// ISO date, `YYYY-MM-DD`.
    pub date: String,
    pub net_worth: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_manual: Option<bool>,
}

impl Snapshot {
    pub fn new(date: NaiveDate, net_worth: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            date: date.format("%Y-%m-%d").to_string(),
            net_worth,
            note: None,
            is_manual: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn manual(mut self) -> Self {
        self.is_manual = Some(true);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_date_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let snapshot = Snapshot::new(date, 1_000.0);
        assert_eq!(snapshot.date, "2024-03-09");
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let json = serde_json::to_string(&Snapshot::new(date, 5.0)).unwrap();
        assert!(!json.contains("note"));
        assert!(!json.contains("isManual"));

        let json = serde_json::to_string(&Snapshot::new(date, 5.0).with_note("bonus").manual()).unwrap();
        assert!(json.contains("\"note\":\"bonus\""));
        assert!(json.contains("\"isManual\":true"));
    }
}
