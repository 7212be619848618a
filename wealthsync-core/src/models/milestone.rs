use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: String,
    pub name: String,
    pub target_amount: f64,
    pub color: String,
}

impl Milestone {
    pub fn new(name: impl Into<String>, target_amount: f64, color: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            target_amount,
            color: color.into(),
        }
    }

    /// The two goals every new tracker starts with.
    pub fn defaults() -> Vec<Milestone> {
        vec![
            Milestone {
                id: "1".to_string(),
                name: "Emergency Fund".to_string(),
                target_amount: 500_000.0,
                color: "#10b981".to_string(),
            },
            Milestone {
                id: "2".to_string(),
                name: "Home Down Payment".to_string(),
                target_amount: 5_000_000.0,
                color: "#3b82f6".to_string(),
            },
        ]
    }

    /// Fraction of the target reached by `net_worth`, clamped to `0.0..=1.0`.
    pub fn progress(&self, net_worth: f64) -> f64 {
        if self.target_amount <= 0.0 {
            return 1.0;
        }
        (net_worth / self.target_amount).clamp(0.0, 1.0)
    }
}
