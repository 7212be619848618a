use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Cash,
    MutualFund,
    Stock,
    RealEstate,
    Gold,
    Fd,
    EpfPpf,
    Crypto,
    #[serde(other)]
    Other,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Cash => "CASH",
            AssetType::MutualFund => "MUTUAL_FUND",
            AssetType::Stock => "STOCK",
            AssetType::RealEstate => "REAL_ESTATE",
            AssetType::Gold => "GOLD",
            AssetType::Fd => "FD",
            AssetType::EpfPpf => "EPF_PPF",
            AssetType::Crypto => "CRYPTO",
            AssetType::Other => "OTHER",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "CASH" => Ok(AssetType::Cash),
            "MUTUAL_FUND" => Ok(AssetType::MutualFund),
            "STOCK" => Ok(AssetType::Stock),
            "REAL_ESTATE" => Ok(AssetType::RealEstate),
            "GOLD" => Ok(AssetType::Gold),
            "FD" => Ok(AssetType::Fd),
            "EPF_PPF" => Ok(AssetType::EpfPpf),
            "CRYPTO" => Ok(AssetType::Crypto),
            "OTHER" => Ok(AssetType::Other),
            _ => Err(format!(
                "Invalid asset type '{}'. Valid options: cash, mutual-fund, stock, real-estate, \
                 gold, fd, epf-ppf, crypto, other",
                s
            )),
        }
    }
}

/// Something the family owns. `growth_rate` is the expected annual percentage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: AssetType,
    pub growth_rate: f64,
}

impl Asset {
    pub fn new(name: impl Into<String>, value: f64, kind: AssetType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            value,
            kind,
            growth_rate: 0.0,
        }
    }

    pub fn with_growth_rate(mut self, growth_rate: f64) -> Self {
        self.growth_rate = growth_rate;
        self
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {:.2} @ {}%/yr",
            self.name, self.kind, self.value, self.growth_rate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_type_wire_names() {
        let json = serde_json::to_string(&AssetType::MutualFund).unwrap();
        assert_eq!(json, "\"MUTUAL_FUND\"");
        let json = serde_json::to_string(&AssetType::EpfPpf).unwrap();
        assert_eq!(json, "\"EPF_PPF\"");
        let json = serde_json::to_string(&AssetType::Fd).unwrap();
        assert_eq!(json, "\"FD\"");
    }

    #[test]
    fn test_unknown_asset_type_falls_back_to_other() {
        let parsed: AssetType = serde_json::from_str("\"ART\"").unwrap();
        assert_eq!(parsed, AssetType::Other);
    }

    #[test]
    fn test_asset_type_from_str() {
        assert_eq!(
            AssetType::from_str("mutual-fund").unwrap(),
            AssetType::MutualFund
        );
        assert_eq!(AssetType::from_str("Gold").unwrap(), AssetType::Gold);
        assert!(AssetType::from_str("yacht").is_err());
    }

    #[test]
    fn test_asset_uses_camel_case_fields() {
        let asset = Asset::new("Index fund", 120000.0, AssetType::MutualFund).with_growth_rate(12.0);
        let value = serde_json::to_value(&asset).unwrap();
        assert_eq!(value["type"], "MUTUAL_FUND");
        assert_eq!(value["growthRate"], 12.0);
    }
}
