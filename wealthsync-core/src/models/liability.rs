use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiabilityType {
    HomeLoan,
    CarLoan,
    EducationLoan,
    PersonalLoan,
    CreditCard,
    #[serde(other)]
    Other,
}

impl LiabilityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LiabilityType::HomeLoan => "HOME_LOAN",
            LiabilityType::CarLoan => "CAR_LOAN",
            LiabilityType::EducationLoan => "EDUCATION_LOAN",
            LiabilityType::PersonalLoan => "PERSONAL_LOAN",
            LiabilityType::CreditCard => "CREDIT_CARD",
            LiabilityType::Other => "OTHER",
        }
    }
}

impl fmt::Display for LiabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LiabilityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "HOME_LOAN" => Ok(LiabilityType::HomeLoan),
            "CAR_LOAN" => Ok(LiabilityType::CarLoan),
            "EDUCATION_LOAN" => Ok(LiabilityType::EducationLoan),
            "PERSONAL_LOAN" => Ok(LiabilityType::PersonalLoan),
            "CREDIT_CARD" => Ok(LiabilityType::CreditCard),
            "OTHER" => Ok(LiabilityType::Other),
            _ => Err(format!(
                "Invalid liability type '{}'. Valid options: home-loan, car-loan, \
                 education-loan, personal-loan, credit-card, other",
                s
            )),
        }
    }
}

/// Something the family owes. `interest_rate` is an annual percentage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Liability {
    pub id: String,
    pub name: String,
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: LiabilityType,
    pub interest_rate: f64,
}

impl Liability {
    pub fn new(name: impl Into<String>, value: f64, kind: LiabilityType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            value,
            kind,
            interest_rate: 0.0,
        }
    }

    pub fn with_interest_rate(mut self, interest_rate: f64) -> Self {
        self.interest_rate = interest_rate;
        self
    }
}

impl fmt::Display for Liability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {:.2} @ {}%/yr",
            self.name, self.kind, self.value, self.interest_rate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liability_type_from_str() {
        assert_eq!(
            LiabilityType::from_str("home-loan").unwrap(),
            LiabilityType::HomeLoan
        );
        assert_eq!(
            LiabilityType::from_str("CREDIT_CARD").unwrap(),
            LiabilityType::CreditCard
        );
        assert!(LiabilityType::from_str("mortgage").is_err());
    }

    #[test]
    fn test_liability_serialization() {
        let loan = Liability::new("Car", 450000.0, LiabilityType::CarLoan).with_interest_rate(9.5);
        let value = serde_json::to_value(&loan).unwrap();
        assert_eq!(value["type"], "CAR_LOAN");
        assert_eq!(value["interestRate"], 9.5);

        let parsed: Liability = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, loan);
    }
}
