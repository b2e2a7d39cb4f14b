//! Goal type tags and the per-type detail requirements.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::graph::GoalRecord;

/// Goal categories an advisor may assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Retirement,
    EarlyRetirement,
    HomePurchase,
    InvestmentProperty,
    HomeRenovation,
    ChildEducation,
    ChildWedding,
    StartingFamily,
    AgedCare,
    LifeInsurance,
    TpdInsurance,
    IncomeProtection,
    HealthInsurance,
    Travel,
    Wedding,
    VehiclePurchase,
    MajorPurchase,
    BusinessStart,
    WealthCreation,
    DebtFree,
    EmergencyFund,
    SelfEducation,
    Other,
}

/// Which detail fields a goal of a given type needs before planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailRule {
    /// `target_amount` plus `target_year` or `timeline_years`.
    AmountAndTimeline,
    /// `target_amount` only.
    AmountOnly,
    /// `target_months` or `target_amount`.
    MonthsOrAmount,
}

impl GoalType {
    /// Every goal type, in declaration order.
    pub const ALL: [GoalType; 23] = [
        GoalType::Retirement,
        GoalType::EarlyRetirement,
        GoalType::HomePurchase,
        GoalType::InvestmentProperty,
        GoalType::HomeRenovation,
        GoalType::ChildEducation,
        GoalType::ChildWedding,
        GoalType::StartingFamily,
        GoalType::AgedCare,
        GoalType::LifeInsurance,
        GoalType::TpdInsurance,
        GoalType::IncomeProtection,
        GoalType::HealthInsurance,
        GoalType::Travel,
        GoalType::Wedding,
        GoalType::VehiclePurchase,
        GoalType::MajorPurchase,
        GoalType::BusinessStart,
        GoalType::WealthCreation,
        GoalType::DebtFree,
        GoalType::EmergencyFund,
        GoalType::SelfEducation,
        GoalType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalType::Retirement => "retirement",
            GoalType::EarlyRetirement => "early_retirement",
            GoalType::HomePurchase => "home_purchase",
            GoalType::InvestmentProperty => "investment_property",
            GoalType::HomeRenovation => "home_renovation",
            GoalType::ChildEducation => "child_education",
            GoalType::ChildWedding => "child_wedding",
            GoalType::StartingFamily => "starting_family",
            GoalType::AgedCare => "aged_care",
            GoalType::LifeInsurance => "life_insurance",
            GoalType::TpdInsurance => "tpd_insurance",
            GoalType::IncomeProtection => "income_protection",
            GoalType::HealthInsurance => "health_insurance",
            GoalType::Travel => "travel",
            GoalType::Wedding => "wedding",
            GoalType::VehiclePurchase => "vehicle_purchase",
            GoalType::MajorPurchase => "major_purchase",
            GoalType::BusinessStart => "business_start",
            GoalType::WealthCreation => "wealth_creation",
            GoalType::DebtFree => "debt_free",
            GoalType::EmergencyFund => "emergency_fund",
            GoalType::SelfEducation => "self_education",
            GoalType::Other => "other",
        }
    }

    /// Tag strings passed to the goal inference advisor.
    pub fn allowed_tags() -> Vec<String> {
        Self::ALL.iter().map(|t| t.as_str().to_string()).collect()
    }

    /// Best-effort type for a goal id when no type was recorded.
    pub fn infer_from_id(goal_id: &str) -> Option<GoalType> {
        let id = goal_id.trim().to_lowercase();
        if let Ok(goal_type) = id.parse() {
            return Some(goal_type);
        }
        match id.as_str() {
            "retirement_planning" => Some(GoalType::Retirement),
            "buying_a_home" | "buy_home" | "buy_property" => Some(GoalType::HomePurchase),
            "buy_investment_property" => Some(GoalType::InvestmentProperty),
            "debt_reduction" => Some(GoalType::DebtFree),
            "build_wealth" => Some(GoalType::WealthCreation),
            "emergency_buffer" => Some(GoalType::EmergencyFund),
            _ => None,
        }
    }

    /// Detail fields this type needs.
    pub fn detail_requirement(&self) -> DetailRule {
        match self {
            GoalType::EmergencyFund => DetailRule::MonthsOrAmount,
            GoalType::LifeInsurance | GoalType::TpdInsurance | GoalType::IncomeProtection => {
                DetailRule::AmountOnly
            }
            _ => DetailRule::AmountAndTimeline,
        }
    }
}

impl fmt::Display for GoalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GoalType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown goal type: {}", s))
    }
}

/// Goal type recorded on the goal, else inferred from its id.
pub fn effective_goal_type(record: &GoalRecord) -> Option<GoalType> {
    record
        .goal_type
        .as_deref()
        .and_then(|t| t.parse().ok())
        .or_else(|| GoalType::infer_from_id(&record.goal_id))
}

/// Detail fields still missing for a qualified goal.
///
/// Goals of unknown type need an amount and a timeline.
pub fn missing_details(record: &GoalRecord) -> Vec<&'static str> {
    let requirement = effective_goal_type(record)
        .map(|t| t.detail_requirement())
        .unwrap_or(DetailRule::AmountAndTimeline);

    let has_timeline = record.target_year.is_some() || record.timeline_years.is_some();
    let mut missing = Vec::new();
    match requirement {
        DetailRule::AmountAndTimeline => {
            if record.target_amount.is_none() {
                missing.push("target_amount");
            }
            if !has_timeline {
                missing.push("target_year");
            }
        }
        DetailRule::AmountOnly => {
            if record.target_amount.is_none() {
                missing.push("target_amount");
            }
        }
        DetailRule::MonthsOrAmount => {
            if record.target_months.is_none() && record.target_amount.is_none() {
                missing.push("target_months");
            }
        }
    }
    missing
}

/// Whether the goal should enter the goal-details sub-dialogue.
pub fn needs_details(record: &GoalRecord) -> bool {
    !record.details_complete && !record.details_deferred && !missing_details(record).is_empty()
}
