//! Goal records, rejection snapshots and goal-understanding records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Lifecycle bucket of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Possible,
    Qualified,
    Rejected,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Possible => "possible",
            GoalStatus::Qualified => "qualified",
            GoalStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A goal in the `possible` or `qualified` bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalRecord {
    pub goal_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Node names the goal was deduced from.
    #[serde(default)]
    pub evidence: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline_years: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_months: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_via: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_strategy_for: Option<String>,
    #[serde(default)]
    pub details_complete: bool,
    #[serde(default)]
    pub details_deferred: bool,
    #[serde(default)]
    pub reopened_from_rejection: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_rejection: Option<RejectionSnapshot>,
    /// Detail fields without a dedicated slot (e.g. funding_method).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

/// Supplied goal fields; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalPatch {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub evidence: Option<BTreeSet<String>>,
    #[serde(default)]
    pub goal_type: Option<String>,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default)]
    pub target_amount: Option<f64>,
    #[serde(default)]
    pub target_year: Option<i32>,
    #[serde(default)]
    pub timeline_years: Option<f64>,
    #[serde(default)]
    pub target_months: Option<f64>,
    #[serde(default)]
    pub confirmed_via: Option<String>,
    #[serde(default)]
    pub is_strategy_for: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

impl GoalPatch {
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set confidence, clamped to `[0, 1]`.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    pub fn with_evidence<I, S>(mut self, evidence: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.evidence = Some(evidence.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_goal_type(mut self, goal_type: impl Into<String>) -> Self {
        self.goal_type = Some(goal_type.into());
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_confirmed_via(mut self, via: impl Into<String>) -> Self {
        self.confirmed_via = Some(via.into());
        self
    }

    /// Patch carrying every populated field of an existing record.
    pub fn from_record(record: &GoalRecord) -> Self {
        Self {
            description: record.description.clone(),
            confidence: record.confidence,
            evidence: Some(record.evidence.clone()),
            goal_type: record.goal_type.clone(),
            priority: record.priority,
            target_amount: record.target_amount,
            target_year: record.target_year,
            timeline_years: record.timeline_years,
            target_months: record.target_months,
            confirmed_via: record.confirmed_via.clone(),
            is_strategy_for: record.is_strategy_for.clone(),
            extra: record.extra.clone(),
        }
    }
}

impl GoalRecord {
    /// Empty record for `goal_id`.
    pub fn new(goal_id: impl Into<String>) -> Self {
        Self {
            goal_id: goal_id.into(),
            ..Self::default()
        }
    }

    /// Overwrite every field the patch supplies.
    pub fn merge(&mut self, patch: &GoalPatch) {
        if let Some(v) = &patch.description {
            self.description = Some(v.clone());
        }
        if let Some(v) = patch.confidence {
            self.confidence = Some(v.clamp(0.0, 1.0));
        }
        if let Some(v) = &patch.evidence {
            self.evidence = v.clone();
        }
        if let Some(v) = &patch.goal_type {
            self.goal_type = Some(v.clone());
        }
        if let Some(v) = patch.priority {
            self.priority = Some(v);
        }
        if let Some(v) = patch.target_amount {
            self.target_amount = Some(v);
        }
        if let Some(v) = patch.target_year {
            self.target_year = Some(v);
        }
        if let Some(v) = patch.timeline_years {
            self.timeline_years = Some(v);
        }
        if let Some(v) = patch.target_months {
            self.target_months = Some(v);
        }
        if let Some(v) = &patch.confirmed_via {
            self.confirmed_via = Some(v.clone());
        }
        if let Some(v) = &patch.is_strategy_for {
            self.is_strategy_for = Some(v.clone());
        }
        for (k, v) in &patch.extra {
            self.extra.insert(k.clone(), v.clone());
        }
    }

    /// Whether any amount or timing detail has been captured.
    pub fn has_any_detail(&self) -> bool {
        self.target_amount.is_some()
            || self.target_year.is_some()
            || self.timeline_years.is_some()
            || self.target_months.is_some()
    }
}

/// State retained for a rejected goal, consulted only when it is re-proposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionSnapshot {
    pub confidence: Option<f64>,
    #[serde(default)]
    pub evidence: BTreeSet<String>,
    pub description: Option<String>,
    pub rejected_at: DateTime<Utc>,
}

/// A goal the user chose to revisit later during scenario framing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredGoal {
    pub goal_id: String,
    pub description: Option<String>,
    pub deferred_at: DateTime<Utc>,
}

/// One layer of a goal's meaning uncovered during exploration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalLayer {
    /// `surface_goal`, `strategy`, `underlying_need` or `core_value`.
    pub layer_type: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_quote: Option<String>,
}

pub const LAYER_UNDERLYING_NEED: &str = "underlying_need";
pub const LAYER_CORE_VALUE: &str = "core_value";

/// Permanent record synthesized when a goal exploration ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalUnderstanding {
    pub goal_id: String,
    pub surface_goal: String,
    #[serde(default)]
    pub is_strategy_for: Option<String>,
    #[serde(default)]
    pub goal_layers: Vec<GoalLayer>,
    #[serde(default)]
    pub underlying_needs: Vec<String>,
    #[serde(default)]
    pub core_values: Vec<String>,
    #[serde(default)]
    pub emotional_themes: Vec<String>,
    #[serde(default)]
    pub key_quotes: Vec<String>,
    pub exploration_turns: u32,
    pub created_at: DateTime<Utc>,
}

impl GoalUnderstanding {
    /// Build the record from the accumulated exploration layers and themes.
    pub fn synthesize(
        goal_id: impl Into<String>,
        surface_goal: impl Into<String>,
        is_strategy_for: Option<String>,
        layers: Vec<GoalLayer>,
        themes: Vec<String>,
        turns: u32,
    ) -> Self {
        let of_type = |kind: &str| -> Vec<String> {
            layers
                .iter()
                .filter(|l| l.layer_type == kind)
                .map(|l| l.description.clone())
                .collect()
        };
        let underlying_needs = of_type(LAYER_UNDERLYING_NEED);
        let core_values = of_type(LAYER_CORE_VALUE);
        let key_quotes = layers
            .iter()
            .filter_map(|l| l.user_quote.clone())
            .filter(|q| !q.trim().is_empty())
            .collect();

        Self {
            goal_id: goal_id.into(),
            surface_goal: surface_goal.into(),
            is_strategy_for,
            goal_layers: layers,
            underlying_needs,
            core_values,
            emotional_themes: themes,
            key_quotes,
            exploration_turns: turns,
            created_at: Utc::now(),
        }
    }

    /// One summary line used in advisor context.
    pub fn summary_line(&self) -> String {
        let mut line = format!("- {}", self.surface_goal);
        if let Some(strategy) = &self.is_strategy_for {
            line.push_str(&format!(" (strategy for: {})", strategy));
        }
        if !self.emotional_themes.is_empty() {
            line.push_str(&format!(" | themes: {}", self.emotional_themes.join(", ")));
        }
        if !self.core_values.is_empty() {
            line.push_str(&format!(" | values: {}", self.core_values.join(", ")));
        }
        if let Some(quote) = self.key_quotes.first() {
            line.push_str(&format!(" | user said: \"{}\"", quote));
        }
        line
    }
}
