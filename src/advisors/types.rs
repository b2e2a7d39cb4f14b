//! Advisor requests and proposals.
//!
//! Requests are owned snapshots of session state. Proposals are untrusted:
//! every field is optional, and list items that fail to parse are dropped one
//! by one instead of failing the whole proposal.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use crate::graph::{FieldMap, FieldUpdate, GoalLayer, GoalPatch, GoalRecord, GoalStateView};
use crate::orchestrator::Phase;
use crate::schema::NodeType;

/// Which advisor a call went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorKind {
    FactExtractor,
    Conversation,
    GoalInference,
    Scenario,
    GoalDetails,
}

impl AdvisorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdvisorKind::FactExtractor => "fact_extractor",
            AdvisorKind::Conversation => "conversation",
            AdvisorKind::GoalInference => "goal_inference",
            AdvisorKind::Scenario => "scenario",
            AdvisorKind::GoalDetails => "goal_details",
        }
    }
}

impl fmt::Display for AdvisorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who spoke a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Advisor,
}

/// One line of a sub-dialogue transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

impl TranscriptEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    pub fn advisor(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Advisor,
            text: text.into(),
        }
    }
}

fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(error = %e, "Dropping malformed advisor item");
                None
            }
        })
        .collect())
}

fn lenient_map<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(key, item)| match serde_json::from_value(item) {
            Ok(parsed) => Some((key, parsed)),
            Err(e) => {
                warn!(key = %key, error = %e, "Dropping malformed advisor entry");
                None
            }
        })
        .collect())
}

/// Numbers sometimes arrive as strings ("250000", "$1,200").
fn loose_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse().ok()
        }
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Fact extraction
// ----------------------------------------------------------------------------

/// Input to [`super::FactExtractor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactExtractionRequest {
    pub user_text: String,
    pub current_node: Option<String>,
    pub current_question: Option<String>,
    pub snapshot: BTreeMap<String, FieldMap>,
    pub schema: Vec<NodeType>,
}

/// Facts found in one user message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactProposal {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub updates: Vec<FieldUpdate>,
    /// Omitted nodes that became relevant again.
    #[serde(default, deserialize_with = "lenient_vec")]
    pub revive_nodes: Vec<String>,
    #[serde(default)]
    pub conflicts_detected: Option<bool>,
}

// ----------------------------------------------------------------------------
// Conversation
// ----------------------------------------------------------------------------

/// State of the goal exploration sub-dialogue, shared with advisors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExplorationContext {
    pub goal_id: String,
    pub goal_description: String,
    pub turn: u32,
    pub max_turns: u32,
    #[serde(default)]
    pub goal_layers: Vec<GoalLayer>,
    #[serde(default)]
    pub emotional_themes: Vec<String>,
    #[serde(default)]
    pub transcript: Vec<TranscriptEntry>,
}

/// Input to [`super::ConversationalAdvisor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRequest {
    pub phase: Phase,
    pub user_text: String,
    pub current_node: Option<String>,
    pub missing_fields: Vec<String>,
    pub last_question: Option<String>,
    pub snapshot: BTreeMap<String, FieldMap>,
    pub visited: Vec<String>,
    pub pending: Vec<String>,
    pub omitted: Vec<String>,
    pub goal_state: GoalStateView,
    pub exploration: Option<ExplorationContext>,
    pub exploration_summary: String,
}

/// A goal mentioned or inferred by an advisor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalCandidate {
    #[serde(default)]
    pub goal_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Node names the goal was deduced from.
    #[serde(default, alias = "deduced_from", deserialize_with = "lenient_vec")]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub goal_type: Option<String>,
}

impl GoalCandidate {
    /// Ledger patch carrying the candidate's supplied fields.
    pub fn to_patch(&self) -> GoalPatch {
        let mut patch = GoalPatch::default();
        if let Some(desc) = self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            patch = patch.with_description(desc.trim());
        }
        if let Some(confidence) = self.confidence.filter(|c| c.is_finite()) {
            patch = patch.with_confidence(confidence);
        }
        if !self.evidence.is_empty() {
            patch = patch.with_evidence(self.evidence.iter().cloned());
        }
        if let Some(goal_type) = self.goal_type.as_deref().filter(|t| !t.trim().is_empty()) {
            patch = patch.with_goal_type(goal_type.trim());
        }
        patch
    }
}

/// Everything the conversational advisor may propose in one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationProposal {
    #[serde(default)]
    pub response_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub new_goals_detected: Vec<GoalCandidate>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub goals_to_qualify: Vec<GoalCandidate>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub goals_to_reject: Vec<String>,
    /// Goal id to priority.
    #[serde(default, deserialize_with = "lenient_map")]
    pub goals_to_confirm: BTreeMap<String, u32>,
    #[serde(default)]
    pub question_target_node: Option<String>,
    #[serde(default)]
    pub question_target_field: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub nodes_to_omit: Vec<String>,
    #[serde(default, deserialize_with = "lenient_map")]
    pub omission_reasons: BTreeMap<String, String>,
    #[serde(default)]
    pub goals_collection_complete: Option<bool>,
    #[serde(default)]
    pub phase1_complete: Option<bool>,
    /// Replaces the exploration layer list when present.
    #[serde(default)]
    pub goal_layers: Option<Vec<GoalLayer>>,
    /// Replaces the exploration theme set when present.
    #[serde(default)]
    pub emotional_themes: Option<Vec<String>>,
    #[serde(default)]
    pub exploration_complete: Option<bool>,
    #[serde(default)]
    pub is_strategy_for: Option<String>,
}

// ----------------------------------------------------------------------------
// Goal inference
// ----------------------------------------------------------------------------

/// Input to [`super::GoalInferenceAdvisor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalInferenceRequest {
    pub visited_snapshots: BTreeMap<String, FieldMap>,
    pub goal_state: GoalStateView,
    pub allowed_goal_types: Vec<String>,
    pub exploration_summary: String,
}

/// Goals deduced from collected facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceProposal {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub inferred_goals: Vec<GoalCandidate>,
    /// Goal to frame first.
    #[serde(default)]
    pub scenario_goal: Option<String>,
}

// ----------------------------------------------------------------------------
// Scenario framing
// ----------------------------------------------------------------------------

/// Input to [`super::ScenarioAdvisor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRequest {
    pub goal_id: String,
    pub candidate: GoalPatch,
    pub user_text: Option<String>,
    pub snapshot: BTreeMap<String, FieldMap>,
    pub transcript: Vec<TranscriptEntry>,
    pub turn: u32,
    pub max_turns: u32,
}

/// Scenario advisor verdict for one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioProposal {
    #[serde(default)]
    pub response_text: Option<String>,
    /// Echo of the goal being framed; a mismatch voids the verdict.
    #[serde(default)]
    pub goal_id: Option<String>,
    #[serde(default)]
    pub goal_confirmed: Option<bool>,
    #[serde(default)]
    pub goal_rejected: Option<bool>,
    #[serde(default)]
    pub goal_deferred: Option<bool>,
    #[serde(default)]
    pub should_continue: Option<bool>,
}

/// Resolved scenario verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioVerdict {
    Confirmed,
    Rejected,
    Deferred,
}

impl ScenarioProposal {
    /// Verdict with confirmed > rejected > deferred precedence.
    pub fn verdict(&self) -> Option<ScenarioVerdict> {
        if self.goal_confirmed == Some(true) {
            Some(ScenarioVerdict::Confirmed)
        } else if self.goal_rejected == Some(true) {
            Some(ScenarioVerdict::Rejected)
        } else if self.goal_deferred == Some(true) {
            Some(ScenarioVerdict::Deferred)
        } else {
            None
        }
    }
}

// ----------------------------------------------------------------------------
// Goal details
// ----------------------------------------------------------------------------

/// Input to [`super::GoalDetailAdvisor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalDetailRequest {
    pub goal: GoalRecord,
    pub missing_details: Vec<String>,
    pub goal_state: GoalStateView,
    pub snapshot: BTreeMap<String, FieldMap>,
    pub user_text: Option<String>,
}

/// Details extracted for the goal under discussion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalDetailProposal {
    #[serde(default)]
    pub extracted_details: BTreeMap<String, Value>,
    #[serde(default)]
    pub done: Option<bool>,
    #[serde(default)]
    pub question: Option<String>,
}

impl GoalDetailProposal {
    /// Normalize extracted details into a goal patch.
    ///
    /// Known numeric slots accept numbers or numeric strings; values that do
    /// not parse are dropped. Unknown keys land in `extra`.
    pub fn to_patch(&self) -> GoalPatch {
        let mut patch = GoalPatch::default();
        for (key, value) in &self.extracted_details {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "target_amount" => patch.target_amount = loose_number(value),
                "target_year" => {
                    patch.target_year = loose_number(value)
                        .filter(|y| y.fract() == 0.0 && (1900.0..=2200.0).contains(y))
                        .map(|y| y as i32)
                }
                "timeline_years" => patch.timeline_years = loose_number(value),
                "target_months" => patch.target_months = loose_number(value),
                _ => {
                    patch.extra.insert(key.clone(), value.clone());
                }
            }
        }
        patch
    }

    /// Whether anything usable was extracted.
    pub fn has_details(&self) -> bool {
        self.extracted_details.values().any(|v| !v.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_malformed_items_are_dropped_individually() {
        let proposal: FactProposal = serde_json::from_value(json!({
            "updates": [
                {"node_name": "Personal", "field_name": "age", "value": 34},
                {"node_name": "Personal"},
                "garbage"
            ],
            "revive_nodes": ["Marriage", 7]
        }))
        .unwrap();
        assert_eq!(proposal.updates.len(), 1);
        assert_eq!(proposal.revive_nodes, vec!["Marriage".to_string()]);
        assert_eq!(proposal.conflicts_detected, None);
    }

    #[test]
    fn test_empty_object_is_a_valid_proposal() {
        let proposal: ConversationProposal = serde_json::from_value(json!({})).unwrap();
        assert_eq!(proposal, ConversationProposal::default());
        let proposal: ConversationProposal =
            serde_json::from_value(json!({"nodes_to_omit": null})).unwrap();
        assert!(proposal.nodes_to_omit.is_empty());
    }

    #[test]
    fn test_goals_to_confirm_drops_bad_priorities() {
        let proposal: ConversationProposal = serde_json::from_value(json!({
            "goals_to_confirm": {"retirement": 1, "travel": "soon"}
        }))
        .unwrap();
        assert_eq!(proposal.goals_to_confirm.len(), 1);
        assert_eq!(proposal.goals_to_confirm["retirement"], 1);
    }

    #[test]
    fn test_goal_candidate_accepts_deduced_from() {
        let candidate: GoalCandidate = serde_json::from_value(json!({
            "goal_id": "debt_free",
            "confidence": 0.6,
            "deduced_from": ["Loan", "Income"]
        }))
        .unwrap();
        let patch = candidate.to_patch();
        assert_eq!(patch.evidence.unwrap().len(), 2);
        assert_eq!(patch.confidence, Some(0.6));
        assert_eq!(patch.description, None);
    }

    #[test]
    fn test_scenario_verdict_precedence() {
        let proposal = ScenarioProposal {
            goal_confirmed: Some(true),
            goal_rejected: Some(true),
            goal_deferred: Some(true),
            ..Default::default()
        };
        assert_eq!(proposal.verdict(), Some(ScenarioVerdict::Confirmed));

        let proposal = ScenarioProposal {
            goal_rejected: Some(true),
            goal_deferred: Some(true),
            ..Default::default()
        };
        assert_eq!(proposal.verdict(), Some(ScenarioVerdict::Rejected));
        assert_eq!(ScenarioProposal::default().verdict(), None);
    }

    #[test]
    fn test_goal_detail_normalization() {
        let proposal: GoalDetailProposal = serde_json::from_value(json!({
            "extracted_details": {
                "target_amount": "$850,000",
                "target_year": 2029,
                "timeline_years": null,
                "funding_method": "savings"
            },
            "done": true
        }))
        .unwrap();
        let patch = proposal.to_patch();
        assert_eq!(patch.target_amount, Some(850000.0));
        assert_eq!(patch.target_year, Some(2029));
        assert_eq!(patch.timeline_years, None);
        assert_eq!(patch.extra.get("funding_method"), Some(&json!("savings")));
        assert!(proposal.has_details());
    }

    #[test]
    fn test_implausible_year_is_dropped() {
        let proposal = GoalDetailProposal {
            extracted_details: BTreeMap::from([("target_year".to_string(), json!(5))]),
            ..Default::default()
        };
        assert_eq!(proposal.to_patch().target_year, None);
    }
}
