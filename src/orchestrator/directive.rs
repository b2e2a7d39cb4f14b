//! What the orchestrator hands back after every turn.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Phase;
use crate::advisors::{DegradedAdvisors, ScenarioVerdict};
use crate::graph::{ConflictRecord, FieldMap, GoalStateView};

/// Node (and optionally field) the next question is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionTarget {
    pub node: String,
    pub field: Option<String>,
}

/// Completion signals, already corrected against the frontier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionFlags {
    /// Every node has been visited, omitted or rejected.
    pub visited_all: bool,
    /// Advisor claimed overall completion and the frontier agrees.
    pub phase1_complete: bool,
    pub goals_collection_complete: bool,
    pub exploration_complete: bool,
    pub scenario_complete: bool,
    pub goal_details_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationView {
    pub goal_id: String,
    pub turn: u32,
    pub max_turns: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioView {
    pub goal_id: String,
    pub goal_description: Option<String>,
    pub turn: u32,
    pub max_turns: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalDetailsView {
    pub goal_id: String,
    pub missing_fields: Vec<String>,
}

/// Result of the last scenario sub-dialogue, reported on the turn it ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub goal_id: String,
    pub verdict: Option<ScenarioVerdict>,
}

/// Per-turn output of the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub phase: Phase,
    /// Text to show the user.
    pub message: String,
    pub target: Option<QuestionTarget>,
    pub flags: CompletionFlags,
    pub goal_state: GoalStateView,
    /// Every node snapshot collected so far.
    pub data: BTreeMap<String, FieldMap>,
    /// Snapshot of the targeted node.
    pub extracted_data: FieldMap,
    /// First five pending nodes, sorted.
    pub upcoming_nodes: Vec<String>,
    pub conflicts: BTreeMap<String, BTreeMap<String, ConflictRecord>>,
    /// Advisors that failed or timed out this turn.
    pub degraded: DegradedAdvisors,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exploration: Option<ExplorationView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<ScenarioView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_outcome: Option<ScenarioOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_details: Option<GoalDetailsView>,
}
