//! Orchestrator state: phase, pointers and one-shot latches.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::advisors::{ExplorationContext, TranscriptEntry};
use crate::error::{SnapshotError, SnapshotResult};
use crate::goals::ScenarioQueue;
use crate::graph::{GoalLayer, GoalPatch};

/// Dialogue phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    DataGathering,
    GoalExploration,
    ScenarioFraming,
    GoalDetails,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::DataGathering => "data_gathering",
            Phase::GoalExploration => "goal_exploration",
            Phase::ScenarioFraming => "scenario_framing",
            Phase::GoalDetails => "goal_details",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "data_gathering" => Ok(Phase::DataGathering),
            "goal_exploration" => Ok(Phase::GoalExploration),
            "scenario_framing" => Ok(Phase::ScenarioFraming),
            "goal_details" => Ok(Phase::GoalDetails),
            _ => Err(format!("Unknown phase: {}", s)),
        }
    }
}

/// Active goal exploration sub-dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationState {
    pub goal_id: String,
    pub goal_description: String,
    pub turn: u32,
    #[serde(default)]
    pub goal_layers: Vec<GoalLayer>,
    #[serde(default)]
    pub emotional_themes: Vec<String>,
    #[serde(default)]
    pub transcript: Vec<TranscriptEntry>,
    #[serde(default)]
    pub is_strategy_for: Option<String>,
}

impl ExplorationState {
    pub fn new(goal_id: impl Into<String>, goal_description: impl Into<String>) -> Self {
        Self {
            goal_id: goal_id.into(),
            goal_description: goal_description.into(),
            turn: 1,
            goal_layers: Vec::new(),
            emotional_themes: Vec::new(),
            transcript: Vec::new(),
            is_strategy_for: None,
        }
    }

    /// Advisor-facing view of the exploration.
    pub fn context(&self, max_turns: u32) -> ExplorationContext {
        ExplorationContext {
            goal_id: self.goal_id.clone(),
            goal_description: self.goal_description.clone(),
            turn: self.turn,
            max_turns,
            goal_layers: self.goal_layers.clone(),
            emotional_themes: self.emotional_themes.clone(),
            transcript: self.transcript.clone(),
        }
    }
}

/// Active scenario framing sub-dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioState {
    pub goal_id: String,
    pub candidate: GoalPatch,
    pub turn: u32,
    #[serde(default)]
    pub transcript: Vec<TranscriptEntry>,
}

/// Active goal-details sub-dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailsState {
    pub goal_id: String,
    #[serde(default)]
    pub missing: Vec<String>,
}

/// Everything the phase machine tracks besides the graph store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorState {
    pub phase: Phase,
    /// Node pinned for collection until it completes.
    pub current_node: Option<String>,
    pub last_question: Option<String>,
    pub last_question_node: Option<String>,
    pub exploration: Option<ExplorationState>,
    pub scenario: Option<ScenarioState>,
    pub details: Option<DetailsState>,
    pub goal_intake_complete: bool,
    pub priority_planning_done: bool,
    pub goal_inference_activated: bool,
    pub turn_count: u64,
}

impl OrchestratorState {
    /// Check that the phase agrees with the sub-dialogue pointers.
    pub fn validate(&self) -> SnapshotResult<()> {
        let checks = [
            (Phase::GoalExploration, self.exploration.is_some(), "exploration"),
            (Phase::ScenarioFraming, self.scenario.is_some(), "scenario"),
            (Phase::GoalDetails, self.details.is_some(), "goal details"),
        ];
        for (phase, active, name) in checks {
            if (self.phase == phase) != active {
                return Err(SnapshotError::Invariant {
                    message: format!(
                        "phase {} does not match {} pointer (active: {})",
                        self.phase, name, active
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Serializable image of a whole session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// [`crate::graph::GraphStore::dump`] output.
    pub graph: Value,
    pub state: OrchestratorState,
    #[serde(default)]
    pub queue: ScenarioQueue,
}
