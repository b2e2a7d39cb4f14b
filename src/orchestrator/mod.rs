//! The dialogue phase machine.
//!
//! An [`Orchestrator`] owns one session: its [`GraphStore`], the scenario
//! backlog and the phase state. Each call to [`Orchestrator::submit_turn`]
//! consults the advisors, applies what survives validation, decides the next
//! phase and returns a [`Directive`]. Advisor failures never escape a turn.
//!
//! ```text
//! DataGathering ──new goal──▶ GoalExploration ──done/cap──▶ DataGathering
//!       │
//!       ├──frontier drained + inference──▶ ScenarioFraming ──queue empty──▶ DataGathering
//!       │
//!       └──frontier drained + goals lacking details──▶ GoalDetails ──all done──▶ DataGathering
//! ```

mod details;
mod directive;
mod exploration;
mod gathering;
mod scenario;
mod state;


use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::advisors::{
    guarded, AdvisorKind, AdvisorSet, ConversationProposal, ConversationRequest, DegradedAdvisors,
    FactExtractionRequest, FactProposal, ScenarioVerdict,
};
use crate::config::DialogueConfig;
use crate::error::SnapshotResult;
use crate::evaluator::{is_complete, targeting_missing};
use crate::goals::{GoalLedger, ScenarioQueue};
use crate::graph::{FieldMap, FieldUpdate, GraphStore};
use crate::schema::SchemaRegistry;

pub use directive::{
    CompletionFlags, Directive, ExplorationView, GoalDetailsView, QuestionTarget,
    ScenarioOutcome, ScenarioView,
};
pub use state::{
    DetailsState, ExplorationState, OrchestratorState, Phase, ScenarioState, SessionSnapshot,
};

/// Closing line once nothing is left to ask.
const NOTHING_LEFT_MESSAGE: &str =
    "Thanks, I have what I need for now. Is there anything else you'd like to add?";

/// Outputs accumulated while a turn runs.
#[derive(Debug, Default)]
struct Turn {
    degraded: DegradedAdvisors,
    message: Option<String>,
    target: Option<QuestionTarget>,
    phase1_claimed: bool,
    inference_attempted: bool,
    goals_collection_complete: bool,
    exploration_complete: bool,
    scenario_outcome: Option<ScenarioOutcome>,
    goal_details_complete: bool,
}

/// One session's dialogue engine.
pub struct Orchestrator {
    registry: Arc<SchemaRegistry>,
    advisors: AdvisorSet,
    config: DialogueConfig,
    ledger: GoalLedger,
    store: GraphStore,
    queue: ScenarioQueue,
    state: OrchestratorState,
}

impl Orchestrator {
    /// Fresh session with every registered node pending.
    pub fn new(registry: Arc<SchemaRegistry>, advisors: AdvisorSet, config: DialogueConfig) -> Self {
        let store = GraphStore::with_pending(registry.names());
        Self {
            ledger: GoalLedger::new(config.reopen_confidence_delta),
            registry,
            advisors,
            config,
            store,
            queue: ScenarioQueue::new(),
            state: OrchestratorState::default(),
        }
    }

    /// Rebuild a session from a snapshot.
    pub fn from_snapshot(
        registry: Arc<SchemaRegistry>,
        advisors: AdvisorSet,
        config: DialogueConfig,
        snapshot: SessionSnapshot,
    ) -> SnapshotResult<Self> {
        let mut orchestrator = Self::new(registry, advisors, config);
        orchestrator.restore(snapshot)?;
        Ok(orchestrator)
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub fn queue(&self) -> &ScenarioQueue {
        &self.queue
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Capture the whole session.
    pub fn snapshot(&self) -> SnapshotResult<SessionSnapshot> {
        Ok(SessionSnapshot {
            graph: self.store.dump()?,
            state: self.state.clone(),
            queue: self.queue.clone(),
        })
    }

    /// Replace the session with `snapshot`.
    ///
    /// Everything is validated before anything is swapped in; on error the
    /// current session is left untouched.
    pub fn restore(&mut self, snapshot: SessionSnapshot) -> SnapshotResult<()> {
        let store = GraphStore::restore(snapshot.graph)?;
        snapshot.state.validate()?;
        self.store = store;
        self.state = snapshot.state;
        self.queue = snapshot.queue;
        debug!(phase = %self.state.phase, "Session restored");
        Ok(())
    }

    /// Opening directive.
    ///
    /// On a resumed session this repeats the last question instead of asking
    /// the advisor again.
    pub async fn start(&mut self) -> Directive {
        let mut turn = Turn::default();

        if self.state.turn_count > 0 || self.state.phase != Phase::DataGathering {
            turn.message = self.state.last_question.clone();
            turn.target = self.state.last_question_node.clone().map(|node| QuestionTarget {
                field: self.next_missing_field(&node),
                node,
            });
            return self.finish(turn);
        }

        let request = self.conversation_request(Phase::DataGathering, "");
        let advisors = self.advisors.clone();
        let result = guarded(
            AdvisorKind::Conversation,
            self.config.advisor_timeout_ms,
            advisors.conversation.converse(request),
        )
        .await;
        let proposal = turn.degraded.absorb(AdvisorKind::Conversation, result);

        match proposal {
            Some(proposal) => self.follow_proposal(&mut turn, &proposal),
            None => self.ask_deterministically(&mut turn),
        }

        info!(phase = %self.state.phase, "Session started");
        self.finish(turn)
    }

    /// Process one user message. Always returns a directive.
    pub async fn submit_turn(&mut self, user_text: &str) -> Directive {
        self.state.turn_count += 1;
        let mut turn = Turn::default();

        match self.state.phase {
            Phase::DataGathering => self.gathering_turn(&mut turn, user_text).await,
            Phase::GoalExploration => self.exploration_turn(&mut turn, user_text).await,
            Phase::ScenarioFraming => self.scenario_turn(&mut turn, user_text).await,
            Phase::GoalDetails => self.details_turn(&mut turn, user_text).await,
        }

        self.finish(turn)
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    fn set_phase(&mut self, to: Phase) {
        if self.state.phase != to {
            info!(from = %self.state.phase, to = %to, "Phase transition");
            self.state.phase = to;
        }
    }

    fn all_snapshots(&self) -> BTreeMap<String, FieldMap> {
        self.store.node_snapshots().clone()
    }

    fn fact_request(&self, user_text: &str) -> FactExtractionRequest {
        FactExtractionRequest {
            user_text: user_text.to_string(),
            current_node: self
                .state
                .last_question_node
                .clone()
                .or_else(|| self.state.current_node.clone()),
            current_question: self.state.last_question.clone(),
            snapshot: self.all_snapshots(),
            schema: self.registry.iter().cloned().collect(),
        }
    }

    fn conversation_request(&self, phase: Phase, user_text: &str) -> ConversationRequest {
        let current_node = self
            .state
            .current_node
            .clone()
            .or_else(|| self.state.last_question_node.clone());
        let missing_fields = current_node
            .as_deref()
            .map(|node| self.targeting_missing_for(node))
            .unwrap_or_default();

        ConversationRequest {
            phase,
            user_text: user_text.to_string(),
            current_node,
            missing_fields,
            last_question: self.state.last_question.clone(),
            snapshot: self.all_snapshots(),
            visited: self.store.visited().iter().cloned().collect(),
            pending: self.store.pending().iter().cloned().collect(),
            omitted: self.store.omitted().iter().cloned().collect(),
            goal_state: self.store.goal_state(),
            exploration: self
                .state
                .exploration
                .as_ref()
                .map(|e| e.context(self.config.exploration_max_turns)),
            exploration_summary: self.store.exploration_summary(),
        }
    }

    fn node_is_complete(&self, node: &str) -> bool {
        self.registry
            .get(node)
            .is_some_and(|n| is_complete(n, self.store.node_snapshot(node)))
    }

    /// Move a node to Visited once its collection spec is satisfied.
    fn mark_complete_if_needed(&mut self, node: &str) -> bool {
        if self.store.visited().contains(node) || !self.node_is_complete(node) {
            return false;
        }
        self.store.mark_visited(node)
    }

    fn targeting_missing_for(&self, node: &str) -> Vec<String> {
        match self.registry.get(node) {
            Some(node_type) => targeting_missing(
                node_type,
                self.store.node_snapshot(node),
                self.store.asked_questions(node),
            ),
            None => Vec::new(),
        }
    }

    /// Deterministic next field for a node.
    fn next_missing_field(&self, node: &str) -> Option<String> {
        self.targeting_missing_for(node).into_iter().next()
    }

    /// Apply a fact proposal: known nodes and fields only, then revivals and
    /// completion checks.
    fn apply_facts(&mut self, proposal: FactProposal) {
        let (valid, dropped): (Vec<FieldUpdate>, Vec<FieldUpdate>) =
            proposal.updates.into_iter().partition(|u| {
                self.registry
                    .get(u.node_name.trim())
                    .is_some_and(|n| n.has_field(u.field_name.trim()))
            });
        for update in &dropped {
            warn!(
                node = %update.node_name,
                field = %update.field_name,
                "Dropping update for unknown node or field"
            );
        }

        let report = self.store.apply_updates(&valid);
        if !report.conflicts.is_empty() {
            info!(conflicts = report.conflicts.len(), "Corrections recorded as conflicts");
        }

        for node in proposal.revive_nodes {
            let node = node.trim();
            if !self.registry.contains(node) {
                warn!(node = %node, "Ignoring revival of unknown node");
                continue;
            }
            if self.store.omitted().contains(node) {
                self.store.revive_node(node);
            } else {
                self.store.add_pending([node]);
            }
            self.store.clear_asked_questions(node);
        }

        for node in report.touched_nodes() {
            self.mark_complete_if_needed(&node);
        }
    }

    /// Run fact extraction alone (used by sub-dialogues that have no
    /// conversational branch to pair it with).
    async fn extract_facts(&mut self, turn: &mut Turn, user_text: &str) {
        let request = self.fact_request(user_text);
        let advisors = self.advisors.clone();
        let result = guarded(
            AdvisorKind::FactExtractor,
            self.config.advisor_timeout_ms,
            advisors.facts.extract_facts(request),
        )
        .await;
        if let Some(facts) = turn.degraded.absorb(AdvisorKind::FactExtractor, result) {
            self.apply_facts(facts);
        }
    }

    /// Validate an advisor-proposed target against the schema.
    fn resolve_target(&self, node: Option<&str>, field: Option<&str>) -> Option<QuestionTarget> {
        let node = node.map(str::trim).filter(|n| !n.is_empty())?;
        let Some(node_type) = self.registry.get(node) else {
            warn!(node = %node, "Advisor targeted unknown node");
            return None;
        };
        let field = field
            .map(str::trim)
            .filter(|f| node_type.describe(f).is_some())
            .map(str::to_string)
            .or_else(|| node_type.default_question_field().map(str::to_string));
        Some(QuestionTarget {
            node: node.to_string(),
            field,
        })
    }

    /// Whether the pinned node still holds the dialogue.
    fn pin_holds(&self, node: &str) -> bool {
        self.store.pending().contains(node) && !self.node_is_complete(node)
    }

    /// Apply node pinning to a proposed target and adopt the result.
    fn adopt_target(
        &mut self,
        turn: &mut Turn,
        proposed: Option<QuestionTarget>,
        advisor_text: Option<String>,
    ) {
        let mut target = proposed;
        let mut message = advisor_text.filter(|t| !t.trim().is_empty());

        if let Some(pinned) = self.state.current_node.clone() {
            if self.pin_holds(&pinned) {
                if target.as_ref().map(|t| t.node.as_str()) != Some(pinned.as_str()) {
                    let field = self.next_missing_field(&pinned);
                    warn!(
                        pinned = %pinned,
                        proposed = ?target.as_ref().map(|t| &t.node),
                        "Pinned node overrides advisor target"
                    );
                    message = Some(self.registry.fallback_question(&pinned, field.as_deref()));
                    target = Some(QuestionTarget {
                        node: pinned,
                        field,
                    });
                }
            } else {
                debug!(node = %pinned, "Releasing pinned node");
                self.state.current_node = None;
            }
        }

        if let Some(target) = &target {
            if self.state.current_node.is_none() && self.pin_holds(&target.node) {
                self.state.current_node = Some(target.node.clone());
            }
            if self.state.last_question_node.as_deref() != Some(target.node.as_str()) {
                self.store.add_edge(
                    self.state.last_question_node.as_deref(),
                    &target.node,
                    "question target",
                );
            }
        }

        if message.is_none() {
            message = Some(match &target {
                Some(t) => self.registry.fallback_question(&t.node, t.field.as_deref()),
                None => NOTHING_LEFT_MESSAGE.to_string(),
            });
        }

        turn.target = target;
        turn.message = message;
    }

    /// Pick the next target without advisor input: the pinned node if it
    /// still holds, else the first open node.
    fn ask_deterministically(&mut self, turn: &mut Turn) {
        let node = self
            .state
            .current_node
            .clone()
            .filter(|n| self.pin_holds(n))
            .or_else(|| self.store.open_nodes().into_iter().next());
        let target = node.map(|node| QuestionTarget {
            field: self.next_missing_field(&node),
            node,
        });
        self.adopt_target(turn, target, None);
    }

    /// Adopt the advisor's proposed target. An unknown node, or a proposal
    /// with neither a target nor any text, falls back to the deterministic
    /// choice.
    fn follow_proposal(&mut self, turn: &mut Turn, proposal: &ConversationProposal) {
        let node = proposal.question_target_node.as_deref();
        let target = self.resolve_target(node, proposal.question_target_field.as_deref());
        let proposed_node = node.is_some_and(|n| !n.trim().is_empty());
        let silent = proposal
            .response_text
            .as_deref()
            .map_or(true, |t| t.trim().is_empty());

        if target.is_none() && (proposed_node || silent) {
            self.ask_deterministically(turn);
        } else {
            self.adopt_target(turn, target, proposal.response_text.clone());
        }
    }

    /// Build the directive and remember what was asked.
    fn finish(&mut self, turn: Turn) -> Directive {
        let message = turn
            .message
            .unwrap_or_else(|| NOTHING_LEFT_MESSAGE.to_string());

        if self.state.phase == Phase::DataGathering {
            if let Some(QuestionTarget {
                node,
                field: Some(field),
            }) = &turn.target
            {
                self.store.mark_question_asked(node, field);
            }
        }
        self.state.last_question = Some(message.clone());
        self.state.last_question_node = turn.target.as_ref().map(|t| t.node.clone());

        let visited_all = self.store.pending().is_empty();
        if turn.phase1_claimed && !visited_all {
            warn!(
                pending = self.store.pending().len(),
                "Overriding completion claim while nodes are pending"
            );
        }

        let extracted_data = turn
            .target
            .as_ref()
            .map(|t| self.store.node_snapshot(&t.node).clone())
            .unwrap_or_default();

        Directive {
            phase: self.state.phase,
            message,
            flags: CompletionFlags {
                visited_all,
                phase1_complete: turn.phase1_claimed && visited_all,
                goals_collection_complete: turn.goals_collection_complete
                    || self.state.goal_intake_complete,
                exploration_complete: turn.exploration_complete,
                scenario_complete: turn.scenario_outcome.is_some(),
                goal_details_complete: turn.goal_details_complete,
            },
            target: turn.target,
            goal_state: self.store.goal_state(),
            data: self.all_snapshots(),
            extracted_data,
            upcoming_nodes: self.store.pending().iter().take(5).cloned().collect(),
            conflicts: self.store.conflicts().clone(),
            degraded: turn.degraded,
            exploration: self.state.exploration.as_ref().map(|e| ExplorationView {
                goal_id: e.goal_id.clone(),
                turn: e.turn,
                max_turns: self.config.exploration_max_turns,
            }),
            scenario: self.state.scenario.as_ref().map(|s| ScenarioView {
                goal_id: s.goal_id.clone(),
                goal_description: s.candidate.description.clone(),
                turn: s.turn,
                max_turns: self.config.scenario_max_turns,
            }),
            scenario_outcome: turn.scenario_outcome,
            goal_details: self.state.details.as_ref().map(|d| GoalDetailsView {
                goal_id: d.goal_id.clone(),
                missing_fields: d.missing.clone(),
            }),
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("phase", &self.state.phase)
            .field("turn_count", &self.state.turn_count)
            .finish_non_exhaustive()
    }
}

/// Verdict text used when the scenario advisor gave no reply.
fn verdict_acknowledgement(verdict: Option<ScenarioVerdict>) -> &'static str {
    match verdict {
        Some(ScenarioVerdict::Confirmed) => "Got it, I'll add that as a goal.",
        Some(ScenarioVerdict::Rejected) => "No worries, we'll leave that out.",
        Some(ScenarioVerdict::Deferred) => "No worries, I'll park that and we can revisit it later.",
        None => "Thanks, let's keep going.",
    }
}
