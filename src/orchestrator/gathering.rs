//! DataGathering turns: facts, goals, omissions and node targeting.

use tracing::{debug, info, warn};

use super::{Orchestrator, Phase, Turn};
use crate::advisors::{guarded, AdvisorKind, ConversationProposal, GoalInferenceRequest};
use crate::evaluator::is_answered;
use crate::goals::{normalize_goal_id, GoalType};
use crate::graph::{GoalPatch, GoalStatus};

const DEFAULT_OMISSION_REASON: &str = "Not relevant to the client's situation";

/// Node whose answers unlock goal priority planning.
const PLANNING_NODE: &str = "Personal";

impl Orchestrator {
    pub(super) async fn gathering_turn(&mut self, turn: &mut Turn, user_text: &str) {
        let fact_request = self.fact_request(user_text);
        let conversation_request = self.conversation_request(Phase::DataGathering, user_text);
        let advisors = self.advisors.clone();
        let timeout_ms = self.config.advisor_timeout_ms;

        let (facts, conversation) = tokio::join!(
            guarded(
                AdvisorKind::FactExtractor,
                timeout_ms,
                advisors.facts.extract_facts(fact_request),
            ),
            guarded(
                AdvisorKind::Conversation,
                timeout_ms,
                advisors.conversation.converse(conversation_request),
            ),
        );

        if let Some(facts) = turn.degraded.absorb(AdvisorKind::FactExtractor, facts) {
            self.apply_facts(facts);
        }
        let conversation = turn.degraded.absorb(AdvisorKind::Conversation, conversation);

        if self.maybe_run_inference(turn).await {
            // The scenario owns this turn's reply; the proposal's bookkeeping
            // still counts.
            if let Some(proposal) = &conversation {
                self.apply_intake_latch(turn, proposal);
                self.apply_goal_signals(proposal);
                self.apply_omissions(proposal);
                self.check_priority_planning();
            }
            return;
        }

        match conversation {
            Some(proposal) => {
                self.apply_conversation(turn, proposal, user_text).await;
                if self.state.phase != Phase::DataGathering {
                    return;
                }
            }
            None => self.ask_deterministically(turn),
        }

        // Omissions may have drained the frontier this turn.
        if self.maybe_run_inference(turn).await {
            return;
        }
        self.maybe_start_details(turn).await;
    }

    /// Fold a conversational proposal into the session.
    async fn apply_conversation(
        &mut self,
        turn: &mut Turn,
        proposal: ConversationProposal,
        user_text: &str,
    ) {
        self.apply_intake_latch(turn, &proposal);
        let stated = self.apply_goal_signals(&proposal);
        self.apply_omissions(&proposal);
        self.check_priority_planning();

        // Only goals the user stated outright are explored; hinted goals
        // wait for scenario framing.
        if !self.state.goal_intake_complete {
            let unexplored = stated.into_iter().find(|(id, _)| {
                self.store.goal_status(id) == Some(GoalStatus::Qualified)
                    && self.store.goal_understanding(id).is_none()
            });
            if let Some((goal_id, description)) = unexplored {
                self.start_exploration(turn, goal_id, description, user_text)
                    .await;
                return;
            }
        }

        self.follow_proposal(turn, &proposal);
        turn.phase1_claimed = proposal.phase1_complete == Some(true);
    }

    fn apply_intake_latch(&mut self, turn: &mut Turn, proposal: &ConversationProposal) {
        if proposal.goals_collection_complete != Some(true) {
            return;
        }
        turn.goals_collection_complete = true;
        if !self.state.goal_intake_complete {
            info!("Goal intake complete");
            self.state.goal_intake_complete = true;
        }
    }

    /// Apply goal proposals. Returns the explicitly stated goals it
    /// qualified, with their descriptions.
    pub(super) fn apply_goal_signals(
        &mut self,
        proposal: &ConversationProposal,
    ) -> Vec<(String, String)> {
        let mut stated_goals = Vec::new();

        for candidate in &proposal.new_goals_detected {
            let patch = candidate.to_patch();
            let stated = candidate.confidence.is_some_and(|c| c >= 1.0);
            if !stated {
                let outcome =
                    self.ledger
                        .add_possible(&mut self.store, candidate.goal_id.as_deref(), patch);
                if outcome.goal_id().is_none() {
                    debug!(goal_id = ?candidate.goal_id, "Dropped detected goal");
                }
                continue;
            }

            let qualified = match normalize_goal_id(
                candidate.goal_id.as_deref(),
                candidate.description.as_deref(),
            ) {
                Some(id) => {
                    let priority = self.priority_for(&id);
                    self.ledger
                        .qualify(&mut self.store, &id, patch.with_priority(priority))
                }
                None => None,
            };
            match qualified {
                Some(id) => {
                    let description = candidate
                        .description
                        .clone()
                        .unwrap_or_else(|| id.replace('_', " "));
                    stated_goals.push((id, description));
                }
                None => debug!(goal_id = ?candidate.goal_id, "Dropped stated goal"),
            }
        }

        for candidate in &proposal.goals_to_qualify {
            self.ledger.add_possible(
                &mut self.store,
                candidate.goal_id.as_deref(),
                candidate.to_patch(),
            );
        }

        for (goal_id, priority) in &proposal.goals_to_confirm {
            let patch = GoalPatch::default().with_priority(*priority);
            if self.ledger.qualify(&mut self.store, goal_id, patch).is_none() {
                debug!(goal_id = %goal_id, "Dropped goal confirmation with unusable id");
            }
        }

        for goal_id in &proposal.goals_to_reject {
            self.ledger.reject(&mut self.store, goal_id);
        }

        stated_goals
    }

    /// Existing priority of a goal, else the next free one.
    pub(super) fn priority_for(&self, goal_id: &str) -> u32 {
        self.store
            .qualified_goals()
            .get(goal_id)
            .and_then(|g| g.priority)
            .unwrap_or_else(|| self.ledger.next_priority(&self.store))
    }

    fn apply_omissions(&mut self, proposal: &ConversationProposal) {
        for node in &proposal.nodes_to_omit {
            let node = node.trim();
            if !self.registry.contains(node) {
                warn!(node = %node, "Ignoring omission of unknown node");
                continue;
            }
            let reason = proposal
                .omission_reasons
                .get(node)
                .map(|r| r.trim())
                .filter(|r| !r.is_empty())
                .unwrap_or(DEFAULT_OMISSION_REASON)
                .to_string();

            if self.store.omit_node(node, Some(&reason)) {
                self.store.add_edge(
                    self.state.last_question_node.as_deref(),
                    node,
                    format!("omitted: {}", reason),
                );
                if self.state.current_node.as_deref() == Some(node) {
                    self.state.current_node = None;
                }
            }
        }
    }

    fn check_priority_planning(&mut self) {
        if self.state.priority_planning_done {
            return;
        }
        let personal = self.store.node_snapshot(PLANNING_NODE);
        if is_answered(personal, "age") || is_answered(personal, "marital_status") {
            debug!("Priority planning unlocked");
            self.state.priority_planning_done = true;
        }
    }

    /// One-shot goal inference once the frontier drains.
    ///
    /// Returns true if a scenario sub-dialogue started and owns the turn.
    async fn maybe_run_inference(&mut self, turn: &mut Turn) -> bool {
        if self.state.goal_inference_activated
            || turn.inference_attempted
            || !self.store.open_nodes().is_empty()
        {
            return false;
        }
        turn.inference_attempted = true;

        let request = GoalInferenceRequest {
            visited_snapshots: self.store.visited_snapshots(),
            goal_state: self.store.goal_state(),
            allowed_goal_types: GoalType::allowed_tags(),
            exploration_summary: self.store.exploration_summary(),
        };
        let advisors = self.advisors.clone();
        let result = guarded(
            AdvisorKind::GoalInference,
            self.config.advisor_timeout_ms,
            advisors.inference.infer_goals(request),
        )
        .await;
        let Some(proposal) = turn.degraded.absorb(AdvisorKind::GoalInference, result) else {
            return false;
        };
        self.state.goal_inference_activated = true;

        let mut candidates = Vec::new();
        for candidate in &proposal.inferred_goals {
            let outcome = self.ledger.add_possible(
                &mut self.store,
                candidate.goal_id.as_deref(),
                candidate.to_patch(),
            );
            if let Some(record) = outcome
                .goal_id()
                .and_then(|id| self.store.possible_goals().get(id))
            {
                candidates.push((record.goal_id.clone(), GoalPatch::from_record(record)));
            }
        }

        let priority = normalize_goal_id(proposal.scenario_goal.as_deref(), None);
        let enqueued = self
            .queue
            .enqueue(candidates, priority.as_deref(), &self.store);
        info!(
            inferred = proposal.inferred_goals.len(),
            enqueued,
            priority = ?priority,
            "Goal inference complete"
        );

        if self.state.scenario.is_some() {
            return false;
        }
        match self.queue.dequeue_next(&self.store) {
            Some(entry) => {
                self.start_scenario(turn, entry).await;
                true
            }
            None => false,
        }
    }
}
