//! GoalExploration: why a stated goal matters, layer by layer.

use tracing::{debug, info, warn};

use super::{ExplorationState, Orchestrator, Phase, Turn};
use crate::advisors::{guarded, AdvisorKind, ConversationProposal, TranscriptEntry};
use crate::graph::{GoalPatch, GoalUnderstanding};

fn exploration_prompt(description: &str) -> String {
    format!(
        "Tell me a bit more about \"{}\". What would it mean for you to get there?",
        description
    )
}

impl Orchestrator {
    /// Enter GoalExploration for a newly stated goal.
    pub(super) async fn start_exploration(
        &mut self,
        turn: &mut Turn,
        goal_id: String,
        description: String,
        user_text: &str,
    ) {
        info!(goal_id = %goal_id, "Starting goal exploration");
        let mut exploration = ExplorationState::new(goal_id, description);
        if !user_text.trim().is_empty() {
            exploration.transcript.push(TranscriptEntry::user(user_text));
        }
        self.state.exploration = Some(exploration);
        self.set_phase(Phase::GoalExploration);

        let request = self.conversation_request(Phase::GoalExploration, user_text);
        let advisors = self.advisors.clone();
        let result = guarded(
            AdvisorKind::Conversation,
            self.config.advisor_timeout_ms,
            advisors.conversation.converse(request),
        )
        .await;
        let proposal = turn.degraded.absorb(AdvisorKind::Conversation, result);

        let reply = proposal.as_ref().and_then(|p| self.absorb_exploration(p));
        self.reply_in_exploration(turn, reply);
    }

    pub(super) async fn exploration_turn(&mut self, turn: &mut Turn, user_text: &str) {
        let Some(exploration) = self.state.exploration.as_mut() else {
            warn!("Exploration phase without exploration state; resuming data gathering");
            self.set_phase(Phase::DataGathering);
            self.ask_deterministically(turn);
            return;
        };
        exploration.turn += 1;
        exploration.transcript.push(TranscriptEntry::user(user_text));
        let exploration_turn = exploration.turn;

        let fact_request = self.fact_request(user_text);
        let conversation_request = self.conversation_request(Phase::GoalExploration, user_text);
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

        let reply = conversation.as_ref().and_then(|p| {
            self.apply_goal_signals(p);
            self.absorb_exploration(p)
        });

        let signalled = conversation
            .as_ref()
            .is_some_and(|p| p.exploration_complete == Some(true));
        let capped = exploration_turn >= self.config.exploration_max_turns;

        if !signalled && !capped {
            self.reply_in_exploration(turn, reply);
            return;
        }

        if capped && !signalled {
            warn!(turn = exploration_turn, "Exploration hit its turn cap");
        }
        self.finish_exploration(turn);

        match conversation {
            Some(proposal) => self.follow_proposal(turn, &proposal),
            None => self.ask_deterministically(turn),
        }
    }

    /// Take layers, themes and strategy redirection from a proposal.
    /// Returns the proposal's reply text, if any.
    fn absorb_exploration(&mut self, proposal: &ConversationProposal) -> Option<String> {
        let exploration = self.state.exploration.as_mut()?;
        if let Some(layers) = &proposal.goal_layers {
            exploration.goal_layers = layers.clone();
        }
        if let Some(themes) = &proposal.emotional_themes {
            exploration.emotional_themes = themes.clone();
        }
        if let Some(strategy_for) = proposal
            .is_strategy_for
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            exploration.is_strategy_for = Some(strategy_for.to_string());
        }
        proposal
            .response_text
            .clone()
            .filter(|t| !t.trim().is_empty())
    }

    fn reply_in_exploration(&mut self, turn: &mut Turn, reply: Option<String>) {
        let Some(exploration) = self.state.exploration.as_mut() else {
            return;
        };
        let message = reply.unwrap_or_else(|| exploration_prompt(&exploration.goal_description));
        exploration
            .transcript
            .push(TranscriptEntry::advisor(message.clone()));
        turn.target = None;
        turn.message = Some(message);
    }

    /// Record the goal understanding, qualify the goal and return to
    /// DataGathering.
    fn finish_exploration(&mut self, turn: &mut Turn) {
        let Some(exploration) = self.state.exploration.take() else {
            return;
        };
        let goal_id = exploration.goal_id;

        let understanding = GoalUnderstanding::synthesize(
            goal_id.clone(),
            exploration.goal_description.clone(),
            exploration.is_strategy_for.clone(),
            exploration.goal_layers,
            exploration.emotional_themes,
            exploration.turn,
        );
        debug!(
            goal_id = %goal_id,
            needs = understanding.underlying_needs.len(),
            values = understanding.core_values.len(),
            "Goal understanding recorded"
        );
        self.store.add_goal_understanding(understanding);

        let mut patch = GoalPatch::default()
            .with_description(exploration.goal_description)
            .with_confidence(1.0)
            .with_priority(self.priority_for(&goal_id));
        patch.is_strategy_for = exploration.is_strategy_for;
        self.ledger.qualify(&mut self.store, &goal_id, patch);

        info!(goal_id = %goal_id, turns = exploration.turn, "Goal exploration complete");
        turn.exploration_complete = true;
        self.set_phase(Phase::DataGathering);
    }
}
