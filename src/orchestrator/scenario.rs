//! ScenarioFraming: inferred goals are framed one at a time, back to back.

use tracing::{info, warn};

use super::{verdict_acknowledgement, Orchestrator, Phase, ScenarioOutcome, ScenarioState, Turn};
use crate::advisors::{
    guarded, AdvisorKind, ScenarioProposal, ScenarioRequest, ScenarioVerdict, TranscriptEntry,
};
use crate::goals::{normalize_goal_id, ScenarioQueueEntry};

const CONFIRMED_VIA: &str = "scenario_framing";

fn scenario_opening(state: &ScenarioState) -> String {
    let goal = state
        .candidate
        .description
        .clone()
        .unwrap_or_else(|| state.goal_id.replace('_', " "));
    format!(
        "Looking at what you've shared, one thing people in a similar position often plan for is: {}. Is that something that matters to you?",
        goal
    )
}

const SCENARIO_FOLLOW_UP: &str = "How does that sound to you?";

impl Orchestrator {
    /// Enter ScenarioFraming for a dequeued goal and open the scenario.
    pub(super) async fn start_scenario(&mut self, turn: &mut Turn, entry: ScenarioQueueEntry) {
        info!(goal_id = %entry.goal_id, order = entry.order, "Starting scenario framing");
        self.state.scenario = Some(ScenarioState {
            goal_id: entry.goal_id,
            candidate: entry.candidate,
            turn: 1,
            transcript: Vec::new(),
        });
        self.set_phase(Phase::ScenarioFraming);

        let reply = self
            .call_scenario(turn, None)
            .await
            .and_then(|p| p.response_text)
            .filter(|t| !t.trim().is_empty());

        let Some(scenario) = self.state.scenario.as_mut() else {
            return;
        };
        let message = reply.unwrap_or_else(|| scenario_opening(scenario));
        scenario
            .transcript
            .push(TranscriptEntry::advisor(message.clone()));
        turn.target = None;
        turn.message = Some(message);
    }

    async fn call_scenario(
        &self,
        turn: &mut Turn,
        user_text: Option<&str>,
    ) -> Option<ScenarioProposal> {
        let scenario = self.state.scenario.as_ref()?;
        let request = ScenarioRequest {
            goal_id: scenario.goal_id.clone(),
            candidate: scenario.candidate.clone(),
            user_text: user_text.map(str::to_string),
            snapshot: self.all_snapshots(),
            transcript: scenario.transcript.clone(),
            turn: scenario.turn,
            max_turns: self.config.scenario_max_turns,
        };
        let advisors = self.advisors.clone();
        let result = guarded(
            AdvisorKind::Scenario,
            self.config.advisor_timeout_ms,
            advisors.scenario.frame_scenario(request),
        )
        .await;
        turn.degraded.absorb(AdvisorKind::Scenario, result)
    }

    pub(super) async fn scenario_turn(&mut self, turn: &mut Turn, user_text: &str) {
        let Some(scenario) = self.state.scenario.as_mut() else {
            warn!("Scenario phase without scenario state; resuming data gathering");
            self.set_phase(Phase::DataGathering);
            self.ask_deterministically(turn);
            return;
        };
        scenario.turn += 1;
        scenario.transcript.push(TranscriptEntry::user(user_text));
        let goal_id = scenario.goal_id.clone();
        let candidate = scenario.candidate.clone();
        let scenario_turn = scenario.turn;

        self.extract_facts(turn, user_text).await;
        let proposal = self.call_scenario(turn, Some(user_text)).await;

        let mut verdict = None;
        let mut stop = false;
        if let Some(p) = &proposal {
            let echo = p.goal_id.as_deref().map(|g| normalize_goal_id(Some(g), None));
            match echo {
                Some(echo) if echo.as_deref() != Some(goal_id.as_str()) => {
                    warn!(
                        expected = %goal_id,
                        echoed = ?p.goal_id,
                        "Scenario verdict for a different goal ignored"
                    );
                }
                _ => verdict = p.verdict(),
            }
            stop = p.should_continue == Some(false);
        }

        match verdict {
            Some(ScenarioVerdict::Confirmed) => {
                let patch = candidate
                    .with_priority(self.priority_for(&goal_id))
                    .with_confirmed_via(CONFIRMED_VIA);
                self.ledger.qualify(&mut self.store, &goal_id, patch);
            }
            Some(ScenarioVerdict::Rejected) => {
                self.ledger.reject(&mut self.store, &goal_id);
            }
            Some(ScenarioVerdict::Deferred) => {
                self.ledger
                    .defer(&mut self.store, &goal_id, candidate.description.as_deref());
                stop = true;
            }
            None => {}
        }

        let reply = proposal
            .and_then(|p| p.response_text)
            .filter(|t| !t.trim().is_empty());
        let capped = scenario_turn >= self.config.scenario_max_turns;

        if !stop && !capped {
            let message = reply.unwrap_or_else(|| SCENARIO_FOLLOW_UP.to_string());
            if let Some(scenario) = self.state.scenario.as_mut() {
                scenario
                    .transcript
                    .push(TranscriptEntry::advisor(message.clone()));
            }
            turn.target = None;
            turn.message = Some(message);
            return;
        }

        info!(goal_id = %goal_id, verdict = ?verdict, turns = scenario_turn, "Scenario framing complete");
        self.state.scenario = None;
        turn.scenario_outcome = Some(ScenarioOutcome {
            goal_id,
            verdict,
        });
        let acknowledgement = reply.unwrap_or_else(|| verdict_acknowledgement(verdict).to_string());

        match self.queue.dequeue_next(&self.store) {
            Some(next) => self.start_scenario(turn, next).await,
            None => {
                self.set_phase(Phase::DataGathering);
                if !self.maybe_start_details(turn).await {
                    self.ask_deterministically(turn);
                }
            }
        }
        prefix_message(turn, acknowledgement);
    }
}

/// Put `lead` in front of the turn's message.
pub(super) fn prefix_message(turn: &mut Turn, lead: String) {
    turn.message = Some(match turn.message.take() {
        Some(rest) if !rest.trim().is_empty() => format!("{}\n\n{}", lead, rest),
        _ => lead,
    });
}
