//! GoalDetails: amounts and timing for qualified goals, one goal at a time.

use tracing::{debug, info, warn};

use super::{DetailsState, Orchestrator, Phase, Turn};
use crate::advisors::{guarded, AdvisorKind, GoalDetailProposal, GoalDetailRequest};
use crate::goals::{missing_details, needs_details};
use crate::graph::GoalRecord;

/// Priority assumed for goals that never received one.
const DEFAULT_PRIORITY: u32 = 99;

const DETAILS_COMPLETE_MESSAGE: &str = "Thanks, that covers the key details for your goals.";

fn detail_question(record: &GoalRecord, missing: &[String]) -> String {
    let goal = record
        .description
        .clone()
        .unwrap_or_else(|| record.goal_id.replace('_', " "));
    match missing.first().map(String::as_str) {
        Some("target_year") => format!("When would you like to achieve \"{}\"?", goal),
        Some("target_months") => format!(
            "For \"{}\", how many months of expenses would you like to have set aside?",
            goal
        ),
        _ => format!("Roughly how much would you need for \"{}\"?", goal),
    }
}

impl Orchestrator {
    /// Qualified goals still needing details, by priority then id.
    pub fn details_backlog(&self) -> Vec<String> {
        let mut goals: Vec<&GoalRecord> = self
            .store
            .qualified_goals()
            .values()
            .filter(|g| needs_details(g))
            .collect();
        goals.sort_by(|a, b| {
            a.priority
                .unwrap_or(DEFAULT_PRIORITY)
                .cmp(&b.priority.unwrap_or(DEFAULT_PRIORITY))
                .then_with(|| a.goal_id.cmp(&b.goal_id))
        });
        goals.into_iter().map(|g| g.goal_id.clone()).collect()
    }

    /// Enter GoalDetails if no sub-dialogue is active, the frontier is
    /// drained and some qualified goal lacks details.
    ///
    /// Returns true if a detail question now owns the turn.
    pub(super) async fn maybe_start_details(&mut self, turn: &mut Turn) -> bool {
        if self.state.phase != Phase::DataGathering
            || self.state.exploration.is_some()
            || self.state.scenario.is_some()
            || self.state.details.is_some()
            || !self.store.pending().is_empty()
            || self.details_backlog().is_empty()
        {
            return false;
        }
        self.advance_details(turn).await
    }

    /// Open the next goal in the backlog, skipping goals the advisor closes
    /// straight away. Leaves GoalDetails once the backlog is empty.
    async fn advance_details(&mut self, turn: &mut Turn) -> bool {
        loop {
            let next = self
                .details_backlog()
                .into_iter()
                .next()
                .and_then(|id| self.store.qualified_goals().get(&id).cloned());

            let Some(record) = next else {
                self.state.details = None;
                if self.state.phase == Phase::GoalDetails {
                    info!("Goal details complete");
                    self.set_phase(Phase::DataGathering);
                    turn.goal_details_complete = true;
                }
                return false;
            };

            let missing: Vec<String> = missing_details(&record)
                .into_iter()
                .map(str::to_string)
                .collect();
            info!(goal_id = %record.goal_id, missing = ?missing, "Collecting goal details");
            self.state.details = Some(DetailsState {
                goal_id: record.goal_id.clone(),
                missing: missing.clone(),
            });
            self.set_phase(Phase::GoalDetails);

            let Some(proposal) = self.call_details(turn, None).await else {
                turn.target = None;
                turn.message = Some(detail_question(&record, &missing));
                return true;
            };

            if let Some(question) = self.absorb_details(&record.goal_id, proposal) {
                turn.target = None;
                turn.message = Some(question);
                return true;
            }
        }
    }

    async fn call_details(
        &self,
        turn: &mut Turn,
        user_text: Option<&str>,
    ) -> Option<GoalDetailProposal> {
        let details = self.state.details.as_ref()?;
        let goal = self.store.qualified_goals().get(&details.goal_id)?.clone();
        let request = GoalDetailRequest {
            goal,
            missing_details: details.missing.clone(),
            goal_state: self.store.goal_state(),
            snapshot: self.all_snapshots(),
            user_text: user_text.map(str::to_string),
        };
        let advisors = self.advisors.clone();
        let result = guarded(
            AdvisorKind::GoalDetails,
            self.config.advisor_timeout_ms,
            advisors.details.collect_details(request),
        )
        .await;
        turn.degraded.absorb(AdvisorKind::GoalDetails, result)
    }

    /// Merge a proposal into the goal under discussion.
    ///
    /// Returns the next question, or `None` once the goal is closed.
    fn absorb_details(&mut self, goal_id: &str, proposal: GoalDetailProposal) -> Option<String> {
        if proposal.has_details() {
            let patch = proposal.to_patch();
            self.ledger.merge_details(&mut self.store, goal_id, &patch);
        }

        let record = self.store.qualified_goals().get(goal_id).cloned();
        let missing: Vec<String> = record
            .as_ref()
            .map(|r| missing_details(r).into_iter().map(str::to_string).collect())
            .unwrap_or_default();
        if let Some(details) = self.state.details.as_mut() {
            details.missing = missing.clone();
        }

        let done = proposal.done == Some(true);
        let question = proposal.question.filter(|q| !q.trim().is_empty());
        match (record, done, question) {
            (Some(_), false, Some(question)) => Some(question),
            (Some(record), false, None) if !missing.is_empty() => {
                Some(detail_question(&record, &missing))
            }
            _ => {
                debug!(goal_id = %goal_id, "Closing goal details");
                self.ledger.finish_details(&mut self.store, goal_id);
                None
            }
        }
    }

    pub(super) async fn details_turn(&mut self, turn: &mut Turn, user_text: &str) {
        let Some(goal_id) = self.state.details.as_ref().map(|d| d.goal_id.clone()) else {
            warn!("Goal details phase without details state; resuming data gathering");
            self.set_phase(Phase::DataGathering);
            self.ask_deterministically(turn);
            return;
        };

        if self.store.qualified_goals().contains_key(&goal_id) {
            match self.call_details(turn, Some(user_text)).await {
                None => {
                    // Ask the same thing again rather than lose the answer.
                    turn.target = None;
                    turn.message = self.state.last_question.clone();
                    return;
                }
                Some(proposal) => {
                    if let Some(question) = self.absorb_details(&goal_id, proposal) {
                        turn.target = None;
                        turn.message = Some(question);
                        return;
                    }
                }
            }
        } else {
            warn!(goal_id = %goal_id, "Goal left the qualified set during details");
        }

        if !self.advance_details(turn).await {
            turn.target = None;
            turn.message = Some(DETAILS_COMPLETE_MESSAGE.to_string());
        }
    }
}
