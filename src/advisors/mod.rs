//! Advisor seams.
//!
//! Advisors are the non-deterministic collaborators of the orchestrator: they
//! read a snapshot of session state and propose facts, questions and goal
//! judgments. They never mutate state themselves. Each advisor is a trait so
//! the orchestrator can be driven by Langbase pipes in production and by
//! mocks in tests.

mod guard;
mod langbase;
mod types;

use async_trait::async_trait;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::error::AdvisorResult;

pub use guard::{guarded, DegradedAdvisors};
pub use langbase::{extract_json_from_completion, pipe_definitions, LangbaseAdvisors};
pub use types::{
    AdvisorKind, ConversationProposal, ConversationRequest, ExplorationContext,
    FactExtractionRequest, FactProposal, GoalCandidate, GoalDetailProposal, GoalDetailRequest,
    GoalInferenceRequest, InferenceProposal, ScenarioProposal, ScenarioRequest, ScenarioVerdict,
    Speaker, TranscriptEntry,
};

/// Extracts field updates from a user message.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FactExtractor: Send + Sync {
    async fn extract_facts(&self, request: FactExtractionRequest) -> AdvisorResult<FactProposal>;
}

/// Produces the conversational reply and turn-level proposals.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConversationalAdvisor: Send + Sync {
    async fn converse(&self, request: ConversationRequest) -> AdvisorResult<ConversationProposal>;
}

/// Deduces goals from completed nodes.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GoalInferenceAdvisor: Send + Sync {
    async fn infer_goals(&self, request: GoalInferenceRequest) -> AdvisorResult<InferenceProposal>;
}

/// Frames one inferred goal as a scenario and reads the user's verdict.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ScenarioAdvisor: Send + Sync {
    async fn frame_scenario(&self, request: ScenarioRequest) -> AdvisorResult<ScenarioProposal>;
}

/// Collects amount and timing details for a qualified goal.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GoalDetailAdvisor: Send + Sync {
    async fn collect_details(&self, request: GoalDetailRequest) -> AdvisorResult<GoalDetailProposal>;
}

/// The five advisor handles injected into an orchestrator.
#[derive(Clone)]
pub struct AdvisorSet {
    pub facts: Arc<dyn FactExtractor>,
    pub conversation: Arc<dyn ConversationalAdvisor>,
    pub inference: Arc<dyn GoalInferenceAdvisor>,
    pub scenario: Arc<dyn ScenarioAdvisor>,
    pub details: Arc<dyn GoalDetailAdvisor>,
}

impl AdvisorSet {
    pub fn new(
        facts: Arc<dyn FactExtractor>,
        conversation: Arc<dyn ConversationalAdvisor>,
        inference: Arc<dyn GoalInferenceAdvisor>,
        scenario: Arc<dyn ScenarioAdvisor>,
        details: Arc<dyn GoalDetailAdvisor>,
    ) -> Self {
        Self {
            facts,
            conversation,
            inference,
            scenario,
            details,
        }
    }

    /// One implementation serving every advisor role.
    pub fn uniform<A>(advisor: Arc<A>) -> Self
    where
        A: FactExtractor
            + ConversationalAdvisor
            + GoalInferenceAdvisor
            + ScenarioAdvisor
            + GoalDetailAdvisor
            + 'static,
    {
        Self {
            facts: advisor.clone(),
            conversation: advisor.clone(),
            inference: advisor.clone(),
            scenario: advisor.clone(),
            details: advisor,
        }
    }
}

impl std::fmt::Debug for AdvisorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisorSet").finish_non_exhaustive()
    }
}
