//! Langbase-backed advisors.
//!
//! Every advisor call serializes its request as the user message of a pipe
//! run and parses a JSON object out of the completion.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::types::{
    AdvisorKind, ConversationProposal, ConversationRequest, FactExtractionRequest, FactProposal,
    GoalDetailProposal, GoalDetailRequest, GoalInferenceRequest, InferenceProposal,
    ScenarioProposal, ScenarioRequest,
};
use super::{
    ConversationalAdvisor, FactExtractor, GoalDetailAdvisor, GoalInferenceAdvisor,
    ScenarioAdvisor,
};
use crate::config::PipeConfig;
use crate::error::{AdvisorError, AdvisorResult, LangbaseResult};
use crate::langbase::{LangbaseClient, PipeDefinition};
use crate::prompts::{
    CONVERSATION_PROMPT, FACT_EXTRACTOR_PROMPT, GOAL_DETAILS_PROMPT, GOAL_INFERENCE_PROMPT,
    SCENARIO_FRAMER_PROMPT,
};

/// Extract JSON from a completion string.
///
/// Attempts extraction in this order:
/// 1. Raw JSON (fast path)
/// 2. ```json ... ``` code blocks
/// 3. ``` ... ``` code blocks
/// 4. The outermost `{ ... }` span inside surrounding prose
pub fn extract_json_from_completion(completion: &str) -> Result<&str, String> {
    let trimmed = completion.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }

    if completion.contains("```json") {
        return completion
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ```json block but content was empty or malformed".to_string());
    }

    if completion.contains("```") {
        return completion
            .split("```")
            .nth(1)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ``` block but content was empty or malformed".to_string());
    }

    if let (Some(start), Some(end)) = (completion.find('{'), completion.rfind('}')) {
        if end > start {
            return Ok(&completion[start..=end]);
        }
    }

    Err(format!(
        "No JSON found in response. First 100 chars: '{}'",
        completion.chars().take(100).collect::<String>()
    ))
}

/// The pipes the Langbase advisors run, with their system prompts.
pub fn pipe_definitions(pipes: &PipeConfig) -> Vec<PipeDefinition> {
    vec![
        PipeDefinition::new(
            &pipes.fact_extractor,
            "Extracts fact-find field updates from client messages",
            FACT_EXTRACTOR_PROMPT,
        )
        .with_temperature(0.1),
        PipeDefinition::new(
            &pipes.conversation,
            "Runs the fact-find conversation",
            CONVERSATION_PROMPT,
        )
        .with_temperature(0.7),
        PipeDefinition::new(
            &pipes.goal_inference,
            "Infers financial goals from completed fact-find nodes",
            GOAL_INFERENCE_PROMPT,
        ),
        PipeDefinition::new(
            &pipes.scenario,
            "Frames inferred goals as concrete scenarios",
            SCENARIO_FRAMER_PROMPT,
        )
        .with_temperature(0.7),
        PipeDefinition::new(
            &pipes.goal_details,
            "Collects target amounts and timelines for goals",
            GOAL_DETAILS_PROMPT,
        ),
    ]
}

/// Implements every advisor trait on top of Langbase pipes.
#[derive(Clone)]
pub struct LangbaseAdvisors {
    client: LangbaseClient,
    pipes: PipeConfig,
}

impl LangbaseAdvisors {
    pub fn new(client: LangbaseClient, pipes: PipeConfig) -> Self {
        Self { client, pipes }
    }

    /// Create or update every advisor pipe.
    pub async fn ensure_pipes(&self) -> LangbaseResult<()> {
        for definition in pipe_definitions(&self.pipes) {
            self.client.ensure_pipe(&definition).await?;
        }
        Ok(())
    }

    fn pipe_for(&self, kind: AdvisorKind) -> &str {
        match kind {
            AdvisorKind::FactExtractor => &self.pipes.fact_extractor,
            AdvisorKind::Conversation => &self.pipes.conversation,
            AdvisorKind::GoalInference => &self.pipes.goal_inference,
            AdvisorKind::Scenario => &self.pipes.scenario,
            AdvisorKind::GoalDetails => &self.pipes.goal_details,
        }
    }

    async fn run<Req, Out>(&self, kind: AdvisorKind, request: &Req) -> AdvisorResult<Out>
    where
        Req: Serialize + Sync,
        Out: DeserializeOwned,
    {
        let payload =
            serde_json::to_string(request).map_err(|e| AdvisorError::MalformedOutput {
                advisor: kind.to_string(),
                message: format!("Failed to serialize request: {}", e),
            })?;

        let completion = self.client.run_pipe(self.pipe_for(kind), payload).await?;
        debug!(advisor = %kind, chars = completion.len(), "Advisor completion received");

        let json = extract_json_from_completion(&completion).map_err(|message| {
            AdvisorError::MalformedOutput {
                advisor: kind.to_string(),
                message,
            }
        })?;

        serde_json::from_str(json).map_err(|e| AdvisorError::MalformedOutput {
            advisor: kind.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl FactExtractor for LangbaseAdvisors {
    async fn extract_facts(&self, request: FactExtractionRequest) -> AdvisorResult<FactProposal> {
        self.run(AdvisorKind::FactExtractor, &request).await
    }
}

#[async_trait]
impl ConversationalAdvisor for LangbaseAdvisors {
    async fn converse(&self, request: ConversationRequest) -> AdvisorResult<ConversationProposal> {
        self.run(AdvisorKind::Conversation, &request).await
    }
}

#[async_trait]
impl GoalInferenceAdvisor for LangbaseAdvisors {
    async fn infer_goals(&self, request: GoalInferenceRequest) -> AdvisorResult<InferenceProposal> {
        self.run(AdvisorKind::GoalInference, &request).await
    }
}

#[async_trait]
impl ScenarioAdvisor for LangbaseAdvisors {
    async fn frame_scenario(&self, request: ScenarioRequest) -> AdvisorResult<ScenarioProposal> {
        self.run(AdvisorKind::Scenario, &request).await
    }
}

#[async_trait]
impl GoalDetailAdvisor for LangbaseAdvisors {
    async fn collect_details(&self, request: GoalDetailRequest) -> AdvisorResult<GoalDetailProposal> {
        self.run(AdvisorKind::GoalDetails, &request).await
    }
}
