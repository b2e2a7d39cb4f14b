//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use langbase_factfind::advisors::{
    AdvisorSet, ConversationProposal, ConversationRequest, ConversationalAdvisor,
    FactExtractionRequest, FactExtractor, FactProposal, GoalDetailAdvisor, GoalDetailProposal,
    GoalDetailRequest, GoalInferenceAdvisor, GoalInferenceRequest, InferenceProposal,
    ScenarioAdvisor, ScenarioProposal, ScenarioRequest,
};
use langbase_factfind::config::{
    Config, DatabaseConfig, DialogueConfig, LangbaseConfig, LogFormat, LoggingConfig, PipeConfig,
    RequestConfig,
};
use langbase_factfind::error::AdvisorResult;
use langbase_factfind::schema::{CollectionSpec, FieldDef, NodeType, SchemaRegistry};

/// Two small nodes: Personal (age, marital_status) and Income (salary).
pub fn small_registry() -> Arc<SchemaRegistry> {
    Arc::new(
        SchemaRegistry::empty()
            .with_node(NodeType::new(
                "Personal",
                "Personal details",
                vec![
                    FieldDef::new("age", "Age in years"),
                    FieldDef::new("marital_status", "Marital status"),
                ],
                CollectionSpec::required(&["age", "marital_status"]),
            ))
            .with_node(NodeType::new(
                "Income",
                "Household income",
                vec![FieldDef::new("salary", "Annual salary before tax")],
                CollectionSpec::required(&["salary"]),
            )),
    )
}

pub fn test_config(database: PathBuf) -> Config {
    Config {
        langbase: LangbaseConfig {
            api_key: "test-api-key".to_string(),
            base_url: "http://localhost".to_string(),
        },
        database: DatabaseConfig {
            path: database,
            max_connections: 1,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
        },
        request: RequestConfig {
            timeout_ms: 2000,
            max_retries: 0,
            retry_delay_ms: 10,
        },
        pipes: PipeConfig {
            fact_extractor: "facts-pipe".to_string(),
            conversation: "conversation-pipe".to_string(),
            goal_inference: "inference-pipe".to_string(),
            scenario: "scenario-pipe".to_string(),
            goal_details: "details-pipe".to_string(),
        },
        dialogue: DialogueConfig {
            advisor_timeout_ms: 2000,
            ..Default::default()
        },
    }
}

/// Advisor fake answering from per-role queues. An empty queue answers with
/// an empty proposal.
#[derive(Default)]
pub struct Scripted {
    facts: Mutex<VecDeque<FactProposal>>,
    conversation: Mutex<VecDeque<ConversationProposal>>,
    inference: Mutex<VecDeque<InferenceProposal>>,
    scenario: Mutex<VecDeque<ScenarioProposal>>,
    details: Mutex<VecDeque<GoalDetailProposal>>,
}

impl Scripted {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn facts(&self, value: Value) {
        self.facts.lock().unwrap().push_back(parse(value));
    }

    pub fn conversation(&self, value: Value) {
        self.conversation.lock().unwrap().push_back(parse(value));
    }

    pub fn inference(&self, value: Value) {
        self.inference.lock().unwrap().push_back(parse(value));
    }

    pub fn scenario(&self, value: Value) {
        self.scenario.lock().unwrap().push_back(parse(value));
    }

    pub fn details(&self, value: Value) {
        self.details.lock().unwrap().push_back(parse(value));
    }

    pub fn advisor_set(self: &Arc<Self>) -> AdvisorSet {
        AdvisorSet::uniform(self.clone())
    }
}

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).expect("scripted proposal")
}

fn next<T: Default>(queue: &Mutex<VecDeque<T>>) -> T {
    queue.lock().unwrap().pop_front().unwrap_or_default()
}

#[async_trait]
impl FactExtractor for Scripted {
    async fn extract_facts(&self, _request: FactExtractionRequest) -> AdvisorResult<FactProposal> {
        Ok(next(&self.facts))
    }
}

#[async_trait]
impl ConversationalAdvisor for Scripted {
    async fn converse(&self, _request: ConversationRequest) -> AdvisorResult<ConversationProposal> {
        Ok(next(&self.conversation))
    }
}

#[async_trait]
impl GoalInferenceAdvisor for Scripted {
    async fn infer_goals(&self, _request: GoalInferenceRequest) -> AdvisorResult<InferenceProposal> {
        Ok(next(&self.inference))
    }
}

#[async_trait]
impl ScenarioAdvisor for Scripted {
    async fn frame_scenario(&self, _request: ScenarioRequest) -> AdvisorResult<ScenarioProposal> {
        Ok(next(&self.scenario))
    }
}

#[async_trait]
impl GoalDetailAdvisor for Scripted {
    async fn collect_details(
        &self,
        _request: GoalDetailRequest,
    ) -> AdvisorResult<GoalDetailProposal> {
        Ok(next(&self.details))
    }
}
