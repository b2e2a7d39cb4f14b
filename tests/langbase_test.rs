//! Integration tests for the Langbase client and the pipe-backed advisors
//!
//! Tests HTTP behavior using wiremock for request/response mocking.

use std::collections::BTreeMap;

use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use langbase_factfind::advisors::{
    ConversationRequest, ConversationalAdvisor, FactExtractionRequest, FactExtractor,
    LangbaseAdvisors,
};
use langbase_factfind::config::{LangbaseConfig, PipeConfig, RequestConfig};
use langbase_factfind::error::{AdvisorError, LangbaseError};
use langbase_factfind::langbase::{LangbaseClient, Message, PipeDefinition, PipeRequest};
use langbase_factfind::orchestrator::Phase;
use langbase_factfind::schema::SchemaRegistry;

/// Create a test client pointing to mock server
fn create_test_client(base_url: &str, max_retries: u32) -> LangbaseClient {
    let config = LangbaseConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
    };

    let request_config = RequestConfig {
        timeout_ms: 5000,
        max_retries,
        retry_delay_ms: 10,
    };

    LangbaseClient::new(&config, request_config).expect("Failed to create client")
}

fn test_pipes() -> PipeConfig {
    PipeConfig {
        fact_extractor: "facts-pipe".to_string(),
        conversation: "conversation-pipe".to_string(),
        goal_inference: "inference-pipe".to_string(),
        scenario: "scenario-pipe".to_string(),
        goal_details: "details-pipe".to_string(),
    }
}

fn completion(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "completion": text,
        "threadId": null
    }))
}

fn fact_request(text: &str) -> FactExtractionRequest {
    let registry = SchemaRegistry::new();
    FactExtractionRequest {
        user_text: text.to_string(),
        current_node: Some("Personal".to_string()),
        current_question: Some("How old are you?".to_string()),
        snapshot: BTreeMap::new(),
        schema: registry.iter().cloned().collect(),
    }
}

fn conversation_request(text: &str) -> ConversationRequest {
    ConversationRequest {
        phase: Phase::DataGathering,
        user_text: text.to_string(),
        current_node: Some("Personal".to_string()),
        missing_fields: vec!["age".to_string()],
        last_question: None,
        snapshot: BTreeMap::new(),
        visited: vec![],
        pending: vec!["Personal".to_string(), "Income".to_string()],
        omitted: vec![],
        goal_state: Default::default(),
        exploration: None,
        exploration_summary: String::new(),
    }
}

mod client_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_pipe_call() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .and(header("Authorization", "Bearer test-api-key"))
            .and(header("Content-Type", "application/json"))
            .and(body_partial_json(json!({"name": "test-pipe", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "completion": "{\"updates\": []}",
                "threadId": "thread-123",
                "raw": {
                    "model": "gpt-4o-mini",
                    "usage": {
                        "prompt_tokens": 100,
                        "completion_tokens": 50,
                        "total_tokens": 150
                    }
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let request = PipeRequest::new("test-pipe", vec![Message::user("hello")]);
        let response = client.call_pipe(request).await.unwrap();

        assert!(response.success);
        assert_eq!(response.completion, "{\"updates\": []}");
        assert_eq!(response.total_tokens(), Some(150));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Invalid API key"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 3);
        let result = client.run_pipe("test-pipe", "hi".to_string()).await;

        assert!(matches!(result, Err(LangbaseError::Api { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 2);
        let result = client.run_pipe("test-pipe", "hi".to_string()).await;

        match result {
            Err(LangbaseError::Unavailable { retries, .. }) => assert_eq!(retries, 3),
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pipe_reporting_failure_is_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "completion": ""
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let result = client.run_pipe("test-pipe", "hi".to_string()).await;

        assert!(matches!(result, Err(LangbaseError::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn test_ensure_pipe_accepts_existing_pipe() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes"))
            .and(body_partial_json(json!({"name": "facts-pipe", "upsert": true})))
            .respond_with(ResponseTemplate::new(409).set_body_string("exists"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let definition = PipeDefinition::new("facts-pipe", "Extracts facts", "You extract facts.");

        assert!(client.ensure_pipe(&definition).await.is_ok());
    }
}

mod advisor_tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_pipes_creates_every_advisor_pipe() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "pipe",
                "description": null,
                "status": "public",
                "owner_login": "owner",
                "url": "https://langbase.com/owner/pipe",
                "type": "chat",
                "api_key": "pipe-key"
            })))
            .expect(5)
            .mount(&mock_server)
            .await;

        let advisors =
            LangbaseAdvisors::new(create_test_client(&mock_server.uri(), 0), test_pipes());
        advisors.ensure_pipes().await.unwrap();
    }

    #[tokio::test]
    async fn test_fact_extractor_parses_fenced_completion() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .and(body_partial_json(json!({"name": "facts-pipe"})))
            .respond_with(completion(
                "```json\n{\"updates\": [{\"node_name\": \"Personal\", \"field_name\": \"age\", \"value\": 42}]}\n```",
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let advisors =
            LangbaseAdvisors::new(create_test_client(&mock_server.uri(), 0), test_pipes());
        let proposal = advisors.extract_facts(fact_request("I'm 42")).await.unwrap();

        assert_eq!(proposal.updates.len(), 1);
        assert_eq!(proposal.updates[0].node_name, "Personal");
        assert_eq!(proposal.updates[0].value, json!(42));
    }

    #[tokio::test]
    async fn test_malformed_items_are_dropped() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(completion(
                r#"{"updates": [{"node_name": "Personal"}, {"node_name": "Income", "field_name": "salary", "value": 90000}]}"#,
            ))
            .mount(&mock_server)
            .await;

        let advisors =
            LangbaseAdvisors::new(create_test_client(&mock_server.uri(), 0), test_pipes());
        let proposal = advisors.extract_facts(fact_request("90k")).await.unwrap();

        assert_eq!(proposal.updates.len(), 1);
        assert_eq!(proposal.updates[0].field_name, "salary");
    }

    #[tokio::test]
    async fn test_conversation_advisor_reads_target() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .and(body_partial_json(json!({"name": "conversation-pipe"})))
            .respond_with(completion(
                r#"Sure. {"response_text": "What do you earn?", "question_target_node": "Income", "question_target_field": "income_streams_annual", "goals_to_confirm": {"retirement": 1, "bad": "high"}}"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let advisors =
            LangbaseAdvisors::new(create_test_client(&mock_server.uri(), 0), test_pipes());
        let proposal = advisors
            .converse(conversation_request("I'm 42"))
            .await
            .unwrap();

        assert_eq!(proposal.response_text.as_deref(), Some("What do you earn?"));
        assert_eq!(proposal.question_target_node.as_deref(), Some("Income"));
        assert_eq!(proposal.goals_to_confirm.get("retirement"), Some(&1));
        assert!(!proposal.goals_to_confirm.contains_key("bad"));
    }

    #[tokio::test]
    async fn test_completion_without_json_is_malformed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(completion("I could not think of anything."))
            .mount(&mock_server)
            .await;

        let advisors =
            LangbaseAdvisors::new(create_test_client(&mock_server.uri(), 0), test_pipes());
        let result = advisors.converse(conversation_request("hi")).await;

        assert!(matches!(result, Err(AdvisorError::MalformedOutput { .. })));
    }

    #[tokio::test]
    async fn test_http_failure_surfaces_as_langbase_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&mock_server)
            .await;

        let advisors =
            LangbaseAdvisors::new(create_test_client(&mock_server.uri(), 0), test_pipes());
        let result = advisors.extract_facts(fact_request("hi")).await;

        assert!(matches!(
            result,
            Err(AdvisorError::Langbase(LangbaseError::Api { status: 400, .. }))
        ));
    }
}
