use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub langbase: LangbaseConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub pipes: PipeConfig,
    pub dialogue: DialogueConfig,
}

/// Langbase API configuration
#[derive(Debug, Clone)]
pub struct LangbaseConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Langbase pipe names, one per advisor
#[derive(Debug, Clone)]
pub struct PipeConfig {
    pub fact_extractor: String,
    pub conversation: String,
    pub goal_inference: String,
    pub scenario: String,
    pub goal_details: String,
}

/// Bounds applied by the orchestrator to advisor-driven sub-dialogues
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueConfig {
    /// Per-call timeout for every advisor invocation.
    pub advisor_timeout_ms: u64,
    /// Hard cap on goal exploration turns.
    pub exploration_max_turns: u32,
    /// Hard cap on scenario framing turns per goal.
    pub scenario_max_turns: u32,
    /// Confidence gain required to reopen a rejected goal without new evidence.
    pub reopen_confidence_delta: f64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let langbase = LangbaseConfig {
            api_key: env::var("LANGBASE_API_KEY").map_err(|_| AppError::Config {
                message: "LANGBASE_API_KEY is required".to_string(),
            })?,
            base_url: env::var("LANGBASE_BASE_URL")
                .unwrap_or_else(|_| "https://api.langbase.com".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/factfind.db".to_string()),
            ),
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env_parse("REQUEST_TIMEOUT_MS", 30000),
            max_retries: env_parse("MAX_RETRIES", 3),
            retry_delay_ms: env_parse("RETRY_DELAY_MS", 1000),
        };

        let pipes = PipeConfig {
            fact_extractor: env::var("PIPE_FACT_EXTRACTOR")
                .unwrap_or_else(|_| "factfind-fact-extractor-v1".to_string()),
            conversation: env::var("PIPE_CONVERSATION")
                .unwrap_or_else(|_| "factfind-conversation-v1".to_string()),
            goal_inference: env::var("PIPE_GOAL_INFERENCE")
                .unwrap_or_else(|_| "factfind-goal-inference-v1".to_string()),
            scenario: env::var("PIPE_SCENARIO")
                .unwrap_or_else(|_| "factfind-scenario-framer-v1".to_string()),
            goal_details: env::var("PIPE_GOAL_DETAILS")
                .unwrap_or_else(|_| "factfind-goal-details-v1".to_string()),
        };

        let defaults = DialogueConfig::default();
        let dialogue = DialogueConfig {
            advisor_timeout_ms: env_parse("ADVISOR_TIMEOUT_MS", defaults.advisor_timeout_ms),
            exploration_max_turns: env_parse(
                "EXPLORATION_MAX_TURNS",
                defaults.exploration_max_turns,
            ),
            scenario_max_turns: env_parse("SCENARIO_MAX_TURNS", defaults.scenario_max_turns),
            reopen_confidence_delta: env_parse(
                "REOPEN_CONFIDENCE_DELTA",
                defaults.reopen_confidence_delta,
            ),
        };

        Ok(Config {
            langbase,
            database,
            logging,
            request,
            pipes,
            dialogue,
        })
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            advisor_timeout_ms: 45000,
            exploration_max_turns: 12,
            scenario_max_turns: 2,
            reopen_confidence_delta: 0.15,
        }
    }
}
