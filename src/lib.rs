//! # Langbase Fact-Find
//!
//! A deterministic bookkeeping engine for long, multi-turn financial
//! fact-finding dialogues. Language understanding and generation are
//! delegated to Langbase Pipes ("advisors"); this crate owns everything that
//! must stay correct when those advisors are slow, wrong or silent.
//!
//! ## Components
//!
//! - **SchemaRegistry**: node types, their fields and completion rules
//! - **GraphStore**: per-session snapshots, traversal frontier, field history
//!   and conflicts, goal buckets
//! - **Evaluator**: declarative completion and missing-field computation
//! - **GoalLedger / ScenarioQueue**: goal lifecycle and the scenario backlog
//! - **Orchestrator**: the phase machine turning each user message into a
//!   directive
//!
//! ## Architecture
//!
//! ```text
//! stdin → DialogueServer → Orchestrator ─┬→ Advisors → Langbase Pipes (HTTP)
//!                │                        └→ GraphStore / GoalLedger / ScenarioQueue
//!                ↓
//!          SQLite (sessions)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use langbase_factfind::{Config, AppState, DialogueServer};
//! use langbase_factfind::langbase::LangbaseClient;
//! use langbase_factfind::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let langbase = LangbaseClient::new(&config.langbase, config.request.clone())?;
//!     let state = Arc::new(AppState::new(config, storage, langbase));
//!     let mut server = DialogueServer::open(state, None).await?;
//!     let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//!     server.run(stdin, tokio::io::stdout()).await?;
//!     Ok(())
//! }
//! ```

/// Advisor traits, request/proposal types and the Langbase implementation.
pub mod advisors;
/// Command-line interface.
pub mod cli;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Collection-spec evaluation over node snapshots.
pub mod evaluator;
/// Goal types, lifecycle rules and the scenario queue.
pub mod goals;
/// Per-session state store.
pub mod graph;
/// Langbase API client and types for pipe communication.
pub mod langbase;
/// Dialogue phase machine.
pub mod orchestrator;
/// System prompts for Langbase pipes.
pub mod prompts;
/// Node type catalog.
pub mod schema;
/// Stdio dialogue server.
pub mod server;
/// SQLite storage layer for persistence.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use orchestrator::{Directive, Orchestrator, Phase};
pub use server::{AppState, DialogueServer, SharedState};
