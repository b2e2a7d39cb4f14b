//! Stdio front end for fact-find sessions.
//!
//! This module provides:
//! - shared application state (config, storage, advisors, schema)
//! - a line-oriented dialogue loop over stdin/stdout with per-turn persistence

mod session;

pub use session::{DialogueServer, TurnOutput};

use std::sync::Arc;

use crate::advisors::{AdvisorSet, LangbaseAdvisors};
use crate::config::Config;
use crate::langbase::LangbaseClient;
use crate::schema::SchemaRegistry;
use crate::storage::SqliteStorage;

/// Application state shared by every session.
pub struct AppState {
    pub config: Config,
    pub storage: SqliteStorage,
    pub advisors: AdvisorSet,
    pub registry: Arc<SchemaRegistry>,
}

impl AppState {
    /// State backed by Langbase advisors and the built-in schema.
    pub fn new(config: Config, storage: SqliteStorage, langbase: LangbaseClient) -> Self {
        let advisors = LangbaseAdvisors::new(langbase, config.pipes.clone());
        Self::with_advisors(config, storage, AdvisorSet::uniform(Arc::new(advisors)))
    }

    /// State with explicitly supplied advisors.
    pub fn with_advisors(config: Config, storage: SqliteStorage, advisors: AdvisorSet) -> Self {
        Self {
            config,
            storage,
            advisors,
            registry: Arc::new(SchemaRegistry::new()),
        }
    }
}

/// Shared application state handle.
pub type SharedState = Arc<AppState>;
