use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use super::SharedState;
use crate::error::{AppError, AppResult, StorageError};
use crate::orchestrator::{Directive, Orchestrator};
use crate::storage::{SessionRecord, SessionStore, TurnRecord};

/// One line written to stdout per directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutput {
    pub session_id: String,
    /// 0 for the opening directive.
    pub turn: u64,
    pub directive: Directive,
}

/// Drives one session: every input line is a user turn, every output line a
/// [`TurnOutput`]. The session is saved after every turn.
pub struct DialogueServer {
    state: SharedState,
    record: SessionRecord,
    orchestrator: Orchestrator,
}

impl DialogueServer {
    /// Open a stored session, or create a new one when `session_id` is
    /// `None`.
    pub async fn open(state: SharedState, session_id: Option<&str>) -> AppResult<Self> {
        let (record, orchestrator) = match session_id {
            Some(id) => {
                let record = state.storage.load_session(id).await?.ok_or_else(|| {
                    StorageError::SessionNotFound {
                        session_id: id.to_string(),
                    }
                })?;
                let orchestrator = Orchestrator::from_snapshot(
                    state.registry.clone(),
                    state.advisors.clone(),
                    state.config.dialogue.clone(),
                    record.snapshot.clone(),
                )?;
                info!(session_id = %record.id, phase = %record.phase, "Session resumed");
                (record, orchestrator)
            }
            None => {
                let orchestrator = Orchestrator::new(
                    state.registry.clone(),
                    state.advisors.clone(),
                    state.config.dialogue.clone(),
                );
                let record = SessionRecord::new(orchestrator.snapshot()?);
                state.storage.save_session(&record).await?;
                info!(session_id = %record.id, "Session created");
                (record, orchestrator)
            }
        };

        Ok(Self {
            state,
            record,
            orchestrator,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.record.id
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Opening directive. Saves the session.
    pub async fn start(&mut self) -> AppResult<TurnOutput> {
        let directive = self.orchestrator.start().await;
        self.record.update(self.orchestrator.snapshot()?);
        self.state.storage.save_session(&self.record).await?;
        Ok(self.output(directive))
    }

    /// Submit one user message and persist the result.
    pub async fn handle_turn(&mut self, user_text: &str) -> AppResult<TurnOutput> {
        let directive = self.orchestrator.submit_turn(user_text).await;
        self.record.update(self.orchestrator.snapshot()?);

        let turn = TurnRecord::new(
            self.record.id.clone(),
            self.record.turn_count(),
            user_text,
            directive.clone(),
        );
        self.state.storage.save_turn(&self.record, &turn).await?;
        Ok(self.output(directive))
    }

    fn output(&self, directive: Directive) -> TurnOutput {
        TurnOutput {
            session_id: self.record.id.clone(),
            turn: self.record.turn_count(),
            directive,
        }
    }

    /// Run the dialogue loop until EOF.
    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> AppResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let opening = self.start().await?;
        write_line(&mut writer, &opening).await?;

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await.map_err(io_error)? {
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            debug!(chars = text.len(), "Received user turn");

            let output = self.handle_turn(text).await?;
            write_line(&mut writer, &output).await?;
        }

        info!(session_id = %self.record.id, "EOF received, session saved");
        Ok(())
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, output: &TurnOutput) -> AppResult<()> {
    let json = serde_json::to_string(output).map_err(|e| AppError::Internal {
        message: format!("Failed to serialize directive: {}", e),
    })?;
    writer.write_all(json.as_bytes()).await.map_err(io_error)?;
    writer.write_all(b"\n").await.map_err(io_error)?;
    writer.flush().await.map_err(io_error)?;
    Ok(())
}

fn io_error(e: std::io::Error) -> AppError {
    AppError::Internal {
        message: format!("I/O error: {}", e),
    }
}
