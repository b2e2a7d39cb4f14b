//! Command-line interface.
//!
//! `chat` runs a session over stdio; the other commands inspect stored
//! sessions.

use clap::{Parser, Subcommand};

use crate::storage::{SessionStore, SqliteStorage};

/// Financial fact-find dialogue engine.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Command to run; `chat` on a new session when none was given.
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Chat { session: None })
    }
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run a session over stdin/stdout, one user message per line
    Chat {
        /// Resume a stored session instead of starting a new one
        #[arg(long)]
        session: Option<String>,
    },

    /// List stored sessions
    Sessions,

    /// Show a stored session's turn log
    Show {
        /// Session id
        id: String,
    },

    /// Delete a stored session
    Delete {
        /// Session id
        id: String,
    },
}

/// Result of CLI command execution.
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Execute a session inspection command. `chat` is handled by the binary.
pub async fn execute_command(command: Commands, storage: &SqliteStorage) -> CliResult {
    match command {
        Commands::Sessions => execute_sessions(storage).await,
        Commands::Show { id } => execute_show(storage, &id).await,
        Commands::Delete { id } => execute_delete(storage, &id).await,
        Commands::Chat { .. } => CliResult::error("chat runs interactively"),
    }
}

async fn execute_sessions(storage: &SqliteStorage) -> CliResult {
    let sessions = match storage.list_sessions().await {
        Ok(s) => s,
        Err(e) => return CliResult::error(format!("Failed to list sessions: {}", e)),
    };

    if sessions.is_empty() {
        return CliResult::success("No sessions stored.");
    }

    let mut output = format!("{:<38} {:<18} {:>6}  {}\n", "ID", "PHASE", "TURNS", "UPDATED");
    for s in sessions {
        output.push_str(&format!(
            "{:<38} {:<18} {:>6}  {}\n",
            s.id,
            s.phase,
            s.turn_count,
            s.updated_at.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    CliResult::success(output.trim_end())
}

async fn execute_show(storage: &SqliteStorage, id: &str) -> CliResult {
    let session = match storage.load_session(id).await {
        Ok(Some(s)) => s,
        Ok(None) => return CliResult::error(format!("Session not found: {}", id)),
        Err(e) => return CliResult::error(format!("Failed to load session: {}", e)),
    };
    let turns = match storage.session_turns(id).await {
        Ok(t) => t,
        Err(e) => return CliResult::error(format!("Failed to load turns: {}", e)),
    };

    let mut output = format!(
        "Session {} ({}, {} turns)\n",
        session.id,
        session.phase,
        session.turn_count()
    );
    for turn in turns {
        output.push_str(&format!(
            "\n[{}] user: {}\n[{}] {}: {}\n",
            turn.turn_index, turn.user_text, turn.turn_index, turn.phase, turn.directive.message
        ));
    }
    CliResult::success(output.trim_end())
}

async fn execute_delete(storage: &SqliteStorage, id: &str) -> CliResult {
    match storage.delete_session(id).await {
        Ok(()) => CliResult::success(format!("Deleted session {}", id)),
        Err(e) => CliResult::error(format!("Failed to delete session: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_chat() {
        let cli = Cli::parse_from(["factfind"]);
        assert_eq!(cli.command(), Commands::Chat { session: None });
    }

    #[test]
    fn test_chat_resumes_session() {
        let cli = Cli::parse_from(["factfind", "chat", "--session", "abc"]);
        assert_eq!(
            cli.command(),
            Commands::Chat {
                session: Some("abc".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_sessions_empty_store() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let result = execute_command(Commands::Sessions, &storage).await;
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.message, "No sessions stored.");
    }

    #[tokio::test]
    async fn test_show_unknown_session() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let result = execute_command(Commands::Show { id: "nope".to_string() }, &storage).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.message.contains("Session not found"));
    }
}
