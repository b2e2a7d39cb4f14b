use clap::Parser;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use langbase_factfind::{
    advisors::LangbaseAdvisors,
    cli::{execute_command, Cli, Commands},
    config::{Config, LogFormat},
    langbase::LangbaseClient,
    server::{AppState, DialogueServer},
    storage::SqliteStorage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Langbase fact-find starting..."
    );

    // Initialize storage
    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    let session = match cli.command() {
        Commands::Chat { session } => session,
        command => {
            let result = execute_command(command, &storage).await;
            if result.exit_code == 0 {
                println!("{}", result.message);
            } else {
                eprintln!("{}", result.message);
            }
            std::process::exit(result.exit_code);
        }
    };

    // Initialize Langbase client
    let langbase = match LangbaseClient::new(&config.langbase, config.request.clone()) {
        Ok(c) => {
            info!(base_url = %config.langbase.base_url, "Langbase client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize Langbase client");
            return Err(e.into());
        }
    };

    // Ensure advisor pipes exist (create if needed)
    info!("Ensuring advisor pipes exist...");
    let advisors = LangbaseAdvisors::new(langbase.clone(), config.pipes.clone());
    if let Err(e) = advisors.ensure_pipes().await {
        error!(error = %e, "Failed to ensure advisor pipes exist");
        return Err(e.into());
    }

    let state = Arc::new(AppState::new(config, storage, langbase));
    let mut server = match DialogueServer::open(state, session.as_deref()).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to open session");
            return Err(e.into());
        }
    };

    info!(session_id = %server.session_id(), "Session ready, reading messages from stdin...");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    if let Err(e) = server.run(stdin, tokio::io::stdout()).await {
        error!(error = %e, "Session error");
        return Err(e.into());
    }

    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
