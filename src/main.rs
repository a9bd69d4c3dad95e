use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::prelude::*;

use kanabot::authz::{AuthorizationStore, FileGrantLog, GrantLog, PersistenceError, SqliteGrantLog};
use kanabot::config::{Config, GrantStoreKind};
use kanabot::gateway::OpenAiClient;
use kanabot::line::{self, LineClient, WebhookState};
use kanabot::{Responder, RoutingEngine};

fn open_grant_log(config: &Config) -> Result<Box<dyn GrantLog>, PersistenceError> {
    let path = config.grant_store_path();
    let log: Box<dyn GrantLog> = match config.grant_store {
        GrantStoreKind::File => Box::new(FileGrantLog::open(&path)?),
        GrantStoreKind::Sqlite => Box::new(SqliteGrantLog::open(&path)?),
    };
    info!("Grant store: {:?}", path);
    Ok(log)
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "kanabot.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("kanabot.log"))
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Failed to open log file in {}: {e}", log_dir.display());
            std::process::exit(1);
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting kanabot...");
    info!("Loaded config from {config_path}");
    info!("Whitelisted senders: {}", config.routing.whitelist.len());
    info!("Authorization trigger: {:?}", config.routing.authorization_trigger);
    if config.dry_run {
        info!("DRY RUN mode enabled");
    }

    let grant_log = match open_grant_log(&config) {
        Ok(log) => log,
        Err(e) => {
            error!("Failed to open grant store: {e}");
            std::process::exit(1);
        }
    };
    let store = Arc::new(AuthorizationStore::new(grant_log));
    if let Err(e) = store.load() {
        error!("Failed to load authorized groups: {e}");
        std::process::exit(1);
    }
    if store.is_empty() {
        info!("No authorized groups yet, waiting for a whitelisted sender");
    }

    let gateway = match OpenAiClient::new(config.gateway.clone()) {
        Ok(g) => Arc::new(g),
        Err(e) => {
            error!("Failed to create gateway client: {e}");
            std::process::exit(1);
        }
    };
    let line_client = match LineClient::new(config.line_channel_access_token.clone(), config.dry_run) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Failed to create LINE client: {e}");
            std::process::exit(1);
        }
    };

    let state = WebhookState::new(
        &config.line_channel_secret,
        Arc::new(RoutingEngine::new(config.routing.clone(), store)),
        Arc::new(Responder::new(config.prompts.clone(), gateway, line_client)),
    );

    if let Err(e) = line::run_server(config.listen_addr, state).await {
        error!("Webhook server failed: {e}");
        std::process::exit(1);
    }
    info!("🛑 Stopped");
}
