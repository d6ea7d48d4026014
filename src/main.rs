//! wallet_ledger - HTTP server entry point
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │  Config  │───▶│  Store   │───▶│  Ledger  │───▶│ Gateway  │
//! │  (YAML)  │    │(PG/Mem)  │    │+Transfer │    │  (axum)  │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};

use wallet_ledger::auth::JwtAuthenticator;
use wallet_ledger::config::{AppConfig, StorageBackend};
use wallet_ledger::db::Database;
use wallet_ledger::gateway::{self, state::AppState};
use wallet_ledger::ledger::{LedgerStore, MemoryLedgerStore, PgLedgerStore};
use wallet_ledger::logging;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _guard = logging::init_logging(&config);

    tracing::info!(env = %env, backend = ?config.storage.backend, "Starting wallet_ledger");

    let secret = config.jwt_secret()?;
    let authenticator = Arc::new(JwtAuthenticator::new(&secret));

    let (store, db): (Arc<dyn LedgerStore>, Option<Arc<Database>>) = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("In-process store: data is lost on restart");
            let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
            (store, None)
        }
        StorageBackend::Postgres => {
            let url = config
                .storage
                .postgres_url
                .as_deref()
                .context("storage.postgres_url is not set")?;
            let db = Arc::new(
                Database::connect(url, config.storage.max_connections)
                    .await
                    .context("Failed to connect to PostgreSQL")?,
            );
            let pg = PgLedgerStore::new(db.pool().clone());
            pg.migrate().await.context("Failed to run migrations")?;
            tracing::info!("Migrations applied");
            let store: Arc<dyn LedgerStore> = Arc::new(pg);
            (store, Some(db))
        }
    };

    let mut state = AppState::new(store, config.ledger.recent_records_limit, authenticator);
    if let Some(db) = db {
        state = state.with_database(db);
    }

    gateway::run_server(&config.gateway, Arc::new(state)).await
}
