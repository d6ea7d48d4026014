use std::sync::Arc;

use crate::auth::Authenticator;
use crate::db::Database;
use crate::ledger::service::TransactionLedger;
use crate::ledger::store::LedgerStore;
use crate::transfer::coordinator::TransferCoordinator;

/// Gateway application state (shared)
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<TransactionLedger>,
    pub transfers: Arc<TransferCoordinator>,
    pub authenticator: Arc<dyn Authenticator>,
    /// Present with the postgres backend; pinged by the health check
    pub db: Option<Arc<Database>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        recent_records_limit: usize,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            ledger: Arc::new(TransactionLedger::with_recent_limit(
                store.clone(),
                recent_records_limit,
            )),
            transfers: Arc::new(TransferCoordinator::new(store)),
            authenticator,
            db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<Database>) -> Self {
        self.db = Some(db);
        self
    }
}
