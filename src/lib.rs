//! wallet_ledger - Personal finance balance-consistency engine
//!
//! Keeps per-user wallet and bank-account balances synchronized with a
//! mutable log of income and expense records.
//!
//! # Modules
//!
//! - [`ledger`] - Records, profiles, balance mutator and the stores
//! - [`transfer`] - Two-leg transfers with idempotency keys
//! - [`auth`] - Bearer-token identity lookup
//! - [`gateway`] - axum HTTP surface
//! - [`db`] - PostgreSQL pool
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

pub mod auth;
pub mod config;
pub mod db;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod transfer;

// Convenient re-exports at crate root
pub use ledger::{
    LedgerError, LedgerResult, LedgerStore, MemoryLedgerStore, PgLedgerStore, TransactionLedger,
};
pub use transfer::TransferCoordinator;
