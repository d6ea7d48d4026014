//! Balance-consistency engine
//!
//! Keeps per-user wallet and bank-account balances in step with a mutable
//! log of income and expense records.
//!
//! # Invariant
//!
//! ```text
//! balance[w]        == Σ signed(r)  for r.wallet == w
//! account[a].balance == Σ signed(r)  for r.bank_account_id == a
//! ```
//!
//! # Ordering
//!
//! 1. **Atomic deltas**: balances change only through `col = col + delta`
//! 2. **Compensate, then mutate**: reversal deltas land before the record
//!    is replaced or removed, in the same store transaction
//! 3. **Version CAS**: update and delete only write if the record is still
//!    at the version that was read; losers re-read and retry

pub mod db;
pub mod error;
pub mod memory;
pub mod mutator;
pub mod service;
pub mod store;
pub mod types;


// Re-exports for convenience
pub use db::PgLedgerStore;
pub use error::{LedgerError, LedgerResult};
pub use memory::MemoryLedgerStore;
pub use mutator::{Adjustments, BalanceDelta, BalanceField};
pub use service::{BalanceAudit, FieldDrift, MAX_CAS_RETRIES, ProfileOverview, TransactionLedger};
pub use store::{CasOutcome, LedgerStore, TransferCommit};
pub use types::{
    AccountId, BankAccount, Profile, RecordId, TransactionInput, TransactionRecord,
    TransactionType, UserId, Wallet, WalletBalances,
};
