//! Ledger + Profile store interface
//!
//! Every method is one unit of work: a record write and the balance deltas
//! that pair with it either both land or neither does. Balance writes are
//! increments (`col = col + delta`), never computed in application code.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::error::LedgerResult;
use super::mutator::{Adjustments, BalanceField};
use super::types::{BankAccount, Profile, RecordId, TransactionRecord, UserId};
use crate::transfer::types::{TransferLegs, TransferReceipt};

/// Result of a version-checked record write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// Record matched the expected version and was written
    Applied,
    /// Record changed or vanished since it was read; nothing was written
    Stale,
}

/// Result of committing a transfer
#[derive(Debug, Clone)]
pub enum TransferCommit {
    /// Legs, receipt and adjustments were written
    Applied,
    /// The idempotency key was already used; nothing was written
    Replayed {
        receipt: TransferReceipt,
        legs: TransferLegs,
    },
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    // === Profile Store ===

    /// Read without creating
    async fn get_profile(&self, user_id: &UserId) -> LedgerResult<Option<Profile>>;

    /// Idempotent upsert-by-key; concurrent first access yields one profile
    async fn get_or_create_profile(&self, user_id: &UserId) -> LedgerResult<Profile>;

    /// Apply all deltas as one atomic multi-field increment
    async fn apply_deltas(&self, user_id: &UserId, adjustments: &Adjustments)
    -> LedgerResult<Profile>;

    /// Single-field form of `apply_deltas`
    async fn apply_delta(
        &self,
        user_id: &UserId,
        field: BalanceField,
        amount: Decimal,
    ) -> LedgerResult<Profile> {
        let mut adjustments = Adjustments::new();
        adjustments.push(field, amount)?;
        self.apply_deltas(user_id, &adjustments).await
    }

    /// Append a zero-balance account to the profile (profile upserted first)
    async fn add_account(&self, user_id: &UserId, account: &BankAccount) -> LedgerResult<Profile>;

    async fn set_budget(&self, user_id: &UserId, budget: Option<Decimal>) -> LedgerResult<Profile>;

    // === Ledger Store ===

    async fn get_record(
        &self,
        user_id: &UserId,
        id: RecordId,
    ) -> LedgerResult<Option<TransactionRecord>>;

    /// Newest first by `(date, created_at)`
    async fn recent_records(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> LedgerResult<Vec<TransactionRecord>>;

    /// Every record of the user, any order
    async fn list_records(&self, user_id: &UserId) -> LedgerResult<Vec<TransactionRecord>>;

    /// Persist `record`, then apply `adjustments`
    async fn insert_record(
        &self,
        record: &TransactionRecord,
        adjustments: &Adjustments,
    ) -> LedgerResult<()>;

    /// Apply `adjustments`, then overwrite the record, iff it is still at
    /// `expected.version`
    async fn replace_record(
        &self,
        expected: &TransactionRecord,
        replacement: &TransactionRecord,
        adjustments: &Adjustments,
    ) -> LedgerResult<CasOutcome>;

    /// Apply the refund in `adjustments`, then remove the record, iff it is
    /// still at `expected.version`
    async fn remove_record(
        &self,
        expected: &TransactionRecord,
        adjustments: &Adjustments,
    ) -> LedgerResult<CasOutcome>;

    // === Transfers ===

    /// Write both legs, the receipt and the adjustments, keyed by
    /// `(user_id, idempotency_key)`
    async fn commit_transfer(
        &self,
        receipt: &TransferReceipt,
        legs: &TransferLegs,
        adjustments: &Adjustments,
    ) -> LedgerResult<TransferCommit>;

    async fn find_transfer(
        &self,
        user_id: &UserId,
        idempotency_key: &str,
    ) -> LedgerResult<Option<(TransferReceipt, TransferLegs)>>;
}
