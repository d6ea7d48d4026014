//! In-process ledger store
//!
//! One book per user behind its own mutex; users never contend. Each trait
//! method validates first and mutates second while holding the user's lock,
//! so a failed call leaves the book untouched.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;

use super::error::{LedgerError, LedgerResult};
use super::mutator::{Adjustments, BalanceField};
use super::store::{CasOutcome, LedgerStore, TransferCommit};
use super::types::{BankAccount, Profile, RecordId, TransactionRecord, UserId, check_storable};
use crate::transfer::types::{TransferLegs, TransferReceipt};

#[derive(Debug, Default)]
struct UserBook {
    profile: Option<Profile>,
    records: BTreeMap<RecordId, TransactionRecord>,
    /// Keyed by idempotency key
    transfers: HashMap<String, TransferReceipt>,
}

impl UserBook {
    fn profile_or_create(&mut self, user_id: &UserId) -> &mut Profile {
        self.profile
            .get_or_insert_with(|| Profile::empty(user_id.clone()))
    }

    /// All-or-nothing increment of every field in `adjustments`
    fn apply(&mut self, user_id: &UserId, adjustments: &Adjustments) -> LedgerResult<()> {
        if adjustments.is_empty() {
            return Ok(());
        }

        // Resolve every target and its new value before writing any
        let mut updates = Vec::with_capacity(adjustments.len());
        for delta in adjustments.iter() {
            let current = match delta.field {
                BalanceField::Wallet(wallet) => self
                    .profile
                    .as_ref()
                    .map(|p| p.balance.get(wallet))
                    .unwrap_or_default(),
                BalanceField::Account(id) => {
                    self.profile
                        .as_ref()
                        .ok_or_else(|| {
                            LedgerError::InvalidInput(format!("unknown bank account: {id}"))
                        })?
                        .require_account(id)?
                        .balance
                }
            };
            let field = delta.field.to_string();
            let next = current
                .checked_add(delta.amount)
                .ok_or_else(|| LedgerError::InvalidInput(format!("{field} is out of range")))?;
            check_storable(&field, next)?;
            updates.push((delta.field, next));
        }

        let profile = self.profile_or_create(user_id);
        for (field, value) in updates {
            match field {
                BalanceField::Wallet(wallet) => *profile.balance.get_mut(wallet) = value,
                BalanceField::Account(id) => {
                    if let Some(account) = profile.account_mut(id) {
                        account.balance = value;
                    }
                }
            }
        }
        Ok(())
    }

    fn is_current(&self, expected: &TransactionRecord) -> bool {
        self.records
            .get(&expected.id)
            .is_some_and(|r| r.user_id == expected.user_id && r.version == expected.version)
    }

    fn legs_for(&self, receipt: &TransferReceipt) -> LedgerResult<TransferLegs> {
        let expense = self.records.get(&receipt.expense_record_id).cloned();
        let income = self.records.get(&receipt.income_record_id).cloned();
        match (expense, income) {
            (Some(expense), Some(income)) => Ok(TransferLegs { expense, income }),
            _ => Err(LedgerError::NotFound(format!(
                "legs of transfer {}",
                receipt.transfer_id
            ))),
        }
    }
}

/// DashMap-backed store for development and tests
#[derive(Default)]
pub struct MemoryLedgerStore {
    books: DashMap<UserId, Arc<Mutex<UserBook>>>,
    #[cfg(test)]
    fail_writes: std::sync::atomic::AtomicBool,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry API: concurrent first access creates exactly one book
    fn book(&self, user_id: &UserId) -> Arc<Mutex<UserBook>> {
        self.books.entry(user_id.clone()).or_default().clone()
    }

    /// Read-side lookup; never inserts
    fn existing_book(&self, user_id: &UserId) -> Option<Arc<Mutex<UserBook>>> {
        self.books.get(user_id).map(|book| book.value().clone())
    }

    fn lock(book: &Mutex<UserBook>) -> LedgerResult<MutexGuard<'_, UserBook>> {
        book.lock()
            .map_err(|_| LedgerError::WriteFailed("user book lock poisoned".to_string()))
    }

    /// Make every subsequent write fail with `WriteFailed`
    #[cfg(test)]
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_writable(&self) -> LedgerResult<()> {
        #[cfg(test)]
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(LedgerError::WriteFailed("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_profile(&self, user_id: &UserId) -> LedgerResult<Option<Profile>> {
        let Some(book) = self.existing_book(user_id) else {
            return Ok(None);
        };
        let guard = Self::lock(&book)?;
        Ok(guard.profile.clone())
    }

    async fn get_or_create_profile(&self, user_id: &UserId) -> LedgerResult<Profile> {
        self.check_writable()?;
        let book = self.book(user_id);
        let mut guard = Self::lock(&book)?;
        Ok(guard.profile_or_create(user_id).clone())
    }

    async fn apply_deltas(
        &self,
        user_id: &UserId,
        adjustments: &Adjustments,
    ) -> LedgerResult<Profile> {
        self.check_writable()?;
        let book = self.book(user_id);
        let mut guard = Self::lock(&book)?;
        guard.apply(user_id, adjustments)?;
        Ok(guard.profile_or_create(user_id).clone())
    }

    async fn add_account(&self, user_id: &UserId, account: &BankAccount) -> LedgerResult<Profile> {
        self.check_writable()?;
        let book = self.book(user_id);
        let mut guard = Self::lock(&book)?;
        let profile = guard.profile_or_create(user_id);
        if profile.account(account.id).is_some() {
            return Err(LedgerError::InvalidInput(format!(
                "duplicate bank account id: {}",
                account.id
            )));
        }
        profile.accounts.push(account.clone());
        Ok(profile.clone())
    }

    async fn set_budget(&self, user_id: &UserId, budget: Option<Decimal>) -> LedgerResult<Profile> {
        self.check_writable()?;
        let book = self.book(user_id);
        let mut guard = Self::lock(&book)?;
        let profile = guard.profile_or_create(user_id);
        profile.budget = budget;
        Ok(profile.clone())
    }

    async fn get_record(
        &self,
        user_id: &UserId,
        id: RecordId,
    ) -> LedgerResult<Option<TransactionRecord>> {
        let Some(book) = self.existing_book(user_id) else {
            return Ok(None);
        };
        let guard = Self::lock(&book)?;
        Ok(guard.records.get(&id).cloned())
    }

    async fn recent_records(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> LedgerResult<Vec<TransactionRecord>> {
        let mut records = self.list_records(user_id).await?;
        records.sort_by(|a, b| {
            (b.date, b.created_at, b.id).cmp(&(a.date, a.created_at, a.id))
        });
        records.truncate(limit);
        Ok(records)
    }

    async fn list_records(&self, user_id: &UserId) -> LedgerResult<Vec<TransactionRecord>> {
        let Some(book) = self.existing_book(user_id) else {
            return Ok(Vec::new());
        };
        let guard = Self::lock(&book)?;
        Ok(guard.records.values().cloned().collect())
    }

    async fn insert_record(
        &self,
        record: &TransactionRecord,
        adjustments: &Adjustments,
    ) -> LedgerResult<()> {
        self.check_writable()?;
        let book = self.book(&record.user_id);
        let mut guard = Self::lock(&book)?;
        if guard.records.contains_key(&record.id) {
            return Err(LedgerError::WriteFailed(format!(
                "record {} already exists",
                record.id
            )));
        }
        guard.apply(&record.user_id, adjustments)?;
        guard.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn replace_record(
        &self,
        expected: &TransactionRecord,
        replacement: &TransactionRecord,
        adjustments: &Adjustments,
    ) -> LedgerResult<CasOutcome> {
        self.check_writable()?;
        let book = self.book(&expected.user_id);
        let mut guard = Self::lock(&book)?;
        if !guard.is_current(expected) {
            return Ok(CasOutcome::Stale);
        }
        guard.apply(&expected.user_id, adjustments)?;
        guard.records.insert(replacement.id, replacement.clone());
        Ok(CasOutcome::Applied)
    }

    async fn remove_record(
        &self,
        expected: &TransactionRecord,
        adjustments: &Adjustments,
    ) -> LedgerResult<CasOutcome> {
        self.check_writable()?;
        let book = self.book(&expected.user_id);
        let mut guard = Self::lock(&book)?;
        if !guard.is_current(expected) {
            return Ok(CasOutcome::Stale);
        }
        guard.apply(&expected.user_id, adjustments)?;
        guard.records.remove(&expected.id);
        Ok(CasOutcome::Applied)
    }

    async fn commit_transfer(
        &self,
        receipt: &TransferReceipt,
        legs: &TransferLegs,
        adjustments: &Adjustments,
    ) -> LedgerResult<TransferCommit> {
        self.check_writable()?;
        let book = self.book(&receipt.user_id);
        let mut guard = Self::lock(&book)?;

        if let Some(existing) = guard.transfers.get(&receipt.idempotency_key).cloned() {
            let legs = guard.legs_for(&existing)?;
            return Ok(TransferCommit::Replayed {
                receipt: existing,
                legs,
            });
        }

        guard.apply(&receipt.user_id, adjustments)?;
        guard.records.insert(legs.expense.id, legs.expense.clone());
        guard.records.insert(legs.income.id, legs.income.clone());
        guard
            .transfers
            .insert(receipt.idempotency_key.clone(), receipt.clone());
        Ok(TransferCommit::Applied)
    }

    async fn find_transfer(
        &self,
        user_id: &UserId,
        idempotency_key: &str,
    ) -> LedgerResult<Option<(TransferReceipt, TransferLegs)>> {
        let Some(book) = self.existing_book(user_id) else {
            return Ok(None);
        };
        let guard = Self::lock(&book)?;
        match guard.transfers.get(idempotency_key) {
            Some(receipt) => {
                let legs = guard.legs_for(receipt)?;
                Ok(Some((receipt.clone(), legs)))
            }
            None => Ok(None),
        }
    }
}
