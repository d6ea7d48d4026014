//! Transaction Ledger
//!
//! Record CRUD with paired balance compensation. Every mutation computes its
//! deltas through the mutator and hands record write + deltas to the store as
//! one unit of work. Updates and deletes are version-checked and retried.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};

use super::error::{LedgerError, LedgerResult};
use super::mutator::{self, BalanceField};
use super::store::{CasOutcome, LedgerStore};
use super::types::{
    AccountId, BankAccount, Profile, RecordId, TransactionInput, TransactionRecord, UserId, Wallet,
    check_storable,
};

/// Attempts at a version-checked write before giving up
pub const MAX_CAS_RETRIES: usize = 8;

/// Default size of the overview's recent-records list
pub const DEFAULT_RECENT_LIMIT: usize = 20;

/// Profile plus the newest records
#[derive(Debug, Clone, Serialize)]
pub struct ProfileOverview {
    pub profile: Profile,
    pub recent: Vec<TransactionRecord>,
}

/// Stored vs recomputed value of one balance field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDrift {
    pub field: BalanceField,
    pub recorded: Decimal,
    pub expected: Decimal,
    pub drift: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceAudit {
    pub user_id: UserId,
    pub records_scanned: usize,
    pub fields: Vec<FieldDrift>,
}

impl BalanceAudit {
    pub fn is_clean(&self) -> bool {
        self.fields.iter().all(|f| f.drift.is_zero())
    }

    pub fn drifted(&self) -> impl Iterator<Item = &FieldDrift> {
        self.fields.iter().filter(|f| !f.drift.is_zero())
    }
}

pub struct TransactionLedger {
    store: Arc<dyn LedgerStore>,
    recent_limit: usize,
}

impl TransactionLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self::with_recent_limit(store, DEFAULT_RECENT_LIMIT)
    }

    pub fn with_recent_limit(store: Arc<dyn LedgerStore>, recent_limit: usize) -> Self {
        Self {
            store,
            recent_limit,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Account references must name an account of the caller's profile
    async fn check_account(&self, user_id: &UserId, account_id: Option<AccountId>) -> LedgerResult<()> {
        let Some(account_id) = account_id else {
            return Ok(());
        };
        match self.store.get_profile(user_id).await? {
            Some(profile) => profile.require_account(account_id).map(|_| ()),
            None => Err(LedgerError::InvalidInput(format!(
                "unknown bank account: {account_id}"
            ))),
        }
    }

    fn report(&self, op: &str, user_id: &UserId, err: &LedgerError) {
        if let LedgerError::WriteFailed(detail) = err {
            error!(
                op,
                user_id = %user_id,
                store = self.store.name(),
                detail = %detail,
                "Ledger write failed"
            );
        }
    }

    /// Persist a new record and apply its signed amount
    pub async fn create(
        &self,
        user_id: &UserId,
        input: TransactionInput,
    ) -> LedgerResult<TransactionRecord> {
        input.validate()?;
        self.check_account(user_id, input.bank_account_id).await?;

        let record = TransactionRecord::new(user_id.clone(), input, Utc::now());
        let adjustments = mutator::for_create(&record)?;

        self.store
            .insert_record(&record, &adjustments)
            .await
            .inspect_err(|e| self.report("create", user_id, e))?;

        info!(record_id = %record.id, user_id = %user_id, "Record created: {}", record);
        Ok(record)
    }

    pub async fn get(&self, user_id: &UserId, id: RecordId) -> LedgerResult<TransactionRecord> {
        self.store
            .get_record(user_id, id)
            .await?
            .ok_or_else(|| LedgerError::record_not_found(id))
    }

    /// Full replacement of a record's content; compensation and replacement
    /// commit together or not at all
    pub async fn update(
        &self,
        user_id: &UserId,
        id: RecordId,
        input: TransactionInput,
    ) -> LedgerResult<TransactionRecord> {
        input.validate()?;
        self.check_account(user_id, input.bank_account_id).await?;

        for attempt in 1..=MAX_CAS_RETRIES {
            let existing = self.get(user_id, id).await?;
            let replacement = existing.revised(input.clone());
            let adjustments = mutator::for_update(&existing, &replacement)?;

            let outcome = self
                .store
                .replace_record(&existing, &replacement, &adjustments)
                .await
                .inspect_err(|e| self.report("update", user_id, e))?;

            match outcome {
                CasOutcome::Applied => {
                    info!(
                        record_id = %id,
                        user_id = %user_id,
                        deltas = adjustments.len(),
                        "Record updated: {}",
                        replacement
                    );
                    return Ok(replacement);
                }
                CasOutcome::Stale => {
                    warn!(record_id = %id, attempt, "Record changed concurrently, retrying update");
                }
            }
        }

        let err = LedgerError::WriteFailed(format!(
            "record {id} still contended after {MAX_CAS_RETRIES} attempts"
        ));
        self.report("update", user_id, &err);
        Err(err)
    }

    /// Refund the record's contribution, then remove it. Returns the removed record.
    pub async fn delete(&self, user_id: &UserId, id: RecordId) -> LedgerResult<TransactionRecord> {
        for attempt in 1..=MAX_CAS_RETRIES {
            // A vanished record surfaces here as NotFound, so no double refund
            let existing = self.get(user_id, id).await?;
            let adjustments = mutator::for_delete(&existing)?;

            let outcome = self
                .store
                .remove_record(&existing, &adjustments)
                .await
                .inspect_err(|e| self.report("delete", user_id, e))?;

            match outcome {
                CasOutcome::Applied => {
                    info!(record_id = %id, user_id = %user_id, "Record deleted: {}", existing);
                    return Ok(existing);
                }
                CasOutcome::Stale => {
                    warn!(record_id = %id, attempt, "Record changed concurrently, retrying delete");
                }
            }
        }

        let err = LedgerError::WriteFailed(format!(
            "record {id} still contended after {MAX_CAS_RETRIES} attempts"
        ));
        self.report("delete", user_id, &err);
        Err(err)
    }

    /// Balances, accounts, budget and the newest records. Never creates a profile.
    pub async fn overview(&self, user_id: &UserId) -> LedgerResult<ProfileOverview> {
        let profile = self
            .store
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| Profile::empty(user_id.clone()));
        let recent = self
            .store
            .recent_records(user_id, self.recent_limit)
            .await?;

        Ok(ProfileOverview { profile, recent })
    }

    pub async fn add_account(
        &self,
        user_id: &UserId,
        name: &str,
        metadata: serde_json::Value,
    ) -> LedgerResult<Profile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::InvalidInput(
                "account name must not be empty".to_string(),
            ));
        }
        let metadata = match metadata {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            serde_json::Value::Object(map) => serde_json::Value::Object(map),
            _ => {
                return Err(LedgerError::InvalidInput(
                    "account metadata must be an object".to_string(),
                ));
            }
        };

        let account = BankAccount::new(name, metadata);
        let profile = self
            .store
            .add_account(user_id, &account)
            .await
            .inspect_err(|e| self.report("add_account", user_id, e))?;

        info!(user_id = %user_id, account_id = %account.id, name, "Bank account added");
        Ok(profile)
    }

    /// Plain field write; balances are untouched
    pub async fn set_budget(
        &self,
        user_id: &UserId,
        budget: Option<Decimal>,
    ) -> LedgerResult<Profile> {
        if budget.is_some_and(|b| b < Decimal::ZERO) {
            return Err(LedgerError::InvalidInput(
                "budget must not be negative".to_string(),
            ));
        }
        if let Some(budget) = budget {
            check_storable("budget", budget)?;
        }

        let profile = self
            .store
            .set_budget(user_id, budget)
            .await
            .inspect_err(|e| self.report("set_budget", user_id, e))?;

        info!(user_id = %user_id, budget = ?budget, "Budget set");
        Ok(profile)
    }

    /// Recompute every balance from the records and compare. Read-only.
    pub async fn audit(&self, user_id: &UserId) -> LedgerResult<BalanceAudit> {
        let profile = self
            .store
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| Profile::empty(user_id.clone()));
        let records = self.store.list_records(user_id).await?;

        let mut wallets: HashMap<Wallet, Decimal> = HashMap::new();
        let mut accounts: HashMap<AccountId, Decimal> = HashMap::new();
        for record in &records {
            let sum = wallets.entry(record.wallet).or_default();
            *sum = accumulate(BalanceField::Wallet(record.wallet), *sum, record.signed_amount())?;
            if let Some(account_id) = record.bank_account_id {
                let sum = accounts.entry(account_id).or_default();
                *sum = accumulate(BalanceField::Account(account_id), *sum, record.signed_amount())?;
            }
        }

        let mut fields = Vec::new();
        let mut push = |field: BalanceField, recorded: Decimal, expected: Decimal| {
            let drift = accumulate(field, recorded, -expected)?;
            fields.push(FieldDrift {
                field,
                recorded,
                expected,
                drift,
            });
            LedgerResult::<()>::Ok(())
        };

        for wallet in Wallet::ALL {
            let expected = wallets.get(&wallet).copied().unwrap_or_default();
            push(BalanceField::Wallet(wallet), profile.balance.get(wallet), expected)?;
        }
        for account in &profile.accounts {
            let expected = accounts.remove(&account.id).unwrap_or_default();
            push(BalanceField::Account(account.id), account.balance, expected)?;
        }
        // Records pointing at accounts the profile no longer has
        let mut orphans: Vec<_> = accounts.into_iter().collect();
        orphans.sort_by_key(|(id, _)| *id);
        for (account_id, expected) in orphans {
            push(BalanceField::Account(account_id), Decimal::ZERO, expected)?;
        }

        let audit = BalanceAudit {
            user_id: user_id.clone(),
            records_scanned: records.len(),
            fields,
        };
        if !audit.is_clean() {
            warn!(
                user_id = %user_id,
                drifted = audit.drifted().count(),
                "Balance drift detected"
            );
        }
        Ok(audit)
    }
}

fn accumulate(field: BalanceField, sum: Decimal, amount: Decimal) -> LedgerResult<Decimal> {
    sum.checked_add(amount)
        .ok_or_else(|| LedgerError::InvalidInput(format!("{field} is out of range")))
}
