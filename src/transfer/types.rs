//! Transfer Core Types

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

pub use crate::ledger::types::TransferId;
use crate::ledger::types::{AccountId, Profile, RecordId, TransactionRecord, UserId, Wallet};

use super::locale::Locale;

/// Category tag carried by both legs
pub const TRANSFER_CATEGORY: &str = "transfer";

/// One side of a transfer: a wallet and optionally a named account in it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub wallet: Wallet,
    pub account_id: Option<AccountId>,
    /// Free-text label used in the other leg's description
    pub label: Option<String>,
}

impl Endpoint {
    pub fn wallet(wallet: Wallet) -> Self {
        Self {
            wallet,
            account_id: None,
            label: None,
        }
    }

    pub fn account(account_id: AccountId) -> Self {
        Self {
            wallet: Wallet::Bank,
            account_id: Some(account_id),
            label: None,
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Transfer request from the API layer
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub user_id: UserId,
    pub amount: Decimal,
    pub from: Endpoint,
    pub to: Endpoint,
    /// Shared by both legs; defaults to now
    pub date: Option<DateTime<Utc>>,
    pub locale: Locale,
    /// Client idempotency key; server-generated when absent
    pub idempotency_key: Option<String>,
}

impl TransferRequest {
    pub fn new(user_id: UserId, amount: Decimal, from: Endpoint, to: Endpoint) -> Self {
        Self {
            user_id,
            amount,
            from,
            to,
            date: None,
            locale: Locale::default(),
            idempotency_key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn dated(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn localized(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }
}

/// The two records a transfer produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferLegs {
    pub expense: TransactionRecord,
    pub income: TransactionRecord,
}

/// Persisted marker of a committed transfer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferReceipt {
    pub transfer_id: TransferId,
    pub user_id: UserId,
    pub idempotency_key: String,
    pub amount: Decimal,
    pub expense_record_id: RecordId,
    pub income_record_id: RecordId,
    pub created_at: DateTime<Utc>,
}

impl TransferReceipt {
    pub fn new(key: String, legs: &TransferLegs, now: DateTime<Utc>) -> Self {
        Self {
            // Legs are built first and already carry the id
            transfer_id: legs.expense.transfer_id.unwrap_or_default(),
            user_id: legs.expense.user_id.clone(),
            idempotency_key: key,
            amount: legs.expense.amount,
            expense_record_id: legs.expense.id,
            income_record_id: legs.income.id,
            created_at: now,
        }
    }
}

impl fmt::Display for TransferReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transfer[{}] user={} key={} amount={}",
            self.transfer_id, self.user_id, self.idempotency_key, self.amount
        )
    }
}

/// What the caller gets back
#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub transfer_id: TransferId,
    pub idempotency_key: String,
    pub expense: TransactionRecord,
    pub income: TransactionRecord,
    pub profile: Profile,
    /// True when the key had already been committed and nothing was applied
    pub replayed: bool,
}
