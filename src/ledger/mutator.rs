//! Balance Mutator
//!
//! Turns record mutations into typed balance deltas. Deltas are only ever
//! applied as store-side increments; nothing here reads a current balance.
//!
//! ```text
//! create  →  +signed(new)
//! delete  →  -signed(old)
//! update  →  -signed(old) + signed(new)   (merged per field)
//! transfer→  signed(expense leg) + signed(income leg)
//! ```

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

use super::error::{LedgerError, LedgerResult};
use super::types::{AccountId, TransactionRecord, Wallet};

/// Closed selector of a balance scalar inside a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum BalanceField {
    Wallet(Wallet),
    Account(AccountId),
}

impl fmt::Display for BalanceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceField::Wallet(w) => write!(f, "balance.{w}"),
            BalanceField::Account(id) => write!(f, "accounts[{id}].balance"),
        }
    }
}

/// Atomic-delta command `{field, amount}` for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceDelta {
    pub field: BalanceField,
    pub amount: Decimal,
}

impl BalanceDelta {
    pub fn new(field: BalanceField, amount: Decimal) -> Self {
        Self { field, amount }
    }
}

/// Ordered, merged set of deltas. At most one entry per field, no zeros.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Adjustments {
    deltas: Vec<BalanceDelta>,
}

impl Adjustments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to `field`, folding into an existing entry
    pub fn push(&mut self, field: BalanceField, amount: Decimal) -> LedgerResult<()> {
        if let Some(existing) = self.deltas.iter_mut().find(|d| d.field == field) {
            existing.amount = existing
                .amount
                .checked_add(amount)
                .ok_or_else(|| LedgerError::InvalidInput(format!("{field} delta overflows")))?;
        } else {
            self.deltas.push(BalanceDelta::new(field, amount));
        }
        self.deltas.retain(|d| !d.amount.is_zero());
        Ok(())
    }

    /// Add a record's contribution, reversed when `reverse` is set
    fn push_record(&mut self, record: &TransactionRecord, reverse: bool) -> LedgerResult<()> {
        let amount = if reverse {
            -record.signed_amount()
        } else {
            record.signed_amount()
        };
        self.push(BalanceField::Wallet(record.wallet), amount)?;
        if let Some(account_id) = record.bank_account_id {
            self.push(BalanceField::Account(account_id), amount)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BalanceDelta> {
        self.deltas.iter()
    }

    /// Net amount for a wallet (zero if untouched)
    pub fn wallet_amount(&self, wallet: Wallet) -> Decimal {
        self.amount_for(BalanceField::Wallet(wallet))
    }

    pub fn amount_for(&self, field: BalanceField) -> Decimal {
        self.deltas
            .iter()
            .find(|d| d.field == field)
            .map(|d| d.amount)
            .unwrap_or(Decimal::ZERO)
    }

    /// Account deltas only
    pub fn account_deltas(&self) -> impl Iterator<Item = (AccountId, Decimal)> + '_ {
        self.deltas.iter().filter_map(|d| match d.field {
            BalanceField::Account(id) => Some((id, d.amount)),
            BalanceField::Wallet(_) => None,
        })
    }
}

/// Deltas for persisting a new record
pub fn for_create(record: &TransactionRecord) -> LedgerResult<Adjustments> {
    let mut adj = Adjustments::new();
    adj.push_record(record, false)?;
    Ok(adj)
}

/// Compensation for removing a record
pub fn for_delete(existing: &TransactionRecord) -> LedgerResult<Adjustments> {
    let mut adj = Adjustments::new();
    adj.push_record(existing, true)?;
    Ok(adj)
}

/// Reverse the old contribution, apply the new one. Same-field terms merge
/// into one combined delta, so a description-only edit yields no deltas.
pub fn for_update(
    existing: &TransactionRecord,
    replacement: &TransactionRecord,
) -> LedgerResult<Adjustments> {
    let mut adj = Adjustments::new();
    adj.push_record(existing, true)?;
    adj.push_record(replacement, false)?;
    Ok(adj)
}

/// Net effect of both transfer legs. Equal wallets cancel at wallet level,
/// named accounts still move.
pub fn for_transfer(
    expense_leg: &TransactionRecord,
    income_leg: &TransactionRecord,
) -> LedgerResult<Adjustments> {
    let mut adj = Adjustments::new();
    adj.push_record(expense_leg, false)?;
    adj.push_record(income_leg, false)?;
    Ok(adj)
}
