//! Transfer Coordinator
//!
//! Builds the expense/income leg pair for a move between wallets or bank
//! accounts and commits legs, receipt and balance adjustments as one unit.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::ledger::error::{LedgerError, LedgerResult};
use crate::ledger::mutator;
use crate::ledger::store::{LedgerStore, TransferCommit};
use crate::ledger::types::{
    Profile, TransactionInput, TransactionRecord, TransactionType, UserId, Wallet, check_amount,
};

use super::locale::Locale;
use super::types::{
    Endpoint, TRANSFER_CATEGORY, TransferId, TransferLegs, TransferOutcome, TransferReceipt,
    TransferRequest,
};

/// Longest accepted client idempotency key
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

pub struct TransferCoordinator {
    store: Arc<dyn LedgerStore>,
}

impl TransferCoordinator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Execute a transfer, or replay the outcome of an earlier one with the
    /// same idempotency key
    pub async fn transfer(&self, req: TransferRequest) -> LedgerResult<TransferOutcome> {
        // === Validation: nothing is written on failure ===
        check_amount(req.amount)?;
        check_endpoint("from", &req.from)?;
        check_endpoint("to", &req.to)?;

        let key = match req.idempotency_key.as_deref().map(str::trim) {
            Some("") => {
                return Err(LedgerError::InvalidInput(
                    "idempotency key must not be empty".to_string(),
                ));
            }
            Some(k) if k.len() > MAX_IDEMPOTENCY_KEY_LEN => {
                return Err(LedgerError::InvalidInput(format!(
                    "idempotency key longer than {MAX_IDEMPOTENCY_KEY_LEN} characters"
                )));
            }
            Some(k) => k.to_string(),
            None => ulid::Ulid::new().to_string(),
        };

        if let Some((receipt, legs)) = self.store.find_transfer(&req.user_id, &key).await? {
            return self.replayed(&req.user_id, receipt, legs).await;
        }

        let profile = self.store.get_profile(&req.user_id).await?;
        let names = LegNames::resolve(&req, profile.as_ref())?;

        // === Build legs ===
        let now = Utc::now();
        let date = req.date.unwrap_or(now);
        let transfer_id = TransferId::new();

        let leg = |tx_type: TransactionType, endpoint: &Endpoint, description: String| {
            let mut input = TransactionInput::new(req.amount, tx_type)
                .wallet(endpoint.wallet)
                .described(description, TRANSFER_CATEGORY)
                .dated(date);
            if let Some(account_id) = endpoint.account_id {
                input = input.account(account_id);
            }
            let mut record = TransactionRecord::new(req.user_id.clone(), input, now);
            record.transfer_id = Some(transfer_id);
            record
        };

        let legs = TransferLegs {
            expense: leg(
                TransactionType::Expense,
                &req.from,
                req.locale.outgoing(&names.destination),
            ),
            income: leg(
                TransactionType::Income,
                &req.to,
                req.locale.incoming(&names.source),
            ),
        };
        let adjustments = mutator::for_transfer(&legs.expense, &legs.income)?;
        let receipt = TransferReceipt::new(key, &legs, now);

        // === Commit ===
        let commit = self
            .store
            .commit_transfer(&receipt, &legs, &adjustments)
            .await
            .inspect_err(|e| {
                if let LedgerError::WriteFailed(detail) = e {
                    error!(
                        transfer_id = %transfer_id,
                        user_id = %req.user_id,
                        detail = %detail,
                        "Transfer commit failed"
                    );
                }
            })?;

        match commit {
            TransferCommit::Applied => {
                info!(
                    deltas = adjustments.len(),
                    locale = req.locale.as_str(),
                    "{} committed: {} -> {}",
                    receipt,
                    describe(&req.from),
                    describe(&req.to)
                );
                let profile = self.current_profile(&req.user_id).await?;
                Ok(TransferOutcome {
                    transfer_id,
                    idempotency_key: receipt.idempotency_key,
                    expense: legs.expense,
                    income: legs.income,
                    profile,
                    replayed: false,
                })
            }
            // Lost the race to a twin request with the same key
            TransferCommit::Replayed { receipt, legs } => {
                self.replayed(&req.user_id, receipt, legs).await
            }
        }
    }

    async fn replayed(
        &self,
        user_id: &UserId,
        receipt: TransferReceipt,
        legs: TransferLegs,
    ) -> LedgerResult<TransferOutcome> {
        warn!(
            transfer_id = %receipt.transfer_id,
            key = %receipt.idempotency_key,
            "Duplicate transfer key, replaying original outcome"
        );
        let profile = self.current_profile(user_id).await?;
        Ok(TransferOutcome {
            transfer_id: receipt.transfer_id,
            idempotency_key: receipt.idempotency_key,
            expense: legs.expense,
            income: legs.income,
            profile,
            replayed: true,
        })
    }

    /// Absent profile reads as all zeros
    async fn current_profile(&self, user_id: &UserId) -> LedgerResult<Profile> {
        Ok(self
            .store
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| Profile::empty(user_id.clone())))
    }
}

fn check_endpoint(side: &str, endpoint: &Endpoint) -> LedgerResult<()> {
    if endpoint.account_id.is_some() && endpoint.wallet != Wallet::Bank {
        return Err(LedgerError::InvalidInput(format!(
            "{side}: bank account requires the bank wallet"
        )));
    }
    Ok(())
}

fn describe(endpoint: &Endpoint) -> String {
    match endpoint.account_id {
        Some(id) => format!("{}[{id}]", endpoint.wallet),
        None => endpoint.wallet.to_string(),
    }
}

/// Names each leg's description uses for the other side
struct LegNames {
    source: String,
    destination: String,
}

impl LegNames {
    /// Explicit label, else account name, else wallet word. Fails on
    /// accounts the profile does not have.
    fn resolve(req: &TransferRequest, profile: Option<&Profile>) -> LedgerResult<Self> {
        Ok(Self {
            source: endpoint_name(&req.from, profile, req.locale)?,
            destination: endpoint_name(&req.to, profile, req.locale)?,
        })
    }
}

fn endpoint_name(endpoint: &Endpoint, profile: Option<&Profile>, locale: Locale) -> LedgerResult<String> {
    let account_name = match endpoint.account_id {
        Some(id) => {
            let account = profile
                .ok_or_else(|| LedgerError::InvalidInput(format!("unknown bank account: {id}")))?
                .require_account(id)?;
            Some(account.name.clone())
        }
        None => None,
    };

    Ok(endpoint
        .label
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .or(account_name)
        .unwrap_or_else(|| locale.wallet_name(endpoint.wallet).to_string()))
}
