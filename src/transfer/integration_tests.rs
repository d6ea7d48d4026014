//! Integration Tests for Transfers
//!
//! Drive the coordinator and the ledger over one in-process store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::ledger::error::LedgerError;
use crate::ledger::memory::MemoryLedgerStore;
use crate::ledger::service::TransactionLedger;
use crate::ledger::store::LedgerStore;
use crate::ledger::types::{AccountId, TransactionInput, TransactionType, UserId, Wallet};
use crate::transfer::coordinator::TransferCoordinator;
use crate::transfer::locale::Locale;
use crate::transfer::types::{Endpoint, TRANSFER_CATEGORY, TransferRequest};

struct TestHarness {
    coordinator: TransferCoordinator,
    ledger: TransactionLedger,
    store: Arc<MemoryLedgerStore>,
    user: UserId,
}

impl TestHarness {
    fn new() -> Self {
        let store = Arc::new(MemoryLedgerStore::new());
        Self {
            coordinator: TransferCoordinator::new(store.clone()),
            ledger: TransactionLedger::new(store.clone()),
            store,
            user: UserId::new("user-2001"),
        }
    }

    fn request(&self, amount: Decimal, from: Endpoint, to: Endpoint) -> TransferRequest {
        TransferRequest::new(self.user.clone(), amount, from, to)
    }

    async fn fund_bank(&self, amount: Decimal, account: Option<AccountId>) {
        let mut input = TransactionInput::new(amount, TransactionType::Income);
        if let Some(id) = account {
            input = input.account(id);
        }
        self.ledger.create(&self.user, input).await.unwrap();
    }

    async fn add_account(&self, name: &str) -> AccountId {
        let profile = self
            .ledger
            .add_account(&self.user, name, serde_json::Value::Null)
            .await
            .unwrap();
        profile
            .accounts
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.id)
            .unwrap()
    }

    async fn assert_consistent(&self) {
        let audit = self.ledger.audit(&self.user).await.unwrap();
        assert!(audit.is_clean(), "balance drift: {:?}", audit.fields);
    }
}

// ========================================================================
// Happy Path Tests
// ========================================================================

/// Bank → cash: bank 1000 → 800, cash 0 → 200, legs share the date
#[tokio::test]
async fn test_cross_wallet_transfer() {
    let h = TestHarness::new();
    h.fund_bank(dec!(1000), None).await;

    let date = "2024-06-15T08:30:00Z".parse::<DateTime<Utc>>().unwrap();
    let outcome = h
        .coordinator
        .transfer(
            h.request(dec!(200), Endpoint::wallet(Wallet::Bank), Endpoint::wallet(Wallet::Cash))
                .dated(date),
        )
        .await
        .unwrap();

    assert!(!outcome.replayed);
    assert_eq!(outcome.profile.balance.bank, dec!(800));
    assert_eq!(outcome.profile.balance.cash, dec!(200));

    assert_eq!(outcome.expense.date, date);
    assert_eq!(outcome.income.date, date);
    assert_eq!(outcome.expense.tx_type, TransactionType::Expense);
    assert_eq!(outcome.income.tx_type, TransactionType::Income);
    assert_eq!(outcome.expense.category, TRANSFER_CATEGORY);
    assert_eq!(outcome.expense.transfer_id, Some(outcome.transfer_id));
    assert_eq!(outcome.income.transfer_id, Some(outcome.transfer_id));
    assert_eq!(outcome.expense.description, "Transfer to cash");
    assert_eq!(outcome.income.description, "Transfer from bank");

    h.assert_consistent().await;
}

/// Account A → account B inside bank: wallet untouched, accounts move
#[tokio::test]
async fn test_same_wallet_account_transfer() {
    let h = TestHarness::new();
    let a = h.add_account("BCA").await;
    let b = h.add_account("Mandiri").await;
    h.fund_bank(dec!(500), Some(a)).await;
    h.fund_bank(dec!(100), Some(b)).await;

    let outcome = h
        .coordinator
        .transfer(
            h.request(dec!(100), Endpoint::account(a), Endpoint::account(b))
                .localized(Locale::Id),
        )
        .await
        .unwrap();

    let profile = outcome.profile;
    assert_eq!(profile.balance.bank, dec!(600));
    assert_eq!(profile.account(a).unwrap().balance, dec!(400));
    assert_eq!(profile.account(b).unwrap().balance, dec!(200));
    assert_eq!(outcome.expense.description, "Transfer ke Mandiri");
    assert_eq!(outcome.income.description, "Transfer dari BCA");

    h.assert_consistent().await;
}

/// Explicit labels win over account names
#[tokio::test]
async fn test_labels_override_names() {
    let h = TestHarness::new();
    let a = h.add_account("BCA").await;

    let outcome = h
        .coordinator
        .transfer(h.request(
            dec!(5),
            Endpoint::wallet(Wallet::Cash).labelled("Wallet in car"),
            Endpoint::account(a).labelled("Rainy-day fund"),
        ))
        .await
        .unwrap();

    assert_eq!(outcome.expense.description, "Transfer to Rainy-day fund");
    assert_eq!(outcome.income.description, "Transfer from Wallet in car");
}

// ========================================================================
// Concurrency & Idempotency
// ========================================================================

/// Two concurrent transfers from bank: no lost update
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_no_lost_update() {
    let h = Arc::new(TestHarness::new());
    h.fund_bank(dec!(1000), None).await;

    let mut handles = Vec::new();
    for amount in [dec!(50), dec!(30)] {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            let req = h.request(amount, Endpoint::wallet(Wallet::Bank), Endpoint::wallet(Wallet::Cash));
            h.coordinator.transfer(req).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let profile = h.store.get_profile(&h.user).await.unwrap().unwrap();
    assert_eq!(profile.balance.bank, dec!(920));
    assert_eq!(profile.balance.cash, dec!(80));
    h.assert_consistent().await;
}

/// Same key twice: one application, original legs returned
#[tokio::test]
async fn test_replay_applies_once() {
    let h = TestHarness::new();
    h.fund_bank(dec!(300), None).await;

    let req = h
        .request(dec!(120), Endpoint::wallet(Wallet::Bank), Endpoint::wallet(Wallet::Cash))
        .with_key("client-req-7");

    let first = h.coordinator.transfer(req.clone()).await.unwrap();
    let second = h.coordinator.transfer(req).await.unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(second.transfer_id, first.transfer_id);
    assert_eq!(second.expense, first.expense);
    assert_eq!(second.income, first.income);
    assert_eq!(second.profile.balance.bank, dec!(180));
    assert_eq!(second.profile.balance.cash, dec!(120));

    // Two legs plus the funding record
    assert_eq!(h.store.list_records(&h.user).await.unwrap().len(), 3);
    h.assert_consistent().await;
}

/// Concurrent twins with one key race on the receipt; one wins
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_replay_applies_once() {
    let h = Arc::new(TestHarness::new());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            let req = h
                .request(dec!(10), Endpoint::wallet(Wallet::Cash), Endpoint::wallet(Wallet::Bank))
                .with_key("same-key");
            h.coordinator.transfer(req).await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        if !handle.await.unwrap().unwrap().replayed {
            applied += 1;
        }
    }
    assert_eq!(applied, 1);

    let profile = h.store.get_profile(&h.user).await.unwrap().unwrap();
    assert_eq!(profile.balance.bank, dec!(10));
    assert_eq!(profile.balance.cash, dec!(-10));
}

// ========================================================================
// Edge Cases
// ========================================================================

/// Cash → cash nets to nothing: legs are written, no profile is created
#[tokio::test]
async fn test_cash_to_cash_writes_no_profile() {
    let h = TestHarness::new();

    let outcome = h
        .coordinator
        .transfer(h.request(dec!(15), Endpoint::wallet(Wallet::Cash), Endpoint::wallet(Wallet::Cash)))
        .await
        .unwrap();

    assert_eq!(outcome.profile.balance.cash, Decimal::ZERO);
    assert!(h.store.get_profile(&h.user).await.unwrap().is_none());
    assert_eq!(h.store.list_records(&h.user).await.unwrap().len(), 2);
    h.assert_consistent().await;
}

/// Unknown account: rejected before anything is written
#[tokio::test]
async fn test_unknown_account_writes_nothing() {
    let h = TestHarness::new();
    h.fund_bank(dec!(50), None).await;

    let err = h
        .coordinator
        .transfer(h.request(
            dec!(20),
            Endpoint::wallet(Wallet::Bank),
            Endpoint::account(AccountId::new()),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InvalidInput(_)));
    assert_eq!(h.store.list_records(&h.user).await.unwrap().len(), 1);
    let profile = h.store.get_profile(&h.user).await.unwrap().unwrap();
    assert_eq!(profile.balance.bank, dec!(50));
}

/// Store failure mid-transfer leaves no partial state
#[tokio::test]
async fn test_write_failure_leaves_nothing() {
    let h = TestHarness::new();
    h.fund_bank(dec!(400), None).await;

    h.store.set_fail_writes(true);
    let err = h
        .coordinator
        .transfer(h.request(dec!(40), Endpoint::wallet(Wallet::Bank), Endpoint::wallet(Wallet::Cash)))
        .await
        .unwrap_err();
    h.store.set_fail_writes(false);

    assert!(matches!(err, LedgerError::WriteFailed(_)));
    assert_eq!(h.store.list_records(&h.user).await.unwrap().len(), 1);
    let profile = h.store.get_profile(&h.user).await.unwrap().unwrap();
    assert_eq!(profile.balance.bank, dec!(400));
    assert_eq!(profile.balance.cash, Decimal::ZERO);
}
