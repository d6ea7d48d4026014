//! PostgreSQL ledger store
//!
//! Each trait call runs in one database transaction. Balance writes are
//! `SET col = col + $n`; record writes that depend on a prior read lock the
//! row (`FOR UPDATE`) and check its version first.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{PgConnection, Row};

use super::error::{LedgerError, LedgerResult};
use super::mutator::Adjustments;
use super::store::{CasOutcome, LedgerStore, TransferCommit};
use super::types::{
    AccountId, BankAccount, Profile, RecordId, TransactionRecord, TransactionType, UserId, Wallet,
    WalletBalances,
};
use crate::transfer::types::{TransferId, TransferLegs, TransferReceipt};

const RECORD_COLUMNS: &str = "record_id, user_id, amount, tx_type, wallet, bank_account_id, \
     description, category, tx_date, created_at, version, transfer_id";

/// sqlx-backed store
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run embedded migrations
    pub async fn migrate(&self) -> LedgerResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn corrupt(column: &str, value: impl std::fmt::Display) -> LedgerError {
    LedgerError::WriteFailed(format!("corrupt {column} in store: {value}"))
}

/// Convert database row to TransactionRecord
fn row_to_record(row: &PgRow) -> LedgerResult<TransactionRecord> {
    let record_id: String = row.try_get("record_id")?;
    let id: RecordId = record_id
        .parse()
        .map_err(|_| corrupt("record_id", &record_id))?;

    let tx_type_id: i16 = row.try_get("tx_type")?;
    let tx_type = TransactionType::from_id(tx_type_id).ok_or_else(|| corrupt("tx_type", tx_type_id))?;

    let wallet_id: i16 = row.try_get("wallet")?;
    let wallet = Wallet::from_id(wallet_id).ok_or_else(|| corrupt("wallet", wallet_id))?;

    let bank_account_id = match row.try_get::<Option<String>, _>("bank_account_id")? {
        Some(s) => Some(s.parse::<AccountId>().map_err(|_| corrupt("bank_account_id", &s))?),
        None => None,
    };

    let transfer_id = match row.try_get::<Option<String>, _>("transfer_id")? {
        Some(s) => Some(s.parse::<TransferId>().map_err(|_| corrupt("transfer_id", &s))?),
        None => None,
    };

    Ok(TransactionRecord {
        id,
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        amount: row.try_get("amount")?,
        tx_type,
        wallet,
        bank_account_id,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        date: row.try_get("tx_date")?,
        created_at: row.try_get("created_at")?,
        version: row.try_get("version")?,
        transfer_id,
    })
}

async fn fetch_record(
    conn: &mut PgConnection,
    user_id: &UserId,
    id: RecordId,
) -> LedgerResult<Option<TransactionRecord>> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM transactions_tb WHERE record_id = $1 AND user_id = $2");
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .bind(user_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_record).transpose()
}

async fn load_profile(conn: &mut PgConnection, user_id: &UserId) -> LedgerResult<Option<Profile>> {
    let row = sqlx::query(
        "SELECT bank_balance, cash_balance, budget FROM profiles_tb WHERE user_id = $1",
    )
    .bind(user_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let account_rows = sqlx::query(
        r#"
        SELECT account_id, name, balance, metadata
        FROM bank_accounts_tb
        WHERE user_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(user_id.as_str())
    .fetch_all(&mut *conn)
    .await?;

    let mut accounts = Vec::with_capacity(account_rows.len());
    for r in &account_rows {
        let account_id: String = r.try_get("account_id")?;
        accounts.push(BankAccount {
            id: account_id
                .parse()
                .map_err(|_| corrupt("account_id", &account_id))?,
            name: r.try_get("name")?,
            balance: r.try_get("balance")?,
            metadata: r.try_get("metadata")?,
        });
    }

    Ok(Some(Profile {
        user_id: user_id.clone(),
        balance: WalletBalances {
            bank: row.try_get("bank_balance")?,
            cash: row.try_get("cash_balance")?,
        },
        accounts,
        budget: row.try_get("budget")?,
    }))
}

async fn load_profile_or_empty(conn: &mut PgConnection, user_id: &UserId) -> LedgerResult<Profile> {
    Ok(load_profile(conn, user_id)
        .await?
        .unwrap_or_else(|| Profile::empty(user_id.clone())))
}

/// Idempotent create: a concurrent twin hits the primary key and does nothing
async fn upsert_profile(conn: &mut PgConnection, user_id: &UserId) -> LedgerResult<()> {
    sqlx::query("INSERT INTO profiles_tb (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Atomic increments for every field of `adjustments`
async fn apply_adjustments(
    conn: &mut PgConnection,
    user_id: &UserId,
    adjustments: &Adjustments,
) -> LedgerResult<()> {
    if adjustments.is_empty() {
        return Ok(());
    }
    upsert_profile(conn, user_id).await?;

    // Profile row first serializes every balance write of this user, so the
    // account rows below can never be locked in conflicting orders.
    sqlx::query("SELECT 1 FROM profiles_tb WHERE user_id = $1 FOR UPDATE")
        .bind(user_id.as_str())
        .execute(&mut *conn)
        .await?;

    let bank = adjustments.wallet_amount(Wallet::Bank);
    let cash = adjustments.wallet_amount(Wallet::Cash);
    if !bank.is_zero() || !cash.is_zero() {
        sqlx::query(
            r#"
            UPDATE profiles_tb
            SET bank_balance = bank_balance + $2,
                cash_balance = cash_balance + $3,
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .bind(bank)
        .bind(cash)
        .execute(&mut *conn)
        .await?;
    }

    let mut account_deltas: Vec<_> = adjustments.account_deltas().collect();
    account_deltas.sort_by_key(|(id, _)| *id);
    for (account_id, amount) in account_deltas {
        let result = sqlx::query(
            r#"
            UPDATE bank_accounts_tb
            SET balance = balance + $3
            WHERE user_id = $1 AND account_id = $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(account_id.to_string())
        .bind(amount)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::InvalidInput(format!(
                "unknown bank account: {account_id}"
            )));
        }
    }
    Ok(())
}

async fn insert_record_row(conn: &mut PgConnection, record: &TransactionRecord) -> LedgerResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions_tb
            (record_id, user_id, amount, tx_type, wallet, bank_account_id,
             description, category, tx_date, created_at, version, transfer_id)
        VALUES
            ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.user_id.as_str())
    .bind(record.amount)
    .bind(record.tx_type.id())
    .bind(record.wallet.id())
    .bind(record.bank_account_id.map(|id| id.to_string()))
    .bind(&record.description)
    .bind(&record.category)
    .bind(record.date)
    .bind(record.created_at)
    .bind(record.version)
    .bind(record.transfer_id.map(|id| id.to_string()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Lock the row and compare its version with what the caller observed
async fn lock_if_current(conn: &mut PgConnection, expected: &TransactionRecord) -> LedgerResult<bool> {
    let version: Option<i64> = sqlx::query_scalar(
        "SELECT version FROM transactions_tb WHERE record_id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(expected.id.to_string())
    .bind(expected.user_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(version == Some(expected.version))
}

fn row_to_receipt(row: &PgRow) -> LedgerResult<TransferReceipt> {
    let transfer_id: String = row.try_get("transfer_id")?;
    let expense: String = row.try_get("expense_record_id")?;
    let income: String = row.try_get("income_record_id")?;

    Ok(TransferReceipt {
        transfer_id: transfer_id
            .parse()
            .map_err(|_| corrupt("transfer_id", &transfer_id))?,
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        idempotency_key: row.try_get("idempotency_key")?,
        amount: row.try_get("amount")?,
        expense_record_id: expense
            .parse()
            .map_err(|_| corrupt("expense_record_id", &expense))?,
        income_record_id: income
            .parse()
            .map_err(|_| corrupt("income_record_id", &income))?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn get_profile(&self, user_id: &UserId) -> LedgerResult<Option<Profile>> {
        let mut conn = self.pool.acquire().await?;
        load_profile(&mut conn, user_id).await
    }

    async fn get_or_create_profile(&self, user_id: &UserId) -> LedgerResult<Profile> {
        let mut tx = self.pool.begin().await?;
        upsert_profile(&mut tx, user_id).await?;
        let profile = load_profile_or_empty(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(profile)
    }

    async fn apply_deltas(
        &self,
        user_id: &UserId,
        adjustments: &Adjustments,
    ) -> LedgerResult<Profile> {
        let mut tx = self.pool.begin().await?;
        apply_adjustments(&mut tx, user_id, adjustments).await?;
        let profile = load_profile_or_empty(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(profile)
    }

    async fn add_account(&self, user_id: &UserId, account: &BankAccount) -> LedgerResult<Profile> {
        let mut tx = self.pool.begin().await?;
        upsert_profile(&mut tx, user_id).await?;

        // Serialize position allocation per user
        sqlx::query("SELECT user_id FROM profiles_tb WHERE user_id = $1 FOR UPDATE")
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO bank_accounts_tb (account_id, user_id, position, name, balance, metadata)
            VALUES (
                $1, $2,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM bank_accounts_tb WHERE user_id = $2),
                $3, 0, $4
            )
            "#,
        )
        .bind(account.id.to_string())
        .bind(user_id.as_str())
        .bind(&account.name)
        .bind(&account.metadata)
        .execute(&mut *tx)
        .await?;

        let profile = load_profile_or_empty(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(profile)
    }

    async fn set_budget(&self, user_id: &UserId, budget: Option<Decimal>) -> LedgerResult<Profile> {
        let mut tx = self.pool.begin().await?;
        upsert_profile(&mut tx, user_id).await?;
        sqlx::query("UPDATE profiles_tb SET budget = $2, updated_at = NOW() WHERE user_id = $1")
            .bind(user_id.as_str())
            .bind(budget)
            .execute(&mut *tx)
            .await?;
        let profile = load_profile_or_empty(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(profile)
    }

    async fn get_record(
        &self,
        user_id: &UserId,
        id: RecordId,
    ) -> LedgerResult<Option<TransactionRecord>> {
        let mut conn = self.pool.acquire().await?;
        fetch_record(&mut conn, user_id, id).await
    }

    async fn recent_records(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> LedgerResult<Vec<TransactionRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM transactions_tb WHERE user_id = $1 \
             ORDER BY tx_date DESC, created_at DESC, record_id DESC LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_str())
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn list_records(&self, user_id: &UserId) -> LedgerResult<Vec<TransactionRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM transactions_tb WHERE user_id = $1");
        let rows = sqlx::query(&sql)
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn insert_record(
        &self,
        record: &TransactionRecord,
        adjustments: &Adjustments,
    ) -> LedgerResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_record_row(&mut tx, record).await?;
        apply_adjustments(&mut tx, &record.user_id, adjustments).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn replace_record(
        &self,
        expected: &TransactionRecord,
        replacement: &TransactionRecord,
        adjustments: &Adjustments,
    ) -> LedgerResult<CasOutcome> {
        let mut tx = self.pool.begin().await?;
        if !lock_if_current(&mut tx, expected).await? {
            tx.rollback().await?;
            return Ok(CasOutcome::Stale);
        }

        // Compensate first, then replace
        apply_adjustments(&mut tx, &expected.user_id, adjustments).await?;

        sqlx::query(
            r#"
            UPDATE transactions_tb
            SET amount = $3, tx_type = $4, wallet = $5, bank_account_id = $6,
                description = $7, category = $8, tx_date = $9, version = $10
            WHERE record_id = $1 AND user_id = $2
            "#,
        )
        .bind(replacement.id.to_string())
        .bind(replacement.user_id.as_str())
        .bind(replacement.amount)
        .bind(replacement.tx_type.id())
        .bind(replacement.wallet.id())
        .bind(replacement.bank_account_id.map(|id| id.to_string()))
        .bind(&replacement.description)
        .bind(&replacement.category)
        .bind(replacement.date)
        .bind(replacement.version)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CasOutcome::Applied)
    }

    async fn remove_record(
        &self,
        expected: &TransactionRecord,
        adjustments: &Adjustments,
    ) -> LedgerResult<CasOutcome> {
        let mut tx = self.pool.begin().await?;
        if !lock_if_current(&mut tx, expected).await? {
            tx.rollback().await?;
            return Ok(CasOutcome::Stale);
        }

        // Refund first, then remove
        apply_adjustments(&mut tx, &expected.user_id, adjustments).await?;

        sqlx::query("DELETE FROM transactions_tb WHERE record_id = $1 AND user_id = $2")
            .bind(expected.id.to_string())
            .bind(expected.user_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(CasOutcome::Applied)
    }

    async fn commit_transfer(
        &self,
        receipt: &TransferReceipt,
        legs: &TransferLegs,
        adjustments: &Adjustments,
    ) -> LedgerResult<TransferCommit> {
        let mut tx = self.pool.begin().await?;

        // IDEMPOTENCY: a concurrent twin blocks on the unique key, then sees
        // zero rows affected once the first commits
        let inserted = sqlx::query(
            r#"
            INSERT INTO transfers_tb
                (transfer_id, user_id, idempotency_key, amount,
                 expense_record_id, income_record_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, idempotency_key) DO NOTHING
            "#,
        )
        .bind(receipt.transfer_id.to_string())
        .bind(receipt.user_id.as_str())
        .bind(&receipt.idempotency_key)
        .bind(receipt.amount)
        .bind(receipt.expense_record_id.to_string())
        .bind(receipt.income_record_id.to_string())
        .bind(receipt.created_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            let (receipt, legs) = self
                .find_transfer(&receipt.user_id, &receipt.idempotency_key)
                .await?
                .ok_or_else(|| {
                    LedgerError::WriteFailed(format!(
                        "transfer key {} conflicted but no receipt found",
                        receipt.idempotency_key
                    ))
                })?;
            return Ok(TransferCommit::Replayed { receipt, legs });
        }

        insert_record_row(&mut tx, &legs.expense).await?;
        insert_record_row(&mut tx, &legs.income).await?;
        apply_adjustments(&mut tx, &receipt.user_id, adjustments).await?;

        tx.commit().await?;
        Ok(TransferCommit::Applied)
    }

    async fn find_transfer(
        &self,
        user_id: &UserId,
        idempotency_key: &str,
    ) -> LedgerResult<Option<(TransferReceipt, TransferLegs)>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query(
            r#"
            SELECT transfer_id, user_id, idempotency_key, amount,
                   expense_record_id, income_record_id, created_at
            FROM transfers_tb
            WHERE user_id = $1 AND idempotency_key = $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(idempotency_key)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let receipt = row_to_receipt(&row)?;

        let expense = fetch_record(&mut conn, user_id, receipt.expense_record_id).await?;
        let income = fetch_record(&mut conn, user_id, receipt.income_record_id).await?;
        match (expense, income) {
            (Some(expense), Some(income)) => Ok(Some((receipt, TransferLegs { expense, income }))),
            _ => Err(LedgerError::NotFound(format!(
                "legs of transfer {}",
                receipt.transfer_id
            ))),
        }
    }
}
