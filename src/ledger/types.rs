//! Ledger Core Types
//!
//! Records, wallets, bank accounts and the per-user profile that aggregates them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::LedgerError;

/// Decimal places kept by the `NUMERIC(30, 8)` columns
pub const AMOUNT_SCALE: u32 = 8;

/// Exclusive upper bound (10^22) for amounts and balances
pub const AMOUNT_LIMIT: Decimal = Decimal::from_parts(0xb240_0000, 0x19e0_c9ba, 0x21e, false, 0);

/// Storable magnitude: at most `AMOUNT_SCALE` decimals and below `AMOUNT_LIMIT`.
/// Trailing zeros do not count towards the scale.
pub fn check_storable(what: &str, value: Decimal) -> Result<(), LedgerError> {
    if value.normalize().scale() > AMOUNT_SCALE {
        return Err(LedgerError::InvalidInput(format!(
            "{what} has more than {AMOUNT_SCALE} decimal places"
        )));
    }
    if value.abs() >= AMOUNT_LIMIT {
        return Err(LedgerError::InvalidInput(format!("{what} is out of range")));
    }
    Ok(())
}

/// Positive and storable
pub fn check_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidInput(
            "amount must be greater than zero".to_string(),
        ));
    }
    check_storable("amount", amount)
}

/// Opaque, stable user identifier supplied by the authenticator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(ulid::Ulid);

        impl $name {
            /// Generate a new unique id
            pub fn new() -> Self {
                Self(ulid::Ulid::new())
            }

            pub fn inner(&self) -> ulid::Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(ulid::Ulid::from_string(s)?))
            }
        }
    };
}

ulid_id!(
    /// Transaction record id (ULID, sortable by creation time)
    RecordId
);

ulid_id!(
    /// Bank sub-account id, unique within a profile
    AccountId
);

ulid_id!(
    /// Transfer id shared by both legs of a transfer
    TransferId
);

/// Direction of a transaction record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum TransactionType {
    Income = 1,
    Expense = 2,
}

impl TransactionType {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(TransactionType::Income),
            2 => Some(TransactionType::Expense),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level balance bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum Wallet {
    #[default]
    Bank = 1,
    Cash = 2,
}

impl Wallet {
    pub const ALL: [Wallet; 2] = [Wallet::Bank, Wallet::Cash];

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Wallet::Bank),
            2 => Some(Wallet::Cash),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Wallet::Bank => "bank",
            Wallet::Cash => "cash",
        }
    }
}

impl fmt::Display for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied fields of a record (create and full-replacement update)
#[derive(Debug, Clone)]
pub struct TransactionInput {
    pub amount: Decimal,
    pub tx_type: TransactionType,
    /// Defaults to `Wallet::Bank` when absent
    pub wallet: Option<Wallet>,
    pub bank_account_id: Option<AccountId>,
    pub description: String,
    pub category: String,
    /// Defaults to now on create, to the existing date on update
    pub date: Option<DateTime<Utc>>,
}

impl TransactionInput {
    pub fn new(amount: Decimal, tx_type: TransactionType) -> Self {
        Self {
            amount,
            tx_type,
            wallet: None,
            bank_account_id: None,
            description: String::new(),
            category: String::new(),
            date: None,
        }
    }

    pub fn wallet(mut self, wallet: Wallet) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn account(mut self, account_id: AccountId) -> Self {
        self.bank_account_id = Some(account_id);
        self
    }

    pub fn described(mut self, description: impl Into<String>, category: impl Into<String>) -> Self {
        self.description = description.into();
        self.category = category.into();
        self
    }

    pub fn dated(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    #[inline]
    pub fn effective_wallet(&self) -> Wallet {
        self.wallet.unwrap_or_default()
    }

    /// Shape checks that need no store access
    pub fn validate(&self) -> Result<(), LedgerError> {
        check_amount(self.amount)?;
        if self.bank_account_id.is_some() && self.effective_wallet() != Wallet::Bank {
            return Err(LedgerError::InvalidInput(
                "bank account requires the bank wallet".to_string(),
            ));
        }
        Ok(())
    }
}

/// A persisted income or expense entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: RecordId,
    pub user_id: UserId,
    /// Always positive; sign comes from `tx_type`
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub wallet: Wallet,
    pub bank_account_id: Option<AccountId>,
    pub description: String,
    pub category: String,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped on every replace
    pub version: i64,
    /// Set on both legs of a transfer
    pub transfer_id: Option<TransferId>,
}

impl TransactionRecord {
    /// Build a fresh record (version 1) from validated input
    pub fn new(user_id: UserId, input: TransactionInput, now: DateTime<Utc>) -> Self {
        let wallet = input.effective_wallet();
        Self {
            id: RecordId::new(),
            user_id,
            amount: input.amount,
            tx_type: input.tx_type,
            wallet,
            bank_account_id: input.bank_account_id,
            description: input.description,
            category: input.category,
            date: input.date.unwrap_or(now),
            created_at: now,
            version: 1,
            transfer_id: None,
        }
    }

    /// Replacement content for an update: identity fields are carried over
    pub fn revised(&self, input: TransactionInput) -> Self {
        let wallet = input.effective_wallet();
        Self {
            id: self.id,
            user_id: self.user_id.clone(),
            amount: input.amount,
            tx_type: input.tx_type,
            wallet,
            bank_account_id: input.bank_account_id,
            description: input.description,
            category: input.category,
            date: input.date.unwrap_or(self.date),
            created_at: self.created_at,
            version: self.version + 1,
            transfer_id: self.transfer_id,
        }
    }

    /// Contribution of this record to its wallet and account balances
    #[inline]
    pub fn signed_amount(&self) -> Decimal {
        match self.tx_type {
            TransactionType::Income => self.amount,
            TransactionType::Expense => -self.amount,
        }
    }
}

impl fmt::Display for TransactionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Record[{}] user={} {} {} wallet={} v{}",
            self.id, self.user_id, self.tx_type, self.amount, self.wallet, self.version
        )
    }
}

/// Named sub-ledger nested under the bank wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: AccountId,
    pub name: String,
    pub balance: Decimal,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl BankAccount {
    pub fn new(name: impl Into<String>, metadata: serde_json::Value) -> Self {
        Self {
            id: AccountId::new(),
            name: name.into(),
            balance: Decimal::ZERO,
            metadata,
        }
    }
}

/// Wallet balance map
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalances {
    pub bank: Decimal,
    pub cash: Decimal,
}

impl WalletBalances {
    pub fn get(&self, wallet: Wallet) -> Decimal {
        match wallet {
            Wallet::Bank => self.bank,
            Wallet::Cash => self.cash,
        }
    }

    pub fn get_mut(&mut self, wallet: Wallet) -> &mut Decimal {
        match wallet {
            Wallet::Bank => &mut self.bank,
            Wallet::Cash => &mut self.cash,
        }
    }
}

/// One aggregate-balance document per user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub balance: WalletBalances,
    pub accounts: Vec<BankAccount>,
    pub budget: Option<Decimal>,
}

impl Profile {
    /// Zero-balance, empty-accounts profile
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            balance: WalletBalances::default(),
            accounts: Vec::new(),
            budget: None,
        }
    }

    pub fn account(&self, id: AccountId) -> Option<&BankAccount> {
        self.accounts.iter().find(|a| a.id == id)
    }

    pub fn account_mut(&mut self, id: AccountId) -> Option<&mut BankAccount> {
        self.accounts.iter_mut().find(|a| a.id == id)
    }

    /// Fails with `InvalidInput` if `id` names no account of this profile
    pub fn require_account(&self, id: AccountId) -> Result<&BankAccount, LedgerError> {
        self.account(id)
            .ok_or_else(|| LedgerError::InvalidInput(format!("unknown bank account: {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signed_amount() {
        let now = Utc::now();
        let user = UserId::new("u1");
        let income = TransactionRecord::new(
            user.clone(),
            TransactionInput::new(dec!(12.50), TransactionType::Income),
            now,
        );
        let expense = TransactionRecord::new(
            user,
            TransactionInput::new(dec!(12.50), TransactionType::Expense),
            now,
        );
        assert_eq!(income.signed_amount(), dec!(12.50));
        assert_eq!(expense.signed_amount(), dec!(-12.50));
    }

    #[test]
    fn test_wallet_defaults_to_bank() {
        let record = TransactionRecord::new(
            UserId::new("u1"),
            TransactionInput::new(dec!(1), TransactionType::Income),
            Utc::now(),
        );
        assert_eq!(record.wallet, Wallet::Bank);
        assert_eq!(record.version, 1);
    }

    #[test]
    fn test_id_roundtrip() {
        assert_eq!(Wallet::from_id(Wallet::Cash.id()), Some(Wallet::Cash));
        assert_eq!(
            TransactionType::from_id(TransactionType::Income.id()),
            Some(TransactionType::Income)
        );
        assert_eq!(Wallet::from_id(9), None);

        let id = RecordId::new();
        assert_eq!(id.to_string().parse::<RecordId>().unwrap(), id);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let zero = TransactionInput::new(Decimal::ZERO, TransactionType::Income);
        assert!(zero.validate().is_err());

        let negative = TransactionInput::new(dec!(-3), TransactionType::Expense);
        assert!(negative.validate().is_err());

        let cash_with_account = TransactionInput::new(dec!(3), TransactionType::Expense)
            .wallet(Wallet::Cash)
            .account(AccountId::new());
        assert!(cash_with_account.validate().is_err());
    }

    #[test]
    fn test_amount_bounds() {
        assert!(check_amount(dec!(0.00000001)).is_ok());
        assert!(check_amount(dec!(1.500000000)).is_ok());
        assert!(check_amount(dec!(9999999999999999999999.999999)).is_ok());

        let too_fine = TransactionInput::new(dec!(0.000000001), TransactionType::Income);
        assert!(matches!(too_fine.validate(), Err(LedgerError::InvalidInput(_))));
        assert!(check_amount(dec!(0.123456789)).is_err());

        assert_eq!(AMOUNT_LIMIT, dec!(10000000000000000000000));
        assert!(check_amount(AMOUNT_LIMIT).is_err());
        let huge = TransactionInput::new(Decimal::MAX, TransactionType::Income);
        assert!(matches!(huge.validate(), Err(LedgerError::InvalidInput(_))));

        assert!(check_storable("balance", -AMOUNT_LIMIT).is_err());
        assert!(check_storable("budget", Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_revised_keeps_identity_and_date() {
        let date = "2024-03-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let original = TransactionRecord::new(
            UserId::new("u1"),
            TransactionInput::new(dec!(10), TransactionType::Expense).dated(date),
            Utc::now(),
        );
        let revised = original.revised(
            TransactionInput::new(dec!(20), TransactionType::Income).wallet(Wallet::Cash),
        );
        assert_eq!(revised.id, original.id);
        assert_eq!(revised.created_at, original.created_at);
        assert_eq!(revised.date, date);
        assert_eq!(revised.version, 2);
        assert_eq!(revised.wallet, Wallet::Cash);
    }
}
