//! Request DTOs and the JSON extractor
//!
//! Field names are snake_case; the camelCase spellings are accepted as aliases.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::money::StrictDecimal;
use super::response::ApiError;
use crate::ledger::types::{AccountId, RecordId, TransactionInput, TransactionType, Wallet};
use crate::transfer::types::Endpoint;

/// `Json<T>` whose rejections use the API envelope
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text())
}

/// Record ids arrive as path strings
pub fn parse_record_id(raw: &str) -> Result<RecordId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid record id: {raw}")))
}

/// Body of record create and full-replacement update
#[derive(Debug, Deserialize)]
pub struct RecordRequest {
    pub amount: StrictDecimal,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    #[serde(default)]
    pub wallet: Option<Wallet>,
    #[serde(default, alias = "bankAccountId")]
    pub bank_account_id: Option<AccountId>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl From<RecordRequest> for TransactionInput {
    fn from(req: RecordRequest) -> Self {
        TransactionInput {
            amount: req.amount.inner(),
            tx_type: req.tx_type,
            wallet: req.wallet,
            bank_account_id: req.bank_account_id,
            description: req.description,
            category: req.category,
            date: req.date,
        }
    }
}

/// Body of a transfer
#[derive(Debug, Deserialize)]
pub struct TransferBody {
    pub amount: StrictDecimal,
    #[serde(default, alias = "fromWallet")]
    pub from_wallet: Option<Wallet>,
    #[serde(default, alias = "toWallet")]
    pub to_wallet: Option<Wallet>,
    #[serde(default, alias = "fromBankAccountId")]
    pub from_bank_account_id: Option<AccountId>,
    #[serde(default, alias = "toBankAccountId")]
    pub to_bank_account_id: Option<AccountId>,
    #[serde(default, alias = "fromLabel")]
    pub from_label: Option<String>,
    #[serde(default, alias = "toLabel")]
    pub to_label: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default, alias = "idempotencyKey")]
    pub idempotency_key: Option<String>,
}

impl TransferBody {
    pub fn from_endpoint(&self) -> Endpoint {
        endpoint(self.from_wallet, self.from_bank_account_id, &self.from_label)
    }

    pub fn to_endpoint(&self) -> Endpoint {
        endpoint(self.to_wallet, self.to_bank_account_id, &self.to_label)
    }
}

fn endpoint(wallet: Option<Wallet>, account_id: Option<AccountId>, label: &Option<String>) -> Endpoint {
    Endpoint {
        wallet: wallet.unwrap_or_default(),
        account_id,
        label: label.clone(),
    }
}

#[derive(Debug, Deserialize)]
pub struct AccountRequest {
    pub name: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct BudgetRequest {
    /// Absent or null clears the budget
    #[serde(default)]
    pub budget: Option<StrictDecimal>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub id: RecordId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_request_defaults() {
        let req: RecordRequest =
            serde_json::from_str(r#"{"amount": "12.50", "type": "expense"}"#).unwrap();
        let input = TransactionInput::from(req);
        assert_eq!(input.amount, rust_decimal::Decimal::new(1250, 2));
        assert_eq!(input.tx_type, TransactionType::Expense);
        assert!(input.wallet.is_none());
        assert!(input.date.is_none());
    }

    #[test]
    fn test_record_request_rejects_unknown_type() {
        let result: Result<RecordRequest, _> =
            serde_json::from_str(r#"{"amount": "1", "type": "refund"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_transfer_body_aliases() {
        let id = AccountId::new();
        let json = format!(
            r#"{{"amount": "5", "fromWallet": "cash", "toBankAccountId": "{id}", "toLabel": "BCA"}}"#
        );
        let body: TransferBody = serde_json::from_str(&json).unwrap();
        assert_eq!(body.from_endpoint().wallet, Wallet::Cash);
        let to = body.to_endpoint();
        assert_eq!(to.wallet, Wallet::Bank);
        assert_eq!(to.account_id, Some(id));
        assert_eq!(to.label.as_deref(), Some("BCA"));
    }

    #[test]
    fn test_budget_null_clears() {
        let body: BudgetRequest = serde_json::from_str(r#"{"budget": null}"#).unwrap();
        assert!(body.budget.is_none());
        let body: BudgetRequest = serde_json::from_str(r#"{"budget": "750.00"}"#).unwrap();
        assert_eq!(body.budget.map(|b| b.inner()), Some(rust_decimal::Decimal::new(75000, 2)));
    }
}
