//! Transfer handler

use std::sync::Arc;

use axum::{
    Extension,
    extract::State,
    http::{HeaderMap, header},
};

use super::super::state::AppState;
use super::super::types::{ApiError, ApiJson, ApiResult, TransferBody, ok};
use crate::auth::AuthenticatedUser;
use crate::transfer::locale::Locale;
use crate::transfer::types::{TransferOutcome, TransferRequest};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// POST /api/v1/transfers
///
/// The idempotency key comes from the `Idempotency-Key` header or the body;
/// if both are present they must agree. Locale falls back from the body to
/// `Accept-Language`.
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<TransferBody>,
) -> ApiResult<TransferOutcome> {
    let header_key = match headers.get(IDEMPOTENCY_KEY_HEADER) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| ApiError::bad_request("Idempotency-Key must be visible ASCII"))?
                .to_string(),
        ),
        None => None,
    };
    let key = match (header_key, body.idempotency_key.clone()) {
        (Some(h), Some(b)) if h != b => {
            return ApiError::bad_request("Idempotency-Key header and body disagree").into_err();
        }
        (Some(h), _) => Some(h),
        (None, b) => b,
    };

    let locale = body
        .locale
        .as_deref()
        .or_else(|| {
            headers
                .get(header::ACCEPT_LANGUAGE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
        })
        .map(Locale::from_tag)
        .unwrap_or_default();

    let mut req = TransferRequest::new(
        user.user_id,
        body.amount.inner(),
        body.from_endpoint(),
        body.to_endpoint(),
    )
    .localized(locale);
    if let Some(date) = body.date {
        req = req.dated(date);
    }
    if let Some(key) = key {
        req = req.with_key(key);
    }

    ok(state.transfers.transfer(req).await?)
}
