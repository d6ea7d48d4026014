//! Transaction record handlers

use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
};

use super::super::state::AppState;
use super::super::types::{
    ApiJson, ApiResult, DeleteResponse, RecordRequest, ok, parse_record_id,
};
use crate::auth::AuthenticatedUser;
use crate::ledger::types::TransactionRecord;

/// POST /api/v1/records
pub async fn create_record(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(req): ApiJson<RecordRequest>,
) -> ApiResult<TransactionRecord> {
    let record = state.ledger.create(&user.user_id, req.into()).await?;
    ok(record)
}

/// GET /api/v1/records/{id}
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> ApiResult<TransactionRecord> {
    let id = parse_record_id(&id)?;
    ok(state.ledger.get(&user.user_id, id).await?)
}

/// PUT /api/v1/records/{id}
///
/// Full replacement: omitted `date` keeps the stored date, omitted `wallet`
/// means bank.
pub async fn update_record(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<RecordRequest>,
) -> ApiResult<TransactionRecord> {
    let id = parse_record_id(&id)?;
    let record = state.ledger.update(&user.user_id, id, req.into()).await?;
    ok(record)
}

/// DELETE /api/v1/records/{id}
pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> ApiResult<DeleteResponse> {
    let id = parse_record_id(&id)?;
    let removed = state.ledger.delete(&user.user_id, id).await?;
    ok(DeleteResponse {
        deleted: true,
        id: removed.id,
    })
}
