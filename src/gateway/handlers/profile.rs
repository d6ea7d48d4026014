//! Profile handlers: overview, accounts, budget and audit

use std::sync::Arc;

use axum::{Extension, extract::State};

use super::super::state::AppState;
use super::super::types::{AccountRequest, ApiJson, ApiResult, BudgetRequest, ok};
use crate::auth::AuthenticatedUser;
use crate::ledger::service::{BalanceAudit, ProfileOverview};
use crate::ledger::types::Profile;

/// GET /api/v1/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<ProfileOverview> {
    ok(state.ledger.overview(&user.user_id).await?)
}

/// POST /api/v1/profile/accounts
pub async fn add_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(req): ApiJson<AccountRequest>,
) -> ApiResult<Profile> {
    let profile = state
        .ledger
        .add_account(&user.user_id, &req.name, req.metadata)
        .await?;
    ok(profile)
}

/// PUT /api/v1/profile/budget
pub async fn set_budget(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(req): ApiJson<BudgetRequest>,
) -> ApiResult<Profile> {
    let budget = req.budget.map(|b| b.inner());
    ok(state.ledger.set_budget(&user.user_id, budget).await?)
}

/// GET /api/v1/profile/audit
pub async fn get_audit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<BalanceAudit> {
    ok(state.ledger.audit(&user.user_id).await?)
}
