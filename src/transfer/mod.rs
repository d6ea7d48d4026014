//! Wallet and account transfers
//!
//! A transfer is two ordinary records sharing a `transfer_id`, date and the
//! `transfer` category:
//!
//! ```text
//! expense leg (from) ──┐
//!                      ├── one store transaction + receipt(user, key)
//! income leg  (to)   ──┘
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Merged deltas**: balances move by the sum of both legs' deltas, so
//!    same-wallet transfers touch accounts only
//! 2. **All or nothing**: legs, receipt and adjustments commit together
//! 3. **Idempotency**: a key already committed replays the original legs

pub mod coordinator;
pub mod locale;
pub mod types;

#[cfg(test)]
mod integration_tests;

// Re-exports for convenience
pub use coordinator::TransferCoordinator;
pub use locale::Locale;
pub use types::{
    Endpoint, TRANSFER_CATEGORY, TransferId, TransferLegs, TransferOutcome, TransferReceipt,
    TransferRequest,
};
