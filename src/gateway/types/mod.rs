//! Gateway types module
//!
//! ## Input Types
//! - [`StrictDecimal`]: Format-validated decimal for API input
//! - [`ApiJson`]: JSON extractor with enveloped rejections
//! - Request DTOs for records, transfers and profile edits
//!
//! ## Output Types
//! - [`ApiResponse<T>`]: Unified API response wrapper
//! - [`ApiError`]: Enveloped error with HTTP status

pub mod money;
pub mod request;
pub mod response;

// Re-export commonly used types at module root
pub use money::{StrictDecimal, parse_strict};
pub use request::{
    AccountRequest, ApiJson, BudgetRequest, DeleteResponse, RecordRequest, TransferBody,
    parse_record_id,
};
pub use response::{ApiError, ApiResponse, ApiResult, error_codes, ok};
