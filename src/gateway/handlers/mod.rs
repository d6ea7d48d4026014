//! HTTP handlers, one file per resource

pub mod health;
pub mod profile;
pub mod records;
pub mod transfer;

pub use health::health_check;
pub use profile::{add_account, get_audit, get_profile, set_budget};
pub use records::{create_record, delete_record, get_record, update_record};
pub use transfer::create_transfer;
