//! Repositories
//!
//! Data access traits consumed by the outreach engine.

mod campaign_repo;
mod outreach_log_repo;
mod patient_repo;
mod sequence_repo;
mod tenant_repo;

pub use campaign_repo::*;
pub use outreach_log_repo::*;
pub use patient_repo::*;
pub use sequence_repo::*;
pub use tenant_repo::*;
