//! Recall Core - Benefit Expiry Outreach Domain
//!
//! This crate provides the core types shared by every layer of the outreach
//! engine:
//! - Tenant (practice) messaging configuration and usage counters
//! - Patients, insurance, preferences and appointments
//! - Single-shot and sequence campaigns with their ordered steps
//! - Outreach log rows and per-patient sequence state
//! - The pure message personalizer
//! - Clock abstraction and logging conventions
//!
//! Persistence lives in `recall-store`, provider plumbing in
//! `recall-messaging` and the orchestration in `recall-outreach`.

pub mod clock;
pub mod constants;
pub mod error;
pub mod logging;
pub mod personalize;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use constants::*;
pub use error::*;
pub use personalize::{format_amount, format_date, personalize};
pub use types::*;
