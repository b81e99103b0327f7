//! Core type definitions for the outreach engine
//!
//! All types follow these naming conventions:
//! - snake_case for field names
//! - *_id suffix for primary keys
//! - *_at suffix for instants, *_date for calendar dates

mod benefit;
mod campaign;
mod common;
mod outreach;
mod patient;
mod sequence;
mod tenant;

pub use benefit::*;
pub use campaign::*;
pub use common::*;
pub use outreach::*;
pub use patient::*;
pub use sequence::*;
pub use tenant::*;
