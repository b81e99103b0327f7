//! Recall Store - Persistence Seams
//!
//! Repository traits for tenants, patients, campaigns, outreach logs and
//! sequence state, plus the benefits collaborator the engine queries for
//! eligibility and personalization data.
//!
//! # Usage Example
//!
//! ```ignore
//! use recall_store::{InMemoryStore, Repositories, RepositoryBenefitsEngine};
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let repos = Repositories::in_memory(store.clone());
//! let benefits = RepositoryBenefitsEngine::new(repos.patients.clone(), clock);
//! ```

pub mod benefits;
pub mod error;
pub mod memory;
pub mod repos;
pub mod repositories;

pub use benefits::{BenefitsEngine, RepositoryBenefitsEngine};
pub use error::*;
pub use memory::InMemoryStore;
pub use repos::*;
pub use repositories::Repositories;
