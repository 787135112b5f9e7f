//! Repository layer: durable storage behind the entity store.
//!
//! # Responsibility
//! - Define the persistence contract the store depends on.
//! - Keep file layout and record encoding out of business logic.
//!
//! # Invariants
//! - Repository code never enforces cross-record business rules; the store
//!   re-checks uniqueness when it indexes a loaded dataset.

pub mod persistence;
