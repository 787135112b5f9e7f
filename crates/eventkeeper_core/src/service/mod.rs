//! Use-case services.
//!
//! # Responsibility
//! - Own the authoritative in-memory collections and their invariants.
//! - Persist after every successful mutation.

pub mod entity_store;
