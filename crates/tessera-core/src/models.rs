//! Domain models for Tessera.
//!
//! These are the core types shared across all crates.

pub mod capability;
pub mod invitation;
pub mod membership;
pub mod plan;
pub mod user;
pub mod workspace;
