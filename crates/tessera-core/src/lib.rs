//! Tessera Core: domain models, error taxonomy and repository traits
//! for workspace authorization and plan limits.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{TesseraError, TesseraResult};
