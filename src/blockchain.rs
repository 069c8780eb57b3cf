// Thin re-export module: the ledger engine lives in `blockchain/core.rs`,
// split into chain management and chain validation.

pub mod core;
pub use core::*;
