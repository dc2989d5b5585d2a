//! Ledger module containing the input tables and the allocation ledger

pub mod allocation;
pub mod expectation;
pub mod transaction;

pub use allocation::*;
pub use expectation::*;
pub use transaction::*;
