//! # Reconciliation Core
//!
//! Matching and allocation engine that reconciles a bank statement against a
//! card summary and a deposit slip.
//!
//! ## Features
//!
//! - **Exclusive allocation**: every bank row is consumed by at most one expected-amount cell
//! - **Strategy pipeline**: exact, description-grouped, bounded subset-sum and amount-range matching
//! - **Fair candidate quotas**: no single large cell can monopolize the shared pool
//! - **Cash/check splitting**: ambiguous branch deposits are partitioned between the slip columns
//! - **Cleanup pass**: late settlements are picked up over a widened window
//! - **Discrepancy reporting**: net difference per category plus per-cell diagnostics
//!
//! ## Quick Start
//!
//! ```rust
//! use reconciliation_core::{
//!     patterns, reconcile, Category, ExpectationCell, ExpectationTable, MatchingConfig,
//!     TransactionTable,
//! };
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//!
//! let day = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
//! let transactions = TransactionTable::new(vec![
//!     patterns::card_settlement(1, day, Category::Visa, BigDecimal::from(100)).unwrap(),
//! ])
//! .unwrap();
//! let expectations = ExpectationTable::new(vec![ExpectationCell::new(
//!     day,
//!     Category::Visa,
//!     BigDecimal::from(100),
//! )])
//! .unwrap();
//!
//! let report = reconcile(&transactions, &expectations, MatchingConfig::default()).unwrap();
//! assert_eq!(report.matches.len(), 1);
//! ```

pub mod config;
pub mod ledger;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::MatchingConfig;
pub use ledger::*;
pub use reconciliation::{
    reconcile, CellDiagnostics, CellOutcome, DiscrepancyReport, Reconciler, ReconciliationReport,
    ReportSummary,
};
pub use traits::*;
pub use types::*;

// Re-export transaction patterns for convenience
pub use ledger::transaction::patterns;
