//! Traits for validation and output abstraction

use async_trait::async_trait;
use bigdecimal::BigDecimal;

use crate::reconciliation::discrepancy::DiscrepancyReport;
use crate::reconciliation::report::ReconciliationReport;
use crate::types::*;

/// Output abstraction for reconciliation results
///
/// This trait allows the engine's records to be delivered to any backend
/// (a spreadsheet annotator, a database, an in-memory buffer, etc.) by
/// implementing these methods.
#[async_trait]
pub trait ReconciliationSink: Send + Sync {
    /// Receive one matched cell
    async fn record_match(&mut self, record: &MatchRecord) -> ReconResult<()>;

    /// Receive one unmatched cell with its exclusive allocation
    async fn record_unmatched(&mut self, record: &UnmatchedRecord) -> ReconResult<()>;

    /// Receive the per-category net discrepancies
    async fn record_discrepancies(&mut self, report: &DiscrepancyReport) -> ReconResult<()>;

    /// Push a whole report, matches first
    async fn publish_report(&mut self, report: &ReconciliationReport) -> ReconResult<()> {
        for record in &report.matches {
            self.record_match(record).await?;
        }
        for record in &report.unmatched {
            self.record_unmatched(record).await?;
        }
        self.record_discrepancies(&report.discrepancies).await
    }
}

/// Trait for implementing custom bank row validation rules
pub trait TransactionValidator: Send + Sync {
    /// Validate a row before it enters the transaction table
    fn validate_transaction(&self, transaction: &Transaction) -> ReconResult<()>;
}

/// Trait for implementing custom expectation cell validation rules
pub trait ExpectationValidator: Send + Sync {
    /// Validate a cell before it enters the expectation table
    fn validate_cell(&self, cell: &ExpectationCell) -> ReconResult<()>;
}

/// Default transaction validator with basic rules
pub struct DefaultTransactionValidator;

impl TransactionValidator for DefaultTransactionValidator {
    fn validate_transaction(&self, transaction: &Transaction) -> ReconResult<()> {
        if transaction.description.trim().is_empty() {
            return Err(ReconError::Validation(format!(
                "Row {} has an empty description",
                transaction.row_id
            )));
        }

        Ok(())
    }
}

/// Default expectation validator: summary category and a positive amount
pub struct DefaultExpectationValidator;

impl ExpectationValidator for DefaultExpectationValidator {
    fn validate_cell(&self, cell: &ExpectationCell) -> ReconResult<()> {
        if !cell.category.is_expectation() {
            return Err(ReconError::Validation(format!(
                "{} is not a summary or deposit slip column",
                cell.category
            )));
        }

        if cell.expected_amount <= BigDecimal::from(0) {
            return Err(ReconError::Validation(format!(
                "Expected amount for {} must be positive",
                cell.key()
            )));
        }

        Ok(())
    }
}
