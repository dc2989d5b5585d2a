//! Validation utilities

use crate::traits::*;
use crate::types::*;
use bigdecimal::BigDecimal;

/// Validate that an amount is not zero
pub fn validate_non_zero_amount(amount: &BigDecimal) -> ReconResult<()> {
    if *amount == BigDecimal::from(0) {
        Err(ReconError::Validation("Amount cannot be zero".to_string()))
    } else {
        Ok(())
    }
}

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: &BigDecimal) -> ReconResult<()> {
    if *amount <= BigDecimal::from(0) {
        Err(ReconError::Validation(
            "Amount must be positive".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate that a bank description is usable for grouping
pub fn validate_description(description: &str) -> ReconResult<()> {
    if description.trim().is_empty() {
        return Err(ReconError::Validation(
            "Transaction description cannot be empty".to_string(),
        ));
    }

    if description.len() > 500 {
        return Err(ReconError::Validation(
            "Transaction description cannot exceed 500 characters".to_string(),
        ));
    }

    if description != description.trim() {
        return Err(ReconError::Validation(format!(
            "Transaction description '{}' is not normalized",
            description
        )));
    }

    Ok(())
}

/// Strict bank row validator for pre-classified statements
pub struct StrictTransactionValidator;

impl TransactionValidator for StrictTransactionValidator {
    fn validate_transaction(&self, transaction: &Transaction) -> ReconResult<()> {
        validate_description(&transaction.description)?;
        validate_non_zero_amount(&transaction.amount)?;

        // Inflows must be classified, or they silently drop out of the pool
        if transaction.direction.is_inflow() && transaction.category == Category::Unknown {
            return Err(ReconError::Validation(format!(
                "Inflow row {} has no category",
                transaction.row_id
            )));
        }

        if transaction.direction == Direction::Credit && transaction.amount < BigDecimal::from(0) {
            return Err(ReconError::Validation(format!(
                "Credit row {} has a negative amount",
                transaction.row_id
            )));
        }

        Ok(())
    }
}

/// Strict expectation validator
pub struct StrictExpectationValidator;

impl ExpectationValidator for StrictExpectationValidator {
    fn validate_cell(&self, cell: &ExpectationCell) -> ReconResult<()> {
        DefaultExpectationValidator.validate_cell(cell)?;
        validate_positive_amount(&cell.expected_amount)?;

        // Summary amounts are in cents
        if cell.expected_amount.with_scale(2) != cell.expected_amount {
            return Err(ReconError::Validation(format!(
                "Expected amount for {} has more than two decimal places",
                cell.key()
            )));
        }

        Ok(())
    }
}
