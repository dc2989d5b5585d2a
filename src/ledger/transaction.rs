//! Bank statement table and transaction construction helpers

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashMap;

use crate::traits::*;
use crate::types::*;

/// Validated bank statement rows, ordered by `(date, row_id)`
pub struct TransactionTable {
    rows: Vec<Transaction>,
    index: HashMap<RowId, usize>,
}

impl std::fmt::Debug for TransactionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionTable")
            .field("rows", &self.rows.len())
            .finish()
    }
}

impl TransactionTable {
    /// Build a table with the default validator
    pub fn new(rows: Vec<Transaction>) -> ReconResult<Self> {
        Self::with_validator(rows, &DefaultTransactionValidator)
    }

    /// Build a table with a custom validator
    pub fn with_validator(
        mut rows: Vec<Transaction>,
        validator: &dyn TransactionValidator,
    ) -> ReconResult<Self> {
        for row in &rows {
            validator.validate_transaction(row)?;
        }

        rows.sort_by(|a, b| (a.date, a.row_id).cmp(&(b.date, b.row_id)));

        let mut index = HashMap::with_capacity(rows.len());
        for (position, row) in rows.iter().enumerate() {
            if index.insert(row.row_id, position).is_some() {
                return Err(ReconError::DuplicateRowId(row.row_id));
            }
        }

        Ok(Self { rows, index })
    }

    pub fn get(&self, row_id: RowId) -> Option<&Transaction> {
        self.index.get(&row_id).map(|&position| &self.rows[position])
    }

    /// Rows in `(date, row_id)` order
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.rows.iter()
    }

    /// Inflow rows with a known category: the shared matching pool
    pub fn poolable(&self) -> impl Iterator<Item = &Transaction> {
        self.rows.iter().filter(|txn| txn.is_poolable())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Builder for bank statement rows
#[derive(Debug)]
pub struct TransactionBuilder {
    transaction: Transaction,
}

impl TransactionBuilder {
    /// Start a credit row of unknown category
    pub fn new(row_id: u64, date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            transaction: Transaction::new(
                RowId(row_id),
                date,
                description.into(),
                BigDecimal::from(0),
                Direction::Credit,
                Category::Unknown,
            ),
        }
    }

    pub fn amount(mut self, amount: BigDecimal) -> Self {
        self.transaction.amount = amount;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.transaction.direction = direction;
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.transaction.category = category;
        self
    }

    /// Build the row, rejecting blank descriptions and zero amounts
    pub fn build(self) -> ReconResult<Transaction> {
        DefaultTransactionValidator.validate_transaction(&self.transaction)?;
        if self.transaction.amount == BigDecimal::from(0) {
            return Err(ReconError::Validation(format!(
                "Row {} has a zero amount",
                self.transaction.row_id
            )));
        }
        Ok(self.transaction)
    }
}

/// Common bank row patterns
pub mod patterns {
    use super::*;

    /// Description the bank prints on branch deposits that mix cash and checks
    pub const AMBIGUOUS_DEPOSIT_DESCRIPTION: &str = "GC 1416 CASH/CHECK";

    /// Card processor settlement credited to the account
    pub fn card_settlement(
        row_id: u64,
        date: NaiveDate,
        category: Category,
        amount: BigDecimal,
    ) -> ReconResult<Transaction> {
        if !category.is_card() {
            return Err(ReconError::Validation(format!(
                "{} is not a card category",
                category
            )));
        }

        TransactionBuilder::new(row_id, date, format!("{} DEPOSIT", category.label().to_uppercase()))
            .amount(amount)
            .category(category)
            .build()
    }

    /// Pre-authorized debit that nets processor fees against a settlement
    pub fn card_bpad(
        row_id: u64,
        date: NaiveDate,
        category: Category,
        amount: BigDecimal,
    ) -> ReconResult<Transaction> {
        let mut txn = card_settlement(row_id, date, category, amount)?;
        txn.direction = Direction::Bpad;
        Ok(txn)
    }

    /// Deposit the bank labels as cash or as check
    pub fn deposit(
        row_id: u64,
        date: NaiveDate,
        category: Category,
        amount: BigDecimal,
    ) -> ReconResult<Transaction> {
        if !category.is_deposit() {
            return Err(ReconError::Validation(format!(
                "{} is not a deposit category",
                category
            )));
        }

        TransactionBuilder::new(row_id, date, format!("{} DEPOSIT", category.label().to_uppercase()))
            .amount(amount)
            .category(category)
            .build()
    }

    /// Branch deposit that could be either cash or check
    pub fn ambiguous_deposit(
        row_id: u64,
        date: NaiveDate,
        amount: BigDecimal,
    ) -> ReconResult<Transaction> {
        TransactionBuilder::new(row_id, date, AMBIGUOUS_DEPOSIT_DESCRIPTION)
            .amount(amount)
            .category(Category::CashOrCheck)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    #[test]
    fn test_table_sorts_by_date_then_row_id() {
        let table = TransactionTable::new(vec![
            patterns::deposit(9, day(2), Category::Cash, BigDecimal::from(10)).unwrap(),
            patterns::deposit(3, day(3), Category::Cash, BigDecimal::from(20)).unwrap(),
            patterns::deposit(1, day(2), Category::Check, BigDecimal::from(30)).unwrap(),
        ])
        .unwrap();

        let order: Vec<RowId> = table.iter().map(|t| t.row_id).collect();
        assert_eq!(order, vec![RowId(1), RowId(9), RowId(3)]);
        assert_eq!(table.get(RowId(3)).unwrap().amount, BigDecimal::from(20));
    }

    #[test]
    fn test_duplicate_row_ids_rejected() {
        let result = TransactionTable::new(vec![
            patterns::deposit(1, day(2), Category::Cash, BigDecimal::from(10)).unwrap(),
            patterns::deposit(1, day(4), Category::Check, BigDecimal::from(30)).unwrap(),
        ]);
        assert!(matches!(result, Err(ReconError::DuplicateRowId(RowId(1)))));
    }

    #[test]
    fn test_builder_and_patterns() {
        let bpad = patterns::card_bpad(4, day(1), Category::Amex, BigDecimal::from(75)).unwrap();
        assert_eq!(bpad.direction, Direction::Bpad);
        assert_eq!(bpad.description, "AMEX DEPOSIT");
        assert!(bpad.is_poolable());

        let ambiguous = patterns::ambiguous_deposit(5, day(1), BigDecimal::from(40)).unwrap();
        assert_eq!(ambiguous.category, Category::CashOrCheck);

        assert!(patterns::card_settlement(6, day(1), Category::Cash, BigDecimal::from(1)).is_err());
        assert!(TransactionBuilder::new(7, day(1), "FEE").build().is_err());

        let fee = TransactionBuilder::new(8, day(1), "SERVICE CHARGE")
            .amount(BigDecimal::from(-12))
            .direction(Direction::Debit)
            .build()
            .unwrap();
        assert!(!fee.is_poolable());
    }
}
