//! Expected amounts per (date, category): card summary and deposit slip

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::traits::*;
use crate::types::*;

/// Header labels that never carry an expectation
const SKIPPED_COLUMNS: [&str; 3] = ["date", "total", "visa & mc"];

/// One dated row of a card summary or deposit slip
#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub date: NaiveDate,
    /// One value per header column; blanks are `None`
    pub values: Vec<Option<BigDecimal>>,
}

impl WideRow {
    pub fn new(date: NaiveDate, values: Vec<Option<BigDecimal>>) -> Self {
        Self { date, values }
    }
}

/// Validated expectation cells, unique per `(date, category)`
#[derive(Debug, Clone)]
pub struct ExpectationTable {
    cells: BTreeMap<CellKey, ExpectationCell>,
}

impl ExpectationTable {
    /// Build a table with the default validator
    pub fn new(cells: Vec<ExpectationCell>) -> ReconResult<Self> {
        Self::with_validator(cells, &DefaultExpectationValidator)
    }

    /// Build a table with a custom validator. Zero amounts are dropped.
    pub fn with_validator(
        cells: Vec<ExpectationCell>,
        validator: &dyn ExpectationValidator,
    ) -> ReconResult<Self> {
        let zero = BigDecimal::from(0);
        let mut table = BTreeMap::new();

        for cell in cells {
            if cell.expected_amount == zero {
                continue;
            }
            validator.validate_cell(&cell)?;
            let key = cell.key();
            if table.insert(key, cell).is_some() {
                return Err(ReconError::DuplicateCell(key));
            }
        }

        Ok(Self { cells: table })
    }

    /// Build a table from a wide sheet: one column per category, one row per date.
    ///
    /// `Date`, `Total`, `Visa & MC` and `Unnamed*` columns are skipped.
    /// Every label in `required` must appear in the header.
    pub fn from_wide_rows(
        header: &[&str],
        rows: &[WideRow],
        required: &[Category],
    ) -> ReconResult<Self> {
        let mut columns: Vec<(usize, Category)> = Vec::new();

        for (position, label) in header.iter().enumerate() {
            let trimmed = label.trim();
            let lowered = trimmed.to_lowercase();
            if trimmed.is_empty()
                || SKIPPED_COLUMNS.contains(&lowered.as_str())
                || lowered.starts_with("unnamed")
            {
                continue;
            }

            let category = Category::from_label(trimmed)
                .filter(Category::is_expectation)
                .ok_or_else(|| ReconError::UnknownCategory(trimmed.to_string()))?;
            columns.push((position, category));
        }

        for category in required {
            if !columns.iter().any(|(_, c)| c == category) {
                return Err(ReconError::MissingExpectedColumn(category.label().to_string()));
            }
        }

        let mut cells = Vec::new();
        for row in rows {
            for &(position, category) in &columns {
                if let Some(Some(amount)) = row.values.get(position) {
                    cells.push(ExpectationCell::new(row.date, category, amount.clone()));
                }
            }
        }

        debug!(
            columns = columns.len(),
            rows = rows.len(),
            cells = cells.len(),
            "Read wide expectation sheet"
        );

        Self::new(cells)
    }

    pub fn get(&self, key: &CellKey) -> Option<&ExpectationCell> {
        self.cells.get(key)
    }

    /// Cells in `(date, category)` order
    pub fn iter(&self) -> impl Iterator<Item = &ExpectationCell> {
        self.cells.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CellKey> {
        self.cells.keys()
    }

    /// Dates carrying both a Cash and a Check cell
    pub fn sibling_dates(&self) -> BTreeSet<NaiveDate> {
        self.cells
            .keys()
            .filter(|key| key.category == Category::Cash)
            .filter(|key| {
                self.cells
                    .contains_key(&CellKey::new(key.date, Category::Check))
            })
            .map(|key| key.date)
            .collect()
    }

    /// Merge another table in, e.g. a deposit slip into a card summary
    pub fn merge(mut self, other: ExpectationTable) -> ReconResult<Self> {
        for (key, cell) in other.cells {
            if self.cells.insert(key, cell).is_some() {
                return Err(ReconError::DuplicateCell(key));
            }
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
