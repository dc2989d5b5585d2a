//! Net discrepancy per category after all passes

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ledger::{AllocationLedger, TransactionTable};
use crate::types::*;

/// Net discrepancy for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDiscrepancy {
    pub category: Category,
    /// Σ (actual − expected) over matches
    pub matched_difference: BigDecimal,
    /// Σ (found − expected) over unmatched cells
    pub unmatched_difference: BigDecimal,
    /// Σ amount of rows no cell holds
    pub leftover_total: BigDecimal,
    pub leftover_rows: Vec<RowId>,
    pub net: BigDecimal,
}

impl CategoryDiscrepancy {
    fn new(category: Category) -> Self {
        Self {
            category,
            matched_difference: BigDecimal::from(0),
            unmatched_difference: BigDecimal::from(0),
            leftover_total: BigDecimal::from(0),
            leftover_rows: Vec::new(),
            net: BigDecimal::from(0),
        }
    }
}

/// Aggregate discrepancies and the totals they reconcile against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancyReport {
    /// Posting date of the earliest matched bank row; leftovers on or before
    /// it are ignored
    pub first_matched_date: Option<NaiveDate>,
    pub categories: Vec<CategoryDiscrepancy>,
    pub matched_total: BigDecimal,
    pub exclusive_total: BigDecimal,
    pub leftover_total: BigDecimal,
}

impl DiscrepancyReport {
    /// Aggregate the records of a finished run.
    ///
    /// Leftovers are unclaimed inflow rows of a known category dated strictly
    /// after the first matched date, or all of them when nothing matched.
    pub fn compute(
        transactions: &TransactionTable,
        ledger: &AllocationLedger,
        matches: &[MatchRecord],
        unmatched: &[UnmatchedRecord],
    ) -> Self {
        let mut by_category: BTreeMap<Category, CategoryDiscrepancy> = BTreeMap::new();
        let mut matched_total = BigDecimal::from(0);
        let mut exclusive_total = BigDecimal::from(0);
        let mut leftover_total = BigDecimal::from(0);

        for record in matches {
            matched_total += &record.actual_total;
            by_category
                .entry(record.cell.category)
                .or_insert_with(|| CategoryDiscrepancy::new(record.cell.category))
                .matched_difference += &record.difference;
        }

        for record in unmatched {
            exclusive_total += &record.found_total;
            by_category
                .entry(record.cell.category)
                .or_insert_with(|| CategoryDiscrepancy::new(record.cell.category))
                .unmatched_difference += record.difference();
        }

        let first_matched_date = matches
            .iter()
            .flat_map(|record| record.row_ids.iter())
            .filter_map(|row_id| transactions.get(*row_id))
            .map(|txn| txn.date)
            .min();

        for txn in transactions.poolable() {
            if ledger.is_claimed(txn.row_id) {
                continue;
            }
            if first_matched_date.is_some_and(|first| txn.date <= first) {
                continue;
            }
            leftover_total += &txn.amount;
            let entry = by_category
                .entry(txn.category)
                .or_insert_with(|| CategoryDiscrepancy::new(txn.category));
            entry.leftover_total += &txn.amount;
            entry.leftover_rows.push(txn.row_id);
        }

        let categories = by_category
            .into_values()
            .map(|mut entry| {
                entry.net = &entry.matched_difference + &entry.unmatched_difference + &entry.leftover_total;
                entry
            })
            .collect();

        Self {
            first_matched_date,
            categories,
            matched_total,
            exclusive_total,
            leftover_total,
        }
    }

    pub fn for_category(&self, category: Category) -> Option<&CategoryDiscrepancy> {
        self.categories.iter().find(|entry| entry.category == category)
    }

    /// Sum of every category's net discrepancy
    pub fn net_total(&self) -> BigDecimal {
        self.categories
            .iter()
            .fold(BigDecimal::from(0), |acc, entry| acc + &entry.net)
    }

    /// Matched, exclusive and leftover amounts together
    pub fn accounted_total(&self) -> BigDecimal {
        &self.matched_total + &self.exclusive_total + &self.leftover_total
    }
}
