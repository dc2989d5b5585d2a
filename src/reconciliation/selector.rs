//! Candidate selection: unclaimed rows that may satisfy a cell

use chrono::{Days, NaiveDate};

use crate::config::WindowConfig;
use crate::ledger::{AllocationLedger, TransactionTable};
use crate::types::*;
use crate::utils::amount::sort_by_amount_desc;

/// Date range and category a cell draws candidates from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateWindow {
    pub category: Category,
    pub anchor: NaiveDate,
    pub forward_days: u32,
    pub backward_days: u32,
}

impl CandidateWindow {
    /// Standard window for a cell
    pub fn for_cell(cell: CellKey, config: &WindowConfig) -> Self {
        Self {
            category: cell.category,
            anchor: cell.date,
            forward_days: config.forward_days_for(cell.category),
            backward_days: config.backward_days_for(cell.category),
        }
    }

    /// Same window with the forward edge pushed out
    pub fn extended(self, extra_days: u32) -> Self {
        Self {
            forward_days: self.forward_days + extra_days,
            ..self
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.anchor
            .checked_sub_days(Days::new(u64::from(self.backward_days)))
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn end(&self) -> NaiveDate {
        self.anchor
            .checked_add_days(Days::new(u64::from(self.forward_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start() <= date && date <= self.end()
    }

    /// Category, direction and date checks, ignoring the ledger
    pub fn admits(&self, txn: &Transaction) -> bool {
        txn.category.satisfies(self.category)
            && self.category.accepts(txn.direction)
            && self.contains(txn.date)
    }
}

/// Stateless reader over the transaction table and the ledger
pub struct CandidateSelector<'t, 'l> {
    table: &'t TransactionTable,
    ledger: &'l AllocationLedger,
}

impl<'t, 'l> CandidateSelector<'t, 'l> {
    pub fn new(table: &'t TransactionTable, ledger: &'l AllocationLedger) -> Self {
        Self { table, ledger }
    }

    /// Unclaimed rows admitted by the window, in `(date, row_id)` order
    pub fn select(&self, window: &CandidateWindow) -> Vec<&'t Transaction> {
        self.table
            .iter()
            .filter(|txn| window.admits(txn) && !self.ledger.is_claimed(txn.row_id))
            .collect()
    }

    /// Unclaimed cash-or-check credits dated `date` through `date + window_days`
    pub fn select_ambiguous(&self, date: NaiveDate, window_days: u32) -> Vec<&'t Transaction> {
        let end = date
            .checked_add_days(Days::new(u64::from(window_days)))
            .unwrap_or(NaiveDate::MAX);
        self.table
            .iter()
            .filter(|txn| {
                txn.category == Category::CashOrCheck
                    && txn.direction == Direction::Credit
                    && date <= txn.date
                    && txn.date <= end
                    && !self.ledger.is_claimed(txn.row_id)
            })
            .collect()
    }
}

/// Keep the `quota` largest candidates when there are more than `quota`.
///
/// Shorter lists are returned untouched, in date order.
pub fn truncate_to_quota(mut candidates: Vec<&Transaction>, quota: usize) -> Vec<&Transaction> {
    if candidates.len() > quota {
        sort_by_amount_desc(&mut candidates);
        candidates.truncate(quota);
    }
    candidates
}
