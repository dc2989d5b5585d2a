//! Reconciliation engine: matching, exclusive allocation and cleanup passes
//!
//! A [`Reconciler`] owns the allocation ledger for one run and drives the
//! passes in their fixed order:
//!
//! 1. Matching: per date, the cash/check split followed by each cell's
//!    strategy pipeline over its fairness-capped candidates.
//! 2. Exclusivity: unmatched cells, largest first, reserve their leftovers.
//! 3. Cleanup: unmatched cells retry once over a wider window.

pub mod cleanup;
pub mod discrepancy;
pub mod exclusivity;
pub mod fairness;
pub mod partition;
pub mod report;
pub mod selector;
pub mod strategy;

pub use discrepancy::{CategoryDiscrepancy, DiscrepancyReport};
pub use fairness::FairnessPlan;
pub use partition::{Bipartition, PartitionSide};
pub use report::{CellDiagnostics, CellOutcome, MethodCount, ReconciliationReport, ReportSummary};
pub use selector::{CandidateSelector, CandidateWindow};
pub use strategy::{StrategyMatch, StrategyPipeline};

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MatchingConfig;
use crate::ledger::{AllocationLedger, ClaimKind, ExpectationTable, TransactionTable};
use crate::types::*;

/// Single-run allocator over one transaction table and one expectation table
pub struct Reconciler<'a> {
    transactions: &'a TransactionTable,
    expectations: &'a ExpectationTable,
    config: MatchingConfig,
    fairness: FairnessPlan,
    ledger: AllocationLedger,
    phase: RunPhase,
    matches: BTreeMap<CellKey, MatchRecord>,
    unmatched: BTreeMap<CellKey, UnmatchedRecord>,
    diagnostics: BTreeMap<CellKey, CellDiagnostics>,
}

impl<'a> Reconciler<'a> {
    /// Validate the config and plan candidate quotas for the run
    pub fn new(
        transactions: &'a TransactionTable,
        expectations: &'a ExpectationTable,
        config: MatchingConfig,
    ) -> ReconResult<Self> {
        config.validate()?;
        let fairness =
            FairnessPlan::compute(&config.fairness, transactions.poolable().count(), expectations);

        Ok(Self {
            transactions,
            expectations,
            config,
            fairness,
            ledger: AllocationLedger::new(),
            phase: RunPhase::Ready,
            matches: BTreeMap::new(),
            unmatched: BTreeMap::new(),
            diagnostics: BTreeMap::new(),
        })
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn ledger(&self) -> &AllocationLedger {
        &self.ledger
    }

    pub fn fairness(&self) -> &FairnessPlan {
        &self.fairness
    }

    pub fn matches(&self) -> impl Iterator<Item = &MatchRecord> {
        self.matches.values()
    }

    pub fn unmatched(&self) -> impl Iterator<Item = &UnmatchedRecord> {
        self.unmatched.values()
    }

    fn require_phase(&self, expected: RunPhase) -> ReconResult<()> {
        if self.phase != expected {
            return Err(ReconError::PassOrder {
                expected,
                found: self.phase,
            });
        }
        Ok(())
    }

    /// Partition and strategy pipeline for every cell, date by date
    pub fn run_matching_pass(&mut self) -> ReconResult<()> {
        self.require_phase(RunPhase::Ready)?;

        let sibling_dates = self.expectations.sibling_dates();
        let dates: BTreeSet<NaiveDate> = self.expectations.keys().map(|key| key.date).collect();

        for date in dates {
            if self.config.partition.enabled && sibling_dates.contains(&date) {
                self.partition_date(date)?;
            }

            let cells: Vec<ExpectationCell> = self
                .expectations
                .iter()
                .filter(|cell| cell.date == date && !self.matches.contains_key(&cell.key()))
                .cloned()
                .collect();
            for cell in cells {
                self.match_cell(&cell)?;
            }
        }

        info!(
            matched = self.matches.len(),
            pending = self.unmatched.len(),
            "Matching pass complete"
        );
        self.phase = RunPhase::Matched;
        Ok(())
    }

    /// Split the date's ambiguous deposits between its cash and check cells
    fn partition_date(&mut self, date: NaiveDate) -> ReconResult<()> {
        let cash_key = CellKey::new(date, Category::Cash);
        let check_key = CellKey::new(date, Category::Check);
        let expectations = self.expectations;
        let (Some(cash), Some(check)) = (expectations.get(&cash_key), expectations.get(&check_key))
        else {
            return Ok(());
        };

        let ambiguous = CandidateSelector::new(self.transactions, &self.ledger)
            .select_ambiguous(date, self.config.partition.window_days);
        if ambiguous.is_empty() {
            return Ok(());
        }

        let split = match partition::bipartition(
            date,
            &ambiguous,
            &cash.expected_amount,
            &check.expected_amount,
            &self.config.partition,
            &self.config.tolerance,
        ) {
            Ok(split) => split,
            Err(err) if err.is_recoverable() => {
                warn!(%date, reason = %err, "Skipping cash/check split");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let method = MatchMethod::Partition(split.kind);
        for (cell, side) in [(cash, split.cash), (check, split.check)] {
            let key = cell.key();
            self.ledger.claim(key, ClaimKind::Matched, &side.row_ids)?;
            self.diagnostics.insert(
                key,
                CellDiagnostics {
                    cell: key,
                    quota: self.fairness.quota_for(&key),
                    pipeline_candidates: 0,
                },
            );
            self.matches.insert(
                key,
                MatchRecord::new(
                    key,
                    cell.expected_amount.clone(),
                    method,
                    side.row_ids,
                    side.total,
                ),
            );
        }

        info!(%date, method = %method.label(), rows = ambiguous.len(), "Split ambiguous deposits");
        Ok(())
    }

    /// Run one cell's pipeline over its quota-capped candidates
    fn match_cell(&mut self, cell: &ExpectationCell) -> ReconResult<()> {
        let key = cell.key();
        let quota = self.fairness.quota_for(&key);
        let window = CandidateWindow::for_cell(key, &self.config.window);
        let candidates = selector::truncate_to_quota(
            CandidateSelector::new(self.transactions, &self.ledger).select(&window),
            quota,
        );

        self.diagnostics.insert(
            key,
            CellDiagnostics {
                cell: key,
                quota,
                pipeline_candidates: candidates.len(),
            },
        );

        let pipeline = StrategyPipeline::for_category(&self.config, key.category);
        match pipeline.run(key, &cell.expected_amount, &candidates) {
            Ok(found) => {
                self.ledger.claim(key, ClaimKind::Matched, &found.row_ids)?;
                self.matches.insert(
                    key,
                    MatchRecord::new(
                        key,
                        cell.expected_amount.clone(),
                        MatchMethod::Pipeline(found.kind),
                        found.row_ids,
                        found.total,
                    ),
                );
            }
            Err(err) => {
                let reason = err.into_unmatched_reason()?;
                debug!(cell = %key, quota, candidates = candidates.len(), %reason, "Cell pending");
                self.unmatched.insert(
                    key,
                    UnmatchedRecord {
                        cell: key,
                        expected_amount: cell.expected_amount.clone(),
                        row_ids: Vec::new(),
                        found_total: BigDecimal::from(0),
                        reason,
                    },
                );
            }
        }
        Ok(())
    }

    /// Reserve leftovers for unmatched cells, largest expectation first
    pub fn run_exclusivity_pass(&mut self) -> ReconResult<()> {
        self.require_phase(RunPhase::Matched)?;

        let claimed = exclusivity::allocate_exclusive(
            self.transactions,
            &mut self.ledger,
            &self.config.window,
            &self.fairness,
            &mut self.unmatched,
        )?;

        info!(cells = self.unmatched.len(), rows = claimed, "Exclusivity pass complete");
        self.phase = RunPhase::Allocated;
        Ok(())
    }

    /// Retry unmatched cells over a widened window
    pub fn run_cleanup_pass(&mut self) -> ReconResult<()> {
        self.require_phase(RunPhase::Allocated)?;

        if self.config.cleanup.enabled {
            let promoted = cleanup::extend_unmatched(
                self.transactions,
                &self.config,
                &mut self.ledger,
                &mut self.matches,
                &mut self.unmatched,
            )?;
            info!(promoted, remaining = self.unmatched.len(), "Cleanup pass complete");
        } else {
            debug!("Cleanup disabled");
        }

        self.phase = RunPhase::CleanedUp;
        Ok(())
    }

    /// Check every cell has exactly one outcome and build the report
    pub fn finish(self) -> ReconResult<ReconciliationReport> {
        self.require_phase(RunPhase::CleanedUp)?;

        for key in self.expectations.keys() {
            let matched = self.matches.contains_key(key);
            let unmatched = self.unmatched.contains_key(key);
            if matched == unmatched {
                return Err(ReconError::MissingOutcome(*key));
            }
        }

        let mut holders: BTreeMap<RowId, CellKey> = BTreeMap::new();
        let held: Vec<(CellKey, &Vec<RowId>)> = self
            .matches
            .values()
            .map(|r| (r.cell, &r.row_ids))
            .chain(self.unmatched.values().map(|r| (r.cell, &r.row_ids)))
            .collect();
        for &(cell, row_ids) in &held {
            for row_id in row_ids {
                if let Some(holder) = holders.insert(*row_id, cell) {
                    return Err(ReconError::AllocationConflict {
                        row_id: *row_id,
                        holder,
                        claimant: cell,
                    });
                }
            }
        }

        for (cell, row_ids) in held {
            let mut recorded = row_ids.clone();
            recorded.sort();
            if self.ledger.rows_held_by(cell) != recorded {
                return Err(ReconError::LedgerMismatch(cell));
            }
        }

        let matches: Vec<MatchRecord> = self.matches.into_values().collect();
        let unmatched: Vec<UnmatchedRecord> = self.unmatched.into_values().collect();
        let discrepancies =
            DiscrepancyReport::compute(self.transactions, &self.ledger, &matches, &unmatched);

        let report = ReconciliationReport {
            run_id: Uuid::new_v4(),
            generated_at: chrono::Utc::now().naive_utc(),
            matches,
            unmatched,
            diagnostics: self.diagnostics.into_values().collect(),
            discrepancies,
        };

        info!(
            run_id = %report.run_id,
            matched = report.matches.len(),
            unmatched = report.unmatched.len(),
            net = %report.discrepancies.net_total(),
            "Reconciliation finished"
        );
        Ok(report)
    }

    /// Run every pass in order and build the report
    pub fn run(mut self) -> ReconResult<ReconciliationReport> {
        self.run_matching_pass()?;
        self.run_exclusivity_pass()?;
        self.run_cleanup_pass()?;
        self.finish()
    }
}

/// Reconcile a bank statement against its expectations in one call
pub fn reconcile(
    transactions: &TransactionTable,
    expectations: &ExpectationTable,
    config: MatchingConfig,
) -> ReconResult<ReconciliationReport> {
    Reconciler::new(transactions, expectations, config)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::patterns;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn test_passes_must_run_in_order() {
        let transactions = TransactionTable::new(vec![]).unwrap();
        let expectations = ExpectationTable::new(vec![]).unwrap();
        let mut reconciler =
            Reconciler::new(&transactions, &expectations, MatchingConfig::default()).unwrap();

        let err = reconciler.run_cleanup_pass().unwrap_err();
        assert!(matches!(
            err,
            ReconError::PassOrder {
                expected: RunPhase::Allocated,
                found: RunPhase::Ready
            }
        ));

        reconciler.run_matching_pass().unwrap();
        assert!(reconciler.run_matching_pass().is_err());
        reconciler.run_exclusivity_pass().unwrap();
        reconciler.run_cleanup_pass().unwrap();
        assert_eq!(reconciler.phase(), RunPhase::CleanedUp);

        let report = reconciler.finish().unwrap();
        assert!(report.matches.is_empty());
    }

    #[test]
    fn test_finish_before_cleanup_rejected() {
        let transactions = TransactionTable::new(vec![]).unwrap();
        let expectations = ExpectationTable::new(vec![]).unwrap();
        let mut reconciler =
            Reconciler::new(&transactions, &expectations, MatchingConfig::default()).unwrap();
        reconciler.run_matching_pass().unwrap();
        assert!(matches!(
            reconciler.finish(),
            Err(ReconError::PassOrder { .. })
        ));
    }

    #[test]
    fn test_infeasible_split_falls_back_to_pipeline() {
        let transactions = TransactionTable::new(vec![
            patterns::ambiguous_deposit(1, day(4), BigDecimal::from(900)).unwrap(),
            patterns::deposit(2, day(4), Category::Cash, BigDecimal::from(60)).unwrap(),
        ])
        .unwrap();
        let expectations = ExpectationTable::new(vec![
            ExpectationCell::new(day(4), Category::Cash, BigDecimal::from(60)),
            ExpectationCell::new(day(4), Category::Check, BigDecimal::from(40)),
        ])
        .unwrap();

        let mut config = MatchingConfig::default();
        config.fairness.enabled = false;
        let report = reconcile(&transactions, &expectations, config).unwrap();

        let cash = report.match_for(&CellKey::new(day(4), Category::Cash)).unwrap();
        assert_eq!(cash.method, MatchMethod::Pipeline(StrategyKind::Exact));
        assert_eq!(cash.row_ids, vec![RowId(2)]);

        let check = report.unmatched_for(&CellKey::new(day(4), Category::Check)).unwrap();
        assert_eq!(check.row_ids, vec![RowId(1)]);
        assert_eq!(check.coverage(), Coverage::Excess);
    }

    #[test]
    fn test_finish_rejects_rows_missing_from_ledger() {
        let transactions = TransactionTable::new(vec![
            patterns::card_settlement(1, day(4), Category::Visa, BigDecimal::from(100)).unwrap(),
        ])
        .unwrap();
        let expectations = ExpectationTable::new(vec![ExpectationCell::new(
            day(4),
            Category::Visa,
            BigDecimal::from(100),
        )])
        .unwrap();
        let key = CellKey::new(day(4), Category::Visa);

        let mut reconciler =
            Reconciler::new(&transactions, &expectations, MatchingConfig::default()).unwrap();
        reconciler.run_matching_pass().unwrap();
        reconciler.run_exclusivity_pass().unwrap();
        reconciler.run_cleanup_pass().unwrap();
        assert_eq!(reconciler.ledger().rows_held_by(key), vec![RowId(1)]);

        if let Some(record) = reconciler.matches.get_mut(&key) {
            record.row_ids.push(RowId(7));
        }
        assert!(matches!(
            reconciler.finish(),
            Err(ReconError::LedgerMismatch(cell)) if cell == key
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let transactions = TransactionTable::new(vec![]).unwrap();
        let expectations = ExpectationTable::new(vec![]).unwrap();
        let mut config = MatchingConfig::default();
        config.fairness.max_per_cell = 0;
        assert!(matches!(
            Reconciler::new(&transactions, &expectations, config),
            Err(ReconError::Config(_))
        ));
    }
}
