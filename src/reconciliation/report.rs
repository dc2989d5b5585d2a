//! Output of a reconciliation run

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::reconciliation::discrepancy::DiscrepancyReport;
use crate::types::*;

/// What the run saw for a single cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDiagnostics {
    pub cell: CellKey,
    /// Candidate cap from the fairness plan
    pub quota: usize,
    /// Candidates handed to the pipeline after truncation; zero for cells
    /// settled by the cash/check split
    pub pipeline_candidates: usize,
}

/// Final outcome of one cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellOutcome<'a> {
    Matched(&'a MatchRecord),
    Unmatched(&'a UnmatchedRecord),
}

/// Match count for one method label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCount {
    pub method: String,
    pub count: usize,
}

/// Headline numbers of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_cells: usize,
    pub matched_cells: usize,
    pub unmatched_cells: usize,
    /// Matches per method label, sorted by label
    pub by_method: Vec<MethodCount>,
    /// Unmatched cells that received at least one exclusive row
    pub exclusive_allocations: usize,
    pub exclusive_rows: usize,
}

/// Every cell's outcome plus per-category discrepancies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub run_id: Uuid,
    pub generated_at: NaiveDateTime,
    /// Matches in `(date, category)` order
    pub matches: Vec<MatchRecord>,
    /// Unmatched cells in `(date, category)` order
    pub unmatched: Vec<UnmatchedRecord>,
    pub diagnostics: Vec<CellDiagnostics>,
    pub discrepancies: DiscrepancyReport,
}

impl ReconciliationReport {
    pub fn outcome(&self, cell: &CellKey) -> Option<CellOutcome<'_>> {
        if let Some(record) = self.match_for(cell) {
            return Some(CellOutcome::Matched(record));
        }
        self.unmatched_for(cell).map(CellOutcome::Unmatched)
    }

    pub fn match_for(&self, cell: &CellKey) -> Option<&MatchRecord> {
        self.matches.iter().find(|record| record.cell == *cell)
    }

    pub fn unmatched_for(&self, cell: &CellKey) -> Option<&UnmatchedRecord> {
        self.unmatched.iter().find(|record| record.cell == *cell)
    }

    pub fn diagnostics_for(&self, cell: &CellKey) -> Option<&CellDiagnostics> {
        self.diagnostics.iter().find(|diag| diag.cell == *cell)
    }

    pub fn summary(&self) -> ReportSummary {
        let mut by_method: BTreeMap<String, usize> = BTreeMap::new();
        for record in &self.matches {
            *by_method.entry(record.method.label()).or_insert(0) += 1;
        }

        ReportSummary {
            total_cells: self.matches.len() + self.unmatched.len(),
            matched_cells: self.matches.len(),
            unmatched_cells: self.unmatched.len(),
            by_method: by_method
                .into_iter()
                .map(|(method, count)| MethodCount { method, count })
                .collect(),
            exclusive_allocations: self
                .unmatched
                .iter()
                .filter(|record| !record.row_ids.is_empty())
                .count(),
            exclusive_rows: self.unmatched.iter().map(|record| record.row_ids.len()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn report() -> ReconciliationReport {
        let date = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let visa = CellKey::new(date, Category::Visa);
        let amex = CellKey::new(date, Category::Amex);
        let cash = CellKey::new(date, Category::Cash);

        ReconciliationReport {
            run_id: Uuid::new_v4(),
            generated_at: chrono::Utc::now().naive_utc(),
            matches: vec![
                MatchRecord::new(
                    visa,
                    BigDecimal::from(10),
                    MatchMethod::Pipeline(StrategyKind::Exact),
                    vec![RowId(1)],
                    BigDecimal::from(10),
                ),
                MatchRecord::new(
                    cash,
                    BigDecimal::from(10),
                    MatchMethod::Cleanup(StrategyKind::Exact),
                    vec![RowId(2)],
                    BigDecimal::from(10),
                ),
            ],
            unmatched: vec![UnmatchedRecord {
                cell: amex,
                expected_amount: BigDecimal::from(30),
                row_ids: vec![RowId(3), RowId(4)],
                found_total: BigDecimal::from(25),
                reason: UnmatchedReason::NoStrategyMatch { tried: vec![] },
            }],
            diagnostics: vec![],
            discrepancies: DiscrepancyReport {
                first_matched_date: Some(date),
                categories: vec![],
                matched_total: BigDecimal::from(20),
                exclusive_total: BigDecimal::from(25),
                leftover_total: BigDecimal::from(0),
            },
        }
    }

    #[test]
    fn test_summary_counts() {
        let summary = report().summary();
        assert_eq!(summary.total_cells, 3);
        assert_eq!(summary.matched_cells, 2);
        assert_eq!(
            summary.by_method,
            vec![
                MethodCount {
                    method: "cleanup_exact".to_string(),
                    count: 1
                },
                MethodCount {
                    method: "exact".to_string(),
                    count: 1
                },
            ]
        );
        assert_eq!(summary.exclusive_allocations, 1);
        assert_eq!(summary.exclusive_rows, 2);
    }

    #[test]
    fn test_outcome_lookup() {
        let report = report();
        let date = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        assert!(matches!(
            report.outcome(&CellKey::new(date, Category::Amex)),
            Some(CellOutcome::Unmatched(_))
        ));
        assert!(matches!(
            report.outcome(&CellKey::new(date, Category::Visa)),
            Some(CellOutcome::Matched(_))
        ));
        assert!(report.outcome(&CellKey::new(date, Category::Check)).is_none());
    }
}
