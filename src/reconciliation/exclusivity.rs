//! Exclusive allocation of leftover rows to unmatched cells

use std::collections::BTreeMap;
use tracing::debug;

use crate::config::WindowConfig;
use crate::ledger::{AllocationLedger, ClaimKind, TransactionTable};
use crate::reconciliation::fairness::FairnessPlan;
use crate::reconciliation::selector::{self, CandidateSelector, CandidateWindow};
use crate::types::*;
use crate::utils::amount::total;

/// Give each unmatched cell the unclaimed rows in its window, capped by its
/// fairness quota.
///
/// Larger expectations go first, so a shared pool ends up with the cell it
/// most plausibly belongs to. The rows only feed found/insufficient/excess
/// reporting; rows past the quota stay unclaimed for cleanup. Returns the
/// number of rows claimed.
pub fn allocate_exclusive(
    transactions: &TransactionTable,
    ledger: &mut AllocationLedger,
    windows: &WindowConfig,
    fairness: &FairnessPlan,
    unmatched: &mut BTreeMap<CellKey, UnmatchedRecord>,
) -> ReconResult<usize> {
    let mut order: Vec<(CellKey, bigdecimal::BigDecimal)> = unmatched
        .iter()
        .map(|(key, record)| (*key, record.expected_amount.clone()))
        .collect();
    order.sort_by(|(a_key, a_amount), (b_key, b_amount)| {
        b_amount.cmp(a_amount).then_with(|| a_key.cmp(b_key))
    });

    let mut claimed = 0;
    for (key, _) in order {
        let window = CandidateWindow::for_cell(key, windows);
        let rows = selector::truncate_to_quota(
            CandidateSelector::new(transactions, ledger).select(&window),
            fairness.quota_for(&key),
        );
        let row_ids: Vec<RowId> = rows.iter().map(|txn| txn.row_id).collect();
        ledger.claim(key, ClaimKind::Exclusive, &row_ids)?;

        if let Some(record) = unmatched.get_mut(&key) {
            record.found_total = total(rows.iter().copied());
            record.row_ids = row_ids;
            claimed += record.row_ids.len();
            debug!(
                cell = %key,
                rows = record.row_ids.len(),
                found = %record.found_total,
                coverage = ?record.coverage(),
                "Exclusive allocation"
            );
        }
    }

    Ok(claimed)
}
