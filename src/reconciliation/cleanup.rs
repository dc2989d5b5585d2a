//! Extended-window retry for cells still unmatched after exclusivity

use std::collections::BTreeMap;
use tracing::debug;

use crate::config::MatchingConfig;
use crate::ledger::{AllocationLedger, ClaimKind, TransactionTable};
use crate::reconciliation::selector::{CandidateSelector, CandidateWindow};
use crate::reconciliation::strategy::StrategyPipeline;
use crate::types::*;

/// Retry each unmatched cell once, in date order, over unclaimed rows in a
/// window widened by `cleanup.extra_days`. No quota applies.
///
/// A promoted cell gives up its exclusive rows and its unmatched record.
/// Returns the number of promoted cells.
pub fn extend_unmatched(
    transactions: &TransactionTable,
    config: &MatchingConfig,
    ledger: &mut AllocationLedger,
    matches: &mut BTreeMap<CellKey, MatchRecord>,
    unmatched: &mut BTreeMap<CellKey, UnmatchedRecord>,
) -> ReconResult<usize> {
    let keys: Vec<CellKey> = unmatched.keys().copied().collect();
    let mut promoted = 0;

    for key in keys {
        let Some(expected) = unmatched.get(&key).map(|r| r.expected_amount.clone()) else {
            continue;
        };

        let window = CandidateWindow::for_cell(key, &config.window).extended(config.cleanup.extra_days);
        let candidates = CandidateSelector::new(transactions, ledger).select(&window);
        let pipeline = StrategyPipeline::for_category(config, key.category);

        match pipeline.run(key, &expected, &candidates) {
            Ok(found) => {
                let released = ledger.release_exclusive(key);
                ledger.claim(key, ClaimKind::Matched, &found.row_ids)?;
                unmatched.remove(&key);
                debug!(
                    cell = %key,
                    strategy = %found.kind,
                    released = released.len(),
                    "Cleanup promoted cell"
                );
                matches.insert(
                    key,
                    MatchRecord::new(
                        key,
                        expected,
                        MatchMethod::Cleanup(found.kind),
                        found.row_ids,
                        found.total,
                    ),
                );
                promoted += 1;
            }
            Err(err) if err.is_recoverable() => {
                debug!(cell = %key, reason = %err, "Cleanup found nothing");
            }
            Err(err) => return Err(err),
        }
    }

    Ok(promoted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::patterns;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
    }

    #[test]
    fn test_late_settlement_promoted() {
        let table = TransactionTable::new(vec![
            patterns::card_settlement(1, day(8), Category::Visa, BigDecimal::from(1000)).unwrap(),
            patterns::card_settlement(2, day(4), Category::Visa, BigDecimal::from(15)).unwrap(),
        ])
        .unwrap();
        let key = CellKey::new(day(3), Category::Visa);

        let mut ledger = AllocationLedger::new();
        ledger.claim(key, ClaimKind::Exclusive, &[RowId(2)]).unwrap();

        let mut unmatched = BTreeMap::new();
        unmatched.insert(
            key,
            UnmatchedRecord {
                cell: key,
                expected_amount: BigDecimal::from(1000),
                row_ids: vec![RowId(2)],
                found_total: BigDecimal::from(15),
                reason: UnmatchedReason::NoStrategyMatch {
                    tried: vec![StrategyKind::Exact, StrategyKind::DescriptionSum],
                },
            },
        );
        let mut matches = BTreeMap::new();

        let promoted = extend_unmatched(
            &table,
            &MatchingConfig::default(),
            &mut ledger,
            &mut matches,
            &mut unmatched,
        )
        .unwrap();

        assert_eq!(promoted, 1);
        assert!(unmatched.is_empty());
        let record = &matches[&key];
        assert_eq!(record.method, MatchMethod::Cleanup(StrategyKind::Exact));
        assert_eq!(record.row_ids, vec![RowId(1)]);
        // The exclusive reservation went back to the pool
        assert!(!ledger.is_claimed(RowId(2)));
    }

    #[test]
    fn test_out_of_reach_stays_unmatched() {
        let table = TransactionTable::new(vec![
            patterns::card_settlement(1, day(9), Category::Visa, BigDecimal::from(1000)).unwrap(),
        ])
        .unwrap();
        let key = CellKey::new(day(3), Category::Visa);
        let mut unmatched = BTreeMap::new();
        unmatched.insert(
            key,
            UnmatchedRecord {
                cell: key,
                expected_amount: BigDecimal::from(1000),
                row_ids: vec![],
                found_total: BigDecimal::from(0),
                reason: UnmatchedReason::NoCandidateTransactions,
            },
        );

        let promoted = extend_unmatched(
            &table,
            &MatchingConfig::default(),
            &mut AllocationLedger::new(),
            &mut BTreeMap::new(),
            &mut unmatched,
        )
        .unwrap();
        assert_eq!(promoted, 0);
        assert_eq!(unmatched.len(), 1);
    }
}
