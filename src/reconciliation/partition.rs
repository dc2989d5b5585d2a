//! Splitting ambiguous cash-or-check deposits between the two slip columns

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::config::PartitionConfig;
use crate::types::*;
use crate::utils::amount::{sort_by_amount_desc, total, within_tolerance, Combinations};

/// Largest ambiguous set the exact bipartition may be configured to enumerate
pub const MAX_EXACT_PARTITION_SET: usize = 20;

/// One side of a split
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionSide {
    pub row_ids: Vec<RowId>,
    pub total: BigDecimal,
}

impl PartitionSide {
    fn from_rows(rows: &[&Transaction]) -> Self {
        Self {
            row_ids: rows.iter().map(|txn| txn.row_id).collect(),
            total: total(rows.iter().copied()),
        }
    }
}

/// A split of the whole ambiguous set into cash and check
#[derive(Debug, Clone, PartialEq)]
pub struct Bipartition {
    pub kind: PartitionKind,
    pub cash: PartitionSide,
    pub check: PartitionSide,
}

/// Split `ambiguous` between the cash and check cells of `date`.
///
/// Every row lands on exactly one side. Fails with
/// `AmbiguousPartitionInfeasible` when the ambiguous total is too far from
/// the combined expectation for a split to mean anything.
pub fn bipartition(
    date: NaiveDate,
    ambiguous: &[&Transaction],
    cash_expected: &BigDecimal,
    check_expected: &BigDecimal,
    config: &PartitionConfig,
    tolerance: &BigDecimal,
) -> ReconResult<Bipartition> {
    let ambiguous_total = total(ambiguous.iter().copied());
    let expected_total = cash_expected + check_expected;

    if !is_plausible(&ambiguous_total, &expected_total, &config.max_ratio) {
        return Err(ReconError::AmbiguousPartitionInfeasible {
            date,
            ambiguous_total,
            expected_total,
        });
    }

    if ambiguous.len() > config.max_exact_set {
        warn!(
            %date,
            rows = ambiguous.len(),
            cap = config.max_exact_set,
            "Ambiguous set too large for exact split, using proportional fill"
        );
    } else if let Some(split) =
        exact_split(ambiguous, &ambiguous_total, cash_expected, check_expected, tolerance)
    {
        debug!(%date, cash_rows = split.cash.row_ids.len(), "Exact cash/check split");
        return Ok(split);
    }

    let split = proportional_split(ambiguous, cash_expected, &config.cash_fill_ratio);
    debug!(
        %date,
        cash_total = %split.cash.total,
        check_total = %split.check.total,
        "Proportional cash/check split"
    );
    Ok(split)
}

/// Ambiguous total within `[expected / max_ratio, expected * max_ratio]`
fn is_plausible(
    ambiguous_total: &BigDecimal,
    expected_total: &BigDecimal,
    max_ratio: &BigDecimal,
) -> bool {
    let zero = BigDecimal::from(0);
    if *expected_total == zero {
        return false;
    }
    *ambiguous_total <= expected_total * max_ratio
        && ambiguous_total * max_ratio >= *expected_total
}

/// First cash subset, smallest first, leaving both sides within tolerance
fn exact_split(
    ambiguous: &[&Transaction],
    ambiguous_total: &BigDecimal,
    cash_expected: &BigDecimal,
    check_expected: &BigDecimal,
    tolerance: &BigDecimal,
) -> Option<Bipartition> {
    for size in 0..=ambiguous.len() {
        for combo in Combinations::new(ambiguous.len(), size) {
            let cash_total = combo
                .iter()
                .fold(BigDecimal::from(0), |acc, &i| acc + &ambiguous[i].amount);
            let check_total = ambiguous_total - &cash_total;

            if within_tolerance(&cash_total, cash_expected, tolerance)
                && within_tolerance(&check_total, check_expected, tolerance)
            {
                let cash: Vec<&Transaction> = combo.iter().map(|&i| ambiguous[i]).collect();
                let check: Vec<&Transaction> = ambiguous
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !combo.contains(i))
                    .map(|(_, &txn)| txn)
                    .collect();
                return Some(Bipartition {
                    kind: PartitionKind::Exact,
                    cash: PartitionSide::from_rows(&cash),
                    check: PartitionSide::from_rows(&check),
                });
            }
        }
    }
    None
}

/// Largest rows go to cash until it reaches `fill_ratio` of its expectation
fn proportional_split(
    ambiguous: &[&Transaction],
    cash_expected: &BigDecimal,
    fill_ratio: &BigDecimal,
) -> Bipartition {
    let mut ranked = ambiguous.to_vec();
    sort_by_amount_desc(&mut ranked);

    let target = cash_expected * fill_ratio;
    let mut cash_total = BigDecimal::from(0);
    let mut cash = Vec::new();
    let mut check = Vec::new();

    for txn in ranked {
        if cash_total < target {
            cash_total += &txn.amount;
            cash.push(txn);
        } else {
            check.push(txn);
        }
    }

    Bipartition {
        kind: PartitionKind::Proportional,
        cash: PartitionSide::from_rows(&cash),
        check: PartitionSide::from_rows(&check),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::patterns;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 12).unwrap()
    }

    fn deposits(amounts: &[i64]) -> Vec<Transaction> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| {
                patterns::ambiguous_deposit(i as u64 + 1, date(), BigDecimal::from(*amount)).unwrap()
            })
            .collect()
    }

    fn tolerance() -> BigDecimal {
        BigDecimal::new(1.into(), 2)
    }

    #[test]
    fn test_exact_split() {
        let rows = deposits(&[30, 20, 50]);
        let refs: Vec<&Transaction> = rows.iter().collect();
        let split = bipartition(
            date(),
            &refs,
            &BigDecimal::from(50),
            &BigDecimal::from(50),
            &PartitionConfig::default(),
            &tolerance(),
        )
        .unwrap();

        assert_eq!(split.kind, PartitionKind::Exact);
        assert_eq!(split.cash.row_ids, vec![RowId(3)]);
        assert_eq!(split.check.row_ids, vec![RowId(1), RowId(2)]);
        assert_eq!(split.check.total, BigDecimal::from(50));
    }

    #[test]
    fn test_proportional_fallback_consumes_everything() {
        let rows = deposits(&[70, 25, 40, 10]);
        let refs: Vec<&Transaction> = rows.iter().collect();
        let split = bipartition(
            date(),
            &refs,
            &BigDecimal::from(100),
            &BigDecimal::from(60),
            &PartitionConfig::default(),
            &tolerance(),
        )
        .unwrap();

        assert_eq!(split.kind, PartitionKind::Proportional);
        // 70 < 95, then 110 stops the fill
        assert_eq!(split.cash.row_ids, vec![RowId(1), RowId(3)]);
        assert_eq!(split.check.row_ids, vec![RowId(2), RowId(4)]);
        assert_eq!(&split.cash.total + &split.check.total, BigDecimal::from(145));
    }

    #[test]
    fn test_implausible_totals_rejected() {
        let rows = deposits(&[500]);
        let refs: Vec<&Transaction> = rows.iter().collect();
        let result = bipartition(
            date(),
            &refs,
            &BigDecimal::from(100),
            &BigDecimal::from(100),
            &PartitionConfig::default(),
            &tolerance(),
        );
        assert!(matches!(
            result,
            Err(ReconError::AmbiguousPartitionInfeasible { .. })
        ));

        let result = bipartition(
            date(),
            &refs,
            &BigDecimal::from(0),
            &BigDecimal::from(0),
            &PartitionConfig::default(),
            &tolerance(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_exact_search_cap() {
        let rows = deposits(&[50, 50]);
        let refs: Vec<&Transaction> = rows.iter().collect();
        let config = PartitionConfig {
            max_exact_set: 1,
            ..PartitionConfig::default()
        };
        let split = bipartition(
            date(),
            &refs,
            &BigDecimal::from(50),
            &BigDecimal::from(50),
            &config,
            &tolerance(),
        )
        .unwrap();
        assert_eq!(split.kind, PartitionKind::Proportional);
        assert_eq!(split.cash.row_ids.len(), 1);
    }
}
