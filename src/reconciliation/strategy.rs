//! Matching strategies and the per-category pipeline that runs them

use bigdecimal::BigDecimal;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::MatchingConfig;
use crate::types::*;
use crate::utils::amount::{sort_by_amount_desc, total, within_tolerance, Combinations};

/// Largest candidate list any combination search looks at
pub const MAX_CANDIDATE_SET: usize = 10;
/// Largest combination the subset-sum strategy tries
pub const MAX_SUBSET_ARITY: usize = 3;
/// Largest partial group the description strategy tries
pub const MAX_GROUP_ARITY: usize = 5;

/// Rows a strategy accepted for a cell
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyMatch {
    pub kind: StrategyKind,
    pub row_ids: Vec<RowId>,
    pub total: BigDecimal,
}

impl StrategyMatch {
    fn from_rows(kind: StrategyKind, rows: &[&Transaction]) -> Self {
        Self {
            kind,
            row_ids: rows.iter().map(|txn| txn.row_id).collect(),
            total: total(rows.iter().copied()),
        }
    }
}

/// Ordered strategy list for one category
#[derive(Debug, Clone)]
pub struct StrategyPipeline {
    strategies: Vec<StrategyKind>,
    tolerance: BigDecimal,
    amount_range_pct: BigDecimal,
}

impl StrategyPipeline {
    pub fn new(
        strategies: Vec<StrategyKind>,
        tolerance: BigDecimal,
        amount_range_pct: BigDecimal,
    ) -> Self {
        Self {
            strategies,
            tolerance,
            amount_range_pct,
        }
    }

    /// Pipeline configured for a category
    pub fn for_category(config: &MatchingConfig, category: Category) -> Self {
        Self::new(
            config.pipeline.strategies_for(category),
            config.tolerance.clone(),
            config.pipeline.amount_range_pct.clone(),
        )
    }

    pub fn strategies(&self) -> &[StrategyKind] {
        &self.strategies
    }

    /// Try each strategy in order; the first that accepts wins.
    ///
    /// Fails with `NoCandidateTransactions` on an empty list and
    /// `NoStrategyMatch` when every strategy declines.
    pub fn run(
        &self,
        cell: CellKey,
        expected: &BigDecimal,
        candidates: &[&Transaction],
    ) -> ReconResult<StrategyMatch> {
        if candidates.is_empty() {
            return Err(ReconError::NoCandidateTransactions(cell));
        }

        for kind in &self.strategies {
            let found = match kind {
                StrategyKind::Exact => exact_match(candidates, expected, &self.tolerance),
                StrategyKind::DescriptionSum => {
                    description_sum(candidates, expected, &self.tolerance)
                }
                StrategyKind::SubsetSum => subset_sum(candidates, expected, &self.tolerance),
                StrategyKind::AmountRange => {
                    amount_range(candidates, expected, &self.amount_range_pct)
                }
            };

            if let Some(found) = found {
                debug!(
                    cell = %cell,
                    strategy = %kind,
                    rows = found.row_ids.len(),
                    total = %found.total,
                    "Strategy matched"
                );
                return Ok(found);
            }
        }

        Err(ReconError::NoStrategyMatch {
            cell,
            tried: self.strategies.clone(),
        })
    }
}

/// Every candidate within tolerance of the expected amount, taken together
pub fn exact_match(
    candidates: &[&Transaction],
    expected: &BigDecimal,
    tolerance: &BigDecimal,
) -> Option<StrategyMatch> {
    let hits: Vec<&Transaction> = candidates
        .iter()
        .copied()
        .filter(|txn| within_tolerance(&txn.amount, expected, tolerance))
        .collect();

    if hits.is_empty() {
        None
    } else {
        Some(StrategyMatch::from_rows(StrategyKind::Exact, &hits))
    }
}

/// Sums of rows sharing a description.
///
/// Whole groups are tried first, in description order. Then each group, in
/// order of first appearance, is searched for a partial combination of up to
/// `MAX_GROUP_ARITY` rows, taken in candidate order.
pub fn description_sum(
    candidates: &[&Transaction],
    expected: &BigDecimal,
    tolerance: &BigDecimal,
) -> Option<StrategyMatch> {
    let mut groups: BTreeMap<&str, Vec<&Transaction>> = BTreeMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    for &txn in candidates {
        let description = txn.description.as_str();
        let group = groups.entry(description).or_default();
        if group.is_empty() {
            first_seen.push(description);
        }
        group.push(txn);
    }

    for group in groups.values() {
        if within_tolerance(&total(group.iter().copied()), expected, tolerance) {
            return Some(StrategyMatch::from_rows(StrategyKind::DescriptionSum, group));
        }
    }

    for description in first_seen {
        let Some(group) = groups.get(description) else {
            continue;
        };
        let max_size = group.len().min(MAX_GROUP_ARITY);
        if let Some(rows) = first_combination(group, 1..=max_size, expected, tolerance) {
            return Some(StrategyMatch::from_rows(StrategyKind::DescriptionSum, &rows));
        }
    }

    None
}

/// Two or three of the largest candidates summing to the expected amount.
///
/// The search favours larger amounts: the list is cut to the
/// `MAX_CANDIDATE_SET` largest rows and combinations are tried in
/// lexicographic order over that ranking.
pub fn subset_sum(
    candidates: &[&Transaction],
    expected: &BigDecimal,
    tolerance: &BigDecimal,
) -> Option<StrategyMatch> {
    let mut ranked = candidates.to_vec();
    sort_by_amount_desc(&mut ranked);
    ranked.truncate(MAX_CANDIDATE_SET);

    first_combination(&ranked, 2..=MAX_SUBSET_ARITY, expected, tolerance)
        .map(|rows| StrategyMatch::from_rows(StrategyKind::SubsetSum, &rows))
}

/// Closest single candidate within `expected * (1 ± pct)`; earlier rows win ties
pub fn amount_range(
    candidates: &[&Transaction],
    expected: &BigDecimal,
    pct: &BigDecimal,
) -> Option<StrategyMatch> {
    let one = BigDecimal::from(1);
    let low = expected * (&one - pct);
    let high = expected * (&one + pct);

    let mut best: Option<(&Transaction, BigDecimal)> = None;
    for &txn in candidates {
        if txn.amount < low || txn.amount > high {
            continue;
        }
        let distance = (&txn.amount - expected).abs();
        let closer = match &best {
            Some((_, best_distance)) => distance < *best_distance,
            None => true,
        };
        if closer {
            best = Some((txn, distance));
        }
    }

    best.map(|(txn, _)| StrategyMatch::from_rows(StrategyKind::AmountRange, &[txn]))
}

/// First combination, by size then lexicographic order, whose sum is within tolerance
fn first_combination<'a>(
    rows: &[&'a Transaction],
    sizes: std::ops::RangeInclusive<usize>,
    expected: &BigDecimal,
    tolerance: &BigDecimal,
) -> Option<Vec<&'a Transaction>> {
    for size in sizes {
        for combo in Combinations::new(rows.len(), size) {
            let sum = combo
                .iter()
                .fold(BigDecimal::from(0), |acc, &i| acc + &rows[i].amount);
            if within_tolerance(&sum, expected, tolerance) {
                return Some(combo.iter().map(|&i| rows[i]).collect());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TransactionBuilder;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn rows(fixture: &[(u64, &str, &str)]) -> Vec<Transaction> {
        let date = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
        fixture.iter()
            .map(|(id, description, amount)| {
                TransactionBuilder::new(*id, date, *description)
                    .amount(BigDecimal::from_str(amount).unwrap())
                    .category(Category::Visa)
                    .build()
                    .unwrap()
            })
            .collect()
    }

    fn tolerance() -> BigDecimal {
        BigDecimal::from_str("0.01").unwrap()
    }

    fn ids(found: &StrategyMatch) -> Vec<u64> {
        found.row_ids.iter().map(|id| id.0).collect()
    }

    #[test]
    fn test_exact_takes_only_the_equal_row() {
        let txns = rows(&[(1, "A", "40"), (2, "A", "60"), (3, "B", "100")]);
        let refs: Vec<&Transaction> = txns.iter().collect();
        let found = exact_match(&refs, &BigDecimal::from(100), &tolerance()).unwrap();
        assert_eq!(ids(&found), vec![3]);
        assert_eq!(found.total, BigDecimal::from(100));
    }

    #[test]
    fn test_description_sum_prefers_whole_groups() {
        let txns = rows(&[
            (1, "VISA DEPOSIT", "40"),
            (2, "VISA DEPOSIT", "60"),
            (3, "BATCH 2", "100"),
        ]);
        let refs: Vec<&Transaction> = txns.iter().collect();
        let found = description_sum(&refs, &BigDecimal::from(100), &tolerance()).unwrap();
        // "BATCH 2" sorts before "VISA DEPOSIT"
        assert_eq!(ids(&found), vec![3]);

        let found = description_sum(&refs[..2], &BigDecimal::from(100), &tolerance()).unwrap();
        assert_eq!(ids(&found), vec![1, 2]);
    }

    #[test]
    fn test_description_sum_partial_group() {
        let txns = rows(&[
            (1, "VISA DEPOSIT", "25.50"),
            (2, "VISA DEPOSIT", "10"),
            (3, "VISA DEPOSIT", "74.50"),
            (4, "VISA DEPOSIT", "8"),
        ]);
        let refs: Vec<&Transaction> = txns.iter().collect();
        let found = description_sum(&refs, &BigDecimal::from(100), &tolerance()).unwrap();
        assert_eq!(found.kind, StrategyKind::DescriptionSum);
        assert_eq!(ids(&found), vec![1, 3]);
    }

    #[test]
    fn test_description_sum_partial_follows_candidate_order() {
        let txns = rows(&[
            (1, "AMEX DEPOSIT", "40"),
            (2, "AMEX DEPOSIT", "60"),
            (3, "AMEX DEPOSIT", "70"),
            (4, "AMEX DEPOSIT", "30"),
        ]);
        let refs: Vec<&Transaction> = txns.iter().collect();
        let found = description_sum(&refs, &BigDecimal::from(100), &tolerance()).unwrap();
        // 40 + 60 comes before 70 + 30
        assert_eq!(ids(&found), vec![1, 2]);
    }

    #[test]
    fn test_subset_sum_biases_toward_large_rows() {
        let txns = rows(&[
            (1, "A", "10"),
            (2, "B", "90"),
            (3, "C", "60"),
            (4, "D", "40"),
        ]);
        let refs: Vec<&Transaction> = txns.iter().collect();
        let found = subset_sum(&refs, &BigDecimal::from(100), &tolerance()).unwrap();
        assert_eq!(ids(&found), vec![2, 1]);

        let found = subset_sum(&refs, &BigDecimal::from(190), &tolerance()).unwrap();
        assert_eq!(ids(&found), vec![2, 3, 4]);

        assert!(subset_sum(&refs, &BigDecimal::from(90), &tolerance()).is_none());
    }

    #[test]
    fn test_amount_range_picks_closest() {
        let txns = rows(&[
            (1, "AMEX", "97.50"),
            (2, "AMEX", "101"),
            (3, "AMEX", "99"),
            (4, "AMEX", "104"),
        ]);
        let refs: Vec<&Transaction> = txns.iter().collect();
        let pct = BigDecimal::from_str("0.03").unwrap();
        let found = amount_range(&refs, &BigDecimal::from(100), &pct).unwrap();
        // 101 and 99 are equally close; the earlier row wins
        assert_eq!(ids(&found), vec![2]);

        assert!(amount_range(&refs[3..], &BigDecimal::from(100), &pct).is_none());
    }

    #[test]
    fn test_pipeline_reports_what_it_tried() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
        let cell = CellKey::new(date, Category::Amex);
        let pipeline = StrategyPipeline::for_category(&MatchingConfig::default(), Category::Amex);
        assert_eq!(pipeline.strategies().len(), 3);

        let err = pipeline.run(cell, &BigDecimal::from(100), &[]).unwrap_err();
        assert!(matches!(err, ReconError::NoCandidateTransactions(_)));

        let txns = rows(&[(1, "AMEX", "50")]);
        let refs: Vec<&Transaction> = txns.iter().collect();
        match pipeline.run(cell, &BigDecimal::from(100), &refs).unwrap_err() {
            ReconError::NoStrategyMatch { tried, .. } => assert_eq!(tried.len(), 3),
            other => panic!("unexpected error: {other}"),
        }

        let txns = rows(&[(1, "AMEX", "98")]);
        let refs: Vec<&Transaction> = txns.iter().collect();
        let found = pipeline.run(cell, &BigDecimal::from(100), &refs).unwrap();
        assert_eq!(found.kind, StrategyKind::AmountRange);
    }
}
