//! Amount comparison and combination enumeration helpers

use bigdecimal::BigDecimal;

use crate::types::Transaction;

/// `|actual - expected| < tolerance`
pub fn within_tolerance(actual: &BigDecimal, expected: &BigDecimal, tolerance: &BigDecimal) -> bool {
    (actual - expected).abs() < *tolerance
}

/// Sum of the amounts of the given transactions
pub fn total<'a, I>(transactions: I) -> BigDecimal
where
    I: IntoIterator<Item = &'a Transaction>,
{
    transactions
        .into_iter()
        .fold(BigDecimal::from(0), |acc, txn| acc + &txn.amount)
}

/// Stable sort by amount, largest first. Equal amounts keep their input order.
pub fn sort_by_amount_desc(transactions: &mut [&Transaction]) {
    transactions.sort_by(|a, b| b.amount.cmp(&a.amount));
}

/// Index combinations of `k` out of `n` in lexicographic order.
///
/// Yields a single empty combination for `k == 0` and nothing for `k > n`.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    indices: Vec<usize>,
    done: bool,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            done: k > n,
        }
    }

    fn advance(&mut self) {
        let k = self.indices.len();
        // Rightmost index that can still move right
        let mut i = k;
        while i > 0 {
            i -= 1;
            if self.indices[i] < self.n - k + i {
                self.indices[i] += 1;
                for j in i + 1..k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
                return;
            }
        }
        self.done = true;
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let current = self.indices.clone();
        self.advance();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_tolerance_is_strict() {
        let tolerance = BigDecimal::from_str("0.01").unwrap();
        let expected = BigDecimal::from(100);
        assert!(within_tolerance(
            &BigDecimal::from_str("100.009").unwrap(),
            &expected,
            &tolerance
        ));
        assert!(!within_tolerance(
            &BigDecimal::from_str("100.01").unwrap(),
            &expected,
            &tolerance
        ));
        assert!(within_tolerance(
            &BigDecimal::from_str("99.995").unwrap(),
            &expected,
            &tolerance
        ));
    }

    #[test]
    fn test_combinations_are_lexicographic() {
        let combos: Vec<Vec<usize>> = Combinations::new(4, 2).collect();
        assert_eq!(
            combos,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert_eq!(Combinations::new(5, 3).count(), 10);
        assert_eq!(Combinations::new(3, 3).collect::<Vec<_>>(), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_combination_edge_sizes() {
        assert_eq!(Combinations::new(3, 0).collect::<Vec<_>>(), vec![Vec::<usize>::new()]);
        assert_eq!(Combinations::new(0, 0).count(), 1);
        assert_eq!(Combinations::new(2, 3).count(), 0);
    }
}
