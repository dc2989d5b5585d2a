//! Anti-greedy candidate quotas, computed once per run

use bigdecimal::{BigDecimal, ToPrimitive};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::FairnessConfig;
use crate::ledger::ExpectationTable;
use crate::types::*;

/// Per-cell cap on how many candidates the pipeline may see
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FairnessPlan {
    pub pool: usize,
    pub base: usize,
    pub max_per_cell: usize,
    quotas: BTreeMap<CellKey, usize>,
}

impl FairnessPlan {
    /// Compute quotas for every cell from the size of the shared pool
    pub fn compute(config: &FairnessConfig, pool: usize, cells: &ExpectationTable) -> Self {
        let cell_count = cells.len().max(1);
        let base = (pool / cell_count).max(1);

        let reserved = BigDecimal::from(pool as u64) * (BigDecimal::from(1) - &config.reservation);
        let spendable = reserved.with_scale(0).to_usize().unwrap_or(0);
        let max_per_cell = config.max_per_cell.min(spendable).max(1);

        let quotas = cells
            .iter()
            .map(|cell| {
                let quota = if config.enabled {
                    adjusted_quota(config, base, max_per_cell, &cell.expected_amount)
                } else {
                    config.max_per_cell
                };
                (cell.key(), quota)
            })
            .collect();

        debug!(pool, base, max_per_cell, enabled = config.enabled, "Computed fairness plan");

        Self {
            pool,
            base,
            max_per_cell,
            quotas,
        }
    }

    /// Quota for a cell; unknown cells get the per-cell maximum
    pub fn quota_for(&self, cell: &CellKey) -> usize {
        self.quotas.get(cell).copied().unwrap_or(self.max_per_cell)
    }
}

fn adjusted_quota(
    config: &FairnessConfig,
    base: usize,
    max_per_cell: usize,
    expected: &BigDecimal,
) -> usize {
    let mut quota = base;
    if *expected > config.large_cell_threshold {
        quota += 1;
    } else if *expected < config.small_cell_threshold {
        quota = quota.saturating_sub(1).max(1);
    }
    quota.clamp(1, max_per_cell)
}
