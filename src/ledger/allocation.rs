//! Run-scoped allocation ledger: which cell holds which bank row

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::*;

/// How a cell holds a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimKind {
    /// Consumed by a match record
    Matched,
    /// Reserved for an unmatched cell's found/insufficient/excess accounting
    Exclusive,
}

/// A single ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub cell: CellKey,
    pub kind: ClaimKind,
}

/// Claim map guaranteeing every row is held by at most one cell.
///
/// Claims only grow, with one exception: `release_exclusive` hands an
/// unmatched cell's reservation back when cleanup promotes that cell.
#[derive(Debug, Clone, Default)]
pub struct AllocationLedger {
    claims: BTreeMap<RowId, Claim>,
}

impl AllocationLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_claimed(&self, row_id: RowId) -> bool {
        self.claims.contains_key(&row_id)
    }

    pub fn claim_of(&self, row_id: RowId) -> Option<&Claim> {
        self.claims.get(&row_id)
    }

    /// Claim all rows for `cell`, or none of them.
    ///
    /// Fails with `AllocationConflict` when any row is already held, or
    /// appears twice in `row_ids`.
    pub fn claim(&mut self, cell: CellKey, kind: ClaimKind, row_ids: &[RowId]) -> ReconResult<()> {
        let mut pending = BTreeMap::new();
        for &row_id in row_ids {
            if let Some(existing) = self.claims.get(&row_id) {
                return Err(ReconError::AllocationConflict {
                    row_id,
                    holder: existing.cell,
                    claimant: cell,
                });
            }
            if pending.insert(row_id, Claim { cell, kind }).is_some() {
                return Err(ReconError::AllocationConflict {
                    row_id,
                    holder: cell,
                    claimant: cell,
                });
            }
        }
        self.claims.append(&mut pending);
        Ok(())
    }

    /// Drop the exclusive claims held by `cell`, returning the freed rows
    pub fn release_exclusive(&mut self, cell: CellKey) -> Vec<RowId> {
        let freed: Vec<RowId> = self
            .claims
            .iter()
            .filter(|(_, claim)| claim.cell == cell && claim.kind == ClaimKind::Exclusive)
            .map(|(row_id, _)| *row_id)
            .collect();
        for row_id in &freed {
            self.claims.remove(row_id);
        }
        freed
    }

    /// Rows held by `cell`, in row id order
    pub fn rows_held_by(&self, cell: CellKey) -> Vec<RowId> {
        self.claims
            .iter()
            .filter(|(_, claim)| claim.cell == cell)
            .map(|(row_id, _)| *row_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Number of claims of the given kind
    pub fn count(&self, kind: ClaimKind) -> usize {
        self.claims.values().filter(|claim| claim.kind == kind).count()
    }
}
