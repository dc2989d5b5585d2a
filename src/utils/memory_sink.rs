//! In-memory sink implementation for testing

use async_trait::async_trait;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::reconciliation::discrepancy::DiscrepancyReport;
use crate::traits::*;
use crate::types::*;

/// In-memory sink for testing and development.
///
/// Clones share the same buffers, so a test can keep a handle while the
/// engine writes through another.
#[derive(Debug, Clone)]
pub struct MemorySink {
    matches: Arc<RwLock<Vec<MatchRecord>>>,
    unmatched: Arc<RwLock<Vec<UnmatchedRecord>>>,
    discrepancies: Arc<RwLock<Option<DiscrepancyReport>>>,
}

impl MemorySink {
    /// Create a new memory sink instance
    pub fn new() -> Self {
        Self {
            matches: Arc::new(RwLock::new(Vec::new())),
            unmatched: Arc::new(RwLock::new(Vec::new())),
            discrepancies: Arc::new(RwLock::new(None)),
        }
    }

    pub fn matches(&self) -> ReconResult<Vec<MatchRecord>> {
        Ok(read(&self.matches)?.clone())
    }

    pub fn unmatched(&self) -> ReconResult<Vec<UnmatchedRecord>> {
        Ok(read(&self.unmatched)?.clone())
    }

    pub fn discrepancies(&self) -> ReconResult<Option<DiscrepancyReport>> {
        Ok(read(&self.discrepancies)?.clone())
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> ReconResult<()> {
        write(&self.matches)?.clear();
        write(&self.unmatched)?.clear();
        *write(&self.discrepancies)? = None;
        Ok(())
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> ReconResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|e| ReconError::Sink(format!("poisoned lock: {}", e)))
}

fn write<T>(lock: &RwLock<T>) -> ReconResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|e| ReconError::Sink(format!("poisoned lock: {}", e)))
}

#[async_trait]
impl ReconciliationSink for MemorySink {
    async fn record_match(&mut self, record: &MatchRecord) -> ReconResult<()> {
        write(&self.matches)?.push(record.clone());
        Ok(())
    }

    async fn record_unmatched(&mut self, record: &UnmatchedRecord) -> ReconResult<()> {
        write(&self.unmatched)?.push(record.clone());
        Ok(())
    }

    async fn record_discrepancies(&mut self, report: &DiscrepancyReport) -> ReconResult<()> {
        *write(&self.discrepancies)? = Some(report.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_records_are_shared_between_clones() {
        let handle = MemorySink::new();
        let mut sink = handle.clone();
        let cell = CellKey::new(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(), Category::Cash);

        sink.record_match(&MatchRecord::new(
            cell,
            BigDecimal::from(20),
            MatchMethod::Pipeline(StrategyKind::Exact),
            vec![RowId(1)],
            BigDecimal::from(20),
        ))
        .await
        .unwrap();

        assert_eq!(handle.matches().unwrap().len(), 1);
        assert!(handle.discrepancies().unwrap().is_none());

        handle.clear().unwrap();
        assert!(sink.matches().unwrap().is_empty());
    }
}
