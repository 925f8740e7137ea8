//! Index administration: raw entry scans, rebuild and consistency checks

use std::collections::BTreeSet;
use std::ops::RangeBounds;

use recordlayer_concurrency::TransactionContext;
use recordlayer_core::{Result, Tuple};
use tracing::{info, warn};

use super::{RecordStore, StoredRecord};
use crate::index::{self, IndexCheckReport, IndexEntry, IndexMaintainer};

impl RecordStore {
    /// Raw entries of `index_name` whose indexed values fall in `range`
    ///
    /// Bounds compare against the leading indexed columns, so a one-element
    /// tuple bounds the first column of a composite index.
    pub fn scan_index<R: RangeBounds<Tuple>>(
        &self,
        txn: &mut TransactionContext,
        index_name: &str,
        range: R,
    ) -> Result<Vec<IndexEntry>> {
        let index = self.metadata.index(index_name)?;
        let maintainer = IndexMaintainer::new(index, &self.indexes);
        let (begin, end) = index::key_range(
            maintainer.subspace(),
            range.start_bound(),
            range.end_bound(),
        )?;
        txn.get_range(&begin, &end, None)?
            .iter()
            .map(|(key, _)| maintainer.decode_entry(key))
            .collect()
    }

    /// Clear `index_name` and re-derive its entries from every record
    ///
    /// Returns the number of entries written.
    pub fn rebuild_index(&self, txn: &mut TransactionContext, index_name: &str) -> Result<usize> {
        let index = self.metadata.index(index_name)?;
        let maintainer = IndexMaintainer::new(index, &self.indexes);
        let (begin, end) = maintainer.subspace().range();
        let cleared = txn.clear_range(&begin, &end)?;

        let records = self.live_records(txn, index.record_type())?;
        for stored in &records {
            maintainer.update(txn, &stored.primary_key, None, Some(&stored.record))?;
        }
        info!(
            txn_id = txn.txn_id,
            index = index_name,
            record_type = index.record_type(),
            cleared,
            written = records.len(),
            "rebuilt index"
        );
        Ok(records.len())
    }

    /// Compare `index_name` with the entries its records require
    pub fn check_index(
        &self,
        txn: &mut TransactionContext,
        index_name: &str,
    ) -> Result<IndexCheckReport> {
        let index = self.metadata.index(index_name)?;
        let maintainer = IndexMaintainer::new(index, &self.indexes);

        let mut expected = BTreeSet::new();
        for stored in self.live_records(txn, index.record_type())? {
            expected.insert(IndexEntry {
                index_name: index_name.to_string(),
                values: maintainer.entry_values(&stored.record)?,
                primary_key: stored.primary_key,
            });
        }
        let actual: BTreeSet<IndexEntry> = self
            .scan_index(txn, index_name, ..)?
            .into_iter()
            .collect();

        let report = IndexCheckReport {
            missing: expected.difference(&actual).cloned().collect(),
            dangling: actual.difference(&expected).cloned().collect(),
        };
        if !report.is_consistent() {
            warn!(
                index = index_name,
                missing = report.missing.len(),
                dangling = report.dangling.len(),
                "index inconsistent with records"
            );
        }
        Ok(report)
    }

    fn live_records(&self, txn: &mut TransactionContext, record_type: &str) -> Result<Vec<StoredRecord>> {
        self.scan_records(txn, record_type)?.collect_records()
    }
}
