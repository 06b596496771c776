//! Per-partition transaction watermarks.
//!
//! A watermark is the highest transaction id whose files are already folded
//! into a partition's BASE files. Entries are created on the first rewrite of
//! a partition and only ever move up: every update is `max(existing, new)`,
//! which makes replays idempotent and lets rewrites of the same partition be
//! applied in any order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{id::TransactionId, partition::PartitionKey};

/// Raw value reported for a partition without a watermark.
pub const UNSET_WATERMARK: i64 = -1;

/// Batch of per-partition watermark candidates applied together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkBatch {
    updates: BTreeMap<PartitionKey, TransactionId>,
}

impl WatermarkBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `txn_id` as a candidate for `partition`. Repeated pushes for the
    /// same partition keep the highest id.
    pub fn push(&mut self, partition: PartitionKey, txn_id: TransactionId) {
        self.updates
            .entry(partition)
            .and_modify(|current| *current = (*current).max(txn_id))
            .or_insert(txn_id);
    }

    /// Whether the batch holds no updates.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Number of distinct partitions touched.
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// Iterate over `(partition, candidate)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&PartitionKey, &TransactionId)> {
        self.updates.iter()
    }
}

/// Mapping from partition to the highest incorporated transaction id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionWatermarks {
    entries: BTreeMap<PartitionKey, TransactionId>,
}

impl PartitionWatermarks {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Watermark of `partition`, if one was ever recorded.
    pub fn get(&self, partition: &PartitionKey) -> Option<TransactionId> {
        self.entries.get(partition).copied()
    }

    /// Watermark of `partition` as a raw value, [`UNSET_WATERMARK`] when absent.
    pub fn get_raw(&self, partition: &PartitionKey) -> i64 {
        self.get(partition)
            .map(TransactionId::get)
            .unwrap_or(UNSET_WATERMARK)
    }

    /// Advance `partition` to at least `txn_id` and return the resulting value.
    pub fn upsert(&mut self, partition: PartitionKey, txn_id: TransactionId) -> TransactionId {
        let slot = self.entries.entry(partition).or_insert(txn_id);
        if txn_id > *slot {
            *slot = txn_id;
        }
        *slot
    }

    /// Return a new mapping with every update of `batch` applied.
    ///
    /// The receiver is left untouched, so a caller either publishes the whole
    /// returned mapping or nothing.
    pub fn with_batch(&self, batch: &WatermarkBatch) -> Self {
        let mut next = self.clone();
        for (partition, txn_id) in batch.iter() {
            next.upsert(partition.clone(), *txn_id);
        }
        next
    }

    /// Number of partitions with a watermark.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no partition has a watermark.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(partition, watermark)` pairs in partition order.
    pub fn iter(&self) -> impl Iterator<Item = (&PartitionKey, &TransactionId)> {
        self.entries.iter()
    }
}

impl FromIterator<(PartitionKey, TransactionId)> for PartitionWatermarks {
    fn from_iter<I: IntoIterator<Item = (PartitionKey, TransactionId)>>(iter: I) -> Self {
        let mut marks = PartitionWatermarks::new();
        for (partition, txn_id) in iter {
            marks.upsert(partition, txn_id);
        }
        marks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn(raw: i64) -> TransactionId {
        TransactionId::new(raw).expect("positive txn id")
    }

    fn part(day: &str) -> PartitionKey {
        PartitionKey::from_iter([day])
    }

    #[test]
    fn unset_partition_reports_minus_one() {
        let marks = PartitionWatermarks::new();
        assert_eq!(marks.get(&part("2024-01-01")), None);
        assert_eq!(marks.get_raw(&part("2024-01-01")), UNSET_WATERMARK);
    }

    #[test]
    fn upsert_keeps_maximum_in_any_order() {
        let ids = [3, 9, 1, 7];
        let mut forward = PartitionWatermarks::new();
        for id in ids {
            forward.upsert(part("p"), txn(id));
        }
        let mut backward = PartitionWatermarks::new();
        for id in ids.iter().rev() {
            backward.upsert(part("p"), txn(*id));
        }
        assert_eq!(forward.get(&part("p")), Some(txn(9)));
        assert_eq!(forward, backward);
    }

    #[test]
    fn upsert_returns_resulting_value() {
        let mut marks = PartitionWatermarks::new();
        assert_eq!(marks.upsert(part("p"), txn(5)), txn(5));
        assert_eq!(marks.upsert(part("p"), txn(2)), txn(5));
        assert_eq!(marks.upsert(part("p"), txn(8)), txn(8));
    }

    #[test]
    fn batch_is_applied_to_a_copy() {
        let base: PartitionWatermarks = [(part("a"), txn(4))].into_iter().collect();
        let mut batch = WatermarkBatch::new();
        batch.push(part("a"), txn(2));
        batch.push(part("b"), txn(6));
        batch.push(part("b"), txn(3));

        let next = base.with_batch(&batch);
        assert_eq!(base.len(), 1);
        assert_eq!(next.get(&part("a")), Some(txn(4)));
        assert_eq!(next.get(&part("b")), Some(txn(6)));
        assert_eq!(next.with_batch(&batch), next);
    }
}
