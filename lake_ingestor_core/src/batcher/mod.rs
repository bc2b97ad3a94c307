use std::collections::{BTreeMap, VecDeque, btree_map::Entry};

use crate::{key::PartitionKey, record::Record};

pub use self::policy::FlushPolicy;

mod policy;

/// In-memory buffers of records, one per partition key.
///
/// Records only leave the table through [`BufferTable::snapshot_and_clear`],
/// and a key is never kept around with an empty buffer.
#[derive(Debug, Default)]
pub struct BufferTable {
    buffers: BTreeMap<PartitionKey, VecDeque<Record>>,
    /// Sum of the lengths of all buffers.
    total_count: usize,
}

impl BufferTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record to the key's buffer, creating it if needed.
    pub fn append(&mut self, key: PartitionKey, record: Record) {
        self.buffers.entry(key).or_default().push_back(record);
        self.total_count += 1;
    }

    /// Number of records across all keys.
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn key_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Number of records buffered for the key.
    pub fn len_of(&self, key: &PartitionKey) -> usize {
        self.buffers.get(key).map(VecDeque::len).unwrap_or_default()
    }

    /// Removes the key and returns its records in append order.
    ///
    /// Returns `None` if the key has no buffered records.
    pub fn snapshot_and_clear(&mut self, key: &PartitionKey) -> Option<Vec<Record>> {
        let records = self.buffers.remove(key)?;
        self.total_count -= records.len();
        Some(records.into())
    }

    /// Returns the keys currently buffered, in key order.
    ///
    /// The returned list is a copy, so keys may be cleared while iterating it.
    pub fn iter_keys(&self) -> Vec<PartitionKey> {
        self.buffers.keys().cloned().collect()
    }

    /// Puts records back in front of anything buffered for the key since they
    /// were taken out.
    pub fn reinsert(&mut self, key: PartitionKey, records: Vec<Record>) {
        if records.is_empty() {
            return;
        }

        self.total_count += records.len();

        match self.buffers.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(records.into());
            }
            Entry::Occupied(mut entry) => {
                let newer = std::mem::replace(entry.get_mut(), records.into());
                entry.get_mut().extend(newer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(tenant: &str) -> PartitionKey {
        PartitionKey::new("events", tenant, "P", "2025-08-28")
    }

    fn record(offset: i64) -> Record {
        Record {
            raw: format!("{{\"offset\":{offset}}}"),
            event_id: None,
            topic: "events".to_string(),
            partition: 0,
            offset,
            ingested_at: "2025-08-28T10:00:00.000Z".to_string(),
        }
    }

    fn offsets(records: &[Record]) -> Vec<i64> {
        records.iter().map(|r| r.offset).collect()
    }

    #[test]
    fn test_append_tracks_total_count() {
        let mut table = BufferTable::new();
        assert!(table.is_empty());

        table.append(key("A"), record(0));
        table.append(key("A"), record(1));
        table.append(key("B"), record(2));

        assert_eq!(table.total_count(), 3);
        assert_eq!(table.key_count(), 2);
        assert_eq!(table.len_of(&key("A")), 2);
        assert_eq!(table.len_of(&key("C")), 0);
    }

    #[test]
    fn test_snapshot_preserves_append_order() {
        let mut table = BufferTable::new();
        for offset in 0..5 {
            table.append(key("A"), record(offset));
        }

        let records = table.snapshot_and_clear(&key("A")).unwrap();
        assert_eq!(offsets(&records), vec![0, 1, 2, 3, 4]);
        assert_eq!(table.total_count(), 0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_snapshot_of_missing_key() {
        let mut table = BufferTable::new();
        table.append(key("A"), record(0));

        assert!(table.snapshot_and_clear(&key("B")).is_none());
        assert_eq!(table.total_count(), 1);
    }

    #[test]
    fn test_snapshot_only_affects_its_key() {
        let mut table = BufferTable::new();
        table.append(key("A"), record(0));
        table.append(key("B"), record(1));
        table.append(key("B"), record(2));

        table.snapshot_and_clear(&key("A")).unwrap();

        assert_eq!(table.total_count(), 2);
        assert_eq!(table.iter_keys(), vec![key("B")]);
    }

    #[test]
    fn test_iter_keys_tolerates_removal() {
        let mut table = BufferTable::new();
        table.append(key("B"), record(0));
        table.append(key("A"), record(1));
        table.append(key("C"), record(2));

        let keys = table.iter_keys();
        assert_eq!(keys, vec![key("A"), key("B"), key("C")]);

        for k in &keys {
            table.snapshot_and_clear(&key("C"));
            let _ = table.snapshot_and_clear(k);
        }

        assert!(table.is_empty());
        assert_eq!(table.total_count(), 0);
    }

    #[test]
    fn test_reinsert_goes_in_front_of_newer_records() {
        let mut table = BufferTable::new();
        table.append(key("A"), record(0));
        table.append(key("A"), record(1));

        let failed = table.snapshot_and_clear(&key("A")).unwrap();
        table.append(key("A"), record(2));
        table.reinsert(key("A"), failed);

        assert_eq!(table.total_count(), 3);
        let records = table.snapshot_and_clear(&key("A")).unwrap();
        assert_eq!(offsets(&records), vec![0, 1, 2]);
    }

    #[test]
    fn test_reinsert_empty_does_not_create_key() {
        let mut table = BufferTable::new();
        table.reinsert(key("A"), Vec::new());
        assert!(table.is_empty());
    }
}
