use crate::listing::ListingRecord;
use std::collections::HashSet;

/// Accumulated listings for one (city, building type) harvest
///
/// Records are kept in arrival order. By default nothing is deduplicated, so
/// a refetched page contributes its records a second time; enabling
/// `dedupe_on_merge` drops any record whose `Id` is already present.
#[derive(Debug, Clone, Default)]
pub struct ListingSet {
    records: Vec<ListingRecord>,
    dedupe_on_merge: bool,
    seen_ids: HashSet<String>,
}

impl ListingSet {
    pub fn new(dedupe_on_merge: bool) -> Self {
        Self {
            records: Vec::new(),
            dedupe_on_merge,
            seen_ids: HashSet::new(),
        }
    }

    /// Builds a set from previously persisted records
    ///
    /// Existing records are kept verbatim even when deduplication is enabled;
    /// only later merges are filtered.
    pub fn from_records(records: Vec<ListingRecord>, dedupe_on_merge: bool) -> Self {
        let seen_ids = if dedupe_on_merge {
            records.iter().filter_map(ListingRecord::id).collect()
        } else {
            HashSet::new()
        };

        Self {
            records,
            dedupe_on_merge,
            seen_ids,
        }
    }

    /// Appends one record, returning false if it was dropped as a duplicate
    pub fn push(&mut self, record: ListingRecord) -> bool {
        if self.dedupe_on_merge {
            if let Some(id) = record.id() {
                if !self.seen_ids.insert(id) {
                    return false;
                }
            }
        }
        self.records.push(record);
        true
    }

    /// Appends records in order, returning how many were kept
    pub fn merge<I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = ListingRecord>,
    {
        records
            .into_iter()
            .map(|record| self.push(record))
            .filter(|kept| *kept)
            .count()
    }

    pub fn records(&self) -> &[ListingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
