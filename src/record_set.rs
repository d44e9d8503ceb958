/// Reconciled record store keyed by sequence number
///
/// Iterates in ascending sequence order. A later arrival for a sequence that
/// is already held replaces it (last write wins); when the payloads differ the
/// insert reports the overwritten record so the caller can account for it.

use std::collections::BTreeMap;
use crate::decoder::Record;

/// What an insert did to the set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    New,
    /// Same sequence, identical payload
    Duplicate,
    /// Same sequence, different payload; `previous` was overwritten
    Divergent { previous: Record },
}

#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: BTreeMap<u32, Record>,
}

impl RecordSet {
    pub fn new() -> Self {
        RecordSet::default()
    }

    pub fn insert(&mut self, record: Record) -> Insert {
        match self.records.insert(record.sequence, record) {
            None => Insert::New,
            Some(previous) if previous == record => Insert::Duplicate,
            Some(previous) => Insert::Divergent { previous },
        }
    }

    pub fn get(&self, sequence: u32) -> Option<&Record> {
        self.records.get(&sequence)
    }

    pub fn contains(&self, sequence: u32) -> bool {
        self.records.contains_key(&sequence)
    }

    /// Highest sequence held, if any
    pub fn max_sequence(&self) -> Option<u32> {
        self.records.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ascending sequence order
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn sequences(&self) -> impl Iterator<Item = u32> + '_ {
        self.records.keys().copied()
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut set = RecordSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}
