/// Sequence number gap detection
///
/// Scans a record set for sequence numbers missing from `1..=max`. Gaps are
/// held as inclusive (start, end) ranges, so the cost follows the number of
/// records held rather than the size of the highest sequence.

use std::cmp::Ordering;
use crate::record_set::RecordSet;

/// Snapshot of missing sequence numbers as ascending, disjoint ranges
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GapSet {
    ranges: Vec<(u32, u32)>,
}

fn span(&(start, end): &(u32, u32)) -> u64 {
    (end - start) as u64 + 1
}

impl GapSet {
    /// Total missing sequence numbers
    pub fn len(&self) -> u64 {
        self.ranges.iter().map(span).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn contains(&self, sequence: u32) -> bool {
        self.ranges
            .binary_search_by(|&(start, end)| {
                if end < sequence {
                    Ordering::Less
                } else if start > sequence {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Lazily walk every missing sequence, ascending
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|&(start, end)| start..=end)
    }

    pub fn ranges(&self) -> &[(u32, u32)] {
        &self.ranges
    }

    /// Missing sequences at or below `limit`, listed one by one
    pub fn at_or_below(&self, limit: u32) -> Vec<u32> {
        self.ranges
            .iter()
            .take_while(|&&(start, _)| start <= limit)
            .flat_map(|&(start, end)| start..=end.min(limit))
            .collect()
    }

    /// Missing ranges above `limit`, clipped at the limit
    pub fn above(&self, limit: u32) -> Vec<(u32, u32)> {
        self.ranges
            .iter()
            .filter(|&&(_, end)| end > limit)
            .map(|&(start, end)| (start.max(limit + 1), end))
            .collect()
    }
}

/// Total sequence numbers covered by inclusive ranges
pub fn range_count(ranges: &[(u32, u32)]) -> u64 {
    ranges.iter().map(span).sum()
}

impl FromIterator<u32> for GapSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut seqs: Vec<u32> = iter.into_iter().collect();
        seqs.sort_unstable();
        seqs.dedup();

        let mut ranges: Vec<(u32, u32)> = Vec::new();
        for seq in seqs {
            match ranges.last_mut() {
                Some((_, end)) if end.checked_add(1) == Some(seq) => *end = seq,
                _ => ranges.push((seq, seq)),
            }
        }
        GapSet { ranges }
    }
}

pub struct GapDetector;

impl GapDetector {
    /// Compute `{1..=max_sequence} \ held` for the given set
    pub fn scan(records: &RecordSet) -> GapSet {
        let mut ranges = Vec::new();
        let mut expected = 1u32;

        for seq in records.sequences().filter(|&s| s > 0) {
            if seq > expected {
                ranges.push((expected, seq - 1));
            }
            match seq.checked_add(1) {
                Some(next) => expected = next,
                None => break,
            }
        }
        GapSet { ranges }
    }
}
