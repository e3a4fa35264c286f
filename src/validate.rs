//! Linked-list validator for the bin-head / next-pointer tables.
//!
//! Walks every bin from head to tail and classifies anything that is not a
//! clean, finite, in-range chain. This never runs inside a simulation step;
//! it backs the debug snapshot and the integration tests.

use std::fmt;

use crate::spatial::EMPTY;

/// A broken chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListFault {
    /// A head or next entry that is neither [`EMPTY`] nor a particle index.
    OutOfRange { bin: usize, index: i32 },
    /// The walk of `bin` reached `index` a second time.
    Cycle { bin: usize, index: usize },
}

impl fmt::Display for ListFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListFault::OutOfRange { bin, index } => {
                write!(f, "bin {}: index {} is out of range", bin, index)
            }
            ListFault::Cycle { bin, index } => {
                write!(f, "bin {}: cycle detected at particle {}", bin, index)
            }
        }
    }
}

/// Outcome of walking every bin.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationReport {
    pub faults: Vec<ListFault>,
    /// For each particle, how many bin lists reached it.
    pub visits: Vec<u32>,
    /// For each particle, the first bin whose list reached it.
    pub bin_of: Vec<Option<usize>>,
}

impl ValidationReport {
    /// No faults and every particle is reached exactly once.
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty() && self.visits.iter().all(|&v| v == 1)
    }

    /// Number of distinct particles reachable from some bin head.
    pub fn reachable(&self) -> usize {
        self.visits.iter().filter(|&&v| v > 0).count()
    }

    /// Particles no bin list reaches.
    pub fn lost(&self) -> Vec<usize> {
        self.visits
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| (v == 0).then_some(i))
            .collect()
    }
}

/// Walk every bin list. `next.len()` is the particle count.
pub fn validate_lists(heads: &[i32], next: &[i32]) -> ValidationReport {
    let count = next.len();
    let mut report = ValidationReport {
        faults: Vec::new(),
        visits: vec![0; count],
        bin_of: vec![None; count],
    };
    // Stamp per particle with the bin currently being walked, so the
    // visited set does not need clearing between bins.
    let mut stamp = vec![usize::MAX; count];

    for (bin, &head) in heads.iter().enumerate() {
        let mut cursor = head;
        while cursor != EMPTY {
            let Some(index) = as_particle(cursor, count) else {
                report.faults.push(ListFault::OutOfRange { bin, index: cursor });
                break;
            };
            if stamp[index] == bin {
                report.faults.push(ListFault::Cycle { bin, index });
                break;
            }
            stamp[index] = bin;
            report.visits[index] += 1;
            report.bin_of[index].get_or_insert(bin);
            cursor = next[index];
        }
    }

    report
}

/// Members of one bin in list order, stopping at the first fault or after
/// `next.len()` steps. A `bin` past the head table has no members.
pub fn bin_members(heads: &[i32], next: &[i32], bin: usize) -> Vec<usize> {
    let mut members = Vec::new();
    let Some(&head) = heads.get(bin) else {
        return members;
    };
    let mut cursor = head;
    while cursor != EMPTY && members.len() < next.len() {
        match as_particle(cursor, next.len()) {
            Some(index) => {
                members.push(index);
                cursor = next[index];
            }
            None => break,
        }
    }
    members
}

#[inline]
pub(crate) fn as_particle(link: i32, count: usize) -> Option<usize> {
    usize::try_from(link).ok().filter(|&i| i < count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_tables() {
        // bin 0: 2 -> 0, bin 1: empty, bin 2: 1
        let heads = [2, EMPTY, 1];
        let next = [EMPTY, EMPTY, 0];
        let report = validate_lists(&heads, &next);
        assert!(report.is_clean());
        assert_eq!(report.reachable(), 3);
        assert_eq!(report.bin_of, vec![Some(0), Some(2), Some(0)]);
        assert_eq!(bin_members(&heads, &next, 0), vec![2, 0]);
    }

    #[test]
    fn test_detects_cycle() {
        let heads = [0];
        let next = [1, 2, 0];
        let report = validate_lists(&heads, &next);
        assert_eq!(report.faults, vec![ListFault::Cycle { bin: 0, index: 0 }]);
        assert!(!report.is_clean());
        assert_eq!(bin_members(&heads, &next, 0).len(), 3);
    }

    #[test]
    fn test_members_of_unknown_bin_is_empty() {
        let heads = [1, EMPTY];
        let next = [EMPTY, 0];
        assert_eq!(bin_members(&heads, &next, 0), vec![1, 0]);
        assert!(bin_members(&heads, &next, 2).is_empty());
        assert!(bin_members(&heads, &next, usize::MAX).is_empty());
    }

    #[test]
    fn test_detects_out_of_range() {
        let heads = [0, 7];
        let next = [-5];
        let report = validate_lists(&heads, &next);
        assert_eq!(
            report.faults,
            vec![
                ListFault::OutOfRange { bin: 0, index: -5 },
                ListFault::OutOfRange { bin: 1, index: 7 },
            ]
        );
    }

    #[test]
    fn test_detects_lost_and_shared() {
        // particle 1 is unreachable, particle 0 is reached from both bins
        let heads = [0, 2];
        let next = [EMPTY, EMPTY, 0];
        let report = validate_lists(&heads, &next);
        assert!(report.faults.is_empty());
        assert_eq!(report.lost(), vec![1]);
        assert_eq!(report.visits[0], 2);
        assert!(!report.is_clean());
    }
}
