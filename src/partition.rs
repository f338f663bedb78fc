//! Deterministic block partitioning of `n` elements over `p` ranks.
//!
//! The first `n % p` ranks (in ascending rank order) receive one extra
//! element, so a plan depends only on `(n, p)` and is identical on every
//! rank that computes it. Offsets are the exclusive prefix sum of counts.
//!
//! ```
//! use dist_seq::partition::plan;
//! let p = plan(10, 4).unwrap();
//! assert_eq!(p.counts(), &[3, 3, 2, 2]);
//! assert_eq!(p.offsets(), &[0, 3, 6, 8]);
//! ```

use crate::debug_invariants::DebugInvariants;
use crate::dist_error::DistError;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Per-rank element counts and offsets into the global sequence.
///
/// Deserialized partitions are checked against the same invariants
/// [`plan`] guarantees.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPartition")]
pub struct Partition {
    counts: Vec<usize>,
    offsets: Vec<usize>,
    total: usize,
}

/// Unchecked wire form of a [`Partition`].
#[derive(Deserialize)]
struct RawPartition {
    counts: Vec<usize>,
    offsets: Vec<usize>,
    total: usize,
}

impl TryFrom<RawPartition> for Partition {
    type Error = DistError;

    fn try_from(raw: RawPartition) -> Result<Self, Self::Error> {
        let partition = Partition {
            counts: raw.counts,
            offsets: raw.offsets,
            total: raw.total,
        };
        partition.validate_invariants()?;
        Ok(partition)
    }
}

/// Plan the distribution of `n` elements over a group of `p` ranks.
pub fn plan(n: usize, p: usize) -> Result<Partition, DistError> {
    if p == 0 {
        return Err(DistError::EmptyGroup);
    }
    let block = n / p;
    let remainder = n % p;

    let counts: Vec<usize> = (0..p)
        .map(|i| block + usize::from(i < remainder))
        .collect();
    let offsets: Vec<usize> = counts
        .iter()
        .scan(0usize, |acc, &c| {
            let start = *acc;
            *acc += c;
            Some(start)
        })
        .collect();

    let partition = Partition {
        counts,
        offsets,
        total: n,
    };
    partition.debug_assert_invariants();
    Ok(partition)
}

impl Partition {
    /// Number of ranks this partition was planned for.
    #[inline]
    pub fn group_size(&self) -> usize {
        self.counts.len()
    }

    /// Total number of elements across all ranks.
    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    #[inline]
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    #[inline]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Element count assigned to `rank`.
    ///
    /// # Panics
    /// If `rank >= self.group_size()`.
    #[inline]
    pub fn count(&self, rank: usize) -> usize {
        self.counts[rank]
    }

    /// Global index of the first element of `rank`'s slice.
    ///
    /// # Panics
    /// If `rank >= self.group_size()`.
    #[inline]
    pub fn offset(&self, rank: usize) -> usize {
        self.offsets[rank]
    }

    /// Global index range held by `rank`.
    pub fn range(&self, rank: usize) -> Range<usize> {
        let start = self.offsets[rank];
        start..start + self.counts[rank]
    }

    /// Global index ranges of all ranks, in rank order.
    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.offsets
            .iter()
            .zip(&self.counts)
            .map(|(&start, &len)| start..start + len)
    }

    /// Rank holding global index `index`, or `None` past the end.
    ///
    /// Empty trailing ranks never own an index; the lowest rank whose
    /// range contains `index` is returned.
    pub fn owner_of(&self, index: usize) -> Option<usize> {
        if index >= self.total {
            return None;
        }
        // offsets are non-decreasing; the owner is the last rank whose
        // offset is <= index among ranks with a non-empty slice.
        let upper = self.offsets.partition_point(|&o| o <= index);
        (0..upper).rev().find(|&r| self.counts[r] > 0)
    }

    /// Reject use against a group whose size differs from the planned one.
    pub fn check_group_size(&self, current: usize) -> Result<(), DistError> {
        if self.group_size() == current {
            Ok(())
        } else {
            Err(DistError::GroupSizeChanged {
                planned: self.group_size(),
                current,
            })
        }
    }

    /// Count and displacement tables scaled to bytes for elements of
    /// `extent` bytes, as handed to a variable-length collective.
    pub fn byte_tables(&self, extent: usize) -> Result<(Vec<usize>, Vec<usize>), DistError> {
        let scale = |v: &[usize]| -> Result<Vec<usize>, DistError> {
            v.iter()
                .map(|&x| {
                    x.checked_mul(extent)
                        .ok_or(DistError::CountOverflow(x as u128 * extent as u128))
                })
                .collect()
        };
        Ok((scale(&self.counts)?, scale(&self.offsets)?))
    }
}

impl DebugInvariants for Partition {
    fn validate_invariants(&self) -> Result<(), DistError> {
        let broken = |what: &str| DistError::InvalidCount(format!("partition {what}: {self:?}"));

        if self.counts.is_empty() {
            return Err(DistError::EmptyGroup);
        }
        if self.offsets.len() != self.counts.len() {
            return Err(broken("has mismatched count/offset tables"));
        }
        let sum = self
            .counts
            .iter()
            .try_fold(0usize, |acc, &c| acc.checked_add(c));
        if sum != Some(self.total) {
            return Err(broken("counts do not sum to the total"));
        }
        if self.offsets[0] != 0 {
            return Err(broken("does not start at offset 0"));
        }
        let contiguous = self
            .offsets
            .iter()
            .zip(&self.counts)
            .tuple_windows()
            .all(|((o0, c0), (o1, _))| o0.checked_add(*c0) == Some(*o1));
        if !contiguous {
            return Err(broken("offsets are not the prefix sum of counts"));
        }
        let front_loaded = self.counts.iter().tuple_windows().all(|(a, b)| a >= b);
        if !front_loaded || self.counts[0] - self.counts[self.counts.len() - 1] > 1 {
            return Err(broken("is not a front-loaded block distribution"));
        }
        Ok(())
    }
}
