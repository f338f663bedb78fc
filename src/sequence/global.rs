//! A sequence whose elements live in full on one root rank.

use super::LocalSequence;
use crate::comm::Communicator;
use crate::debug_invariants::DebugInvariants;
use crate::dist_error::DistError;
use crate::group::ProcessGroup;
use crate::partition::{Partition, plan};
use crate::transfer;
use bytemuck::{CheckedBitPattern, NoUninit};
use num_traits::ToPrimitive;
use std::fmt::Debug;
use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, PartialEq)]
enum Storage<T> {
    /// Full element buffer, present on the root only.
    Root(Vec<T>),
    /// Placeholder on every other rank.
    Remote,
}

/// Distribuable sequence: every rank knows the partition, only the root
/// holds the elements.
///
/// Element accessors (`as_slice`, indexing, iteration) are root-only and
/// panic elsewhere; the `try_*` variants return `None` instead.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSequence<T> {
    root: usize,
    rank: usize,
    partition: Partition,
    storage: Storage<T>,
}

#[track_caller]
fn not_root(root: usize, rank: usize) -> ! {
    panic!("global sequence elements are only available on root rank {root} (this is rank {rank})")
}

fn to_len<N: ToPrimitive + Debug>(count: N) -> Result<usize, DistError> {
    count
        .to_usize()
        .ok_or_else(|| DistError::InvalidCount(format!("{count:?}")))
}

impl<T> GlobalSequence<T> {
    fn build<C, F>(
        group: &ProcessGroup<C>,
        n: usize,
        root: usize,
        fill: F,
    ) -> Result<Self, DistError>
    where
        C: Communicator,
        F: FnOnce() -> Result<Vec<T>, DistError>,
    {
        group.check_root(root)?;
        let partition = plan(n, group.size())?;
        let storage = if group.is_root(root) {
            Storage::Root(fill()?)
        } else {
            Storage::Remote
        };
        let seq = GlobalSequence {
            root,
            rank: group.rank(),
            partition,
            storage,
        };
        seq.debug_assert_invariants();
        Ok(seq)
    }

    /// `count` default-valued elements on `root`.
    ///
    /// `count` may be any integer; negative or oversized values fail with
    /// [`DistError::InvalidCount`].
    pub fn new<C, N>(group: &ProcessGroup<C>, count: N, root: usize) -> Result<Self, DistError>
    where
        C: Communicator,
        N: ToPrimitive + Debug,
        T: Default + Clone,
    {
        let n = to_len(count)?;
        Self::build(group, n, root, || Ok(vec![T::default(); n]))
    }

    /// `count` copies of `value` on `root`.
    pub fn from_elem<C, N>(
        group: &ProcessGroup<C>,
        count: N,
        value: T,
        root: usize,
    ) -> Result<Self, DistError>
    where
        C: Communicator,
        N: ToPrimitive + Debug,
        T: Clone,
    {
        let n = to_len(count)?;
        Self::build(group, n, root, || Ok(vec![value; n]))
    }

    /// Copy of `values` on `root`; other ranks only use its length.
    pub fn from_slice<C>(
        group: &ProcessGroup<C>,
        values: &[T],
        root: usize,
    ) -> Result<Self, DistError>
    where
        C: Communicator,
        T: Clone,
    {
        Self::build(group, values.len(), root, || Ok(values.to_vec()))
    }

    /// Takes `values` on `root`; other ranks only use its length.
    pub fn from_vec<C>(
        group: &ProcessGroup<C>,
        values: Vec<T>,
        root: usize,
    ) -> Result<Self, DistError>
    where
        C: Communicator,
    {
        let n = values.len();
        Self::build(group, n, root, || Ok(values))
    }

    /// Elements drawn from an exact-size iterator; it is only consumed on
    /// `root`.
    pub fn from_iter_exact<C, I>(
        group: &ProcessGroup<C>,
        values: I,
        root: usize,
    ) -> Result<Self, DistError>
    where
        C: Communicator,
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let iter = values.into_iter();
        let n = iter.len();
        Self::build(group, n, root, || {
            let v: Vec<T> = iter.collect();
            if v.len() == n {
                Ok(v)
            } else {
                Err(DistError::InvalidCount(format!(
                    "iterator reported {n} elements but yielded {}",
                    v.len()
                )))
            }
        })
    }

    /// Assemble a sequence from a completed transfer.
    pub(crate) fn from_parts(
        root: usize,
        rank: usize,
        partition: Partition,
        elements: Option<Vec<T>>,
    ) -> Self {
        let storage = match elements {
            Some(v) => Storage::Root(v),
            None => Storage::Remote,
        };
        let seq = GlobalSequence {
            root,
            rank,
            partition,
            storage,
        };
        seq.debug_assert_invariants();
        seq
    }

    #[inline]
    pub fn root(&self) -> usize {
        self.root
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        matches!(self.storage, Storage::Root(_))
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn counts(&self) -> &[usize] {
        self.partition.counts()
    }

    pub fn offsets(&self) -> &[usize] {
        self.partition.offsets()
    }

    /// Number of elements of the whole sequence, on every rank.
    pub fn global_len(&self) -> usize {
        self.partition.total()
    }

    /// Number of elements held here: the global length on the root, zero
    /// elsewhere.
    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Root(v) => v.len(),
            Storage::Remote => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Planned element count of `rank`.
    pub fn local_size(&self, rank: usize) -> usize {
        self.partition.count(rank)
    }

    pub fn try_as_slice(&self) -> Option<&[T]> {
        match &self.storage {
            Storage::Root(v) => Some(v),
            Storage::Remote => None,
        }
    }

    pub fn try_as_mut_slice(&mut self) -> Option<&mut [T]> {
        match &mut self.storage {
            Storage::Root(v) => Some(v),
            Storage::Remote => None,
        }
    }

    /// The element buffer on the root, `None` elsewhere.
    pub fn into_vec(self) -> Option<Vec<T>> {
        match self.storage {
            Storage::Root(v) => Some(v),
            Storage::Remote => None,
        }
    }

    /// Root-only.
    #[track_caller]
    pub fn as_slice(&self) -> &[T] {
        match &self.storage {
            Storage::Root(v) => v,
            Storage::Remote => not_root(self.root, self.rank),
        }
    }

    /// Root-only.
    #[track_caller]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let (root, rank) = (self.root, self.rank);
        match &mut self.storage {
            Storage::Root(v) => v,
            Storage::Remote => not_root(root, rank),
        }
    }

    #[track_caller]
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    #[track_caller]
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }
}

impl<T: NoUninit + CheckedBitPattern> GlobalSequence<T> {
    /// Hand every rank its planned slice. Collective.
    pub fn scatter<C: Communicator>(
        &self,
        group: &ProcessGroup<C>,
    ) -> Result<LocalSequence<T>, DistError> {
        transfer::scatter(group, self)
    }

    /// Collect `local` from every rank into a new sequence with this
    /// sequence's partition and root. Collective.
    pub fn gather<C: Communicator>(
        &self,
        group: &ProcessGroup<C>,
        local: &LocalSequence<T>,
    ) -> Result<GlobalSequence<T>, DistError> {
        transfer::gather(group, self, local)
    }

    /// Build a sequence on `root` from local contributions whose total length
    /// is not known in advance. Collective.
    ///
    /// The total is summed to `root` and broadcast, every rank plans the
    /// same partition, and each contribution must match its planned count.
    /// A mismatch anywhere fails the call on every rank before any data
    /// moves.
    pub fn gather_from<C: Communicator>(
        group: &ProcessGroup<C>,
        local: &LocalSequence<T>,
        root: usize,
    ) -> Result<GlobalSequence<T>, DistError> {
        transfer::gather_reduced(group, local, root)
    }
}

impl<T> Index<usize> for GlobalSequence<T> {
    type Output = T;

    #[track_caller]
    fn index(&self, i: usize) -> &T {
        &self.as_slice()[i]
    }
}

impl<T> IndexMut<usize> for GlobalSequence<T> {
    #[track_caller]
    fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.as_mut_slice()[i]
    }
}

impl<'a, T> IntoIterator for &'a GlobalSequence<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    #[track_caller]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut GlobalSequence<T> {
    type Item = &'a mut T;
    type IntoIter = std::slice::IterMut<'a, T>;

    #[track_caller]
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T> DebugInvariants for GlobalSequence<T> {
    fn validate_invariants(&self) -> Result<(), DistError> {
        self.partition.validate_invariants()?;
        let size = self.partition.group_size();
        if self.root >= size {
            return Err(DistError::InvalidRoot {
                root: self.root,
                size,
            });
        }
        match &self.storage {
            Storage::Root(v) if self.rank != self.root || v.len() != self.partition.total() => {
                Err(DistError::PartitionMismatch {
                    rank: self.rank,
                    expected: self.partition.total(),
                    actual: v.len(),
                })
            }
            Storage::Remote if self.rank == self.root => Err(DistError::PartitionMismatch {
                rank: self.rank,
                expected: self.partition.total(),
                actual: 0,
            }),
            _ => Ok(()),
        }
    }
}
