//! One rank's disjoint slice of a distributed sequence.

use std::ops::{Deref, DerefMut};

/// Elements owned by the calling rank.
///
/// Produced by [`GlobalSequence::scatter`](super::GlobalSequence::scatter);
/// consumed by `gather`. The length is fixed by the partition: elements
/// may be modified in place, but the slice is never resized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LocalSequence<T> {
    data: Vec<T>,
}

impl<T> LocalSequence<T> {
    /// Wrap a rank-local contribution.
    ///
    /// Its length must equal this rank's count in the partition the
    /// transfer uses. For
    /// [`GlobalSequence::gather_from`](super::GlobalSequence::gather_from)
    /// that is the count [`plan`](crate::partition::plan) assigns for the
    /// summed total; otherwise the whole group fails with a mismatch.
    pub fn from_local(data: Vec<T>) -> Self {
        LocalSequence { data }
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> Deref for LocalSequence<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> DerefMut for LocalSequence<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> IntoIterator for LocalSequence<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a LocalSequence<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut LocalSequence<T> {
    type Item = &'a mut T;
    type IntoIter = std::slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter_mut()
    }
}

#[cfg(feature = "rayon")]
impl<T: Send + Sync> LocalSequence<T> {
    pub fn par_iter(&self) -> rayon::slice::Iter<'_, T> {
        use rayon::iter::IntoParallelRefIterator;
        self.data.par_iter()
    }

    pub fn par_iter_mut(&mut self) -> rayon::slice::IterMut<'_, T> {
        use rayon::iter::IntoParallelRefMutIterator;
        self.data.par_iter_mut()
    }
}
