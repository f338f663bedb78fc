//! Scatter and gather between global and local sequences.
//!
//! Every transfer follows the same steps:
//! 1. admit the collective under the group's threading mode,
//! 2. resolve the element's wire descriptor and scale the partition's
//!    count/offset tables to bytes,
//! 3. issue exactly one variable-length collective on the substrate,
//! 4. decode the received bytes into the resulting sequence.
//!
//! Elements are sent as their raw bytes (`NoUninit`) and bit-checked on
//! receipt (`CheckedBitPattern`), so types such as `bool` travel safely.
//!
//! Validation for [`scatter`] and [`gather`] happens before the collective,
//! on each rank independently. A rank that fails validation never enters the
//! collective, which leaves its peers blocked: as with any substrate
//! failure, the group is unusable afterwards. [`gather_reduced`] instead
//! agrees on length mismatches collectively, so every rank fails together.

use crate::comm::{Communicator, Varcount, VarcountMut};
use crate::datatype::wire::{cast_slice, decode_elements};
use crate::datatype::{self, WireDescriptor};
use crate::dist_error::DistError;
use crate::group::ProcessGroup;
use crate::partition::{Partition, plan};
use crate::sequence::{GlobalSequence, LocalSequence};
use bytemuck::{CheckedBitPattern, NoUninit};
use log::{debug, warn};
use std::any::type_name;
use std::mem::size_of;

/// Byte-level layout of one transfer.
#[derive(Debug)]
struct TransferPlan {
    descriptor: WireDescriptor,
    counts: Vec<usize>,
    displs: Vec<usize>,
}

impl TransferPlan {
    fn prepare<T, C: Communicator>(
        group: &ProcessGroup<C>,
        partition: &Partition,
        root: usize,
    ) -> Result<Self, DistError>
    where
        T: 'static,
    {
        let descriptor = datatype::resolve::<T>()?;
        if descriptor.extent() != size_of::<T>() {
            return Err(DistError::DescriptorWidth {
                type_name: type_name::<T>(),
                extent: descriptor.extent(),
                size: size_of::<T>(),
            });
        }
        group.check_root(root)?;
        partition.check_group_size(group.size())?;
        let (counts, displs) = partition.byte_tables(descriptor.extent())?;
        Ok(TransferPlan {
            descriptor,
            counts,
            displs,
        })
    }

    /// Bytes of a buffer holding `n` elements.
    fn bytes_for(&self, n: usize) -> Result<usize, DistError> {
        let extent = self.descriptor.extent();
        n.checked_mul(extent)
            .ok_or(DistError::CountOverflow(n as u128 * extent as u128))
    }
}

/// Split `global` from its root into one [`LocalSequence`] per rank.
pub fn scatter<T, C>(
    group: &ProcessGroup<C>,
    global: &GlobalSequence<T>,
) -> Result<LocalSequence<T>, DistError>
where
    T: NoUninit + CheckedBitPattern,
    C: Communicator,
{
    let _guard = group.enter_collective()?;
    let root = global.root();
    let layout = TransferPlan::prepare::<T, C>(group, global.partition(), root)?;
    let me = group.rank();
    let n = global.local_size(me);

    let mut received = vec![0u8; layout.bytes_for(n)?];
    let send = group.is_root(root).then(|| Varcount {
        buf: cast_slice(global.as_slice()),
        counts: &layout.counts,
        displs: &layout.displs,
    });
    debug!(
        "scatter<{}>: {} elements from root {root}, rank {me} receives {n}",
        layout.descriptor,
        global.global_len(),
    );
    group.comm().scatter_varcount(root, send, &mut received)?;
    Ok(LocalSequence::from_local(decode_elements(&received, n)?))
}

/// Collect every rank's `local` into a new sequence on `global`'s root,
/// reusing `global`'s partition.
pub fn gather<T, C>(
    group: &ProcessGroup<C>,
    global: &GlobalSequence<T>,
    local: &LocalSequence<T>,
) -> Result<GlobalSequence<T>, DistError>
where
    T: NoUninit + CheckedBitPattern,
    C: Communicator,
{
    let _guard = group.enter_collective()?;
    collect_into(group, global.partition().clone(), global.root(), local)
}

/// Gather contributions whose total length only the group as a whole knows.
///
/// The local lengths are summed to `root` and the total is broadcast so every
/// rank plans the identical partition. The ranks then agree, with a second
/// reduction and broadcast, whether every contribution matches its planned
/// count. If any does not, no rank enters the gather: mismatched ranks fail
/// with [`DistError::PartitionMismatch`], the others with
/// [`DistError::PeerPartitionMismatch`].
pub fn gather_reduced<T, C>(
    group: &ProcessGroup<C>,
    local: &LocalSequence<T>,
    root: usize,
) -> Result<GlobalSequence<T>, DistError>
where
    T: NoUninit + CheckedBitPattern,
    C: Communicator,
{
    let _guard = group.enter_collective()?;
    group.check_root(root)?;

    let comm = group.comm();
    let me = group.rank();
    let partial = comm.reduce_sum(root, local.len() as u64)?;
    let total = comm.broadcast_u64(root, partial.unwrap_or(0))?;
    let n = usize::try_from(total).map_err(|_| DistError::InvalidCount(total.to_string()))?;
    let partition = plan(n, group.size())?;
    debug!("gather_from: rank {me} contributes {} of {n} elements", local.len());

    let expected = partition.count(me);
    let mismatched = u64::from(local.len() != expected);
    let mismatched = comm.reduce_sum(root, mismatched)?;
    let mismatched = comm.broadcast_u64(root, mismatched.unwrap_or(0))?;
    if mismatched > 0 {
        warn!("gather_from: {mismatched} rank(s) disagree with the planned partition");
        return Err(if local.len() != expected {
            DistError::PartitionMismatch {
                rank: me,
                expected,
                actual: local.len(),
            }
        } else {
            DistError::PeerPartitionMismatch {
                mismatched: usize::try_from(mismatched).unwrap_or(usize::MAX),
            }
        });
    }

    collect_into(group, partition, root, local)
}

/// Gather body shared by both variants; the caller holds the collective guard.
fn collect_into<T, C>(
    group: &ProcessGroup<C>,
    partition: Partition,
    root: usize,
    local: &LocalSequence<T>,
) -> Result<GlobalSequence<T>, DistError>
where
    T: NoUninit + CheckedBitPattern,
    C: Communicator,
{
    let layout = TransferPlan::prepare::<T, C>(group, &partition, root)?;
    let me = group.rank();
    let expected = partition.count(me);
    if local.len() != expected {
        return Err(DistError::PartitionMismatch {
            rank: me,
            expected,
            actual: local.len(),
        });
    }

    let total = partition.total();
    let mut received = if group.is_root(root) {
        Some(vec![0u8; layout.bytes_for(total)?])
    } else {
        None
    };
    let recv = received.as_mut().map(|buf| VarcountMut {
        buf: buf.as_mut_slice(),
        counts: &layout.counts,
        displs: &layout.displs,
    });
    debug!(
        "gather<{}>: rank {me} sends {} elements to root {root} ({total} total)",
        layout.descriptor,
        local.len(),
    );
    group
        .comm()
        .gather_varcount(root, cast_slice(local.as_slice()), recv)?;

    let elements = received
        .map(|bytes| decode_elements(&bytes, total))
        .transpose()?;
    Ok(GlobalSequence::from_parts(root, me, partition, elements))
}
