//! DistError: Unified error type for dist-seq public APIs
//!
//! Every fallible operation in the crate (planning, type resolution,
//! bootstrap, scatter/gather) reports through this one enum. Contract
//! violations such as reading root-only data on a non-root rank are not
//! errors; they panic.

use crate::group::ThreadingMode;
use thiserror::Error;

/// Unified error type for dist-seq operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DistError {
    /// The requested root rank does not belong to the group.
    #[error("root rank {root} is outside the process group [0, {size})")]
    InvalidRoot { root: usize, size: usize },
    /// No wire descriptor is registered for the element type.
    #[error("no wire descriptor registered for type `{0}`")]
    UnsupportedType(&'static str),
    /// A local buffer disagrees with the planned count for its rank.
    #[error("rank {rank} holds {actual} local elements but the partition assigns it {expected}")]
    PartitionMismatch {
        rank: usize,
        expected: usize,
        actual: usize,
    },
    /// Another rank's contribution to a length-discovering gather disagrees
    /// with the partition planned from the summed total.
    #[error("{mismatched} rank(s) contributed lengths that disagree with the planned partition")]
    PeerPartitionMismatch { mismatched: usize },
    /// The partition was planned against a different group size.
    #[error("partition was planned for {planned} ranks but the group has {current}")]
    GroupSizeChanged { planned: usize, current: usize },
    /// A partition was requested for zero ranks.
    #[error("process group size must be positive")]
    EmptyGroup,
    /// An element count that is negative or does not fit in `usize`.
    #[error("element count {0} is not a valid sequence length")]
    InvalidCount(String),
    /// A type already has a wire descriptor.
    #[error("a wire descriptor for type `{0}` is already registered")]
    DuplicateDescriptor(&'static str),
    /// Descriptor extent and in-memory size of the type disagree.
    #[error("descriptor for `{type_name}` spans {extent} bytes but the type occupies {size}")]
    DescriptorWidth {
        type_name: &'static str,
        extent: usize,
        size: usize,
    },
    /// A byte count or summed length does not fit the substrate's count type.
    #[error("count {0} exceeds the substrate's count range")]
    CountOverflow(u128),
    /// Received bytes do not form a valid element, e.g. a `bool` byte other
    /// than 0 or 1.
    #[error("received bytes at element {index} are not a valid `{type_name}`")]
    InvalidElement {
        type_name: &'static str,
        index: usize,
    },
    /// Point-to-point or collective traffic with a peer failed.
    #[error("communication with rank {neighbor} failed: {reason}")]
    CommError { neighbor: usize, reason: String },
    /// The substrate could not be brought up.
    #[error("process group bootstrap failed: {0}")]
    Bootstrap(String),
    /// A collective was issued from a thread the threading mode excludes.
    #[error("threading mode {mode:?} only allows collectives on the bootstrapping thread")]
    ThreadingViolation { mode: ThreadingMode },
    /// A rank of a thread-backed group panicked.
    #[error("rank {0} terminated abnormally")]
    RankPanicked(usize),
}
