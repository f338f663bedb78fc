#![cfg_attr(docsrs, feature(doc_cfg))]
//! # dist-seq
//!
//! dist-seq distributes a sequence of values across a fixed-size process
//! group and moves it between a *global* form, held in full on one root
//! rank, and a *local* form, one disjoint slice per rank.
//!
//! ## Features
//! - Deterministic block partitioning ([`partition::plan`]): the first
//!   `n % p` ranks receive one extra element
//! - [`GlobalSequence`](sequence::GlobalSequence) and
//!   [`LocalSequence`](sequence::LocalSequence) with scatter/gather
//!   transfers, including a gather that discovers the total length first
//! - An open type → wire descriptor registry ([`datatype`]) for scalars and
//!   value/rank pairs, extensible with user types
//! - Pluggable substrates: serial ([`comm::NoComm`]), in-process threads
//!   ([`comm::ThreadComm`]) and MPI (`comm::MpiComm`, feature `mpi-support`)
//!
//! ## Usage
//!
//! ```
//! use dist_seq::prelude::*;
//!
//! let out = run_local(3, &BootstrapConfig::default(), |group| {
//!     let root = 0;
//!     let global = GlobalSequence::from_vec(&group, (1..=7).collect::<Vec<i32>>(), root)?;
//!     let mut local = global.scatter(&group)?;
//!     local.iter_mut().for_each(|x| *x *= 10);
//!     let back = global.gather(&group, &local)?;
//!     group.teardown()?;
//!     Ok::<_, DistError>(back.into_vec())
//! })
//! .unwrap();
//!
//! assert_eq!(out[0].as_ref().unwrap(), &Some(vec![10, 20, 30, 40, 50, 60, 70]));
//! assert_eq!(out[1].as_ref().unwrap(), &None);
//! ```
//!
//! ## Feature flags
//! - `mpi-support`: the rsmpi-backed substrate and `group::init_mpi`
//! - `rayon`: parallel iteration over local sequences
//! - `strict-invariants` / `check-invariants`: structural invariant checks
//!   in release builds

pub mod comm;
pub mod config;
pub mod datatype;
pub mod debug_invariants;
pub mod dist_error;
pub mod group;
pub mod partition;
pub mod sequence;
pub mod transfer;

pub use debug_invariants::DebugInvariants;
pub use dist_error::DistError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::comm::{Communicator, NoComm, ThreadComm};
    pub use crate::config::BootstrapConfig;
    pub use crate::datatype::{
        DoubleInt, FloatInt, LongInt, RawByte, ShortInt, TwoInt, TypeRegistry, WireDescriptor,
        registry, resolve,
    };
    pub use crate::dist_error::DistError;
    #[cfg(feature = "mpi-support")]
    pub use crate::group::init_mpi;
    pub use crate::group::{ProcessGroup, ThreadingMode, init_serial, run_local};
    pub use crate::partition::{Partition, plan};
    pub use crate::sequence::{GlobalSequence, LocalSequence};
}
