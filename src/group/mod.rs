//! Process group: rank/size/host identity plus the owned substrate.
//!
//! A [`ProcessGroup`] is created by one of the bootstrap functions
//! ([`init_serial`], [`run_local`], `init_mpi`) and is read-only afterwards.
//! Every collective issued through it is checked against the group's
//! [`ThreadingMode`] first.

pub mod bootstrap;

use crate::comm::Communicator;
use crate::dist_error::DistError;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::thread::{self, ThreadId};

#[cfg(feature = "mpi-support")]
pub use bootstrap::init_mpi;
pub use bootstrap::{init_serial, run_local};

/// Which threads may issue collectives, from least to most permissive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ThreadingMode {
    /// One thread in the whole process.
    #[default]
    Single,
    /// Only the bootstrapping thread calls collectives.
    Funneled,
    /// Any thread, one collective at a time.
    Serialized,
    /// No restriction.
    Multiple,
}

impl ThreadingMode {
    pub const ALL: [ThreadingMode; 4] = [
        ThreadingMode::Single,
        ThreadingMode::Funneled,
        ThreadingMode::Serialized,
        ThreadingMode::Multiple,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ThreadingMode::Single => "single",
            ThreadingMode::Funneled => "funneled",
            ThreadingMode::Serialized => "serialized",
            ThreadingMode::Multiple => "multiple",
        }
    }
}

impl fmt::Display for ThreadingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreadingMode {
    type Err = DistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ThreadingMode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DistError::Bootstrap(format!("unknown threading mode `{wanted}`")))
    }
}

/// One rank's membership in a fixed-size process group.
///
/// Not `Clone`: [`ProcessGroup::teardown`] consumes it, so teardown runs at
/// most once per group.
pub struct ProcessGroup<C: Communicator> {
    comm: C,
    rank: usize,
    size: usize,
    host: String,
    threading: ThreadingMode,
    owner: ThreadId,
    serial: Mutex<()>,
}

impl<C: Communicator> fmt::Debug for ProcessGroup<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessGroup")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("host", &self.host)
            .field("threading", &self.threading)
            .finish_non_exhaustive()
    }
}

impl<C: Communicator> ProcessGroup<C> {
    /// Wrap an already-initialized substrate endpoint.
    ///
    /// The calling thread becomes the group's bootstrapping thread.
    /// `host` overrides whatever name the substrate reports.
    pub fn from_comm(
        comm: C,
        threading: ThreadingMode,
        host: Option<String>,
    ) -> Result<Self, DistError> {
        let size = comm.size();
        if size == 0 {
            return Err(DistError::EmptyGroup);
        }
        let rank = comm.rank();
        if rank >= size {
            return Err(DistError::Bootstrap(format!(
                "substrate reports rank {rank} in a group of {size}"
            )));
        }
        let host = host
            .or_else(|| comm.host_name())
            .unwrap_or_else(|| "localhost".to_string());
        log::debug!("rank {rank}/{size} on {host} joined the group ({threading})");
        Ok(ProcessGroup {
            comm,
            rank,
            size,
            host,
            threading,
            owner: thread::current().id(),
            serial: Mutex::new(()),
        })
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Threading mode in effect (what the substrate provides).
    pub fn threading(&self) -> ThreadingMode {
        self.threading
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    #[inline]
    pub fn is_root(&self, root: usize) -> bool {
        self.rank == root
    }

    pub fn check_root(&self, root: usize) -> Result<(), DistError> {
        if root < self.size {
            Ok(())
        } else {
            Err(DistError::InvalidRoot {
                root,
                size: self.size,
            })
        }
    }

    /// Group-wide barrier.
    pub fn synchronize(&self) -> Result<(), DistError> {
        let _guard = self.enter_collective()?;
        self.comm.barrier()
    }

    /// Synchronize one last time and release the substrate.
    pub fn teardown(self) -> Result<(), DistError> {
        self.synchronize()?;
        log::debug!("rank {}/{} left the group", self.rank, self.size);
        Ok(())
    }

    /// Admission check for a collective issued from the current thread.
    ///
    /// Under `Serialized` the returned guard must be held until the
    /// collective has completed.
    pub(crate) fn enter_collective(&self) -> Result<Option<MutexGuard<'_, ()>>, DistError> {
        match self.threading {
            ThreadingMode::Single | ThreadingMode::Funneled => {
                if thread::current().id() != self.owner {
                    return Err(DistError::ThreadingViolation {
                        mode: self.threading,
                    });
                }
                Ok(None)
            }
            ThreadingMode::Serialized => Ok(Some(self.serial.lock())),
            ThreadingMode::Multiple => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::NoComm;

    #[test]
    fn modes_are_ordered_by_permissiveness() {
        assert!(ThreadingMode::Single < ThreadingMode::Funneled);
        assert!(ThreadingMode::Funneled < ThreadingMode::Serialized);
        assert!(ThreadingMode::Serialized < ThreadingMode::Multiple);
        assert_eq!(ThreadingMode::default(), ThreadingMode::Single);
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("Funneled".parse::<ThreadingMode>().unwrap(), ThreadingMode::Funneled);
        assert_eq!(" multiple ".parse::<ThreadingMode>().unwrap(), ThreadingMode::Multiple);
        assert!(matches!(
            "threaded".parse::<ThreadingMode>(),
            Err(DistError::Bootstrap(_))
        ));
        for m in ThreadingMode::ALL {
            assert_eq!(m.to_string().parse::<ThreadingMode>().unwrap(), m);
        }
    }

    #[test]
    fn serial_group_identity() {
        let g = ProcessGroup::from_comm(NoComm, ThreadingMode::Single, None).unwrap();
        assert_eq!((g.rank(), g.size()), (0, 1));
        assert_eq!(g.host(), "localhost");
        assert!(g.is_root(0));
        assert_eq!(
            g.check_root(1),
            Err(DistError::InvalidRoot { root: 1, size: 1 })
        );
        g.teardown().unwrap();
    }

    #[test]
    fn host_override_wins() {
        let g = ProcessGroup::from_comm(NoComm, ThreadingMode::Single, Some("node07".into()))
            .unwrap();
        assert_eq!(g.host(), "node07");
    }

    #[test]
    fn funneled_rejects_foreign_thread() {
        let g = ProcessGroup::from_comm(NoComm, ThreadingMode::Funneled, None).unwrap();
        g.synchronize().unwrap();
        let err = thread::scope(|s| s.spawn(|| g.synchronize()).join().unwrap());
        assert_eq!(
            err,
            Err(DistError::ThreadingViolation {
                mode: ThreadingMode::Funneled
            })
        );
    }

    #[test]
    fn serialized_and_multiple_admit_any_thread() {
        for mode in [ThreadingMode::Serialized, ThreadingMode::Multiple] {
            let g = ProcessGroup::from_comm(NoComm, mode, None).unwrap();
            let outcomes: Vec<_> = thread::scope(|s| {
                let hs: Vec<_> = (0..3).map(|_| s.spawn(|| g.synchronize())).collect();
                hs.into_iter().map(|h| h.join().unwrap()).collect()
            });
            assert!(outcomes.iter().all(Result::is_ok), "{mode}");
        }
    }
}
