//! Bringing a process group up.
//!
//! * [`init_serial`]: a one-rank group over [`NoComm`].
//! * [`run_local`]: `size` ranks as scoped threads of this process over
//!   [`ThreadComm`]; the closure runs once per rank.
//! * `init_mpi` (feature `mpi-support`): one rank per MPI process.

use super::ProcessGroup;
use crate::comm::{Communicator, NoComm, ThreadComm};
use crate::config::BootstrapConfig;
use crate::dist_error::DistError;
use std::thread;

/// Single-rank group on the calling thread.
pub fn init_serial(cfg: &BootstrapConfig) -> Result<ProcessGroup<NoComm>, DistError> {
    ProcessGroup::from_comm(NoComm, cfg.threading, cfg.host_name.clone())
}

/// Run `f` on every rank of a fresh thread-backed group of `size` ranks.
///
/// Each rank gets its own thread, which bootstraps its [`ProcessGroup`]
/// (and so becomes that rank's bootstrapping thread). Results come back in
/// rank order. A rank that panics is reported as
/// [`DistError::RankPanicked`]; peers blocked on it only return if
/// `cfg.recv_timeout_ms` is set.
pub fn run_local<R, F>(size: usize, cfg: &BootstrapConfig, f: F) -> Result<Vec<R>, DistError>
where
    F: Fn(ProcessGroup<ThreadComm>) -> R + Sync,
    R: Send,
{
    if size == 0 {
        return Err(DistError::EmptyGroup);
    }
    let f = &f;
    let comms = ThreadComm::group(size);

    thread::scope(|s| -> Result<Vec<R>, DistError> {
        let handles = comms
            .into_iter()
            .map(|comm| {
                let comm = comm.with_recv_timeout(cfg.recv_timeout());
                let rank = comm.rank();
                thread::Builder::new()
                    .name(format!("dist-seq-rank-{rank}"))
                    .spawn_scoped(s, move || {
                        let group =
                            ProcessGroup::from_comm(comm, cfg.threading, cfg.host_name.clone())?;
                        Ok::<R, DistError>(f(group))
                    })
                    .map_err(|e| DistError::Bootstrap(format!("cannot spawn rank {rank}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        // join every rank before reporting, so a late panic is not rethrown by the scope
        let joined: Vec<Result<R, DistError>> = handles
            .into_iter()
            .enumerate()
            .map(|(rank, h)| h.join().map_err(|_| DistError::RankPanicked(rank)).and_then(|r| r))
            .collect();
        joined.into_iter().collect()
    })
}

/// Initialize MPI and wrap `MPI_COMM_WORLD`.
///
/// The group runs with the threading mode MPI actually provides, which may
/// be weaker than `cfg.threading`.
#[cfg(feature = "mpi-support")]
pub fn init_mpi(cfg: &BootstrapConfig) -> Result<ProcessGroup<crate::comm::MpiComm>, DistError> {
    let (comm, provided) = crate::comm::MpiComm::init(cfg.threading)?;
    if provided < cfg.threading {
        log::warn!(
            "requested threading mode {} but MPI provides {provided}",
            cfg.threading
        );
    }
    ProcessGroup::from_comm(comm, provided, cfg.host_name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::ThreadingMode;

    #[test]
    fn serial_bootstrap_uses_config() {
        let cfg = BootstrapConfig {
            threading: ThreadingMode::Funneled,
            host_name: Some("login01".into()),
            ..BootstrapConfig::default()
        };
        let g = init_serial(&cfg).unwrap();
        assert_eq!(g.threading(), ThreadingMode::Funneled);
        assert_eq!(g.host(), "login01");
        g.teardown().unwrap();
    }

    #[test]
    fn run_local_returns_in_rank_order() {
        let ranks = run_local(5, &BootstrapConfig::default(), |g| {
            g.synchronize().unwrap();
            (g.rank(), g.size())
        })
        .unwrap();
        assert_eq!(ranks, (0..5).map(|r| (r, 5)).collect::<Vec<_>>());
    }

    #[test]
    fn run_local_rejects_empty_group() {
        let out = run_local(0, &BootstrapConfig::default(), |g| g.rank());
        assert_eq!(out, Err(DistError::EmptyGroup));
    }

    #[test]
    fn panicking_rank_is_reported() {
        let out = run_local(2, &BootstrapConfig::default(), |g| {
            if g.rank() == 1 {
                panic!("rank 1 gives up");
            }
            g.rank()
        });
        assert_eq!(out, Err(DistError::RankPanicked(1)));
    }
}
