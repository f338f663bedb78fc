//! MPI substrate backed by rsmpi (feature `mpi-support`).
//!
//! Collectives map one-to-one onto `MPI_Scatterv`, `MPI_Gatherv`,
//! `MPI_Reduce`, `MPI_Bcast` and `MPI_Barrier` over `MPI_COMM_WORLD`, with
//! byte counts and displacements. Point-to-point sends and receives are
//! blocking; their handles are already complete when returned.

use super::{Communicator, Varcount, VarcountMut, Wait, check_root};
use crate::dist_error::DistError;
use crate::group::ThreadingMode;
use ::mpi::collective::{CommunicatorCollectives, Root, SystemOperation};
use ::mpi::datatype::{Partition, PartitionMut};
use ::mpi::environment::{Threading, Universe};
use ::mpi::point_to_point::{Destination, Source};
use ::mpi::topology::{Communicator as MpiCommunicator, SimpleCommunicator};
use ::mpi::Count;

/// `MPI_COMM_WORLD` endpoint. Dropping it finalizes MPI.
pub struct MpiComm {
    world: SimpleCommunicator,
    rank: usize,
    size: usize,
    // declared last: finalize after the communicator is gone
    _universe: Universe,
}

impl std::fmt::Debug for MpiComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpiComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl From<ThreadingMode> for Threading {
    fn from(mode: ThreadingMode) -> Self {
        match mode {
            ThreadingMode::Single => Threading::Single,
            ThreadingMode::Funneled => Threading::Funneled,
            ThreadingMode::Serialized => Threading::Serialized,
            ThreadingMode::Multiple => Threading::Multiple,
        }
    }
}

impl From<Threading> for ThreadingMode {
    fn from(t: Threading) -> Self {
        match t {
            Threading::Single => ThreadingMode::Single,
            Threading::Funneled => ThreadingMode::Funneled,
            Threading::Serialized => ThreadingMode::Serialized,
            Threading::Multiple => ThreadingMode::Multiple,
        }
    }
}

impl MpiComm {
    /// Initialize MPI with the requested threading level.
    ///
    /// Returns the endpoint and the threading level MPI actually provides.
    /// Fails if MPI was already initialized in this process.
    pub fn init(requested: ThreadingMode) -> Result<(Self, ThreadingMode), DistError> {
        let (universe, provided) = ::mpi::initialize_with_threading(requested.into())
            .ok_or_else(|| DistError::Bootstrap("MPI is already initialized".into()))?;
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        Ok((
            MpiComm {
                world,
                rank,
                size,
                _universe: universe,
            },
            provided.into(),
        ))
    }

    fn counts(v: &[usize]) -> Result<Vec<Count>, DistError> {
        v.iter()
            .map(|&x| Count::try_from(x).map_err(|_| DistError::CountOverflow(x as u128)))
            .collect()
    }
}

/// A receive that completed before its handle was returned.
pub struct MpiRecv(Option<Vec<u8>>);

impl Wait for MpiRecv {
    fn wait(self) -> Option<Vec<u8>> {
        self.0
    }
}

impl Communicator for MpiComm {
    type SendHandle = ();
    type RecvHandle = MpiRecv;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn host_name(&self) -> Option<String> {
        ::mpi::environment::processor_name().ok()
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        self.world
            .process_at_rank(peer as i32)
            .send_with_tag(buf, i32::from(tag));
    }

    fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> MpiRecv {
        let (data, _status) = self
            .world
            .process_at_rank(peer as i32)
            .receive_vec_with_tag::<u8>(i32::from(tag));
        MpiRecv(Some(data))
    }

    fn barrier(&self) -> Result<(), DistError> {
        self.world.barrier();
        Ok(())
    }

    fn scatter_varcount(
        &self,
        root: usize,
        send: Option<Varcount<'_>>,
        recv: &mut [u8],
    ) -> Result<(), DistError> {
        check_root(root, self.size)?;
        let root_proc = self.world.process_at_rank(root as i32);
        if self.rank != root {
            root_proc.scatter_varcount_into(recv);
            return Ok(());
        }
        let send = send.ok_or_else(|| DistError::CommError {
            neighbor: root,
            reason: "root must supply the scatter send buffer".into(),
        })?;
        let partition = Partition::new(
            send.buf,
            Self::counts(send.counts)?,
            Self::counts(send.displs)?,
        );
        root_proc.scatter_varcount_into_root(&partition, recv);
        Ok(())
    }

    fn gather_varcount(
        &self,
        root: usize,
        send: &[u8],
        recv: Option<VarcountMut<'_>>,
    ) -> Result<(), DistError> {
        check_root(root, self.size)?;
        let root_proc = self.world.process_at_rank(root as i32);
        if self.rank != root {
            root_proc.gather_varcount_into(send);
            return Ok(());
        }
        let VarcountMut { buf, counts, displs } = recv.ok_or_else(|| DistError::CommError {
            neighbor: root,
            reason: "root must supply the gather receive buffer".into(),
        })?;
        let mut partition = PartitionMut::new(buf, Self::counts(counts)?, Self::counts(displs)?);
        root_proc.gather_varcount_into_root(send, &mut partition);
        Ok(())
    }

    fn reduce_sum(&self, root: usize, value: u64) -> Result<Option<u64>, DistError> {
        check_root(root, self.size)?;
        let root_proc = self.world.process_at_rank(root as i32);
        if self.rank == root {
            let mut total = 0u64;
            root_proc.reduce_into_root(&value, &mut total, SystemOperation::sum());
            Ok(Some(total))
        } else {
            root_proc.reduce_into(&value, SystemOperation::sum());
            Ok(None)
        }
    }

    fn broadcast_u64(&self, root: usize, value: u64) -> Result<u64, DistError> {
        check_root(root, self.size)?;
        let root_proc = self.world.process_at_rank(root as i32);
        let mut v = value;
        root_proc.broadcast_into(&mut v);
        Ok(v)
    }
}
