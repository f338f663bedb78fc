//! Thin façade over the process-group transport substrate.
//!
//! Messages are *contiguous byte slices*. Point-to-point handles are
//! waitable; collectives block until every rank of the group has issued the
//! matching call. Backends:
//!
//! * [`NoComm`]: single-rank serial substrate,
//! * [`ThreadComm`]: one thread per rank inside this process,
//! * `MpiComm` (feature `mpi-support`): MPI through rsmpi.
//!
//! The provided collective methods are root-linear exchanges built on
//! `isend`/`irecv`; substrates with native collectives override them.

#[cfg(feature = "mpi-support")]
pub mod mpi_backend;
pub mod thread;

use crate::datatype::wire::{copy_exact, decode_u64, encode_u64};
use crate::dist_error::DistError;
use std::ops::Range;

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
pub use thread::ThreadComm;

/// Message tag. Values from [`CommTag::RESERVED`] up are used by collectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const RESERVED: u16 = 0xF000;
    pub const BARRIER: CommTag = CommTag(0xF001);
    pub const SCATTER: CommTag = CommTag(0xF002);
    pub const GATHER: CommTag = CommTag(0xF003);
    pub const REDUCE: CommTag = CommTag(0xF004);
    pub const BROADCAST: CommTag = CommTag(0xF005);

    pub const fn new(tag: u16) -> Self {
        CommTag(tag)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Block until completion and return the received bytes, if any.
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Root-side send buffer for a variable-count scatter, in bytes.
#[derive(Debug, Clone, Copy)]
pub struct Varcount<'a> {
    pub buf: &'a [u8],
    pub counts: &'a [usize],
    pub displs: &'a [usize],
}

/// Root-side receive buffer for a variable-count gather, in bytes.
#[derive(Debug)]
pub struct VarcountMut<'a> {
    pub buf: &'a mut [u8],
    pub counts: &'a [usize],
    pub displs: &'a [usize],
}

fn layout_ranges(
    buf_len: usize,
    counts: &[usize],
    displs: &[usize],
    size: usize,
    root: usize,
) -> Result<Vec<Range<usize>>, DistError> {
    let bad = |reason: String| DistError::CommError {
        neighbor: root,
        reason,
    };
    if counts.len() != size || displs.len() != size {
        return Err(bad(format!(
            "count/displacement tables have {}/{} entries for {size} ranks",
            counts.len(),
            displs.len()
        )));
    }
    counts
        .iter()
        .zip(displs)
        .map(|(&c, &d)| {
            let end = d.checked_add(c).filter(|&e| e <= buf_len);
            end.map(|e| d..e)
                .ok_or_else(|| bad(format!("slice {d}+{c} overruns a {buf_len}-byte buffer")))
        })
        .collect()
}

fn check_root(root: usize, size: usize) -> Result<(), DistError> {
    if root < size {
        Ok(())
    } else {
        Err(DistError::InvalidRoot { root, size })
    }
}

fn missing(peer: usize, what: &str) -> DistError {
    DistError::CommError {
        neighbor: peer,
        reason: format!("{what} never arrived"),
    }
}

/// Transport interface consumed by the process group and the transfers.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Name of the host this rank runs on, when the substrate knows it.
    fn host_name(&self) -> Option<String> {
        None
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Block until every rank has entered the barrier.
    fn barrier(&self) -> Result<(), DistError> {
        let (me, n) = (self.rank(), self.size());
        let tag = CommTag::BARRIER.as_u16();
        if n == 1 {
            return Ok(());
        }
        if me == 0 {
            let mut first_err = None;
            for peer in 1..n {
                if self.irecv(peer, tag, &mut []).wait().is_none() && first_err.is_none() {
                    first_err = Some(missing(peer, "barrier arrival"));
                }
            }
            let releases: Vec<_> = (1..n).map(|peer| self.isend(peer, tag, &[])).collect();
            for s in releases {
                let _ = s.wait();
            }
            first_err.map_or(Ok(()), Err)
        } else {
            let _ = self.isend(0, tag, &[]).wait();
            self.irecv(0, tag, &mut [])
                .wait()
                .map(|_| ())
                .ok_or_else(|| missing(0, "barrier release"))
        }
    }

    /// Distribute `send.counts[r]` bytes at `send.displs[r]` from `root` to
    /// every rank `r`. Only the root supplies `send`.
    fn scatter_varcount(
        &self,
        root: usize,
        send: Option<Varcount<'_>>,
        recv: &mut [u8],
    ) -> Result<(), DistError> {
        let (me, n) = (self.rank(), self.size());
        check_root(root, n)?;
        let tag = CommTag::SCATTER.as_u16();

        if me != root {
            let got = self
                .irecv(root, tag, recv)
                .wait()
                .ok_or_else(|| missing(root, "scatter payload"))?;
            return copy_exact(recv, &got, root);
        }

        let send = send.ok_or_else(|| DistError::CommError {
            neighbor: root,
            reason: "root must supply the scatter send buffer".into(),
        })?;
        let ranges = layout_ranges(send.buf.len(), send.counts, send.displs, n, root)?;

        let mut pending = Vec::with_capacity(n.saturating_sub(1));
        for (peer, range) in ranges.iter().enumerate().filter(|(p, _)| *p != root) {
            log::trace!("scatter: root {root} -> rank {peer}: {} bytes", range.len());
            pending.push(self.isend(peer, tag, &send.buf[range.clone()]));
        }
        let own = copy_exact(recv, &send.buf[ranges[root].clone()], root);

        // always drain all send handles before returning
        for s in pending {
            let _ = s.wait();
        }
        own
    }

    /// Collect every rank's `send` bytes into `recv.buf` at `recv.displs`
    /// on `root`. Only the root supplies `recv`.
    fn gather_varcount(
        &self,
        root: usize,
        send: &[u8],
        recv: Option<VarcountMut<'_>>,
    ) -> Result<(), DistError> {
        let (me, n) = (self.rank(), self.size());
        check_root(root, n)?;
        let tag = CommTag::GATHER.as_u16();

        if me != root {
            let _ = self.isend(root, tag, send).wait();
            return Ok(());
        }

        let VarcountMut { buf, counts, displs } = recv.ok_or_else(|| DistError::CommError {
            neighbor: root,
            reason: "root must supply the gather receive buffer".into(),
        })?;
        let ranges = layout_ranges(buf.len(), counts, displs, n, root)?;

        // 1) post all receives
        let mut posted = Vec::with_capacity(n.saturating_sub(1));
        for (peer, range) in ranges.iter().enumerate().filter(|(p, _)| *p != root) {
            let h = self.irecv(peer, tag, &mut buf[range.clone()]);
            posted.push((peer, range.clone(), h));
        }

        // 2) own contribution
        let mut maybe_err = copy_exact(&mut buf[ranges[root].clone()], send, root).err();

        // 3) wait for all recvs, keep the first error but drain everything
        for (peer, range, h) in posted {
            let outcome = h
                .wait()
                .ok_or_else(|| missing(peer, "gather payload"))
                .and_then(|got| {
                    log::trace!("gather: rank {peer} -> root {root}: {} bytes", got.len());
                    copy_exact(&mut buf[range], &got, peer)
                });
            if let Err(e) = outcome {
                maybe_err.get_or_insert(e);
            }
        }
        maybe_err.map_or(Ok(()), Err)
    }

    /// Sum `value` over all ranks; the total is returned on `root` only.
    fn reduce_sum(&self, root: usize, value: u64) -> Result<Option<u64>, DistError> {
        let (me, n) = (self.rank(), self.size());
        check_root(root, n)?;
        let tag = CommTag::REDUCE.as_u16();

        if me != root {
            let _ = self.isend(root, tag, &encode_u64(value)).wait();
            return Ok(None);
        }

        let mut word = [0u8; 8];
        let posted: Vec<_> = (0..n)
            .filter(|&p| p != root)
            .map(|p| (p, self.irecv(p, tag, &mut word)))
            .collect();
        let mut total = Ok(value);
        for (peer, h) in posted {
            let term = h
                .wait()
                .ok_or_else(|| missing(peer, "reduction term"))
                .and_then(|got| decode_u64(&got, peer));
            total = total.and_then(|acc| {
                let t = term?;
                acc.checked_add(t)
                    .ok_or(DistError::CountOverflow(u128::from(acc) + u128::from(t)))
            });
        }
        total.map(Some)
    }

    /// Send `value` from `root` to every rank; every rank returns it.
    fn broadcast_u64(&self, root: usize, value: u64) -> Result<u64, DistError> {
        let (me, n) = (self.rank(), self.size());
        check_root(root, n)?;
        let tag = CommTag::BROADCAST.as_u16();

        if me == root {
            let word = encode_u64(value);
            let sends: Vec<_> = (0..n)
                .filter(|&p| p != root)
                .map(|p| self.isend(p, tag, &word))
                .collect();
            for s in sends {
                let _ = s.wait();
            }
            Ok(value)
        } else {
            let mut word = [0u8; 8];
            let got = self
                .irecv(root, tag, &mut word)
                .wait()
                .ok_or_else(|| missing(root, "broadcast value"))?;
            decode_u64(&got, root)
        }
    }
}

/// Compile-time no-op comm for pure serial use: one rank, rank 0.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl NoComm {
    pub fn is_no_comm(&self) -> bool {
        true
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_comm_is_nop() {
        let comm = NoComm;
        assert!(comm.is_no_comm());
        let mut buf = [0u8; 8];
        assert!(comm.irecv(0, 123, &mut buf).wait().is_none());
        assert!(comm.isend(0, 123, &[]).wait().is_none());
    }

    #[test]
    fn serial_collectives_are_local_copies() {
        let comm = NoComm;
        comm.barrier().unwrap();

        let src = [1u8, 2, 3, 4, 5];
        let mut out = [0u8; 5];
        comm.scatter_varcount(
            0,
            Some(Varcount {
                buf: &src,
                counts: &[5],
                displs: &[0],
            }),
            &mut out,
        )
        .unwrap();
        assert_eq!(out, src);

        let mut back = [0u8; 5];
        comm.gather_varcount(
            0,
            &out,
            Some(VarcountMut {
                buf: &mut back,
                counts: &[5],
                displs: &[0],
            }),
        )
        .unwrap();
        assert_eq!(back, src);

        assert_eq!(comm.reduce_sum(0, 41).unwrap(), Some(41));
        assert_eq!(comm.broadcast_u64(0, 9).unwrap(), 9);
    }

    #[test]
    fn bad_root_and_layout_are_rejected() {
        let comm = NoComm;
        assert_eq!(
            comm.reduce_sum(1, 0),
            Err(DistError::InvalidRoot { root: 1, size: 1 })
        );
        let mut out = [0u8; 2];
        let err = comm
            .scatter_varcount(
                0,
                Some(Varcount {
                    buf: &[1, 2],
                    counts: &[3],
                    displs: &[0],
                }),
                &mut out,
            )
            .unwrap_err();
        assert!(matches!(err, DistError::CommError { neighbor: 0, .. }));
    }

    #[test]
    fn commtag_round_trip() {
        let tag = CommTag::new(0xABCD);
        assert_eq!(tag.as_u16(), 0xABCD);
        assert!(CommTag::SCATTER.as_u16() > CommTag::RESERVED);
    }
}
