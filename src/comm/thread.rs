//! In-process substrate: every rank is a thread of this process.
//!
//! Ranks of one group share a mailbox keyed by `(src, dst, tag)`. Each key is
//! a FIFO queue, so messages between two ranks on one tag are received in the
//! order they were sent, which is what lets collectives on this backend match
//! up across ranks. Sends complete immediately; a receive handle blocks in
//! [`Wait::wait`] until its message is queued (or the optional timeout
//! expires).

use super::{Communicator, Wait};
use bytes::Bytes;
use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Debug, Default)]
struct Mailbox {
    slots: Mutex<HashMap<Key, VecDeque<Bytes>>>,
    arrived: Condvar,
}

impl Mailbox {
    fn post(&self, key: Key, payload: Bytes) {
        self.slots.lock().entry(key).or_default().push_back(payload);
        self.arrived.notify_all();
    }
}

/// One rank's endpoint of a thread-backed group.
#[derive(Clone, Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
    recv_timeout: Option<Duration>,
}

impl ThreadComm {
    /// Endpoints for ranks `0..size`, all wired to one fresh mailbox.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
                recv_timeout: None,
            })
            .collect()
    }

    /// Give up on a receive after `timeout` instead of blocking forever.
    pub fn with_recv_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.recv_timeout = timeout;
        self
    }

    pub fn recv_timeout(&self) -> Option<Duration> {
        self.recv_timeout
    }
}

/// Pending receive on a [`ThreadComm`].
#[derive(Debug)]
pub struct ThreadRecv {
    mailbox: Arc<Mailbox>,
    key: Key,
    deadline: Option<Instant>,
}

impl Wait for ThreadRecv {
    fn wait(self) -> Option<Vec<u8>> {
        let mut slots = self.mailbox.slots.lock();
        loop {
            if let Some(payload) = slots.get_mut(&self.key).and_then(VecDeque::pop_front) {
                return Some(payload.to_vec());
            }
            match self.deadline {
                None => self.mailbox.arrived.wait(&mut slots),
                Some(deadline) => {
                    if self.mailbox.arrived.wait_until(&mut slots, deadline).timed_out() {
                        let (src, dst, tag) = self.key;
                        log::warn!("rank {dst}: receive from rank {src} (tag {tag:#x}) timed out");
                        return slots
                            .get_mut(&self.key)
                            .and_then(VecDeque::pop_front)
                            .map(|p| p.to_vec());
                    }
                }
            }
        }
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = ThreadRecv;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        self.mailbox
            .post((self.rank, peer, tag), Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> Self::RecvHandle {
        ThreadRecv {
            mailbox: Arc::clone(&self.mailbox),
            key: (peer, self.rank, tag),
            deadline: self.recv_timeout.map(|t| Instant::now() + t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{CommTag, Varcount, VarcountMut};
    use crate::dist_error::DistError;
    use std::thread;

    #[test]
    fn round_trip_two_ranks() {
        let comms = ThreadComm::group(2);
        let tag = CommTag::new(7);

        let mut recv_buf = [0u8; 4];
        let h = comms[1].irecv(0, tag.as_u16(), &mut recv_buf);
        comms[0].isend(1, tag.as_u16(), &[1, 2, 3, 4]);
        recv_buf.copy_from_slice(&h.wait().expect("payload from rank 0"));
        assert_eq!(recv_buf, [1, 2, 3, 4]);
    }

    #[test]
    fn fifo_per_tag_and_tag_isolation() {
        let comms = ThreadComm::group(2);
        for i in 0..5u8 {
            comms[0].isend(1, 0xA1, &[i]);
            comms[0].isend(1, 0xB2, &[100 + i]);
        }
        let a: Vec<u8> = (0..5)
            .map(|_| comms[1].irecv(0, 0xA1, &mut [0]).wait().unwrap()[0])
            .collect();
        let b: Vec<u8> = (0..5)
            .map(|_| comms[1].irecv(0, 0xB2, &mut [0]).wait().unwrap()[0])
            .collect();
        assert_eq!(a, vec![0, 1, 2, 3, 4]);
        assert_eq!(b, vec![100, 101, 102, 103, 104]);
    }

    #[test]
    fn separate_groups_do_not_share_mail() {
        let g1 = ThreadComm::group(2);
        let g2 = ThreadComm::group(2)
            .into_iter()
            .map(|c| c.with_recv_timeout(Some(Duration::from_millis(20))))
            .collect::<Vec<_>>();
        g1[0].isend(1, 3, &[9]);
        assert!(g2[1].irecv(0, 3, &mut [0]).wait().is_none());
        assert_eq!(g1[1].irecv(0, 3, &mut [0]).wait(), Some(vec![9]));
    }

    #[test]
    fn blocked_receive_wakes_on_send() {
        let comms = ThreadComm::group(2);
        let sender = comms[0].clone();
        let h = comms[1].irecv(0, 1, &mut [0; 3]);
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            sender.isend(1, 1, b"abc");
        });
        assert_eq!(h.wait().unwrap(), b"abc");
        t.join().unwrap();
    }

    #[test]
    fn default_collectives_over_four_threads() {
        let comms = ThreadComm::group(4);
        let results: Vec<(Vec<u8>, Option<Vec<u8>>, Option<u64>, u64)> = thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|c| {
                    s.spawn(move || {
                        let counts = [1usize, 2, 3, 0];
                        let displs = [0usize, 1, 3, 6];
                        let root = 2;
                        let me = c.rank();

                        let src: Vec<u8> = (10..16).collect();
                        let mut mine = vec![0u8; counts[me]];
                        let send = (me == root).then(|| Varcount {
                            buf: &src,
                            counts: &counts,
                            displs: &displs,
                        });
                        c.scatter_varcount(root, send, &mut mine).unwrap();
                        c.barrier().unwrap();

                        let mut back = vec![0u8; 6];
                        let recv = if me == root {
                            Some(VarcountMut {
                                buf: &mut back,
                                counts: &counts,
                                displs: &displs,
                            })
                        } else {
                            None
                        };
                        c.gather_varcount(root, &mine, recv).unwrap();

                        let sum = c.reduce_sum(root, me as u64 + 1).unwrap();
                        let all = c.broadcast_u64(root, sum.unwrap_or(0)).unwrap();
                        (mine, (me == root).then_some(back), sum, all)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results[0].0, vec![10]);
        assert_eq!(results[1].0, vec![11, 12]);
        assert_eq!(results[2].0, vec![13, 14, 15]);
        assert!(results[3].0.is_empty());
        assert_eq!(results[2].1.as_deref(), Some(&[10u8, 11, 12, 13, 14, 15][..]));
        assert_eq!(results[2].2, Some(10));
        assert!(results.iter().all(|r| r.3 == 10));
    }

    #[test]
    fn overflowing_sum_reports_the_exact_total() {
        let comms = ThreadComm::group(2);
        // Sends land in the mailbox, so the ranks can run one after another.
        assert_eq!(comms[1].reduce_sum(0, u64::MAX), Ok(None));
        assert_eq!(
            comms[0].reduce_sum(0, 2),
            Err(DistError::CountOverflow(u128::from(u64::MAX) + 2))
        );
    }
}
