#![allow(dead_code)]
use dist_seq::prelude::*;

/// Generous receive timeout so a broken test fails instead of hanging.
pub const RECV_TIMEOUT_MS: u64 = 10_000;

pub fn cfg() -> BootstrapConfig {
    BootstrapConfig {
        recv_timeout_ms: Some(RECV_TIMEOUT_MS),
        ..BootstrapConfig::default()
    }
}

/// Run `f` on every rank of a `size`-rank thread group; panics if any rank
/// panicked or failed to bootstrap.
pub fn on_group<R, F>(size: usize, f: F) -> Vec<R>
where
    F: Fn(ProcessGroup<ThreadComm>) -> R + Sync,
    R: Send,
{
    run_local(size, &cfg(), f).expect("thread group ran to completion")
}

/// The sequence lengths worth testing for a group of `p` ranks.
pub fn edge_lengths(p: usize) -> Vec<usize> {
    let mut v = vec![0, 1, p.saturating_sub(1), p, p + 1, 4 * p, 4 * p + 3];
    v.sort_unstable();
    v.dedup();
    v
}
