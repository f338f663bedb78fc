mod util;

use dist_seq::prelude::*;
use std::thread;
use util::on_group;

#[test]
fn identity_and_host_defaults() {
    let out = on_group(3, |g| (g.rank(), g.size(), g.host().to_string(), g.threading()));
    for (r, (rank, size, host, mode)) in out.into_iter().enumerate() {
        assert_eq!((rank, size), (r, 3));
        assert_eq!(host, "localhost");
        assert_eq!(mode, ThreadingMode::Single);
    }
}

#[test]
fn host_override_from_config() {
    let cfg = BootstrapConfig {
        host_name: Some("cluster-a".into()),
        ..util::cfg()
    };
    let hosts = run_local(2, &cfg, |g| g.host().to_string()).unwrap();
    assert_eq!(hosts, vec!["cluster-a", "cluster-a"]);
}

#[test]
fn funneled_group_rejects_helper_thread_collectives() {
    let cfg = util::cfg().with_threading(ThreadingMode::Funneled);
    let out = run_local(2, &cfg, |g| {
        let from_helper = thread::scope(|s| {
            s.spawn(|| GlobalSequence::from_elem(&g, 4, 0u8, 0)?.scatter(&g).map(|_| ()))
                .join()
                .unwrap()
        });
        // the owning thread is still allowed, and keeps the ranks in step
        g.synchronize().unwrap();
        from_helper
    })
    .unwrap();
    for r in out {
        assert_eq!(
            r,
            Err(DistError::ThreadingViolation {
                mode: ThreadingMode::Funneled
            })
        );
    }
}

#[test]
fn serialized_group_admits_a_helper_thread() {
    let cfg = util::cfg().with_threading(ThreadingMode::Serialized);
    let out = run_local(3, &cfg, |g| {
        thread::scope(|s| {
            s.spawn(|| {
                let global = GlobalSequence::from_iter_exact(&g, 0..9u32, 1)?;
                let local = global.scatter(&g)?;
                Ok::<_, DistError>(local.into_vec())
            })
            .join()
            .unwrap()
        })
    })
    .unwrap();
    assert_eq!(out[0], Ok(vec![0, 1, 2]));
    assert_eq!(out[2], Ok(vec![6, 7, 8]));
}

#[test]
fn teardown_synchronizes_the_group() {
    let out = on_group(4, |g| g.teardown());
    assert!(out.iter().all(Result::is_ok));
}

#[test]
fn receive_timeout_surfaces_as_comm_error() {
    let cfg = BootstrapConfig {
        recv_timeout_ms: Some(50),
        ..BootstrapConfig::default()
    };
    // rank 1 never joins the barrier
    let out = run_local(2, &cfg, |g| if g.rank() == 0 { g.synchronize() } else { Ok(()) }).unwrap();
    assert!(matches!(out[0], Err(DistError::CommError { neighbor: 1, .. })));
    assert_eq!(out[1], Ok(()));
}
