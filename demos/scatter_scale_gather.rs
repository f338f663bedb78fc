// Scatters [1..=17] from rank 0 over a group, multiplies every local element
// by 10 and gathers the result back. Runs on a four-thread local group, or,
// with `--features mpi-support` under `mpirun`, one rank per MPI process.
//
//   cargo run --example scatter_scale_gather
//   mpirun -n 4 cargo run --example scatter_scale_gather --features mpi-support
use dist_seq::prelude::*;

fn scale<C: Communicator>(group: ProcessGroup<C>) -> Result<(), DistError> {
    let global = GlobalSequence::from_vec(&group, (1..=17).collect::<Vec<i32>>(), 0)?;
    let mut local = global.scatter(&group)?;
    println!(
        "rank {}/{} on {}: {:?}",
        group.rank(),
        group.size(),
        group.host(),
        local.as_slice()
    );
    local.iter_mut().for_each(|x| *x *= 10);

    let back = global.gather(&group, &local)?;
    if let Some(values) = back.try_as_slice() {
        println!("root gathered {values:?}");
    }
    group.teardown()
}

fn main() -> Result<(), DistError> {
    let cfg = BootstrapConfig::from_env()?;

    #[cfg(feature = "mpi-support")]
    {
        scale(init_mpi(&cfg)?)
    }

    #[cfg(not(feature = "mpi-support"))]
    {
        run_local(4, &cfg, scale)?.into_iter().collect()
    }
}
