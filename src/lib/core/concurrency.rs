use anyhow::{Error, Result};
use log::{error, warn};

/// Validate and normalize a requested CPU count.
pub fn determine_allowed_cpus(desired: usize) -> Result<usize> {
    if desired == 0 {
        error!("Must select > 0 cores");
        Err(Error::msg("Too few cores selected. Min 1"))
    } else if desired > num_cpus::get() {
        warn!(
            "Requested {} cores but only {} are available; tasks will oversubscribe",
            desired,
            num_cpus::get()
        );
        Ok(desired)
    } else {
        Ok(desired)
    }
}

/// Build a dedicated pool for a runner without touching the global one.
pub fn build_pool(size: usize) -> Result<rayon::ThreadPool> {
    let cores = determine_allowed_cpus(size)?;
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(cores)
        .thread_name(|i| format!("varsplit-worker-{}", i))
        .build()?)
}
