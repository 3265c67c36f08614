//! Benchmark workloads for Tether.
//!
//! - [`size_stream`]: deterministic allocation sizes from a seeded ChaCha8 RNG
//! - [`churn`]: allocate/free a stream of sizes through the current allocator

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tether_alloc::AllocBuffer;

/// Generate `n` allocation sizes in `1..=max`, reproducible from `seed`.
pub fn size_stream(seed: u64, n: usize, max: usize) -> Vec<usize> {
    let max = max.max(1) as u64;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| (rng.next_u64() % max) as usize + 1)
        .collect()
}

/// Allocate and drop one buffer per size from the calling thread's current
/// allocator. Returns the total bytes requested, or the number of buffers
/// served before the first failure.
pub fn churn(sizes: &[usize]) -> Result<usize, usize> {
    let mut total = 0;
    for (served, &size) in sizes.iter().enumerate() {
        let buf = AllocBuffer::new(size).map_err(|_| served)?;
        total += buf.len();
    }
    Ok(total)
}
