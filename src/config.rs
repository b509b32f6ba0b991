use crate::memory::Policy;

/// Runtime configuration for one simulator instance.
///
/// Every knob the original command line exposes lives here so that a
/// library user (or a test) can build engines without going through the CLI.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Number of physical frames in the pool.
    pub frames: usize,
    /// Page size in words.
    pub page_size: u64,
    /// Number of segments in the address space.
    pub segments: usize,
    /// Directory fan-out: entries per directory row and per second-level table.
    pub dir_size: usize,
    /// Frame replacement policy.
    pub policy: Policy,
    /// Seed for the engine-owned RNG; fixed seed means fully reproducible runs.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            frames: 16,
            page_size: 1000,
            segments: 3,
            dir_size: 4,
            policy: Policy::Fifo,
            seed: 0,
        }
    }
}
