//! Background simplification workers.
//!
//! A fixed pool of named threads decodes terrain-RGB rasters and runs the
//! RTIN simplifier off the scheduling thread. Jobs are dispatched
//! round-robin and answered on a per-client reply channel, keyed by the
//! caller's correlation key.

mod job;
mod pool;

pub use job::{JobResult, SimplifyJob, WorkerError, simplify_raster};
pub use pool::{WorkerClient, WorkerPool, default_worker_count};
