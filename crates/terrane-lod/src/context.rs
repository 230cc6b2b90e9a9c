//! Process-wide resources shared by every quadtree.

use std::sync::Arc;

use terrane_rtin::{MeshOptions, Rtin, RtinError};
use terrane_worker::{WorkerClient, WorkerPool};

/// The simplifier tables and the worker pool, built once and passed to each view.
pub struct TerrainContext {
    pub rtin: Arc<Rtin>,
    pub pool: Arc<WorkerPool>,
}

impl TerrainContext {
    pub fn new(pool: Arc<WorkerPool>) -> Arc<Self> {
        Arc::new(Self {
            rtin: Arc::clone(pool.rtin()),
            pool,
        })
    }

    /// Build tables for `grid_size` and start `worker_count` workers
    /// (0 selects the default count).
    pub fn build(
        grid_size: usize,
        worker_count: usize,
        options: MeshOptions,
    ) -> Result<Arc<Self>, RtinError> {
        let rtin = Arc::new(Rtin::new(grid_size)?);
        let pool = if worker_count == 0 {
            WorkerPool::with_defaults(rtin, options)
        } else {
            WorkerPool::new(worker_count, rtin, options)
        };
        Ok(Self::new(Arc::new(pool)))
    }

    pub fn client(&self) -> WorkerClient {
        self.pool.client()
    }
}
