//! Fixed worker pool with round-robin dispatch.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};
use terrane_rtin::{MeshOptions, Rtin};
use tracing::{debug, trace, warn};

use crate::{JobResult, SimplifyJob, WorkerError, simplify_raster};

/// Upper bound for the automatic worker count.
const MAX_DEFAULT_WORKERS: usize = 3;

/// Worker count used when none is configured: one less than the core count,
/// clamped to `1..=3`.
pub fn default_worker_count() -> usize {
    num_cpus::get()
        .saturating_sub(1)
        .clamp(1, MAX_DEFAULT_WORKERS)
}

/// A job on its way to a worker, with where to send the answer.
struct Envelope {
    job: SimplifyJob,
    cancelled: Arc<AtomicBool>,
    reply: Sender<JobResult>,
}

/// Fixed set of simplification threads, each with its own queue.
///
/// Share it behind an [`Arc`] and hand each consumer its own
/// [`WorkerClient`]. Dropping the pool closes the queues and joins the
/// threads after they finish the jobs already queued.
pub struct WorkerPool {
    senders: Vec<Sender<Envelope>>,
    handles: Vec<JoinHandle<()>>,
    dispatch_counter: AtomicUsize,
    in_flight: Arc<AtomicU64>,
    rtin: Arc<Rtin>,
}

impl WorkerPool {
    /// Spawn `worker_count` threads (at least one) sharing `rtin`.
    pub fn new(worker_count: usize, rtin: Arc<Rtin>, options: MeshOptions) -> Self {
        let worker_count = worker_count.max(1);
        let in_flight = Arc::new(AtomicU64::new(0));
        let mut senders = Vec::with_capacity(worker_count);
        let mut handles = Vec::with_capacity(worker_count);

        for index in 0..worker_count {
            let (sender, receiver) = unbounded::<Envelope>();
            let rtin = Arc::clone(&rtin);
            let in_flight = Arc::clone(&in_flight);
            let handle = std::thread::Builder::new()
                .name(format!("terrane-worker-{index}"))
                .spawn(move || run_worker(index, receiver, &rtin, &options, &in_flight))
                .expect("Failed to spawn simplification worker thread");
            senders.push(sender);
            handles.push(handle);
        }

        debug!(
            workers = worker_count,
            grid_size = rtin.grid_size(),
            "started worker pool"
        );
        Self {
            senders,
            handles,
            dispatch_counter: AtomicUsize::new(0),
            in_flight,
            rtin,
        }
    }

    /// Create a pool sized by [`default_worker_count`].
    pub fn with_defaults(rtin: Arc<Rtin>, options: MeshOptions) -> Self {
        Self::new(default_worker_count(), rtin, options)
    }

    /// Open a reply channel on a shared pool.
    pub fn client(self: &Arc<Self>) -> WorkerClient {
        let (reply_tx, reply_rx) = unbounded();
        WorkerClient {
            pool: Arc::clone(self),
            reply_tx,
            reply_rx,
            pending: HashMap::new(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.senders.len()
    }

    /// Jobs queued or executing across all workers.
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn rtin(&self) -> &Arc<Rtin> {
        &self.rtin
    }

    /// Hand `envelope` to the next worker in turn and return its index.
    fn dispatch(&self, envelope: Envelope) -> usize {
        let index = self.dispatch_counter.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = self.senders[index].send(envelope) {
            self.in_flight.fetch_sub(1, Ordering::Relaxed);
            let envelope = err.into_inner();
            warn!(worker = index, key = envelope.job.key, "worker queue closed");
            let _ = envelope.reply.send(JobResult {
                key: envelope.job.key,
                outcome: Err(WorkerError::Disconnected(index)),
            });
        }
        index
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.senders.clear();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        debug!("worker pool shut down");
    }
}

fn run_worker(
    index: usize,
    receiver: Receiver<Envelope>,
    rtin: &Rtin,
    options: &MeshOptions,
    in_flight: &AtomicU64,
) {
    while let Ok(envelope) = receiver.recv() {
        let key = envelope.job.key;
        if envelope.cancelled.load(Ordering::Relaxed) {
            trace!(worker = index, key, "skipping cancelled job");
            in_flight.fetch_sub(1, Ordering::Relaxed);
            continue;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            simplify_raster(&envelope.job, rtin, options)
        }))
        .unwrap_or_else(|payload| Err(WorkerError::Panicked(panic_message(payload.as_ref()))));

        if let Err(err) = &outcome {
            warn!(worker = index, key, "simplification failed: {err}");
        }
        if !envelope.cancelled.load(Ordering::Relaxed) {
            let _ = envelope.reply.send(JobResult { key, outcome });
        }
        in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// One consumer's view of a [`WorkerPool`]: submits jobs and receives only
/// its own results.
///
/// Results for keys that were cancelled, or never submitted through this
/// client, are dropped by [`drain_results`](Self::drain_results).
pub struct WorkerClient {
    pool: Arc<WorkerPool>,
    reply_tx: Sender<JobResult>,
    reply_rx: Receiver<JobResult>,
    pending: HashMap<u64, Arc<AtomicBool>>,
}

impl WorkerClient {
    /// Queue `job` and return the index of the worker it was sent to.
    ///
    /// Resubmitting a key that is still pending cancels the earlier job.
    pub fn submit(&mut self, job: SimplifyJob) -> usize {
        let cancelled = Arc::new(AtomicBool::new(false));
        if let Some(previous) = self.pending.insert(job.key, Arc::clone(&cancelled)) {
            previous.store(true, Ordering::Relaxed);
        }
        self.pool.dispatch(Envelope {
            job,
            cancelled,
            reply: self.reply_tx.clone(),
        })
    }

    /// Cancel the job for `key`. Returns `false` if nothing was pending.
    pub fn cancel(&mut self, key: u64) -> bool {
        match self.pending.remove(&key) {
            Some(cancelled) => {
                cancelled.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Collect every result that has arrived for a still-pending key.
    ///
    /// Call once per frame on the scheduling thread.
    pub fn drain_results(&mut self) -> Vec<JobResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.reply_rx.try_recv() {
            match self.pending.get(&result.key) {
                Some(flag) if !flag.load(Ordering::Relaxed) => {
                    self.pending.remove(&result.key);
                    results.push(result);
                }
                _ => trace!(key = result.key, "dropping stale worker result"),
            }
        }
        results
    }

    /// Jobs submitted through this client that have not been drained or cancelled.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, key: u64) -> bool {
        self.pending.contains_key(&key)
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }
}

impl Drop for WorkerClient {
    fn drop(&mut self) {
        for cancelled in self.pending.values() {
            cancelled.store(true, Ordering::Relaxed);
        }
    }
}
