/*!
 * Loader Worker Pool
 * Fixed set of threads draining a shared job queue
 */

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{error, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub(crate) struct WorkerPool {
    sender: Option<flume::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn new(threads: usize) -> Self {
        let (sender, receiver) = flume::unbounded::<Job>();
        let mut workers = Vec::with_capacity(threads);

        for index in 0..threads.max(1) {
            let receiver = receiver.clone();
            let spawned = thread::Builder::new()
                .name(format!("asset-loader-{}", index))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        // Loaders are already guarded; this keeps the worker alive regardless
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!("asset loader job panicked");
                        }
                    }
                });

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => warn!(index, error = %e, "failed to spawn asset loader thread"),
            }
        }

        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Queue a job; runs it on the calling thread if no worker is available
    pub(crate) fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.workers.is_empty() {
            job();
            return;
        }

        let job: Job = Box::new(job);
        let rejected = match &self.sender {
            Some(sender) => sender.send(job).err().map(|e| e.into_inner()),
            None => Some(job),
        };

        if let Some(job) = rejected {
            warn!("asset loader pool is shut down, running load inline");
            job();
        }
    }

    pub(crate) fn thread_count(&self) -> usize {
        self.workers.len()
    }

    fn is_worker(&self, id: ThreadId) -> bool {
        self.workers.iter().any(|w| w.thread().id() == id)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets workers finish queued loads and exit
        self.sender.take();

        let current = thread::current().id();
        if self.is_worker(current) {
            return;
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
