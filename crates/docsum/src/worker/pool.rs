use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};
use tokio::runtime::Runtime;

use crate::error::WorkerError;
use crate::summary::SummaryWorker;
use crate::worker::job::{JobResult, SummaryJob};

/// Cloneable handle that stops a [`WorkerPool`] from another thread, e.g. a
/// Ctrl-C handler.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Fixed set of OS threads consuming [`SummaryJob`]s from a bounded channel.
///
/// Each thread owns a current-thread tokio runtime and blocks on one job at a
/// time. Jobs still queued at shutdown are dropped; their documents stay
/// `Pending` and are picked up again by startup recovery.
pub struct WorkerPool {
    job_sender: Sender<SummaryJob>,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` threads. Fails with [`WorkerError::Runtime`] when
    /// `worker_count` is 0.
    pub fn new(worker: Arc<SummaryWorker>, worker_count: usize) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::Runtime("worker_count must be > 0".to_string()));
        }
        let (job_sender, job_receiver) = bounded::<SummaryJob>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<JobResult>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| WorkerError::Runtime(e.to_string()))?;

            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let summary_worker = Arc::clone(&worker);

            let handle = thread::Builder::new()
                .name(format!("docsum-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(
                        worker_id,
                        runtime,
                        job_rx,
                        result_tx,
                        shutdown_flag,
                        summary_worker,
                    );
                })
                .map_err(|e| WorkerError::Runtime(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} summary workers", worker_count);

        Ok(Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
        })
    }

    /// Enqueues a job, blocking while the queue is full.
    pub fn submit(&self, job: SummaryJob) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    pub fn recv_result(&self) -> Option<JobResult> {
        self.result_receiver.recv().ok()
    }

    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<JobResult> {
        self.result_receiver.recv_timeout(timeout).ok()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn run_worker(
    worker_id: usize,
    runtime: Runtime,
    job_receiver: Receiver<SummaryJob>,
    result_sender: Sender<JobResult>,
    shutdown: Arc<AtomicBool>,
    worker: Arc<SummaryWorker>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(job) => {
                debug!("Worker {} processing document {}", worker_id, job.document_id);

                let outcome = runtime.block_on(worker.process(&job.document_id));
                if let Err(ref e) = outcome {
                    warn!("Summary job for {} failed: {}", job.document_id, e);
                }

                let result = JobResult {
                    document_id: job.document_id,
                    outcome,
                };

                // Results are informational; nobody is required to read them.
                match result_sender.try_send(result) {
                    Ok(()) => {}
                    Err(TrySendError::Full(result)) => {
                        debug!("Result queue full, dropping result for {}", result.document_id);
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        debug!("Worker {} result channel disconnected", worker_id);
                        break;
                    }
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
