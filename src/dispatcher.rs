use crate::config;
use crate::error::{PipelineError, Result};
use crate::model::Report;
use crate::pipeline::{JobOutcome, Pipeline};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicU64,
    completed: AtomicU64,
    vanished: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    pub queued: u64,
    pub completed: u64,
    pub vanished: u64,
    pub failed: u64,
    pub panicked: u64,
}

impl DispatchStats {
    pub fn finished(&self) -> u64 {
        self.completed + self.vanished + self.failed + self.panicked
    }
}

pub struct JobDispatcher {
    tx: Option<Sender<Report>>,
    workers: Vec<thread::JoinHandle<()>>,
    counters: Arc<Counters>,
    capacity: usize,
}

impl JobDispatcher {
    pub fn start(cfg: &config::Dispatcher, pipeline: Arc<Pipeline>) -> Result<Self> {
        let capacity = cfg.queue_capacity.max(1);
        let (tx, rx) = bounded::<Report>(capacity);
        let counters = Arc::new(Counters::default());

        let mut workers = Vec::new();
        for worker_index in 0..cfg.workers.max(1) {
            let rx = rx.clone();
            let pipeline = Arc::clone(&pipeline);
            let counters = Arc::clone(&counters);
            let handle = thread::Builder::new()
                .name(format!("roadscan-worker-{worker_index}"))
                .spawn(move || worker_loop(worker_index, rx, pipeline, counters))?;
            workers.push(handle);
        }

        info!(
            workers = workers.len(),
            capacity, "dispatcher started"
        );
        Ok(Self {
            tx: Some(tx),
            workers,
            counters,
            capacity,
        })
    }

    pub fn launch_background(&self, report: Report) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(PipelineError::DispatcherClosed)?;
        let report_id = report.id.clone();
        match tx.try_send(report) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
                debug!(report_id = %report_id, pending = tx.len(), "report queued");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                warn!(report_id = %report_id, capacity = self.capacity, "dispatch queue full");
                Err(PipelineError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Disconnected(_)) => Err(PipelineError::DispatcherClosed),
        }
    }

    pub fn launch_blocking(&self, report: Report) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(PipelineError::DispatcherClosed)?;
        tx.send(report).map_err(|_| PipelineError::DispatcherClosed)?;
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.tx.as_ref().map_or(0, |tx| tx.len())
    }

    pub fn stats(&self) -> DispatchStats {
        let c = &self.counters;
        DispatchStats {
            queued: c.queued.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            vanished: c.vanished.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            panicked: c.panicked.load(Ordering::Relaxed),
        }
    }

    pub fn shutdown(mut self) -> DispatchStats {
        self.close();
        self.stats()
    }

    fn close(&mut self) {
        if self.tx.take().is_none() {
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("dispatcher worker panicked outside a job");
            }
        }
        info!(stats = ?self.stats(), "dispatcher stopped");
    }
}

impl Drop for JobDispatcher {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker_loop(
    worker_index: usize,
    rx: Receiver<Report>,
    pipeline: Arc<Pipeline>,
    counters: Arc<Counters>,
) {
    let span = tracing::info_span!("dispatcher.worker", worker = worker_index);
    let _enter = span.enter();
    debug!("worker started");

    for report in rx.iter() {
        let outcome = catch_unwind(AssertUnwindSafe(|| pipeline.run_job(&report)));
        match outcome {
            Ok(Ok(JobOutcome::Classified(_))) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Ok(JobOutcome::Vanished)) => {
                counters.vanished.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Ok(JobOutcome::Failed { .. })) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(err)) => {
                error!(report_id = %report.id, kind = ?err.kind(), "job raised: {err}");
                counters.failed.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                error!(report_id = %report.id, "job panicked");
                pipeline.mark_error(&report.id);
                counters.panicked.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    debug!("worker exiting");
}
