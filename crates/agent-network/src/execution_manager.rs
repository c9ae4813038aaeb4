//! Execution Manager - fixed worker pool draining a bounded work queue
//!
//! Callers reserve a queue slot first and only then create durable records,
//! so a full queue is reported before anything is written. Each worker pulls
//! one workflow at a time and runs it to completion on the engine.

use crate::error::{ServiceError, ServiceResult};
use crate::workflow::WorkflowEngine;
use dealflow_common::WorkflowId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError, OwnedPermit};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, Instrument};

/// A queued workflow run
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub workflow_id: WorkflowId,
}

/// A reserved slot in the work queue
pub struct QueueSlot {
    permit: OwnedPermit<WorkItem>,
}

pub struct ExecutionManager {
    sender: Mutex<Option<mpsc::Sender<WorkItem>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    in_flight: Arc<AtomicUsize>,
    capacity: usize,
}

impl ExecutionManager {
    /// Spawn `workers` tasks consuming a queue of `queue_capacity` items
    #[instrument(name = "execution_manager_init", skip(engine))]
    pub fn start(engine: Arc<WorkflowEngine>, workers: usize, queue_capacity: usize) -> Self {
        let workers = workers.max(1);
        let capacity = queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel::<WorkItem>(capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let handles = (0..workers)
            .map(|worker| {
                let engine = engine.clone();
                let receiver = receiver.clone();
                let in_flight = in_flight.clone();
                tokio::spawn(
                    async move {
                        loop {
                            // Lock is released before the run starts
                            let next = receiver.lock().await.recv().await;
                            let Some(item) = next else {
                                debug!("Queue closed, worker exiting");
                                break;
                            };

                            // Own task per run, so a panic ends the run and not the worker
                            let run = {
                                let engine = engine.clone();
                                let workflow_id = item.workflow_id.clone();
                                tokio::spawn(
                                    async move { engine.run(&workflow_id).await }.in_current_span(),
                                )
                            };

                            match run.await {
                                Ok(Ok(status)) => {
                                    debug!("Workflow {} finished as {}", item.workflow_id, status)
                                }
                                Ok(Err(e)) => {
                                    error!("Workflow {} aborted: {}", item.workflow_id, e)
                                }
                                Err(e) => {
                                    error!("Workflow {} run task failed: {}", item.workflow_id, e)
                                }
                            }
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                        }
                    }
                    .instrument(tracing::info_span!("workflow_worker", worker)),
                )
            })
            .collect();

        info!("Started {} workers (queue capacity {})", workers, capacity);

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
            in_flight,
            capacity,
        }
    }

    /// Reserve a queue slot without waiting
    pub async fn try_reserve(&self) -> ServiceResult<QueueSlot> {
        let sender = self
            .sender
            .lock()
            .await
            .clone()
            .ok_or(ServiceError::ShuttingDown)?;

        match sender.try_reserve_owned() {
            Ok(permit) => Ok(QueueSlot { permit }),
            Err(TrySendError::Full(_)) => Err(ServiceError::QueueFull {
                capacity: self.capacity,
            }),
            Err(TrySendError::Closed(_)) => Err(ServiceError::ShuttingDown),
        }
    }

    /// Enqueue into a previously reserved slot; cannot fail
    pub fn submit(&self, slot: QueueSlot, item: WorkItem) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        debug!("Queued workflow {}", item.workflow_id);
        slot.permit.send(item);
    }

    /// Queued plus running workflows
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Stop accepting work, let the workers drain the queue, then join them
    pub async fn shutdown(&self) {
        // Dropping the last sender closes the channel once queued items are consumed
        self.sender.lock().await.take();

        let handles = std::mem::take(&mut *self.workers.lock().await);
        info!("Draining {} in-flight workflows", self.in_flight());
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker task failed: {}", e);
            }
        }
        info!("Execution manager stopped");
    }
}
