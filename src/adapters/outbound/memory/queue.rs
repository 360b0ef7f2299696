use crate::ports::outbound::{Delivery, JobQueue, QueueStatus};
use crate::risk_analysis::domain::AnalysisJob;
use crate::shared::{ErrorCategory, PipelineError};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

struct Inner {
    pending: VecDeque<AnalysisJob>,
    in_flight: HashSet<u64>,
    dead: Vec<(AnalysisJob, ErrorCategory)>,
    /// Jobs sitting out a requeue delay; counted in depth.
    delayed: usize,
    /// Bumped by purge so that delayed requeues from before the purge are
    /// discarded instead of resurfacing.
    epoch: u64,
    next_tag: u64,
    closed: bool,
}

/// In-process broker adapter satisfying the `JobQueue` contract.
///
/// Provides at-least-once delivery with manual acknowledgment inside one
/// process: a pulled job is tracked as in-flight until it is acked,
/// requeued, or dead-lettered, and a worker crash before ack leaves it
/// owned by the queue. Requeue delays run on spawned timers.
#[derive(Clone)]
pub struct InMemoryJobQueue {
    inner: Arc<Mutex<Inner>>,
    notify: Arc<Notify>,
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                pending: VecDeque::new(),
                in_flight: HashSet::new(),
                dead: Vec::new(),
                delayed: 0,
                epoch: 0,
                next_tag: 0,
                closed: false,
            })),
            notify: Arc::new(Notify::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, PipelineError> {
        self.inner.lock().map_err(|_| PipelineError::Queue {
            details: "queue state lock poisoned".to_string(),
        })
    }

    /// Dead-lettered jobs with their failure categories, for inspection.
    pub fn dead_letters(&self) -> Vec<(AnalysisJob, ErrorCategory)> {
        self.inner
            .lock()
            .map(|inner| inner.dead.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn publish(&self, job: AnalysisJob) -> Result<(), PipelineError> {
        {
            let mut inner = self.lock()?;
            if inner.closed {
                return Err(PipelineError::Queue {
                    details: "queue is closed".to_string(),
                });
            }
            inner.pending.push_back(job);
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn pull(&self) -> Option<Delivery> {
        loop {
            {
                let mut inner = self.inner.lock().ok()?;
                if inner.closed {
                    return None;
                }
                if let Some(job) = inner.pending.pop_front() {
                    let tag = inner.next_tag;
                    inner.next_tag += 1;
                    inner.in_flight.insert(tag);
                    // Cascade the wakeup so sibling workers see the rest
                    // of a burst of publishes.
                    if !inner.pending.is_empty() {
                        self.notify.notify_one();
                    }
                    return Some(Delivery { job, tag });
                }
            }
            self.notify.notified().await;
        }
    }

    async fn ack(&self, delivery: Delivery) -> Result<(), PipelineError> {
        let mut inner = self.lock()?;
        inner.in_flight.remove(&delivery.tag);
        Ok(())
    }

    async fn requeue(&self, delivery: Delivery, delay: Duration) -> Result<(), PipelineError> {
        let epoch = {
            let mut inner = self.lock()?;
            inner.in_flight.remove(&delivery.tag);
            inner.delayed += 1;
            inner.epoch
        };

        let mut job = delivery.job;
        job.attempt_count += 1;
        let shared = Arc::clone(&self.inner);
        let notify = Arc::clone(&self.notify);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Ok(mut inner) = shared.lock() {
                inner.delayed = inner.delayed.saturating_sub(1);
                if inner.epoch == epoch && !inner.closed {
                    inner.pending.push_back(job);
                } else {
                    return;
                }
            }
            notify.notify_one();
        });
        Ok(())
    }

    async fn dead_letter(
        &self,
        delivery: Delivery,
        category: ErrorCategory,
    ) -> Result<(), PipelineError> {
        let mut inner = self.lock()?;
        inner.in_flight.remove(&delivery.tag);
        inner.dead.push((delivery.job, category));
        Ok(())
    }

    async fn status(&self) -> QueueStatus {
        self.inner
            .lock()
            .map(|inner| QueueStatus {
                depth: inner.pending.len() + inner.delayed,
                in_flight: inner.in_flight.len(),
                dead_letter: inner.dead.len(),
            })
            .unwrap_or_default()
    }

    async fn purge(&self) -> Result<usize, PipelineError> {
        let mut inner = self.lock()?;
        let removed = inner.pending.len() + inner.delayed;
        inner.pending.clear();
        inner.delayed = 0;
        inner.epoch += 1;
        Ok(removed)
    }

    fn close(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.closed = true;
        }
        self.notify.notify_waiters();
    }
}
