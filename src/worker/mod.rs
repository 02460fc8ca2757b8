//! Per-rank work loop with thermal admission control.
//!
//! Each rank owns its slice of the task range and works through it
//! sequentially:
//!
//! 1. Check in with the coordinator (`Hello`)
//! 2. For every task id: take a fresh temperature sample, wait while the
//!    node's gate is closed, then compute the entry
//! 3. Send the completed slice and the node's thermal record back
//!    (`PartialResult`)
//!
//! The gate only delays new admissions; a task that has started always runs
//! to completion. While throttled the loop sleeps for the configured poll
//! interval between samples rather than spinning.

pub mod executor;

pub use executor::{SquareTask, TaskExecutor, UnitTask};

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::ClusterConfig;
use crate::dispatch::partition::TaskRange;
use crate::dispatch::task::{Rank, ResultEntry, WorkItem};
use crate::error::{HeatshedError, Result};
use crate::thermal::{NodeId, ThermalMonitor};
use crate::transport::{Message, Transport};

pub struct Worker {
    rank: Rank,
    node: NodeId,
    range: TaskRange,
    executor: TaskExecutor,
    monitor: ThermalMonitor,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl Worker {
    pub fn new(
        rank: Rank,
        config: &ClusterConfig,
        executor: TaskExecutor,
        monitor: ThermalMonitor,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let range = TaskRange::for_rank(config.total_tasks, config.worker_count, rank)?;
        Ok(Self {
            rank,
            node: monitor.node(),
            range,
            executor,
            monitor,
            poll_interval: config.poll_interval,
            cancel,
        })
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn range(&self) -> TaskRange {
        self.range
    }

    pub fn into_monitor(self) -> ThermalMonitor {
        self.monitor
    }

    /// Work through the assigned range in task-id order, pausing while the
    /// node is hot.
    pub async fn process_range(&mut self) -> Result<Vec<ResultEntry>> {
        tracing::info!(
            rank = self.rank,
            node = %self.node,
            range = %self.range,
            "worker starting"
        );
        let mut entries = Vec::with_capacity(self.range.len() as usize);
        for task_id in self.range.iter() {
            self.await_admission(task_id).await?;
            entries.push(self.executor.execute_one(task_id));
        }
        tracing::info!(
            rank = self.rank,
            completed = entries.len(),
            throttle_events = self.monitor.events().len(),
            "worker finished range"
        );
        Ok(entries)
    }

    /// One fresh sample per admission decision. While the gate is closed,
    /// sleep for the poll interval and sample again; never busy-wait.
    async fn await_admission(&mut self, task_id: WorkItem) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(HeatshedError::Cancelled);
        }
        self.poll_monitor();
        while !self.monitor.may_admit() {
            tracing::debug!(
                rank = self.rank,
                node = %self.node,
                task_id,
                "admission deferred, waiting for node to cool"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(HeatshedError::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            self.poll_monitor();
        }
        Ok(())
    }

    fn poll_monitor(&mut self) {
        if let Some(event) = self.monitor.poll() {
            tracing::info!(
                rank = self.rank,
                node = %event.node,
                kind = %event.kind,
                fahrenheit = event.fahrenheit,
                seq = event.seq,
                "thermal gate transition"
            );
        }
    }

    /// Full worker protocol for non-coordinator ranks: check in, process the
    /// range, report the slice and thermal record to rank 0.
    pub async fn run<T: Transport + ?Sized>(mut self, transport: &T) -> Result<()> {
        transport
            .send(
                0,
                Message::Hello {
                    rank: self.rank,
                    node: self.node,
                    processor: transport.processor_name().to_string(),
                },
            )
            .await?;

        let entries = self.process_range().await?;

        let (samples, events) = self.monitor.into_archive();
        transport
            .send(
                0,
                Message::PartialResult {
                    worker: self.rank,
                    node: self.node,
                    entries,
                    samples,
                    events,
                },
            )
            .await?;
        Ok(())
    }
}
