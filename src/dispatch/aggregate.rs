use std::collections::BTreeMap;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::ClusterConfig;
use crate::dispatch::partition::TaskRange;
use crate::dispatch::task::{Rank, ResultEntry, WorkItem};
use crate::error::{HeatshedError, Result};
use crate::report::{NodeThermalReport, WorkerReport};
use crate::thermal::{NodeId, TemperatureSample, ThermalMonitor, ThrottleEvent};
use crate::transport::{Message, Transport};
use crate::worker::{TaskExecutor, Worker};

/// The fully merged result table, ordered by task id.
///
/// Exclusively owned by the coordinator; workers only ever see their own
/// slices.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterResult {
    entries: Vec<ResultEntry>,
}

impl ClusterResult {
    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    pub fn get(&self, task_id: WorkItem) -> Option<u64> {
        self.entries
            .binary_search_by_key(&task_id, |e| e.task_id)
            .ok()
            .map(|idx| self.entries[idx].value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Merge per-rank partial results into one complete table.
///
/// Arrival order never matters: the global order is re-established here by
/// sorting on task id. Fails if any expected rank is absent, if a rank id
/// outside the group reported, or if the merged table is not exactly the ids
/// `0..total` with no duplicates.
pub fn aggregate(
    partials: BTreeMap<Rank, Vec<ResultEntry>>,
    expected_workers: u32,
    total: u64,
) -> Result<ClusterResult> {
    let missing: Vec<Rank> = (0..expected_workers)
        .filter(|rank| !partials.contains_key(rank))
        .collect();
    if !missing.is_empty() {
        return Err(HeatshedError::IncompleteAggregation { missing });
    }
    if let Some((&rank, _)) = partials.range(expected_workers..).next() {
        return Err(HeatshedError::InvalidArgument(format!(
            "partial result from unknown rank {rank}"
        )));
    }

    let mut entries: Vec<ResultEntry> = partials.into_values().flatten().collect();
    entries.sort_by_key(|e| e.task_id);

    for pair in entries.windows(2) {
        if pair[0].task_id == pair[1].task_id {
            return Err(HeatshedError::InvalidArgument(format!(
                "duplicate result for task {}",
                pair[0].task_id
            )));
        }
    }
    if let Some(entry) = entries.last() {
        if entry.task_id >= total {
            return Err(HeatshedError::InvalidArgument(format!(
                "task id {} out of range, expected ids below {total}",
                entry.task_id
            )));
        }
    }
    if entries.len() as u64 != total {
        return Err(HeatshedError::InvalidArgument(format!(
            "results cover {} of {total} tasks",
            entries.len()
        )));
    }

    Ok(ClusterResult { entries })
}

/// Output of a coordinated run before report assembly.
pub struct CollectedRun {
    pub result: ClusterResult,
    pub workers: Vec<WorkerReport>,
    pub nodes: Vec<NodeThermalReport>,
}

/// Rank 0: works its own slice, then runs the collection barrier over ranks
/// `1..P` and merges everything into the final table.
pub struct Coordinator {
    config: ClusterConfig,
    worker: Worker,
    cancel: CancellationToken,
}

impl Coordinator {
    pub fn new(
        config: ClusterConfig,
        executor: TaskExecutor,
        monitor: ThermalMonitor,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let worker = Worker::new(0, &config, executor, monitor, cancel.clone())?;
        Ok(Self {
            config,
            worker,
            cancel,
        })
    }

    pub async fn run<T: Transport + ?Sized>(mut self, transport: &T) -> Result<CollectedRun> {
        let p = self.config.worker_count;
        tracing::info!(
            workers = p,
            total_tasks = self.config.total_tasks,
            processor = transport.processor_name(),
            "coordinator starting"
        );

        // The coordinator is also a worker: it computes its own slice
        // locally, so no rank ever sends to itself.
        let own_entries = self.worker.process_range().await?;

        let mut partials: BTreeMap<Rank, Vec<ResultEntry>> = BTreeMap::new();
        let mut workers: Vec<WorkerReport> = Vec::with_capacity(p as usize);
        let mut thermal: BTreeMap<Rank, (NodeId, Vec<TemperatureSample>, Vec<ThrottleEvent>)> =
            BTreeMap::new();

        workers.push(WorkerReport {
            rank: self.worker.rank(),
            node: self.worker.node(),
            processor: transport.processor_name().to_string(),
            range: self.worker.range(),
            tasks_completed: own_entries.len() as u64,
        });
        partials.insert(0, own_entries);

        // Collection barrier: one hello and one partial result per rank, in
        // rank order. Later ranks just buffer in their channels until their
        // turn. Ranks that time out or hang up are collected into one
        // IncompleteAggregation naming all of them.
        let mut missing: Vec<Rank> = Vec::new();
        for src in 1..p {
            let processor = match self.recv_bounded(transport, src).await? {
                Some(Message::Hello {
                    rank,
                    node,
                    processor,
                }) => {
                    if rank != src {
                        return Err(HeatshedError::InvalidArgument(format!(
                            "hello from rank {rank} on channel {src}"
                        )));
                    }
                    tracing::info!(rank, node = %node, processor = %processor, "worker checked in");
                    processor
                }
                Some(other) => {
                    return Err(HeatshedError::InvalidArgument(format!(
                        "expected hello from rank {src}, got {}",
                        other.kind()
                    )));
                }
                None => {
                    missing.push(src);
                    continue;
                }
            };

            match self.recv_bounded(transport, src).await? {
                Some(Message::PartialResult {
                    worker,
                    node,
                    entries,
                    samples,
                    events,
                }) => {
                    if worker != src {
                        return Err(HeatshedError::InvalidArgument(format!(
                            "partial result from rank {worker} on channel {src}"
                        )));
                    }
                    tracing::info!(
                        rank = worker,
                        node = %node,
                        entries = entries.len(),
                        throttle_events = events.len(),
                        "partial result received"
                    );
                    // Ranks derive their slice from the shared config, so
                    // the coordinator can reconstruct it without carrying it
                    // on the wire.
                    workers.push(WorkerReport {
                        rank: worker,
                        node,
                        processor,
                        range: TaskRange::for_rank(self.config.total_tasks, p, worker)?,
                        tasks_completed: entries.len() as u64,
                    });
                    partials.insert(worker, entries);
                    thermal.insert(worker, (node, samples, events));
                }
                Some(other) => {
                    return Err(HeatshedError::InvalidArgument(format!(
                        "expected partial result from rank {src}, got {}",
                        other.kind()
                    )));
                }
                None => missing.push(src),
            }
        }
        if !missing.is_empty() {
            return Err(HeatshedError::IncompleteAggregation { missing });
        }

        let own_node = NodeId::from_rank(0, self.config.cores_per_node);
        let (own_samples, own_events) = self.worker.into_monitor().into_archive();
        thermal.insert(0, (own_node, own_samples, own_events));

        let result = aggregate(partials, p, self.config.total_tasks)?;
        tracing::info!(entries = result.len(), "aggregation complete");

        // One thermal record per node, taken from the node's lead rank. All
        // ranks on a node watch the same sensor, so one archive suffices.
        let nodes: Vec<NodeThermalReport> = thermal
            .into_iter()
            .filter(|(rank, _)| NodeId::is_lead_rank(*rank, self.config.cores_per_node))
            .map(|(rank, (node, samples, events))| {
                NodeThermalReport::new(node, rank, samples, events)
            })
            .collect();

        Ok(CollectedRun {
            result,
            workers,
            nodes,
        })
    }

    /// Receive from one rank, bounded by the aggregation timeout. `Ok(None)`
    /// means the rank never reported (timed out or hung up); the caller
    /// records it as missing and keeps collecting.
    async fn recv_bounded<T: Transport + ?Sized>(
        &self,
        transport: &T,
        src: Rank,
    ) -> Result<Option<Message>> {
        let received = async {
            match self.config.aggregation_timeout {
                Some(limit) => tokio::time::timeout(limit, transport.recv(src)).await.ok(),
                None => Some(transport.recv(src).await),
            }
        };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(HeatshedError::Cancelled),
            outcome = received => match outcome {
                None => {
                    tracing::warn!(rank = src, timeout = ?self.config.aggregation_timeout, "rank did not report in time");
                    Ok(None)
                }
                Some(Ok(message)) => Ok(Some(message)),
                Some(Err(HeatshedError::TransportClosed(rank))) => {
                    tracing::warn!(rank, "rank hung up before reporting");
                    Ok(None)
                }
                Some(Err(err)) => Err(err),
            },
        }
    }
}
