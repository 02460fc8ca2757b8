use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ClusterConfig;
use crate::dispatch::aggregate::Coordinator;
use crate::dispatch::task::Rank;
use crate::error::{HeatshedError, Result};
use crate::report::RunReport;
use crate::thermal::{NodeId, TemperatureSensor, ThermalMonitor};
use crate::transport::LocalCluster;
use crate::worker::{TaskExecutor, Worker};

/// Run a full cluster in-process.
///
/// 1. Builds the local transport mesh for `worker_count` ranks
/// 2. Spawns ranks `1..P` as tasks, each with its own thermal monitor
/// 3. Runs the rank-0 coordinator inline (own slice, then collection)
/// 4. Joins every worker and assembles the run report
///
/// `make_sensor` is called once per rank so tests and the CLI can hand each
/// rank its own sensor. Workers still waiting on a hot gate are released
/// through a child cancellation token once the coordinator has finished, so
/// the final join cannot hang.
pub async fn run_local<F>(
    config: ClusterConfig,
    mut make_sensor: F,
    cancel: CancellationToken,
) -> Result<RunReport>
where
    F: FnMut(Rank, NodeId) -> Box<dyn TemperatureSensor>,
{
    config.validate()?;
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    tracing::info!(
        %run_id,
        workers = config.worker_count,
        total_tasks = config.total_tasks,
        threshold_f = config.thermal.threshold_f,
        "starting local cluster run"
    );

    let run_cancel = cancel.child_token();

    let mut endpoints = LocalCluster::endpoints(config.worker_count).into_iter();
    let coordinator_endpoint = match endpoints.next() {
        Some(endpoint) => endpoint,
        None => {
            return Err(HeatshedError::InvalidArgument(
                "worker_count must be at least 1".to_string(),
            ));
        }
    };

    let mut handles: Vec<(Rank, JoinHandle<Result<()>>)> = Vec::new();
    for (offset, endpoint) in endpoints.enumerate() {
        let rank = offset as Rank + 1;
        let node = NodeId::from_rank(rank, config.cores_per_node);
        let monitor = ThermalMonitor::new(node, make_sensor(rank, node), &config.thermal);
        let worker = Worker::new(
            rank,
            &config,
            TaskExecutor::squares(),
            monitor,
            run_cancel.clone(),
        )?;
        handles.push((rank, tokio::spawn(async move { worker.run(&endpoint).await })));
    }

    let coordinator_node = NodeId::from_rank(0, config.cores_per_node);
    let coordinator_monitor = ThermalMonitor::new(
        coordinator_node,
        make_sensor(0, coordinator_node),
        &config.thermal,
    );
    let coordinator = Coordinator::new(
        config.clone(),
        TaskExecutor::squares(),
        coordinator_monitor,
        run_cancel.clone(),
    )?;
    let collected = coordinator.run(&coordinator_endpoint).await;

    // Collection is over, one way or the other. Release any rank still
    // sleeping on its gate so the join below terminates.
    run_cancel.cancel();

    let mut worker_failure: Option<HeatshedError> = None;
    for (rank, handle) in handles {
        match handle.await {
            Ok(Ok(())) => {}
            // Induced by the cancel above, not a failure in its own right.
            Ok(Err(HeatshedError::Cancelled)) => {}
            Ok(Err(err)) => {
                tracing::error!(rank, error = %err, "worker failed");
                if worker_failure.is_none() {
                    worker_failure = Some(HeatshedError::WorkerFailed {
                        rank,
                        reason: err.to_string(),
                    });
                }
            }
            Err(join_err) => {
                tracing::error!(rank, error = %join_err, "worker task panicked");
                if worker_failure.is_none() {
                    worker_failure = Some(HeatshedError::WorkerFailed {
                        rank,
                        reason: join_err.to_string(),
                    });
                }
            }
        }
    }

    let collected = match (collected, worker_failure) {
        (Ok(collected), None) => collected,
        (Ok(_), Some(failure)) => return Err(failure),
        (Err(HeatshedError::Cancelled), _) => return Err(HeatshedError::Cancelled),
        // A dead worker explains the incomplete collection better than the
        // timeout does.
        (Err(HeatshedError::IncompleteAggregation { missing }), Some(failure)) => {
            tracing::error!(?missing, "aggregation incomplete after worker failure");
            return Err(failure);
        }
        (Err(err), _) => return Err(err),
    };

    let report = RunReport {
        run_id,
        started_at,
        finished_at: Utc::now(),
        config,
        workers: collected.workers,
        nodes: collected.nodes,
        result: collected.result,
    };
    tracing::info!(
        %run_id,
        entries = report.result.len(),
        duration_ms = report.duration().num_milliseconds(),
        "run complete"
    );
    Ok(report)
}
