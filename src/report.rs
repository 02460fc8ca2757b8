use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::ClusterConfig;
use crate::dispatch::aggregate::ClusterResult;
use crate::dispatch::partition::TaskRange;
use crate::dispatch::task::Rank;
use crate::error::Result;
use crate::thermal::{NodeId, TemperatureSample, ThrottleEvent, ThrottleKind};

/// One worker's check-in and completion record.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerReport {
    pub rank: Rank,
    pub node: NodeId,
    pub processor: String,
    /// The slice of the global task range this rank was assigned.
    pub range: TaskRange,
    pub tasks_completed: u64,
}

/// A node's thermal record for the run, taken from its lead rank's archive.
#[derive(Debug, Clone, Serialize)]
pub struct NodeThermalReport {
    pub node: NodeId,
    pub lead_rank: Rank,
    pub samples_recorded: usize,
    pub peak_fahrenheit: Option<f64>,
    pub throttle_events: Vec<ThrottleEvent>,
    pub samples: Vec<TemperatureSample>,
}

impl NodeThermalReport {
    pub fn new(
        node: NodeId,
        lead_rank: Rank,
        samples: Vec<TemperatureSample>,
        throttle_events: Vec<ThrottleEvent>,
    ) -> Self {
        let peak_fahrenheit = samples.iter().map(|s| s.fahrenheit).reduce(f64::max);
        Self {
            node,
            lead_rank,
            samples_recorded: samples.len(),
            peak_fahrenheit,
            throttle_events,
            samples,
        }
    }

    /// Number of times the node entered throttling.
    pub fn throttle_windows(&self) -> usize {
        self.throttle_events
            .iter()
            .filter(|e| e.kind == ThrottleKind::Start)
            .count()
    }
}

/// Everything a run produced, in one serializable record.
///
/// This is the handoff to external consumers: the CLI writes it as JSON and
/// downstream tooling plots the per-node samples and throttle windows from
/// it.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config: ClusterConfig,
    pub workers: Vec<WorkerReport>,
    pub nodes: Vec<NodeThermalReport>,
    pub result: ClusterResult,
}

impl RunReport {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
