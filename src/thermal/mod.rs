pub mod gate;
pub mod history;
pub mod sensor;

pub use gate::{AdmissionGate, ThermalState, ThrottleEvent, ThrottleKind};
pub use history::{TemperatureHistory, TemperatureSample};
pub use sensor::{RampSensor, SysfsSensor, TemperatureSensor};

use serde::{Deserialize, Serialize};

use crate::config::ThermalConfig;
use crate::dispatch::task::Rank;
use crate::error::{HeatshedError, Result};

/// Identifier of a physical node. Ranks on the same board share one thermal
/// zone, so they map onto one node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The node a rank runs on, given how many ranks each node hosts.
    pub fn from_rank(rank: Rank, cores_per_node: u32) -> Self {
        debug_assert!(cores_per_node > 0);
        Self(rank / cores_per_node)
    }

    /// Whether `rank` is the first rank on its node. The lead rank's archive
    /// is the node's canonical history in the run report.
    pub fn is_lead_rank(rank: Rank, cores_per_node: u32) -> bool {
        rank % cores_per_node == 0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-rank thermal pipeline: one sensor, one bounded archive, one admission
/// gate, all for the rank's node.
///
/// `poll` absorbs sensor failures: a failed read is logged and the gate
/// keeps its previous state, so a flaky sensor file can never crash a worker
/// loop or flap the gate open.
pub struct ThermalMonitor {
    node: NodeId,
    sensor: Box<dyn TemperatureSensor>,
    history: TemperatureHistory,
    gate: AdmissionGate,
    events: Vec<ThrottleEvent>,
    next_seq: u64,
    archive_full_logged: bool,
}

impl ThermalMonitor {
    pub fn new(node: NodeId, sensor: Box<dyn TemperatureSensor>, config: &ThermalConfig) -> Self {
        Self {
            node,
            sensor,
            history: TemperatureHistory::new(config.max_recordings),
            gate: AdmissionGate::new(node, config.threshold_f),
            events: Vec::new(),
            next_seq: 0,
            archive_full_logged: false,
        }
    }

    /// Take one reading and feed it through the archive and the gate.
    /// Returns the throttle event if this reading crossed the threshold.
    pub fn poll(&mut self) -> Option<ThrottleEvent> {
        let fahrenheit = match self.sensor.sample() {
            Ok(fahrenheit) => fahrenheit,
            Err(err) => {
                tracing::warn!(
                    node = %self.node,
                    error = %err,
                    "temperature sample failed, keeping previous gate state"
                );
                return None;
            }
        };

        let sample = TemperatureSample::new(self.node, self.next_seq, fahrenheit);
        self.next_seq += 1;

        if !self.history.record(sample.clone()) && !self.archive_full_logged {
            tracing::warn!(
                node = %self.node,
                capacity = self.history.capacity(),
                "temperature archive full, further samples gate but are not recorded"
            );
            self.archive_full_logged = true;
        }

        let event = self.gate.observe(&sample);
        if let Some(event) = &event {
            self.events.push(event.clone());
        }
        event
    }

    pub fn may_admit(&self) -> bool {
        self.gate.may_admit()
    }

    pub fn state(&self) -> ThermalState {
        self.gate.state()
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Most recent archived sample, or `NoSamplesYet` before the first
    /// successful poll.
    pub fn latest_sample(&self) -> Result<&TemperatureSample> {
        self.history
            .latest()
            .ok_or(HeatshedError::NoSamplesYet(self.node))
    }

    pub fn samples(&self) -> &[TemperatureSample] {
        self.history.samples()
    }

    pub fn events(&self) -> &[ThrottleEvent] {
        &self.events
    }

    /// Number of successful sensor reads, including unarchived ones.
    pub fn samples_taken(&self) -> u64 {
        self.next_seq
    }

    pub fn into_archive(self) -> (Vec<TemperatureSample>, Vec<ThrottleEvent>) {
        (self.history.into_samples(), self.events)
    }
}
