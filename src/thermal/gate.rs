use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::thermal::history::TemperatureSample;
use crate::thermal::NodeId;

/// Admission state of a node's thermal gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThermalState {
    Normal,
    Throttled,
}

impl std::fmt::Display for ThermalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThermalState::Normal => write!(f, "normal"),
            ThermalState::Throttled => write!(f, "throttled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThrottleKind {
    /// The node crossed above the threshold and stopped admitting work.
    Start,
    /// The node cooled back to the threshold and resumed admitting work.
    End,
}

impl std::fmt::Display for ThrottleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThrottleKind::Start => write!(f, "throttle-start"),
            ThrottleKind::End => write!(f, "throttle-end"),
        }
    }
}

/// Emitted on each threshold crossing, in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleEvent {
    pub node: NodeId,
    pub kind: ThrottleKind,
    /// The reading that triggered the transition.
    pub fahrenheit: f64,
    /// Sequence number of that reading in the node's sample stream.
    pub seq: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Two-state thermal admission gate for one node.
///
/// `Normal -> Throttled` on a reading strictly above the threshold,
/// `Throttled -> Normal` on a reading at or below it. A reading that does
/// not cross the threshold leaves the state untouched, so a long hot spell
/// produces exactly one event, not one per sample. Sensor failures never
/// reach the gate; it holds its last-known state until the next good
/// reading.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    node: NodeId,
    threshold_f: f64,
    state: ThermalState,
}

impl AdmissionGate {
    pub fn new(node: NodeId, threshold_f: f64) -> Self {
        Self {
            node,
            threshold_f,
            state: ThermalState::Normal,
        }
    }

    pub fn state(&self) -> ThermalState {
        self.state
    }

    /// True when the gate admits new work.
    pub fn may_admit(&self) -> bool {
        self.state == ThermalState::Normal
    }

    /// Feed one reading through the gate. Returns an event only when the
    /// reading crossed the threshold.
    pub fn observe(&mut self, sample: &TemperatureSample) -> Option<ThrottleEvent> {
        let hot = sample.fahrenheit > self.threshold_f;
        let kind = match (self.state, hot) {
            (ThermalState::Normal, true) => {
                self.state = ThermalState::Throttled;
                ThrottleKind::Start
            }
            (ThermalState::Throttled, false) => {
                self.state = ThermalState::Normal;
                ThrottleKind::End
            }
            _ => return None,
        };
        Some(ThrottleEvent {
            node: self.node,
            kind,
            fahrenheit: sample.fahrenheit,
            seq: sample.seq,
            occurred_at: Utc::now(),
        })
    }
}
