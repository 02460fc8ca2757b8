use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::thermal::NodeId;

/// One archived temperature reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSample {
    pub node: NodeId,
    /// Position in the node's sample stream, assigned by the monitor.
    pub seq: u64,
    pub recorded_at: DateTime<Utc>,
    pub fahrenheit: f64,
}

impl TemperatureSample {
    pub fn new(node: NodeId, seq: u64, fahrenheit: f64) -> Self {
        Self {
            node,
            seq,
            recorded_at: Utc::now(),
            fahrenheit,
        }
    }
}

/// Bounded, append-only archive of temperature samples. Each sample carries
/// its node id; the owning monitor decides which node the archive serves.
///
/// Once `max_recordings` samples are stored the archive stops accepting new
/// ones and `record` returns false. The early samples are kept rather than
/// evicted so a full run's warm-up is still available for post-run analysis.
/// Admission gating does not depend on the archive and keeps working when it
/// is full.
#[derive(Debug, Clone)]
pub struct TemperatureHistory {
    max_recordings: usize,
    samples: Vec<TemperatureSample>,
}

impl TemperatureHistory {
    pub fn new(max_recordings: usize) -> Self {
        Self {
            max_recordings,
            samples: Vec::new(),
        }
    }

    /// Append a sample. Returns false when the archive is already full and
    /// the sample was dropped.
    pub fn record(&mut self, sample: TemperatureSample) -> bool {
        if self.samples.len() >= self.max_recordings {
            return false;
        }
        self.samples.push(sample);
        true
    }

    pub fn latest(&self) -> Option<&TemperatureSample> {
        self.samples.last()
    }

    pub fn samples(&self) -> &[TemperatureSample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<TemperatureSample> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.max_recordings
    }

    pub fn capacity(&self) -> usize {
        self.max_recordings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(seq: u64, fahrenheit: f64) -> TemperatureSample {
        TemperatureSample::new(NodeId(0), seq, fahrenheit)
    }

    #[test]
    fn records_until_full() {
        let mut history = TemperatureHistory::new(3);
        assert!(history.record(sample(0, 61.0)));
        assert!(history.record(sample(1, 62.0)));
        assert!(history.record(sample(2, 63.0)));
        assert!(history.is_full());
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn full_archive_drops_new_samples() {
        let mut history = TemperatureHistory::new(2);
        assert!(history.record(sample(0, 61.0)));
        assert!(history.record(sample(1, 62.0)));
        assert!(!history.record(sample(2, 63.0)));
        assert_eq!(history.len(), 2);
        // The earliest samples survive, not the newest.
        assert_eq!(history.samples()[0].fahrenheit, 61.0);
        assert_eq!(history.latest().map(|s| s.seq), Some(1));
    }

    #[test]
    fn latest_is_none_before_first_sample() {
        let history = TemperatureHistory::new(10);
        assert!(history.latest().is_none());
        assert!(history.is_empty());
        assert!(!history.is_full());
    }

    #[test]
    fn zero_capacity_accepts_nothing() {
        let mut history = TemperatureHistory::new(0);
        assert!(!history.record(sample(0, 61.0)));
        assert!(history.is_empty());
        assert!(history.is_full());
    }
}
