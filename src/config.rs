use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::error::{HeatshedError, Result};

/// Default sysfs file exposing the SoC temperature in milli-degrees Celsius.
pub const DEFAULT_SENSOR_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Configuration for per-node thermal monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct ThermalConfig {
    /// Admission threshold in degrees Fahrenheit. A reading strictly above
    /// this pauses new work on the node until a reading at or below it.
    pub threshold_f: f64,
    /// Maximum number of temperature samples archived per node. Once full,
    /// later samples still drive gating but are no longer recorded.
    pub max_recordings: usize,
    /// Path of the plain-text milli-degree sensor file.
    pub sensor_path: PathBuf,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            threshold_f: 70.0,
            max_recordings: 1000,
            sensor_path: PathBuf::from(DEFAULT_SENSOR_PATH),
        }
    }
}

/// Configuration for a cluster run.
///
/// Passed by value at construction; nothing reads configuration from global
/// state.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterConfig {
    /// Total number of tasks, ids 0..total_tasks.
    pub total_tasks: u64,
    /// Number of worker ranks, including the coordinator (rank 0).
    pub worker_count: u32,
    /// Ranks per physical node; node id = rank / cores_per_node.
    pub cores_per_node: u32,
    /// How long a throttled worker sleeps between re-checks of its gate.
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,
    /// Per-receive bound on the coordinator's collection barrier. `None`
    /// waits indefinitely for every worker.
    #[serde(with = "opt_duration_millis")]
    pub aggregation_timeout: Option<Duration>,
    pub thermal: ThermalConfig,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            total_tasks: 1000,
            worker_count: 4,
            cores_per_node: 4,
            poll_interval: Duration::from_millis(500),
            aggregation_timeout: Some(Duration::from_secs(60)),
            thermal: ThermalConfig::default(),
        }
    }
}

impl ClusterConfig {
    pub fn new(total_tasks: u64, worker_count: u32) -> Self {
        Self {
            total_tasks,
            worker_count,
            ..Default::default()
        }
    }

    pub fn with_cores_per_node(mut self, cores_per_node: u32) -> Self {
        self.cores_per_node = cores_per_node;
        self
    }

    pub fn with_threshold_f(mut self, threshold_f: f64) -> Self {
        self.thermal.threshold_f = threshold_f;
        self
    }

    pub fn with_max_recordings(mut self, max_recordings: usize) -> Self {
        self.thermal.max_recordings = max_recordings;
        self
    }

    pub fn with_sensor_path(mut self, path: PathBuf) -> Self {
        self.thermal.sensor_path = path;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_aggregation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.aggregation_timeout = timeout;
        self
    }

    /// Reject configurations that cannot describe a run.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(HeatshedError::InvalidArgument(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if self.cores_per_node == 0 {
            return Err(HeatshedError::InvalidArgument(
                "cores_per_node must be at least 1".to_string(),
            ));
        }
        if !self.thermal.threshold_f.is_finite() {
            return Err(HeatshedError::InvalidArgument(format!(
                "threshold_f must be finite, got {}",
                self.thermal.threshold_f
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(HeatshedError::InvalidArgument(
                "poll_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

mod opt_duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }
}
