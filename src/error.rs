use std::path::PathBuf;

use thiserror::Error;

use crate::dispatch::task::Rank;
use crate::thermal::NodeId;

#[derive(Error, Debug)]
pub enum HeatshedError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Sensor unavailable at {}: {source}", .path.display())]
    SensorUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Sensor returned unparseable reading: {raw:?}")]
    SensorParseError { raw: String },

    #[error("No temperature samples recorded yet for node {0}")]
    NoSamplesYet(NodeId),

    #[error("Aggregation incomplete, missing results from ranks {missing:?}")]
    IncompleteAggregation { missing: Vec<Rank> },

    #[error("Transport to rank {0} is closed")]
    TransportClosed(Rank),

    #[error("Worker rank {rank} failed: {reason}")]
    WorkerFailed { rank: Rank, reason: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HeatshedError>;
