pub mod cluster;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod report;
pub mod shutdown;
pub mod thermal;
pub mod transport;
pub mod worker;

pub use cluster::run_local;
pub use config::{ClusterConfig, ThermalConfig};
pub use error::{HeatshedError, Result};
