pub mod aggregate;
pub mod partition;
pub mod task;

pub use aggregate::{aggregate, ClusterResult, CollectedRun, Coordinator};
pub use partition::{partition, TaskRange};
pub use task::{Rank, ResultEntry, WorkItem};
