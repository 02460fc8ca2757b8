use serde::{Deserialize, Serialize};

/// Identifier of a single unit of work, in `0..total_tasks`.
pub type WorkItem = u64;

/// Index of a process in the transport group. Rank 0 is the coordinator.
pub type Rank = u32;

/// Result of one completed work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub task_id: WorkItem,
    pub value: u64,
}

impl ResultEntry {
    pub fn new(task_id: WorkItem, value: u64) -> Self {
        Self { task_id, value }
    }
}
