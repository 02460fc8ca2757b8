use std::sync::Arc;

use crate::dispatch::partition::TaskRange;
use crate::dispatch::task::{ResultEntry, WorkItem};

/// The unit computation applied to each task id.
///
/// Implementations must be pure: the entry for a task id never depends on
/// execution order, prior calls, or which rank runs it. That is what lets
/// the coordinator treat partial results from any partitioning as
/// interchangeable.
pub trait UnitTask: Send + Sync {
    fn compute(&self, task_id: WorkItem) -> ResultEntry;
}

/// The shipped load-generation workload: `value = task_id squared`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquareTask;

impl UnitTask for SquareTask {
    fn compute(&self, task_id: WorkItem) -> ResultEntry {
        ResultEntry::new(task_id, task_id.wrapping_mul(task_id))
    }
}

/// Applies the unit computation across a task range, in increasing id order.
#[derive(Clone)]
pub struct TaskExecutor {
    task: Arc<dyn UnitTask>,
}

impl TaskExecutor {
    pub fn new(task: Arc<dyn UnitTask>) -> Self {
        Self { task }
    }

    /// Executor for the default squaring workload.
    pub fn squares() -> Self {
        Self::new(Arc::new(SquareTask))
    }

    pub fn execute_one(&self, task_id: WorkItem) -> ResultEntry {
        self.task.compute(task_id)
    }

    /// Compute every entry in the range. Pure and idempotent; the output
    /// depends only on the range and the unit computation.
    pub fn execute(&self, range: TaskRange) -> Vec<ResultEntry> {
        range.iter().map(|id| self.task.compute(id)).collect()
    }
}
