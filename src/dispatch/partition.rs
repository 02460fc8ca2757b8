use serde::Serialize;

use crate::dispatch::task::{Rank, WorkItem};
use crate::error::{HeatshedError, Result};

/// A half-open slice `[start, end)` of the global task range.
///
/// Empty slices (`start == end`) are valid and occur when there are more
/// workers than tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskRange {
    pub start: WorkItem,
    pub end: WorkItem,
}

impl TaskRange {
    pub fn new(start: WorkItem, end: WorkItem) -> Self {
        debug_assert!(end >= start);
        Self { start, end }
    }

    /// The slice assigned to `rank` out of `workers`, without materializing
    /// the full partition. Equal to `partition(total, workers)?[rank]`.
    pub fn for_rank(total: u64, workers: u32, rank: Rank) -> Result<Self> {
        if workers == 0 {
            return Err(HeatshedError::InvalidArgument(
                "cannot partition across zero workers".to_string(),
            ));
        }
        if rank >= workers {
            return Err(HeatshedError::InvalidArgument(format!(
                "rank {rank} out of range for {workers} workers"
            )));
        }
        let workers = u64::from(workers);
        let rank = u64::from(rank);
        let base = total / workers;
        let extra = total % workers;
        // The first `extra` ranks each take one additional task, so every
        // slice has size floor(total/workers) or ceil(total/workers).
        let start = rank * base + rank.min(extra);
        let len = base + u64::from(rank < extra);
        Ok(Self::new(start, start + len))
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, task_id: WorkItem) -> bool {
        task_id >= self.start && task_id < self.end
    }

    /// Task ids in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = WorkItem> {
        self.start..self.end
    }
}

impl std::fmt::Display for TaskRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Split `total` tasks across `workers` ranks: contiguous, disjoint, ordered
/// by rank, sizes differing by at most one.
pub fn partition(total: u64, workers: u32) -> Result<Vec<TaskRange>> {
    if workers == 0 {
        return Err(HeatshedError::InvalidArgument(
            "cannot partition across zero workers".to_string(),
        ));
    }
    (0..workers)
        .map(|rank| TaskRange::for_rank(total, workers, rank))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split() {
        let ranges = partition(10, 2).unwrap();
        assert_eq!(ranges, vec![TaskRange::new(0, 5), TaskRange::new(5, 10)]);
    }

    #[test]
    fn uneven_split_front_loads_remainder() {
        let ranges = partition(10, 3).unwrap();
        assert_eq!(
            ranges,
            vec![
                TaskRange::new(0, 4),
                TaskRange::new(4, 7),
                TaskRange::new(7, 10),
            ]
        );
    }

    #[test]
    fn more_workers_than_tasks_yields_empty_tails() {
        let ranges = partition(2, 4).unwrap();
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0], TaskRange::new(0, 1));
        assert_eq!(ranges[1], TaskRange::new(1, 2));
        assert!(ranges[2].is_empty());
        assert!(ranges[3].is_empty());
    }

    #[test]
    fn zero_tasks_yields_all_empty() {
        let ranges = partition(0, 3).unwrap();
        assert_eq!(ranges.len(), 3);
        assert!(ranges.iter().all(|r| r.is_empty()));
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(matches!(
            partition(10, 0),
            Err(HeatshedError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rank_out_of_range_is_rejected() {
        assert!(TaskRange::for_rank(10, 2, 2).is_err());
    }

    /// Coverage, disjointness, ordering, and balance over a sweep of shapes.
    #[test]
    fn partition_laws() {
        for total in [0u64, 1, 2, 7, 10, 100, 101, 1000] {
            for workers in [1u32, 2, 3, 4, 7, 16] {
                let ranges = partition(total, workers).unwrap();
                assert_eq!(ranges.len(), workers as usize);

                // Contiguous and ordered: each range starts where the
                // previous ended, first at 0, last at total.
                assert_eq!(ranges[0].start, 0);
                assert_eq!(ranges[ranges.len() - 1].end, total);
                for pair in ranges.windows(2) {
                    assert_eq!(pair[0].end, pair[1].start);
                }

                // Covering: sizes sum to total.
                let covered: u64 = ranges.iter().map(|r| r.len()).sum();
                assert_eq!(covered, total);

                // Balanced: sizes differ by at most one.
                let min = ranges.iter().map(|r| r.len()).min().unwrap();
                let max = ranges.iter().map(|r| r.len()).max().unwrap();
                assert!(max - min <= 1);
            }
        }
    }

    #[test]
    fn for_rank_matches_partition() {
        for total in [0u64, 5, 10, 97] {
            for workers in [1u32, 2, 5, 8] {
                let ranges = partition(total, workers).unwrap();
                for rank in 0..workers {
                    assert_eq!(
                        TaskRange::for_rank(total, workers, rank).unwrap(),
                        ranges[rank as usize]
                    );
                }
            }
        }
    }

    #[test]
    fn range_iteration_is_increasing() {
        let range = TaskRange::new(3, 7);
        let ids: Vec<u64> = range.iter().collect();
        assert_eq!(ids, vec![3, 4, 5, 6]);
    }

    #[test]
    fn contains_respects_half_open_bounds() {
        let range = TaskRange::new(3, 7);
        assert!(!range.contains(2));
        assert!(range.contains(3));
        assert!(range.contains(6));
        assert!(!range.contains(7));
    }

    #[test]
    fn display_uses_half_open_notation() {
        assert_eq!(TaskRange::new(0, 5).to_string(), "[0, 5)");
    }
}
