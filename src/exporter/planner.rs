//! Batch planning for export operations
//!
//! This module computes the contiguous, non-overlapping `EntityId` ranges the
//! driver walks through. Planning is pure arithmetic over [`ExportState`]:
//! nothing here talks to the database or the filesystem.

/// Mutable state of a single export run.
///
/// Created once per run, advanced only by the driver after each successful
/// batch, and discarded when the run ends. It is never persisted, so a rerun
/// after a failure starts over from batch 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportState {
    /// Start of the next batch's range.
    pub cursor: i64,
    /// 1-based counter naming the next output file.
    pub sequence: u32,
    /// Maximum `EntityId` snapshotted at init. `None` means the source table
    /// held no rows and zero batches run.
    pub max_id: Option<i64>,
}

impl ExportState {
    /// Create the initial state for a run.
    ///
    /// # Arguments
    /// * `max_id` - Maximum entity id captured before the first batch, or
    ///   `None` when the source is empty
    pub fn new(max_id: Option<i64>) -> Self {
        Self {
            cursor: 1,
            sequence: 1,
            max_id,
        }
    }

    /// Advance past a successfully exported batch.
    pub fn advance(&mut self, batch_size: i64) {
        self.cursor += batch_size;
        self.sequence += 1;
    }

    /// Raise the snapshot maximum. Used by the optional live-refresh mode;
    /// the maximum never shrinks, so already-planned ranges stay valid.
    pub fn raise_max_id(&mut self, fresh: i64) {
        match self.max_id {
            Some(current) if fresh <= current => {}
            _ => self.max_id = Some(fresh),
        }
    }
}

/// A contiguous, inclusive range of `EntityId` values forming one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRange {
    pub start: i64,
    pub end: i64,
}

/// Planner producing the next batch range, or signalling exhaustion.
#[derive(Debug, Clone, Copy)]
pub struct BatchPlanner {
    batch_size: i64,
}

impl BatchPlanner {
    /// Create a planner for a fixed batch size.
    ///
    /// Callers validate the size; the planner assumes it is positive.
    pub fn new(batch_size: i64) -> Self {
        debug_assert!(batch_size > 0);
        Self { batch_size }
    }

    /// Compute the next batch range, or `None` once the cursor has passed
    /// the snapshot maximum (or the source was empty to begin with).
    ///
    /// The final range keeps its full width rather than being clamped to the
    /// maximum: ids past the maximum simply match no rows in the query, and
    /// full-width ranges keep the emitted ranges uniformly sized.
    pub fn next(&self, state: &ExportState) -> Option<BatchRange> {
        let max_id = state.max_id?;
        if state.cursor > max_id {
            return None;
        }
        Some(BatchRange {
            start: state.cursor,
            end: state.cursor + self.batch_size - 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Walk the planner to exhaustion, advancing like the driver does.
    fn collect_ranges(max_id: Option<i64>, batch_size: i64) -> Vec<BatchRange> {
        let planner = BatchPlanner::new(batch_size);
        let mut state = ExportState::new(max_id);
        let mut ranges = Vec::new();
        while let Some(range) = planner.next(&state) {
            ranges.push(range);
            state.advance(batch_size);
        }
        ranges
    }

    #[test]
    fn test_empty_source_plans_nothing() {
        assert!(collect_ranges(None, 2500).is_empty());
    }

    #[test]
    fn test_scenario_b_ranges() {
        // maxId 6000, batch 2500: three full-width ranges.
        let ranges = collect_ranges(Some(6000), 2500);
        assert_eq!(
            ranges,
            vec![
                BatchRange { start: 1, end: 2500 },
                BatchRange {
                    start: 2501,
                    end: 5000
                },
                BatchRange {
                    start: 5001,
                    end: 7500
                },
            ]
        );
    }

    #[test]
    fn test_exact_multiple() {
        let ranges = collect_ranges(Some(5000), 2500);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1].end, 5000);
    }

    #[test]
    fn test_single_entity() {
        let ranges = collect_ranges(Some(1), 2500);
        assert_eq!(ranges, vec![BatchRange { start: 1, end: 2500 }]);
    }

    #[test]
    fn test_ranges_are_disjoint_and_cover() {
        // Batch count is ceil(max_id / batch_size); ranges are contiguous
        // from 1 and pairwise disjoint, jointly covering [1, max_id].
        for (max_id, batch_size) in [
            (1i64, 1i64),
            (7, 3),
            (9, 3),
            (10, 3),
            (2500, 2500),
            (2501, 2500),
            (6000, 2500),
            (1_000_000, 999),
        ] {
            let ranges = collect_ranges(Some(max_id), batch_size);
            let expected = (max_id + batch_size - 1) / batch_size;
            assert_eq!(ranges.len() as i64, expected, "max={max_id} size={batch_size}");

            let mut next_start = 1;
            for range in &ranges {
                assert_eq!(range.start, next_start);
                assert_eq!(range.end, range.start + batch_size - 1);
                next_start = range.end + 1;
            }
            let last = ranges.last().unwrap();
            assert!(last.end >= max_id);
            assert!(last.end - max_id < batch_size);
        }
    }

    #[test]
    fn test_sequence_advances_with_cursor() {
        let mut state = ExportState::new(Some(100));
        assert_eq!(state.sequence, 1);
        state.advance(40);
        state.advance(40);
        assert_eq!(state.cursor, 81);
        assert_eq!(state.sequence, 3);
    }

    #[test]
    fn test_raise_max_id_never_shrinks() {
        let mut state = ExportState::new(Some(100));
        state.raise_max_id(50);
        assert_eq!(state.max_id, Some(100));
        state.raise_max_id(150);
        assert_eq!(state.max_id, Some(150));

        let mut empty = ExportState::new(None);
        empty.raise_max_id(10);
        assert_eq!(empty.max_id, Some(10));
    }
}
