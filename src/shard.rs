//! Stateless mapping between the (row, outcome) work grid and shard indices.
//!
//! Rows are factors (or mediator groups in genotype screens). The grid is
//! flattened row-major, `linear = row * outcomes + outcome`, and cut into
//! consecutive runs of `width` cells. Shards are numbered from 1.

use crate::error::{MedScreenError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkItem {
    pub row: usize,
    pub outcome: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShardSlot {
    pub shard: usize,
    pub slot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sharder {
    rows: usize,
    outcomes: usize,
    width: usize,
}

impl Sharder {
    pub fn new(rows: usize, outcomes: usize, width: usize) -> Result<Self> {
        if width == 0 {
            return Err(MedScreenError::InvalidArgument(
                "shard width should be at least 1".to_string(),
            ));
        }
        Ok(Self {
            rows,
            outcomes,
            width,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn outcomes(&self) -> usize {
        self.outcomes
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn grid_size(&self) -> usize {
        self.rows * self.outcomes
    }

    pub fn shard_count(&self) -> usize {
        self.grid_size().div_ceil(self.width)
    }

    fn linear(&self, item: WorkItem) -> Option<usize> {
        (item.row < self.rows && item.outcome < self.outcomes)
            .then_some(item.row * self.outcomes + item.outcome)
    }

    pub fn locate(&self, item: WorkItem) -> Option<ShardSlot> {
        self.linear(item).map(|linear| ShardSlot {
            shard: linear / self.width + 1,
            slot: linear % self.width,
        })
    }

    pub fn resolve(&self, slot: ShardSlot) -> Option<WorkItem> {
        if slot.shard == 0 || slot.slot >= self.width {
            return None;
        }
        let linear = (slot.shard - 1) * self.width + slot.slot;
        (linear < self.grid_size()).then(|| WorkItem {
            row: linear / self.outcomes,
            outcome: linear % self.outcomes,
        })
    }

    /// Every work item owned by `shard`, in slot order. The last shard may
    /// own fewer than `width` items.
    pub fn pairs_for_shard(&self, shard: usize) -> Result<Vec<WorkItem>> {
        if shard == 0 || shard > self.shard_count() {
            return Err(MedScreenError::InvalidArgument(format!(
                "shard {shard} is outside 1..={}",
                self.shard_count()
            )));
        }
        Ok((0..self.width)
            .map_while(|slot| self.resolve(ShardSlot { shard, slot }))
            .collect())
    }
}
