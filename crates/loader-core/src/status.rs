use std::sync::Arc;

use serde::Serialize;

use crate::aggregate::aggregate;
use crate::board::{BoardReader, ProgressBoard};
use crate::metrics::{CpuStatus, DiskUsage, HostMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateState {
    Busy,
    Error,
    Ready,
}

impl AggregateState {
    /// Error wins over busy; busy wins over ready.
    pub fn of(board: &ProgressBoard) -> Self {
        if board.error {
            AggregateState::Error
        } else if board.busy {
            AggregateState::Busy
        } else {
            AggregateState::Ready
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Steps {
    pub current: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelStatus {
    pub level: usize,
    pub progress: u32,
    pub steps: Steps,
    pub action: Option<String>,
    pub output: Option<String>,
}

/// Point-in-time, read-only view of the loader. Rebuilt on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub status: AggregateState,
    pub progress: Vec<LevelStatus>,
    pub disk: DiskUsage,
    pub cpu: CpuStatus,
}

impl StatusSnapshot {
    pub fn build(board: &ProgressBoard, disk: DiskUsage, cpu: CpuStatus) -> Self {
        let percent = aggregate(&board.tree);
        let progress = board
            .tree
            .nodes()
            .iter()
            .zip(percent)
            .map(|(node, progress)| LevelStatus {
                level: node.level,
                progress,
                steps: Steps {
                    current: node.tick,
                    total: node.total,
                },
                action: node.action.clone(),
                output: node.output.clone(),
            })
            .collect();
        Self {
            status: AggregateState::of(board),
            progress,
            disk,
            cpu,
        }
    }

    /// Drop the diagnostic output blobs.
    pub fn without_output(mut self) -> Self {
        for level in &mut self.progress {
            level.output = None;
        }
        self
    }
}

/// Combines the published board with host metrics on demand.
#[derive(Clone)]
pub struct StatusProjector {
    reader: BoardReader,
    metrics: Arc<dyn HostMetrics>,
}

impl StatusProjector {
    pub fn new(reader: BoardReader, metrics: Arc<dyn HostMetrics>) -> Self {
        Self { reader, metrics }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let board = self.reader.snapshot();
        StatusSnapshot::build(&board, self.metrics.disk(), self.metrics.cpu())
    }
}
